use std::marker::PhantomData;

use glam::{Vec2, Vec3, Vec4};
use ndarray::Array2;

use crate::{
    error::{CompileError, FluidError},
    field::{ChannelLayout, Field, Sampled, Target},
};

pub mod cpu;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// A texture binding slot. Sampler uniforms hold one of these.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureUnit(pub u32);

/// Vertex stages the core knows how to ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexStage {
    /// Emits the cell position `v_P` plus its four neighbors `v_L`, `v_R`, `v_T`, `v_B`, offset
    /// by the `u_texelSize` uniform.
    Neighborhood,
    /// Emits the cell position only.
    Position,
}

impl VertexStage {
    pub fn writes_neighbors(self) -> bool {
        matches!(self, VertexStage::Neighborhood)
    }
}

/// Fragment stages of the simulation, one per kind of pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentStage {
    Clear,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    Obstacle,
    Transfer,
}

impl FragmentStage {
    /// Whether the stage samples the neighbor varyings of [`VertexStage::Neighborhood`].
    pub fn reads_neighbors(self) -> bool {
        matches!(
            self,
            FragmentStage::Curl
                | FragmentStage::Vorticity
                | FragmentStage::Divergence
                | FragmentStage::Pressure
                | FragmentStage::GradientSubtract
        )
    }
}

/// Values of the `u_boundaryMode` uniform of [`FragmentStage::Pressure`].
pub mod boundary_mode {
    /// Neighbors outside the grid read the clamped edge texel.
    pub const EDGE: i32 = 0;
    /// Neighbors outside the grid read `u_boundaryValue`.
    pub const FIXED: i32 = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: &'static str,
    pub vertex: VertexStage,
    pub fragment: FragmentStage,
}

impl ProgramSource {
    pub const fn new(label: &'static str, vertex: VertexStage, fragment: FragmentStage) -> Self {
        Self { label, vertex, fragment }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Sampler,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    Sampler(TextureUnit),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Sampler(_) => UniformKind::Sampler,
        }
    }

    /// The value an unset uniform of the given kind holds.
    pub fn zero(kind: UniformKind) -> Self {
        match kind {
            UniformKind::Float => UniformValue::Float(0.0),
            UniformKind::Vec2 => UniformValue::Vec2(Vec2::ZERO),
            UniformKind::Vec3 => UniformValue::Vec3(Vec3::ZERO),
            UniformKind::Vec4 => UniformValue::Vec4(Vec4::ZERO),
            UniformKind::Int => UniformValue::Int(0),
            UniformKind::Sampler => UniformValue::Sampler(TextureUnit(0)),
        }
    }
}

/// Rust types that can be stored in a uniform slot.
pub trait UniformType: Copy {
    const KIND: UniformKind;

    fn into_value(self) -> UniformValue;
}

impl UniformType for f32 {
    const KIND: UniformKind = UniformKind::Float;

    fn into_value(self) -> UniformValue {
        UniformValue::Float(self)
    }
}

impl UniformType for Vec2 {
    const KIND: UniformKind = UniformKind::Vec2;

    fn into_value(self) -> UniformValue {
        UniformValue::Vec2(self)
    }
}

impl UniformType for Vec3 {
    const KIND: UniformKind = UniformKind::Vec3;

    fn into_value(self) -> UniformValue {
        UniformValue::Vec3(self)
    }
}

impl UniformType for Vec4 {
    const KIND: UniformKind = UniformKind::Vec4;

    fn into_value(self) -> UniformValue {
        UniformValue::Vec4(self)
    }
}

impl UniformType for i32 {
    const KIND: UniformKind = UniformKind::Int;

    fn into_value(self) -> UniformValue {
        UniformValue::Int(self)
    }
}

impl UniformType for TextureUnit {
    const KIND: UniformKind = UniformKind::Sampler;

    fn into_value(self) -> UniformValue {
        UniformValue::Sampler(self)
    }
}

/// A uniform slot of one program, resolved once when the program is loaded.
///
/// The type parameter pins the value type, so a slot can only ever be fed the kind of value the
/// program declared for it.
#[derive(Debug, PartialEq, Eq)]
pub struct UniformLocation<T> {
    program: ProgramId,
    index: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for UniformLocation<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UniformLocation<T> {}

impl<T> UniformLocation<T> {
    pub fn new(program: ProgramId, index: usize) -> Self {
        Self {
            program,
            index,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A rendering/compute backend that evaluates one program over every cell of a target.
///
/// The simulation issues passes through this trait and never evaluates cells itself. Passes
/// execute in call order: a pass observes everything written by earlier passes.
pub trait Backend {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId, CompileError>;

    /// Resolves the uniform `name` of `program` as a slot of type `T`.
    fn uniform_location<T: UniformType>(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation<T>, CompileError>;

    fn bind_program(&mut self, program: ProgramId);

    fn set_uniform<T: UniformType>(&mut self, location: UniformLocation<T>, value: T);

    /// Binds `texture` to texture unit `unit`, returning the value to store in a sampler uniform.
    fn attach(&mut self, texture: Sampled<'_>, unit: u32) -> Result<TextureUnit, FluidError>;

    /// Runs the bound program once per cell of `target`. With `clear`, the target is reset to
    /// opaque black first.
    fn execute_pass(&mut self, target: Target<'_>, clear: bool) -> Result<(), FluidError>;

    fn allocate_field(
        &mut self,
        width: u32,
        height: u32,
        layout: &ChannelLayout,
    ) -> Result<Field, FluidError>;

    fn release_field(&mut self, field: Field);

    /// Replaces the contents of the first channel set of `field`.
    fn upload(&mut self, field: &Field, data: &Array2<Vec4>) -> Result<(), FluidError>;

    fn read_back(&self, texture: Sampled<'_>) -> Result<Array2<Vec4>, FluidError>;

    fn surface_size(&self) -> (u32, u32);

    fn resize_surface(&mut self, width: u32, height: u32);

    fn read_surface(&self) -> Array2<Vec4>;
}
