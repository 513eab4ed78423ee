use std::collections::HashMap;

use glam::{Vec2, Vec4};
use kernels::{Fragment, ShadeContext, UniformDecl};
use log::{debug, trace};
use ndarray::{Array2, Zip};
use smallvec::SmallVec;
use texture::Texture;

use crate::{
    error::{AllocationError, CompileError, FluidError, IncompleteTargetError},
    field::{Attachment, ChannelLayout, Field, Sampled, Target},
};

use super::{
    Backend, FieldId, ProgramId, ProgramSource, TextureId, TextureUnit, UniformLocation,
    UniformType, UniformValue,
};

pub mod kernels;
pub mod texture;

/// Capabilities of a [`CpuBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_texture_size: u32,
    pub texture_units: u32,
    pub max_color_attachments: usize,
    /// Textures that may be alive at once, across all fields.
    pub max_textures: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            texture_units: 8,
            max_color_attachments: 4,
            max_textures: 4096,
        }
    }
}

struct Program {
    source: ProgramSource,
    /// Uniforms of both stages, merged by name.
    uniforms: Vec<UniformDecl>,
    values: Vec<UniformValue>,
    vertex_slots: Vec<usize>,
    fragment_slots: Vec<usize>,
}

impl Program {
    fn link(source: &ProgramSource) -> Result<Self, CompileError> {
        let error = |log: String| CompileError {
            program: source.label.to_owned(),
            log,
        };

        if source.fragment.reads_neighbors() && !source.vertex.writes_neighbors() {
            return Err(error(format!(
                "fragment stage {:?} reads varyings `v_L`, `v_R`, `v_T`, `v_B` not written by vertex stage {:?}",
                source.fragment, source.vertex,
            )));
        }

        let mut uniforms: Vec<UniformDecl> = Vec::new();
        let mut merge = |decls: &[UniformDecl]| -> Result<Vec<usize>, CompileError> {
            decls
                .iter()
                .map(|decl| match uniforms.iter().position(|u| u.name == decl.name) {
                    Some(i) if uniforms[i].kind == decl.kind => Ok(i),
                    Some(i) => Err(error(format!(
                        "uniform `{}` declared as {:?} and {:?}",
                        decl.name, uniforms[i].kind, decl.kind,
                    ))),
                    None => {
                        uniforms.push(*decl);
                        Ok(uniforms.len() - 1)
                    }
                })
                .collect()
        };

        let vertex_slots = merge(kernels::vertex_uniforms(source.vertex))?;
        let fragment_slots = merge(kernels::fragment_uniforms(source.fragment))?;
        let values = uniforms.iter().map(|u| UniformValue::zero(u.kind)).collect();

        Ok(Self {
            source: *source,
            uniforms,
            values,
            vertex_slots,
            fragment_slots,
        })
    }

    fn texel_size(&self) -> Option<Vec2> {
        if !self.source.vertex.writes_neighbors() {
            return None;
        }

        match self.values[self.vertex_slots[kernels::VERTEX_TEXEL_SIZE]] {
            UniformValue::Vec2(v) => Some(v),
            _ => Some(Vec2::ZERO),
        }
    }

    /// Texture units referenced by the sampler uniforms of the program.
    fn sampler_units(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.iter().filter_map(|v| match v {
            UniformValue::Sampler(unit) => Some(unit.0 as usize),
            _ => None,
        })
    }
}

/// A software [`Backend`] that evaluates passes on the CPU, one rayon task per row band.
///
/// Both texel formats are stored at `f32` precision.
pub struct CpuBackend {
    limits: Limits,
    textures: HashMap<TextureId, Texture>,
    fields: HashMap<FieldId, SmallVec<[TextureId; 4]>>,
    programs: Vec<Program>,
    bound: Option<ProgramId>,
    units: Vec<Option<TextureId>>,
    surface: Texture,
    next_texture: u32,
    next_field: u32,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            textures: HashMap::new(),
            fields: HashMap::new(),
            programs: Vec::new(),
            bound: None,
            units: vec![None; limits.texture_units as usize],
            surface: Texture::new(1, 1, Default::default()),
            next_texture: 0,
            next_field: 0,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    fn program(&self, id: ProgramId) -> Result<&Program, CompileError> {
        self.programs.get(id.0 as usize).ok_or_else(|| CompileError {
            program: format!("{id:?}"),
            log: "no such program".to_owned(),
        })
    }

    /// Evaluates the bound program over a `width`x`height` grid.
    fn evaluate(&self, program: &Program, width: usize, height: usize) -> Array2<Vec4> {
        let units: Vec<Option<&Texture>> = self
            .units
            .iter()
            .map(|unit| unit.and_then(|id| self.textures.get(&id)))
            .collect();

        let ctx = ShadeContext::new(&program.values, &program.fragment_slots, &units);
        let texel_size = program.texel_size();
        let stage = program.source.fragment;

        let mut out = Array2::from_elem((width, height), Vec4::ZERO);
        Zip::indexed(&mut out).par_for_each(|(x, y), texel| {
            let fragment = Fragment::at(x, y, width, height, texel_size);
            *texel = kernels::shade(stage, &ctx, &fragment);
        });

        out
    }
}

impl Backend for CpuBackend {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId, CompileError> {
        let program = Program::link(source)?;
        let id = ProgramId(self.programs.len() as u32);

        debug!(
            "compiled program `{}` as {id:?} ({} uniforms)",
            source.label,
            program.uniforms.len(),
        );
        self.programs.push(program);

        Ok(id)
    }

    fn uniform_location<T: UniformType>(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation<T>, CompileError> {
        let compiled = self.program(program)?;

        compiled
            .uniforms
            .iter()
            .position(|u| u.name == name && u.kind == T::KIND)
            .map(|index| UniformLocation::new(program, index))
            .ok_or_else(|| CompileError {
                program: compiled.source.label.to_owned(),
                log: format!("no active uniform `{name}` of type {:?}", T::KIND),
            })
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.bound = Some(program);
    }

    fn set_uniform<T: UniformType>(&mut self, location: UniformLocation<T>, value: T) {
        if let Some(program) = self.programs.get_mut(location.program().0 as usize) {
            program.values[location.index()] = value.into_value();
        }
    }

    fn attach(&mut self, texture: Sampled<'_>, unit: u32) -> Result<TextureUnit, FluidError> {
        if unit >= self.limits.texture_units {
            return Err(FluidError::TextureUnit {
                unit,
                available: self.limits.texture_units,
            });
        }

        if !self.textures.contains_key(&texture.texture()) {
            return Err(IncompleteTargetError {
                field: texture.field(),
                reason: "storage was released".to_owned(),
            }
            .into());
        }

        self.units[unit as usize] = Some(texture.texture());
        Ok(TextureUnit(unit))
    }

    fn execute_pass(&mut self, target: Target<'_>, clear: bool) -> Result<(), FluidError> {
        let id = self.bound.ok_or_else(|| CompileError {
            program: "<none>".to_owned(),
            log: "no program is bound".to_owned(),
        })?;
        let program = self.program(id)?;

        match target {
            Target::Field(field) => {
                let attachments = self.fields.get(&field.id()).ok_or_else(|| IncompleteTargetError {
                    field: field.id(),
                    reason: "storage was released".to_owned(),
                })?;

                for unit in program.sampler_units() {
                    if let Some(Some(texture)) = self.units.get(unit) {
                        if attachments.contains(texture) {
                            return Err(FluidError::FeedbackLoop {
                                texture: *texture,
                                field: field.id(),
                            });
                        }
                    }
                }

                let output = attachments[0];
                let (width, height) = (field.width() as usize, field.height() as usize);
                let out = self.evaluate(program, width, height);

                trace!("pass `{}` -> {:?}", program.source.label, field.id());

                match self.textures.get_mut(&output) {
                    Some(texture) => texture.replace(out),
                    None => {
                        return Err(IncompleteTargetError {
                            field: field.id(),
                            reason: "storage was released".to_owned(),
                        }
                        .into())
                    }
                }
            }
            Target::Surface => {
                let (width, height) = self.surface.dim();
                let src = self.evaluate(program, width, height);

                trace!("pass `{}` -> surface", program.source.label);

                let mut dst = self.surface.data().clone();
                if clear {
                    dst.fill(Vec4::W);
                }

                Zip::from(&mut dst).and(&src).par_for_each(|d, &s| {
                    *d = s * s.w + *d * (1.0 - s.w);
                });
                self.surface.replace(dst);
            }
        }

        Ok(())
    }

    fn allocate_field(
        &mut self,
        width: u32,
        height: u32,
        layout: &ChannelLayout,
    ) -> Result<Field, FluidError> {
        let id = FieldId(self.next_field);

        if layout.is_empty() {
            return Err(IncompleteTargetError {
                field: id,
                reason: "layout has no channel sets".to_owned(),
            }
            .into());
        }

        let reason = if width == 0 || height == 0 {
            Some("size must be nonzero".to_owned())
        } else if width > self.limits.max_texture_size || height > self.limits.max_texture_size {
            Some(format!(
                "exceeds the maximum texture size {}",
                self.limits.max_texture_size
            ))
        } else if layout.len() > self.limits.max_color_attachments {
            Some(format!(
                "{} channel sets exceed the maximum of {}",
                layout.len(),
                self.limits.max_color_attachments
            ))
        } else if self.textures.len() + layout.len() > self.limits.max_textures {
            Some(format!(
                "{} live textures exhaust the budget of {}",
                self.textures.len(),
                self.limits.max_textures
            ))
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(AllocationError { width, height, reason }.into());
        }

        self.next_field += 1;

        let mut attachments = SmallVec::<[Attachment; 4]>::new();
        for &name in layout.names() {
            let texture = TextureId(self.next_texture);
            self.next_texture += 1;

            self.textures.insert(
                texture,
                Texture::new(width as usize, height as usize, layout.format()),
            );
            attachments.push(Attachment { name, texture });
        }

        self.fields
            .insert(id, attachments.iter().map(|a| a.texture).collect());
        debug!("allocated {id:?} {width}x{height} {:?} {:?}", layout.format(), layout.names());

        Ok(Field::new(id, width, height, attachments))
    }

    fn release_field(&mut self, field: Field) {
        let Some(textures) = self.fields.remove(&field.id()) else {
            return;
        };

        for texture in textures {
            self.textures.remove(&texture);
            for unit in self.units.iter_mut().filter(|u| **u == Some(texture)) {
                *unit = None;
            }
        }

        debug!("released {:?}", field.id());
    }

    fn upload(&mut self, field: &Field, data: &Array2<Vec4>) -> Result<(), FluidError> {
        let expected = (field.width() as usize, field.height() as usize);
        if data.dim() != expected {
            return Err(FluidError::ShapeMismatch {
                expected,
                found: data.dim(),
            });
        }

        let texture = self
            .fields
            .get(&field.id())
            .and_then(|textures| textures.first())
            .and_then(|id| self.textures.get_mut(id))
            .ok_or_else(|| IncompleteTargetError {
                field: field.id(),
                reason: "storage was released".to_owned(),
            })?;

        texture.replace(data.clone());
        Ok(())
    }

    fn read_back(&self, texture: Sampled<'_>) -> Result<Array2<Vec4>, FluidError> {
        self.textures
            .get(&texture.texture())
            .map(|t| t.data().clone())
            .ok_or_else(|| {
                IncompleteTargetError {
                    field: texture.field(),
                    reason: "storage was released".to_owned(),
                }
                .into()
            })
    }

    fn surface_size(&self) -> (u32, u32) {
        let (w, h) = self.surface.dim();
        (w as u32, h as u32)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if self.surface_size() != (width, height) {
            self.surface = Texture::new(width.max(1) as usize, height.max(1) as usize, self.surface.format());
        }
    }

    fn read_surface(&self) -> Array2<Vec4> {
        self.surface.data().clone()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::{
        backend::{FragmentStage, VertexStage},
        field::TexelFormat,
    };

    const TRANSFER: ProgramSource =
        ProgramSource::new("transfer", VertexStage::Position, FragmentStage::Transfer);
    const CLEAR: ProgramSource =
        ProgramSource::new("clear", VertexStage::Position, FragmentStage::Clear);

    fn layout() -> ChannelLayout {
        ChannelLayout::single("main", TexelFormat::Rgba32Float)
    }

    #[test]
    fn neighbor_stage_needs_neighborhood_vertex() {
        let mut backend = CpuBackend::new();
        let source = ProgramSource::new("curl", VertexStage::Position, FragmentStage::Curl);

        let err = backend.compile_program(&source).unwrap_err();
        assert_eq!(err.program, "curl");

        let source = ProgramSource::new("curl", VertexStage::Neighborhood, FragmentStage::Curl);
        assert!(backend.compile_program(&source).is_ok());
    }

    #[test]
    fn uniform_location_checks_type() {
        let mut backend = CpuBackend::new();
        let program = backend.compile_program(&TRANSFER).unwrap();

        assert!(backend.uniform_location::<TextureUnit>(program, "u_tex").is_ok());
        assert!(backend.uniform_location::<f32>(program, "u_tex").is_err());
        assert!(backend.uniform_location::<f32>(program, "u_missing").is_err());
    }

    #[test]
    fn merged_uniform_is_shared_between_stages() {
        let mut backend = CpuBackend::new();
        let source = ProgramSource::new("advection", VertexStage::Neighborhood, FragmentStage::Advection);
        let program = backend.compile_program(&source).unwrap();

        let location = backend.uniform_location::<Vec2>(program, "u_texelSize").unwrap();
        let compiled = backend.program(program).unwrap();

        assert_eq!(compiled.uniforms.iter().filter(|u| u.name == "u_texelSize").count(), 1);
        assert_eq!(compiled.vertex_slots[0], location.index());
    }

    #[test]
    fn sampling_the_target_is_a_feedback_loop() {
        let mut backend = CpuBackend::new();
        let field = backend.allocate_field(4, 4, &layout()).unwrap();
        let program = backend.compile_program(&TRANSFER).unwrap();
        let u_tex = backend.uniform_location::<TextureUnit>(program, "u_tex").unwrap();

        backend.bind_program(program);
        let unit = backend.attach(field.sampled(), 0).unwrap();
        backend.set_uniform(u_tex, unit);

        let err = backend.execute_pass(field.target(), false).unwrap_err();
        assert!(matches!(err, FluidError::FeedbackLoop { .. }));
    }

    #[test]
    fn unreferenced_unit_is_not_an_input() {
        let mut backend = CpuBackend::new();
        let source = backend.allocate_field(4, 4, &layout()).unwrap();
        let dest = backend.allocate_field(4, 4, &layout()).unwrap();
        let program = backend.compile_program(&TRANSFER).unwrap();
        let u_tex = backend.uniform_location::<TextureUnit>(program, "u_tex").unwrap();

        let data = Array2::from_elem((4, 4), Vec4::new(0.25, 0.5, 0.75, 1.0));
        backend.upload(&source, &data).unwrap();

        backend.bind_program(program);
        let unit = backend.attach(source.sampled(), 0).unwrap();
        backend.set_uniform(u_tex, unit);
        backend.attach(dest.sampled(), 1).unwrap();

        backend.execute_pass(dest.target(), false).unwrap();
        assert_eq!(backend.read_back(dest.sampled()).unwrap(), data);
    }

    #[test]
    fn texture_unit_out_of_range() {
        let mut backend = CpuBackend::new();
        let field = backend.allocate_field(2, 2, &layout()).unwrap();

        let err = backend.attach(field.sampled(), 8).unwrap_err();
        assert!(matches!(err, FluidError::TextureUnit { unit: 8, available: 8 }));
    }

    #[test]
    fn allocation_limits() {
        let mut backend = CpuBackend::new();

        assert!(matches!(
            backend.allocate_field(0, 4, &layout()),
            Err(FluidError::Allocation(_))
        ));
        assert!(matches!(
            backend.allocate_field(8193, 4, &layout()),
            Err(FluidError::Allocation(_))
        ));
        assert!(matches!(
            backend.allocate_field(4, 4, &ChannelLayout::new([], TexelFormat::Rgba16Float)),
            Err(FluidError::IncompleteTarget(_))
        ));
    }

    #[test]
    fn texture_budget_counts_live_textures() {
        let mut backend = CpuBackend::with_limits(Limits {
            max_textures: 2,
            ..Limits::default()
        });

        let a = backend.allocate_field(4, 4, &layout()).unwrap();
        let _b = backend.allocate_field(4, 4, &layout()).unwrap();
        assert!(matches!(
            backend.allocate_field(4, 4, &layout()),
            Err(FluidError::Allocation(_))
        ));

        backend.release_field(a);
        assert!(backend.allocate_field(4, 4, &layout()).is_ok());
    }

    #[test]
    fn released_target_is_incomplete() {
        let mut backend = CpuBackend::new();
        let field = backend.allocate_field(4, 4, &layout()).unwrap();
        let stale = Field::new(field.id(), 4, 4, field.attachments().iter().copied());
        backend.release_field(field);

        let program = backend.compile_program(&CLEAR).unwrap();
        backend.bind_program(program);

        let err = backend.execute_pass(stale.target(), false).unwrap_err();
        assert!(matches!(err, FluidError::IncompleteTarget(_)));
    }

    #[test]
    fn pass_without_program_fails() {
        let mut backend = CpuBackend::new();
        let field = backend.allocate_field(4, 4, &layout()).unwrap();

        let err = backend.execute_pass(field.target(), false).unwrap_err();
        assert!(matches!(err, FluidError::Compile(_)));
    }

    #[test]
    fn upload_checks_shape() {
        let mut backend = CpuBackend::new();
        let field = backend.allocate_field(4, 2, &layout()).unwrap();

        let err = backend.upload(&field, &Array2::from_elem((2, 4), Vec4::ZERO)).unwrap_err();
        assert!(matches!(
            err,
            FluidError::ShapeMismatch { expected: (4, 2), found: (2, 4) }
        ));
    }

    #[test]
    fn surface_pass_blends_over_cleared_surface() {
        let mut backend = CpuBackend::new();
        backend.resize_surface(3, 2);

        let program = backend.compile_program(&CLEAR).unwrap();
        let u_color = backend.uniform_location::<Vec4>(program, "u_color").unwrap();
        backend.bind_program(program);
        backend.set_uniform(u_color, Vec4::new(1.0, 0.0, 0.0, 0.5));

        backend.execute_pass(Target::Surface, true).unwrap();

        let surface = backend.read_surface();
        assert_eq!(surface.dim(), (3, 2));
        for texel in surface.iter() {
            assert!((texel.x - 0.5).abs() < 1e-6);
            assert!(texel.y.abs() < 1e-6);
            assert!((texel.w - 0.75).abs() < 1e-6);
        }
    }
}
