//! The programs of the simulation, each with its uniform slots resolved once at load time.

use glam::{Vec2, Vec3, Vec4};

use crate::{
    backend::{
        Backend, FragmentStage, ProgramId, ProgramSource, TextureUnit, UniformLocation,
        VertexStage,
    },
    error::FluidError,
};

pub const CLEAR: ProgramSource = ProgramSource::new("clear", VertexStage::Position, FragmentStage::Clear);
pub const SPLAT: ProgramSource = ProgramSource::new("splat", VertexStage::Position, FragmentStage::Splat);
pub const CURL: ProgramSource = ProgramSource::new("curl", VertexStage::Neighborhood, FragmentStage::Curl);
pub const VORTICITY: ProgramSource =
    ProgramSource::new("vorticity", VertexStage::Neighborhood, FragmentStage::Vorticity);
pub const DIVERGENCE: ProgramSource =
    ProgramSource::new("divergence", VertexStage::Neighborhood, FragmentStage::Divergence);
pub const PRESSURE: ProgramSource =
    ProgramSource::new("pressure", VertexStage::Neighborhood, FragmentStage::Pressure);
pub const GRADIENT_SUBTRACT: ProgramSource = ProgramSource::new(
    "gradient_subtract",
    VertexStage::Neighborhood,
    FragmentStage::GradientSubtract,
);
pub const ADVECTION: ProgramSource =
    ProgramSource::new("advection", VertexStage::Neighborhood, FragmentStage::Advection);
pub const OBSTACLE: ProgramSource =
    ProgramSource::new("obstacle", VertexStage::Position, FragmentStage::Obstacle);
pub const TRANSFER: ProgramSource =
    ProgramSource::new("transfer", VertexStage::Position, FragmentStage::Transfer);

#[derive(Clone, Copy, Debug)]
pub struct ClearProgram {
    pub id: ProgramId,
    pub u_color: UniformLocation<Vec4>,
}

impl ClearProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&CLEAR)?;

        Ok(Self {
            id,
            u_color: backend.uniform_location(id, "u_color")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SplatProgram {
    pub id: ProgramId,
    pub u_base: UniformLocation<TextureUnit>,
    pub u_aspect_ratio: UniformLocation<f32>,
    pub u_color: UniformLocation<Vec3>,
    pub u_point: UniformLocation<Vec2>,
    pub u_radius: UniformLocation<f32>,
}

impl SplatProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&SPLAT)?;

        Ok(Self {
            id,
            u_base: backend.uniform_location(id, "u_base")?,
            u_aspect_ratio: backend.uniform_location(id, "u_aspectRatio")?,
            u_color: backend.uniform_location(id, "u_color")?,
            u_point: backend.uniform_location(id, "u_point")?,
            u_radius: backend.uniform_location(id, "u_radius")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CurlProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_velocity: UniformLocation<TextureUnit>,
}

impl CurlProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&CURL)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_velocity: backend.uniform_location(id, "u_velocity")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VorticityProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_velocity: UniformLocation<TextureUnit>,
    pub u_curl: UniformLocation<TextureUnit>,
    pub u_coef: UniformLocation<f32>,
    pub u_dt: UniformLocation<f32>,
}

impl VorticityProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&VORTICITY)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_velocity: backend.uniform_location(id, "u_velocity")?,
            u_curl: backend.uniform_location(id, "u_curl")?,
            u_coef: backend.uniform_location(id, "u_coef")?,
            u_dt: backend.uniform_location(id, "u_dt")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DivergenceProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_velocity: UniformLocation<TextureUnit>,
}

impl DivergenceProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&DIVERGENCE)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_velocity: backend.uniform_location(id, "u_velocity")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PressureProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_pressure: UniformLocation<TextureUnit>,
    pub u_divergence: UniformLocation<TextureUnit>,
    pub u_boundary_mode: UniformLocation<i32>,
    pub u_boundary_value: UniformLocation<f32>,
}

impl PressureProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&PRESSURE)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_pressure: backend.uniform_location(id, "u_pressure")?,
            u_divergence: backend.uniform_location(id, "u_divergence")?,
            u_boundary_mode: backend.uniform_location(id, "u_boundaryMode")?,
            u_boundary_value: backend.uniform_location(id, "u_boundaryValue")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GradientSubtractProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_pressure: UniformLocation<TextureUnit>,
    pub u_velocity: UniformLocation<TextureUnit>,
}

impl GradientSubtractProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&GRADIENT_SUBTRACT)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_pressure: backend.uniform_location(id, "u_pressure")?,
            u_velocity: backend.uniform_location(id, "u_velocity")?,
        })
    }
}

/// Semi-Lagrangian advection. `u_texelSize` is shared by the vertex stage and the backtrace.
#[derive(Clone, Copy, Debug)]
pub struct AdvectionProgram {
    pub id: ProgramId,
    pub u_texel_size: UniformLocation<Vec2>,
    pub u_velocity: UniformLocation<TextureUnit>,
    pub u_source: UniformLocation<TextureUnit>,
    pub u_dt: UniformLocation<f32>,
    pub u_dissipation: UniformLocation<f32>,
}

impl AdvectionProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&ADVECTION)?;

        Ok(Self {
            id,
            u_texel_size: backend.uniform_location(id, "u_texelSize")?,
            u_velocity: backend.uniform_location(id, "u_velocity")?,
            u_source: backend.uniform_location(id, "u_source")?,
            u_dt: backend.uniform_location(id, "u_dt")?,
            u_dissipation: backend.uniform_location(id, "u_dissipation")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ObstacleProgram {
    pub id: ProgramId,
    pub u_source: UniformLocation<TextureUnit>,
    pub u_center: UniformLocation<Vec2>,
    pub u_radius: UniformLocation<f32>,
    pub u_sentinel: UniformLocation<Vec4>,
}

impl ObstacleProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&OBSTACLE)?;

        Ok(Self {
            id,
            u_source: backend.uniform_location(id, "u_source")?,
            u_center: backend.uniform_location(id, "u_center")?,
            u_radius: backend.uniform_location(id, "u_radius")?,
            u_sentinel: backend.uniform_location(id, "u_sentinel")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TransferProgram {
    pub id: ProgramId,
    pub u_tex: UniformLocation<TextureUnit>,
}

impl TransferProgram {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        let id = backend.compile_program(&TRANSFER)?;

        Ok(Self {
            id,
            u_tex: backend.uniform_location(id, "u_tex")?,
        })
    }
}

/// Every program a [`StableFluid2D`](crate::stable::fluid_2d::StableFluid2D) issues passes with.
#[derive(Clone, Copy, Debug)]
pub struct Programs {
    pub clear: ClearProgram,
    pub splat: SplatProgram,
    pub curl: CurlProgram,
    pub vorticity: VorticityProgram,
    pub divergence: DivergenceProgram,
    pub pressure: PressureProgram,
    pub gradient_subtract: GradientSubtractProgram,
    pub advection: AdvectionProgram,
    pub obstacle: ObstacleProgram,
    pub transfer: TransferProgram,
}

impl Programs {
    pub fn load<B: Backend>(backend: &mut B) -> Result<Self, FluidError> {
        Ok(Self {
            clear: ClearProgram::load(backend)?,
            splat: SplatProgram::load(backend)?,
            curl: CurlProgram::load(backend)?,
            vorticity: VorticityProgram::load(backend)?,
            divergence: DivergenceProgram::load(backend)?,
            pressure: PressureProgram::load(backend)?,
            gradient_subtract: GradientSubtractProgram::load(backend)?,
            advection: AdvectionProgram::load(backend)?,
            obstacle: ObstacleProgram::load(backend)?,
            transfer: TransferProgram::load(backend)?,
        })
    }
}
