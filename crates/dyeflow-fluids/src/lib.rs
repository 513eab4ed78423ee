use backend::Backend;
use error::FluidError;

pub mod backend;
pub mod config;
pub mod error;
pub mod field;
pub mod forcing;
pub mod obstacle;
pub mod program;
pub mod scene;
pub mod stable;

pub use config::{ConfigOverrides, SimConfig};
pub use scene::Scene;

/// A fluid that advances by issuing passes on a backend `B`.
pub trait Fluid<B: Backend> {
    type Params;

    fn step(&mut self, backend: &mut B, dt: f32, params: &Self::Params) -> Result<(), FluidError>;
}
