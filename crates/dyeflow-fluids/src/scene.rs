use log::{info, trace};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    backend::Backend,
    config::{ConfigOverrides, SimConfig},
    error::FluidError,
    field::TexelFormat,
    forcing::{self, Pointer, Viewport},
    stable::fluid_2d::{ActiveTarget, StableFluid2D},
    Fluid,
};

/// Time step of [`Scene::frame`].
pub const FIXED_DT: f32 = 0.01;

pub const DEFAULT_SIM_RESOLUTION: u32 = 128;

pub const DEFAULT_DYE_RESOLUTION: u32 = 512;

/// Drives a [`StableFluid2D`] frame by frame: pointer forcing, one simulation step, then
/// presentation of the active target.
pub struct Scene<B: Backend> {
    backend: B,
    /// The fluid for this scene.
    pub fluid: StableFluid2D,
    config: SimConfig,
    pointer: Pointer,
    /// Pointer coordinate space. `None` follows the dye resolution.
    viewport: Option<Viewport>,
    rng: StdRng,
    frame: u64,
}

impl<B: Backend> Scene<B> {
    #[allow(clippy::new_ret_no_self)]
    #[inline(always)]
    pub fn new() -> SceneBuilder {
        SceneBuilder::default()
    }

    /// Builds a scene with the default simulation resolution and a square dye of
    /// `dye_resolution` cells per side.
    pub fn initialize(backend: B, config: SimConfig, dye_resolution: u32) -> Result<Self, FluidError> {
        Self::new().config(config).dye_resolution(dye_resolution).build(backend)
    }

    #[inline(always)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline(always)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline(always)]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[inline(always)]
    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// The number of frames run so far.
    #[inline(always)]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or_else(|| {
            let (w, h) = self.fluid.dye_resolution();
            Viewport::new(w as f32, h as f32)
        })
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn press(&mut self) {
        self.pointer.press();
    }

    /// Moves the pointer to `(x, y)` in viewport pixels.
    pub fn move_pointer(&mut self, x: f32, y: f32) {
        self.pointer.move_to(x, y);
    }

    pub fn release(&mut self) {
        self.pointer.release();
    }

    /// Merges `overrides` into the configuration. Takes effect on the next step.
    pub fn update_configuration(&mut self, overrides: &ConfigOverrides) {
        self.config.apply(overrides);
    }

    pub fn set_active_target(&mut self, target: ActiveTarget) {
        self.fluid.set_active_target(target);
    }

    /// Reallocates the dye as an `n`x`n` grid and resizes the surface to match.
    pub fn set_dye_resolution(&mut self, n: u32) -> Result<(), FluidError> {
        self.fluid.set_dye_resolution(&mut self.backend, n, n)?;
        self.backend.resize_surface(n, n);

        Ok(())
    }

    /// Reallocates velocity, pressure, curl and divergence as `n`x`n` grids.
    pub fn set_sim_resolution(&mut self, n: u32) -> Result<(), FluidError> {
        self.fluid.set_sim_resolution(&mut self.backend, n, n)
    }

    /// Applies pointer forcing, then advances the simulation by `dt`.
    pub fn step_once(&mut self, dt: f32) -> Result<(), FluidError> {
        let viewport = self.viewport();

        forcing::apply_forcing(
            &mut self.fluid,
            &mut self.backend,
            &mut self.pointer,
            viewport,
            &self.config,
            &mut self.rng,
        )?;

        self.fluid.step(&mut self.backend, dt, &self.config)
    }

    /// Copies the active target to the surface.
    pub fn present(&mut self) -> Result<(), FluidError> {
        self.fluid.present(&mut self.backend)
    }

    /// Runs one frame at [`FIXED_DT`] and presents it.
    pub fn frame(&mut self) -> Result<(), FluidError> {
        self.step_once(FIXED_DT)?;
        self.present()?;

        trace!("frame {}", self.frame);
        self.frame += 1;

        Ok(())
    }
}

pub struct SceneBuilder {
    sim_resolution: u32,
    dye_resolution: u32,
    viewport: Option<Viewport>,
    format: TexelFormat,
    seed: u64,
    config: SimConfig,
}

impl SceneBuilder {
    /// The side length of the velocity and pressure grids.
    ///
    /// Defaults to `128`.
    pub fn sim_resolution(mut self, sim_resolution: u32) -> Self {
        self.sim_resolution = sim_resolution;
        self
    }

    /// The side length of the dye grid and of the surface.
    ///
    /// Defaults to `512`.
    pub fn dye_resolution(mut self, dye_resolution: u32) -> Self {
        self.dye_resolution = dye_resolution;
        self
    }

    /// The pixel space pointer coordinates are given in.
    ///
    /// Defaults to the dye resolution.
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Storage precision of every field.
    ///
    /// Defaults to [`TexelFormat::Rgba16Float`].
    pub fn format(mut self, format: TexelFormat) -> Self {
        self.format = format;
        self
    }

    /// Seed of the splat colors.
    ///
    /// Defaults to `0`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build<B: Backend>(self, mut backend: B) -> Result<Scene<B>, FluidError> {
        let sim = (self.sim_resolution, self.sim_resolution);
        let dye = (self.dye_resolution, self.dye_resolution);

        let fluid = StableFluid2D::new(&mut backend, sim, dye, self.format)?;
        backend.resize_surface(self.dye_resolution, self.dye_resolution);

        info!("initialized scene with {:?}", self.config);

        Ok(Scene {
            backend,
            fluid,
            config: self.config,
            pointer: Pointer::default(),
            viewport: self.viewport,
            rng: StdRng::seed_from_u64(self.seed),
            frame: 0,
        })
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self {
            sim_resolution: DEFAULT_SIM_RESOLUTION,
            dye_resolution: DEFAULT_DYE_RESOLUTION,
            viewport: None,
            format: TexelFormat::default(),
            seed: 0,
            config: SimConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cpu::CpuBackend;

    fn scene(config: SimConfig) -> Scene<CpuBackend> {
        Scene::<CpuBackend>::new()
            .sim_resolution(16)
            .dye_resolution(32)
            .config(config)
            .build(CpuBackend::new())
            .unwrap()
    }

    #[test]
    fn viewport_follows_dye_until_set() {
        let mut scene = scene(SimConfig::default());
        assert_eq!(scene.viewport(), Viewport::new(32.0, 32.0));

        scene.set_dye_resolution(64).unwrap();
        assert_eq!(scene.viewport(), Viewport::new(64.0, 64.0));
        assert_eq!(scene.backend().surface_size(), (64, 64));

        scene.set_viewport(Viewport::new(800.0, 600.0));
        scene.set_dye_resolution(16).unwrap();
        assert_eq!(scene.viewport(), Viewport::new(800.0, 600.0));
    }

    #[test]
    fn stop_on_halt_consumes_the_drag() {
        let mut config = SimConfig::default();
        config.stop_on_halt = true;
        let mut scene = scene(config);

        scene.press();
        scene.move_pointer(10.0, 10.0);
        scene.move_pointer(12.0, 10.0);
        scene.frame().unwrap();
        assert!(!scene.pointer().moved());
    }

    #[test]
    fn held_pointer_keeps_pushing() {
        let mut scene = scene(SimConfig::default());

        scene.press();
        scene.move_pointer(10.0, 10.0);
        scene.move_pointer(12.0, 10.0);
        scene.frame().unwrap();
        scene.frame().unwrap();
        assert!(scene.pointer().moved());
        assert_eq!(scene.frame_count(), 2);

        scene.release();
        assert!(!scene.pointer().moved());
    }

    #[test]
    fn update_configuration_merges() {
        let mut scene = scene(SimConfig::default());
        let overrides = ConfigOverrides {
            curl: Some(0.0),
            obstacle: Some(true),
            ..Default::default()
        };

        scene.update_configuration(&overrides);

        assert_eq!(scene.config().curl, 0.0);
        assert!(scene.config().obstacle);
        assert_eq!(scene.config().iterations, 10);
        scene.frame().unwrap();
    }
}
