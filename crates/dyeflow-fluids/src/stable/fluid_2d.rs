use glam::{Vec2, Vec3, Vec4};
use log::info;

use crate::{
    backend::{boundary_mode, Backend},
    config::{PressureBoundary, SimConfig},
    error::FluidError,
    field::{ChannelLayout, DoubleField, Field, Sampled, Target, TexelFormat},
    obstacle::circle::Circle,
    program::{Programs, SplatProgram},
    Fluid,
};

/// Value written into cells covered by the obstacle.
pub const OBSTACLE_SENTINEL: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

/// The field [`StableFluid2D::present`] shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActiveTarget {
    #[default]
    Dye,
    Velocity,
    Pressure,
    Curl,
    Divergence,
}

/// A stable-fluids solver whose every pass runs on a [`Backend`].
///
/// Velocity, pressure, curl and divergence share the simulation resolution. Dye has its own
/// resolution and is advected by the velocity field.
#[derive(Debug)]
pub struct StableFluid2D {
    programs: Programs,
    format: TexelFormat,

    /// Velocity in `xy`.
    velocity: DoubleField,
    /// Pressure in `x`.
    pressure: DoubleField,
    /// Dye color in `xyz`.
    dye: DoubleField,
    /// Scalar vorticity in `x`.
    curl: Field,
    /// Velocity divergence in `x`.
    divergence: Field,

    active: ActiveTarget,
}

impl StableFluid2D {
    pub fn new<B: Backend>(
        backend: &mut B,
        sim_resolution: (u32, u32),
        dye_resolution: (u32, u32),
        format: TexelFormat,
    ) -> Result<Self, FluidError> {
        let programs = Programs::load(backend)?;
        let (width, height) = sim_resolution;

        let velocity = DoubleField::create(backend, width, height, ChannelLayout::single("velocity", format))?;
        let pressure = DoubleField::create(backend, width, height, ChannelLayout::single("pressure", format))?;
        let curl = backend.allocate_field(width, height, &ChannelLayout::single("curl", format))?;
        let divergence = backend.allocate_field(width, height, &ChannelLayout::single("divergence", format))?;
        let dye = DoubleField::create(
            backend,
            dye_resolution.0,
            dye_resolution.1,
            ChannelLayout::single("dye", format),
        )?;

        info!(
            "created fluid: simulation {width}x{height}, dye {}x{}, {format:?}",
            dye_resolution.0, dye_resolution.1,
        );

        Ok(Self {
            programs,
            format,
            velocity,
            pressure,
            dye,
            curl,
            divergence,
            active: ActiveTarget::Dye,
        })
    }

    pub fn velocity(&self) -> &DoubleField {
        &self.velocity
    }

    pub fn pressure(&self) -> &DoubleField {
        &self.pressure
    }

    pub fn dye(&self) -> &DoubleField {
        &self.dye
    }

    pub fn curl(&self) -> &Field {
        &self.curl
    }

    pub fn divergence(&self) -> &Field {
        &self.divergence
    }

    /// Mutable access for seeding state, e.g. with [`DoubleField::load`].
    pub fn velocity_mut(&mut self) -> &mut DoubleField {
        &mut self.velocity
    }

    pub fn dye_mut(&mut self) -> &mut DoubleField {
        &mut self.dye
    }

    pub fn sim_resolution(&self) -> (u32, u32) {
        self.velocity.size()
    }

    pub fn dye_resolution(&self) -> (u32, u32) {
        self.dye.size()
    }

    pub fn active_target(&self) -> ActiveTarget {
        self.active
    }

    pub fn set_active_target(&mut self, target: ActiveTarget) {
        self.active = target;
    }

    /// The current contents of the active target.
    pub fn active_field(&self) -> Sampled<'_> {
        match self.active {
            ActiveTarget::Dye => self.dye.read().sampled(),
            ActiveTarget::Velocity => self.velocity.read().sampled(),
            ActiveTarget::Pressure => self.pressure.read().sampled(),
            ActiveTarget::Curl => self.curl.sampled(),
            ActiveTarget::Divergence => self.divergence.sampled(),
        }
    }

    /// Reallocates the dye at a new resolution. The dye contents are discarded.
    pub fn set_dye_resolution<B: Backend>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<(), FluidError> {
        self.dye.resize(backend, width, height)
    }

    /// Reallocates every simulation-resolution field. All their contents are discarded.
    ///
    /// On failure every field keeps its previous storage.
    pub fn set_sim_resolution<B: Backend>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<(), FluidError> {
        let velocity = DoubleField::create(backend, width, height, self.velocity.layout().clone())?;
        let pressure = match DoubleField::create(backend, width, height, self.pressure.layout().clone()) {
            Ok(pressure) => pressure,
            Err(err) => {
                velocity.release(backend);
                return Err(err);
            }
        };
        let curl = match backend.allocate_field(width, height, &ChannelLayout::single("curl", self.format)) {
            Ok(curl) => curl,
            Err(err) => {
                velocity.release(backend);
                pressure.release(backend);
                return Err(err);
            }
        };
        let divergence = match backend.allocate_field(width, height, &ChannelLayout::single("divergence", self.format)) {
            Ok(divergence) => divergence,
            Err(err) => {
                velocity.release(backend);
                pressure.release(backend);
                backend.release_field(curl);
                return Err(err);
            }
        };

        info!("resized simulation {}x{} -> {width}x{height}", self.velocity.width(), self.velocity.height());

        std::mem::replace(&mut self.velocity, velocity).release(backend);
        std::mem::replace(&mut self.pressure, pressure).release(backend);
        backend.release_field(std::mem::replace(&mut self.curl, curl));
        backend.release_field(std::mem::replace(&mut self.divergence, divergence));

        Ok(())
    }

    /// Frees every field of the simulation.
    pub fn release<B: Backend>(self, backend: &mut B) {
        self.velocity.release(backend);
        self.pressure.release(backend);
        self.dye.release(backend);
        backend.release_field(self.curl);
        backend.release_field(self.divergence);
    }

    /// Adds a Gaussian velocity impulse centered at `point` (normalized coordinates).
    pub fn splat_velocity<B: Backend>(
        &mut self,
        backend: &mut B,
        point: Vec2,
        impulse: Vec2,
        aspect_ratio: f32,
        radius: f32,
    ) -> Result<(), FluidError> {
        splat(
            backend,
            &self.programs.splat,
            &mut self.velocity,
            point,
            impulse.extend(0.0),
            aspect_ratio,
            radius,
        )
    }

    /// Adds a Gaussian blob of dye centered at `point` (normalized coordinates).
    pub fn splat_dye<B: Backend>(
        &mut self,
        backend: &mut B,
        point: Vec2,
        color: Vec3,
        aspect_ratio: f32,
        radius: f32,
    ) -> Result<(), FluidError> {
        splat(
            backend,
            &self.programs.splat,
            &mut self.dye,
            point,
            color,
            aspect_ratio,
            radius,
        )
    }

    pub fn compute_curl<B: Backend>(&mut self, backend: &mut B) -> Result<(), FluidError> {
        let program = self.programs.curl;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        backend.set_uniform(program.u_velocity, velocity);

        backend.execute_pass(self.curl.target(), false)
    }

    pub fn confine_vorticity<B: Backend>(&mut self, backend: &mut B, dt: f32, coef: f32) -> Result<(), FluidError> {
        let program = self.programs.vorticity;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        let curl = backend.attach(self.curl.sampled(), 1)?;
        backend.set_uniform(program.u_velocity, velocity);
        backend.set_uniform(program.u_curl, curl);
        backend.set_uniform(program.u_coef, coef);
        backend.set_uniform(program.u_dt, dt);

        backend.execute_pass(self.velocity.write().target(), false)?;
        self.velocity.swap();

        Ok(())
    }

    pub fn compute_divergence<B: Backend>(&mut self, backend: &mut B) -> Result<(), FluidError> {
        let program = self.programs.divergence;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        backend.set_uniform(program.u_velocity, velocity);

        backend.execute_pass(self.divergence.target(), false)
    }

    /// Fills the pressure with the initial guess of the relaxation.
    pub fn seed_pressure<B: Backend>(&mut self, backend: &mut B, pressure: f32) -> Result<(), FluidError> {
        let program = self.programs.clear;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_color, Vec4::new(pressure, pressure, pressure, 1.0));

        backend.execute_pass(self.pressure.write().target(), false)?;
        self.pressure.swap();

        Ok(())
    }

    /// Runs `iterations` Jacobi sweeps of the pressure Poisson equation.
    pub fn relax_pressure<B: Backend>(
        &mut self,
        backend: &mut B,
        iterations: u32,
        boundary: PressureBoundary,
        boundary_value: f32,
    ) -> Result<(), FluidError> {
        let program = self.programs.pressure;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.pressure.texel_size());

        let mode = match boundary {
            PressureBoundary::Edge => boundary_mode::EDGE,
            PressureBoundary::Fixed => boundary_mode::FIXED,
        };
        backend.set_uniform(program.u_boundary_mode, mode);
        backend.set_uniform(program.u_boundary_value, boundary_value);

        let divergence = backend.attach(self.divergence.sampled(), 0)?;
        backend.set_uniform(program.u_divergence, divergence);

        for _ in 0..iterations {
            let pressure = backend.attach(self.pressure.read().sampled(), 1)?;
            backend.set_uniform(program.u_pressure, pressure);

            backend.execute_pass(self.pressure.write().target(), false)?;
            self.pressure.swap();
        }

        Ok(())
    }

    /// Projects the velocity onto its divergence-free part.
    pub fn subtract_gradient<B: Backend>(&mut self, backend: &mut B) -> Result<(), FluidError> {
        let program = self.programs.gradient_subtract;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());

        let pressure = backend.attach(self.pressure.read().sampled(), 0)?;
        let velocity = backend.attach(self.velocity.read().sampled(), 1)?;
        backend.set_uniform(program.u_pressure, pressure);
        backend.set_uniform(program.u_velocity, velocity);

        backend.execute_pass(self.velocity.write().target(), false)?;
        self.velocity.swap();

        Ok(())
    }

    /// Overwrites the velocity inside the central obstacle with [`OBSTACLE_SENTINEL`].
    pub fn enforce_obstacle<B: Backend>(&mut self, backend: &mut B) -> Result<(), FluidError> {
        let program = self.programs.obstacle;
        let circle = Circle::centered();

        backend.bind_program(program.id);
        backend.set_uniform(program.u_center, circle.position);
        backend.set_uniform(program.u_radius, circle.radius);
        backend.set_uniform(program.u_sentinel, OBSTACLE_SENTINEL);

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        backend.set_uniform(program.u_source, velocity);

        backend.execute_pass(self.velocity.write().target(), false)?;
        self.velocity.swap();

        Ok(())
    }

    pub fn advect_velocity<B: Backend>(&mut self, backend: &mut B, dt: f32, dissipation: f32) -> Result<(), FluidError> {
        let program = self.programs.advection;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());
        backend.set_uniform(program.u_dt, dt);
        backend.set_uniform(program.u_dissipation, dissipation);

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        backend.set_uniform(program.u_velocity, velocity);
        backend.set_uniform(program.u_source, velocity);

        backend.execute_pass(self.velocity.write().target(), false)?;
        self.velocity.swap();

        Ok(())
    }

    /// Carries the dye along the velocity. The backtrace is measured in velocity cells.
    pub fn advect_dye<B: Backend>(&mut self, backend: &mut B, dt: f32, dissipation: f32) -> Result<(), FluidError> {
        let program = self.programs.advection;
        backend.bind_program(program.id);
        backend.set_uniform(program.u_texel_size, self.velocity.texel_size());
        backend.set_uniform(program.u_dt, dt);
        backend.set_uniform(program.u_dissipation, dissipation);

        let velocity = backend.attach(self.velocity.read().sampled(), 0)?;
        let dye = backend.attach(self.dye.read().sampled(), 1)?;
        backend.set_uniform(program.u_velocity, velocity);
        backend.set_uniform(program.u_source, dye);

        backend.execute_pass(self.dye.write().target(), false)?;
        self.dye.swap();

        Ok(())
    }

    /// Copies the active target onto the surface, clearing it first.
    pub fn present<B: Backend>(&self, backend: &mut B) -> Result<(), FluidError> {
        let program = self.programs.transfer;
        backend.bind_program(program.id);

        let texture = backend.attach(self.active_field(), 0)?;
        backend.set_uniform(program.u_tex, texture);

        backend.execute_pass(Target::Surface, true)
    }
}

fn splat<B: Backend>(
    backend: &mut B,
    program: &SplatProgram,
    field: &mut DoubleField,
    point: Vec2,
    color: Vec3,
    aspect_ratio: f32,
    radius: f32,
) -> Result<(), FluidError> {
    backend.bind_program(program.id);
    backend.set_uniform(program.u_aspect_ratio, aspect_ratio);
    backend.set_uniform(program.u_point, point);
    backend.set_uniform(program.u_color, color);
    backend.set_uniform(program.u_radius, radius);

    let base = backend.attach(field.read().sampled(), 0)?;
    backend.set_uniform(program.u_base, base);

    backend.execute_pass(field.write().target(), false)?;
    field.swap();

    Ok(())
}

impl<B: Backend> Fluid<B> for StableFluid2D {
    type Params = SimConfig;

    fn step(&mut self, backend: &mut B, dt: f32, params: &Self::Params) -> Result<(), FluidError> {
        self.compute_curl(backend)?;
        self.confine_vorticity(backend, dt, params.curl)?;
        self.compute_divergence(backend)?;
        self.seed_pressure(backend, params.pressure)?;
        self.relax_pressure(
            backend,
            params.iterations,
            params.pressure_boundary,
            params.pressure_boundary_value,
        )?;
        self.subtract_gradient(backend)?;
        if params.obstacle {
            self.enforce_obstacle(backend)?;
        }
        self.advect_velocity(backend, dt, params.velocity_dissipation)?;
        self.advect_dye(backend, dt, params.dye_dissipation)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::backend::cpu::{CpuBackend, Limits};

    fn fluid(backend: &mut CpuBackend, n: u32) -> StableFluid2D {
        StableFluid2D::new(backend, (n, n), (n, n), TexelFormat::Rgba32Float).unwrap()
    }

    #[test]
    fn uniform_flow_has_free_slip_edges() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        let flow = Array2::from_elem((8, 8), Vec4::new(1.0, 0.0, 0.0, 1.0));
        fluid.velocity_mut().load(&mut backend, &flow).unwrap();
        fluid.compute_divergence(&mut backend).unwrap();

        let div = backend.read_back(fluid.divergence().sampled()).unwrap();
        for y in 0..8 {
            assert!((div[(0, y)].x - 1.0).abs() < 1e-5);
            assert!((div[(7, y)].x + 1.0).abs() < 1e-5);
            for x in 1..7 {
                assert!(div[(x, y)].x.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn rigid_rotation_has_uniform_curl() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        // Counter-clockwise rotation at 0.5 per cell about the grid center.
        let rotation = Array2::from_shape_fn((8, 8), |(x, y)| {
            Vec4::new(-0.5 * (y as f32 - 3.5), 0.5 * (x as f32 - 3.5), 0.0, 1.0)
        });
        fluid.velocity_mut().load(&mut backend, &rotation).unwrap();
        fluid.compute_curl(&mut backend).unwrap();

        let curl = backend.read_back(fluid.curl().sampled()).unwrap();
        for x in 1..7 {
            for y in 1..7 {
                assert!((curl[(x, y)].x - 1.0).abs() < 1e-4, "curl at ({x}, {y}) = {}", curl[(x, y)].x);
            }
        }
    }

    #[test]
    fn confinement_pushes_across_curl_gradient() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        // Curl grows with x, so the normalized gradient of |curl| is +x.
        let ramp = Array2::from_shape_fn((8, 8), |(x, _)| Vec4::new(x as f32 + 1.0, 0.0, 0.0, 1.0));
        backend.upload(fluid.curl(), &ramp).unwrap();
        fluid.confine_vorticity(&mut backend, 0.01, 1.0).unwrap();

        let velocity = backend.read_back(fluid.velocity().read().sampled()).unwrap();
        for x in 1..7 {
            for y in 0..8 {
                let expected = -0.01 * (x as f32 + 1.0) / 1.0001;
                assert!(velocity[(x, y)].x.abs() < 1e-6);
                assert!((velocity[(x, y)].y - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn confinement_clamps_velocity() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        let ramp = Array2::from_shape_fn((8, 8), |(x, _)| Vec4::new(x as f32 + 1.0, 0.0, 0.0, 1.0));
        backend.upload(fluid.curl(), &ramp).unwrap();
        fluid.confine_vorticity(&mut backend, 0.01, 1e9).unwrap();

        let velocity = backend.read_back(fluid.velocity().read().sampled()).unwrap();
        for x in 1..7 {
            assert_eq!(velocity[(x, 4)].y, -1000.0);
            assert!(velocity[(x, 4)].x.abs() < 1e-6);
        }
    }

    #[test]
    fn uniform_curl_adds_no_force() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        let flat = Array2::from_elem((8, 8), Vec4::new(3.0, 0.0, 0.0, 1.0));
        backend.upload(fluid.curl(), &flat).unwrap();
        fluid.confine_vorticity(&mut backend, 0.01, 20.0).unwrap();

        let velocity = backend.read_back(fluid.velocity().read().sampled()).unwrap();
        assert!(velocity.iter().all(|v| v.x == 0.0 && v.y == 0.0));
    }

    #[test]
    fn uniform_flow_carries_dye_one_cell() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        // 100 cells per unit time over dt = 0.01 is one cell.
        let flow = Array2::from_elem((8, 8), Vec4::new(100.0, 0.0, 0.0, 1.0));
        let stripe = Array2::from_shape_fn((8, 8), |(x, _)| {
            if x == 3 { Vec4::ONE } else { Vec4::W }
        });
        fluid.velocity_mut().load(&mut backend, &flow).unwrap();
        fluid.dye_mut().load(&mut backend, &stripe).unwrap();
        fluid.advect_dye(&mut backend, 0.01, 0.0).unwrap();

        let dye = backend.read_back(fluid.dye().read().sampled()).unwrap();
        for y in 0..8 {
            assert!((dye[(4, y)].x - 1.0).abs() < 1e-3);
            assert!(dye[(3, y)].x.abs() < 1e-3);
            assert!(dye[(5, y)].x.abs() < 1e-3);
        }
    }

    #[test]
    fn dissipation_decays_still_dye() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 4);

        let dye = Array2::from_elem((4, 4), Vec4::ONE);
        fluid.dye_mut().load(&mut backend, &dye).unwrap();
        fluid.advect_dye(&mut backend, 0.01, 0.5).unwrap();

        let dye = backend.read_back(fluid.dye().read().sampled()).unwrap();
        let expected = 1.0 / 1.005;
        assert!(dye.iter().all(|d| (d.x - expected).abs() < 1e-6 && (d.z - expected).abs() < 1e-6));
    }

    #[test]
    fn failed_sim_resize_keeps_every_field() {
        // Eight live textures, so the six new ones of a resize do not fit.
        let mut backend = CpuBackend::with_limits(Limits {
            max_textures: 12,
            ..Limits::default()
        });
        let mut fluid = fluid(&mut backend, 8);
        let velocity = fluid.velocity().read().id();

        let err = fluid.set_sim_resolution(&mut backend, 16, 16).unwrap_err();
        assert!(matches!(err, FluidError::Allocation(_)));

        assert_eq!(fluid.sim_resolution(), (8, 8));
        assert_eq!(fluid.pressure().size(), (8, 8));
        assert_eq!(fluid.curl().size(), (8, 8));
        assert_eq!(fluid.divergence().size(), (8, 8));
        assert_eq!(fluid.velocity().read().id(), velocity);
        Fluid::step(&mut fluid, &mut backend, 0.01, &SimConfig::default()).unwrap();

        // The partial allocations were handed back.
        let layout = ChannelLayout::single("spare", TexelFormat::Rgba32Float);
        for _ in 0..4 {
            backend.allocate_field(8, 8, &layout).unwrap();
        }
    }

    #[test]
    fn sim_resize_moves_every_field() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 8);

        fluid.set_sim_resolution(&mut backend, 16, 4).unwrap();

        assert_eq!(fluid.velocity().size(), (16, 4));
        assert_eq!(fluid.pressure().size(), (16, 4));
        assert_eq!(fluid.curl().size(), (16, 4));
        assert_eq!(fluid.divergence().size(), (16, 4));
        assert_eq!(fluid.dye_resolution(), (8, 8));
        Fluid::step(&mut fluid, &mut backend, 0.01, &SimConfig::default()).unwrap();
    }

    #[test]
    fn seeded_pressure_is_uniform() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 4);

        fluid.seed_pressure(&mut backend, 1.8).unwrap();

        let pressure = backend.read_back(fluid.pressure().read().sampled()).unwrap();
        assert!(pressure.iter().all(|p| (p.x - 1.8).abs() < 1e-6));
    }

    #[test]
    fn fixed_boundary_pulls_edge_pressure() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 4);

        fluid.compute_divergence(&mut backend).unwrap();
        fluid.seed_pressure(&mut backend, 1.0).unwrap();
        fluid
            .relax_pressure(&mut backend, 1, PressureBoundary::Fixed, 0.0)
            .unwrap();

        let pressure = backend.read_back(fluid.pressure().read().sampled()).unwrap();
        assert!((pressure[(0, 0)].x - 0.5).abs() < 1e-5);
        assert!((pressure[(1, 0)].x - 0.75).abs() < 1e-5);
        assert!((pressure[(1, 1)].x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn edge_boundary_keeps_uniform_pressure() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 4);

        fluid.compute_divergence(&mut backend).unwrap();
        fluid.seed_pressure(&mut backend, 1.0).unwrap();
        fluid
            .relax_pressure(&mut backend, 3, PressureBoundary::Edge, 0.0)
            .unwrap();

        let pressure = backend.read_back(fluid.pressure().read().sampled()).unwrap();
        assert!(pressure.iter().all(|p| (p.x - 1.0).abs() < 1e-5));
    }

    #[test]
    fn obstacle_overwrites_center_only() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 16);

        let flow = Array2::from_elem((16, 16), Vec4::new(0.5, 0.25, 0.0, 1.0));
        fluid.velocity_mut().load(&mut backend, &flow).unwrap();
        fluid.enforce_obstacle(&mut backend).unwrap();

        let velocity = backend.read_back(fluid.velocity().read().sampled()).unwrap();
        assert_eq!(velocity[(8, 8)], OBSTACLE_SENTINEL);
        assert_eq!(velocity[(0, 0)], flow[(0, 0)]);
        assert_eq!(velocity[(15, 8)], flow[(15, 8)]);
    }

    #[test]
    fn splat_peaks_at_point() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 16);

        fluid
            .splat_dye(&mut backend, Vec2::new(3.5 / 16.0, 11.5 / 16.0), Vec3::new(1.0, 0.5, 0.0), 1.0, 0.002)
            .unwrap();

        let dye = backend.read_back(fluid.dye().read().sampled()).unwrap();
        let peak = dye[(3, 11)];
        assert!(peak.x > 0.9 && peak.x <= 1.0);
        assert!((peak.y - 0.5 * peak.x).abs() < 1e-5);
        assert!(dye[(12, 2)].x < 1e-6);
        assert!(dye.iter().all(|d| d.w == 1.0));
    }

    #[test]
    fn present_shows_active_target() {
        let mut backend = CpuBackend::new();
        let mut fluid = fluid(&mut backend, 4);
        backend.resize_surface(4, 4);

        let dye = Array2::from_elem((4, 4), Vec4::new(0.2, 0.4, 0.6, 1.0));
        fluid.dye_mut().load(&mut backend, &dye).unwrap();
        fluid.present(&mut backend).unwrap();
        assert_eq!(backend.read_surface(), dye);

        fluid.set_active_target(ActiveTarget::Pressure);
        fluid.seed_pressure(&mut backend, 0.5).unwrap();
        fluid.present(&mut backend).unwrap();
        assert!(backend.read_surface().iter().all(|t| (t.x - 0.5).abs() < 1e-6));
    }
}
