use dyeflow_fluids::{
    backend::{cpu::CpuBackend, Backend},
    field::TexelFormat,
    stable::fluid_2d::{ActiveTarget, StableFluid2D},
    Fluid, Scene, SimConfig,
};
use glam::{Vec2, Vec4};
use ndarray::Array2;

fn mean_interior_divergence(backend: &mut CpuBackend, fluid: &mut StableFluid2D) -> f32 {
    fluid.compute_divergence(backend).unwrap();
    let div = backend.read_back(fluid.divergence().sampled()).unwrap();
    let (w, h) = div.dim();

    let mut sum = 0.0;
    let mut count = 0;
    for x in 2..w - 2 {
        for y in 2..h - 2 {
            sum += div[(x, y)].x.abs();
            count += 1;
        }
    }

    sum / count as f32
}

#[test]
fn projection_reduces_divergence() {
    let n = 32;
    let mut backend = CpuBackend::new();
    let mut fluid = StableFluid2D::new(&mut backend, (n, n), (n, n), TexelFormat::Rgba32Float).unwrap();

    // An outward gaussian burst: strongly divergent, zero at the walls.
    let center = Vec2::splat(0.5);
    let burst = Array2::from_shape_fn((n as usize, n as usize), |(x, y)| {
        let p = Vec2::new((x as f32 + 0.5) / n as f32, (y as f32 + 0.5) / n as f32);
        let d = p - center;
        let v = 20.0 * d * (-d.length_squared() / 0.01).exp();
        Vec4::new(v.x, v.y, 0.0, 1.0)
    });
    fluid.velocity_mut().load(&mut backend, &burst).unwrap();

    let before = mean_interior_divergence(&mut backend, &mut fluid);

    let config = SimConfig {
        curl: 0.0,
        iterations: 20,
        ..Default::default()
    };
    fluid.step(&mut backend, 0.01, &config).unwrap();

    let after = mean_interior_divergence(&mut backend, &mut fluid);

    assert!(before > 0.0);
    assert!(after < 0.75 * before, "divergence {before} -> {after}");
}

#[test]
fn still_fluid_conserves_dye() {
    let mut backend = CpuBackend::new();
    let mut fluid = StableFluid2D::new(&mut backend, (32, 32), (64, 64), TexelFormat::Rgba32Float).unwrap();

    let dye = Array2::from_shape_fn((64, 64), |(x, y)| {
        let stripe = if (x / 8 + y / 8) % 2 == 0 { 1.0 } else { 0.25 };
        Vec4::new(stripe, 0.5 * stripe, x as f32 / 64.0, 1.0)
    });
    fluid.dye_mut().load(&mut backend, &dye).unwrap();

    let config = SimConfig {
        velocity_dissipation: 0.0,
        dye_dissipation: 0.0,
        ..Default::default()
    };
    for _ in 0..3 {
        fluid.step(&mut backend, 0.01, &config).unwrap();
    }

    let sum = |a: &Array2<Vec4>| a.iter().fold(Vec4::ZERO, |acc, v| acc + *v);
    let after = backend.read_back(fluid.dye().read().sampled()).unwrap();

    let (expected, found) = (sum(&dye), sum(&after));
    for i in 0..4 {
        assert!((expected[i] - found[i]).abs() <= 1e-3 * expected[i].abs().max(1.0));
    }
}

#[test]
fn dye_resolution_change_keeps_simulation_grids() {
    let mut scene = Scene::<CpuBackend>::new()
        .sim_resolution(32)
        .dye_resolution(64)
        .build(CpuBackend::new())
        .unwrap();

    scene.set_dye_resolution(256).unwrap();
    scene.set_dye_resolution(512).unwrap();

    let fluid = &scene.fluid;
    assert_eq!(fluid.dye_resolution(), (512, 512));
    assert_eq!(fluid.velocity().size(), (32, 32));
    assert_eq!(fluid.pressure().size(), (32, 32));
    assert_eq!(fluid.curl().size(), (32, 32));
    assert_eq!(fluid.divergence().size(), (32, 32));

    assert_eq!(fluid.active_target(), ActiveTarget::Dye);
    assert_eq!(fluid.active_field(), fluid.dye().read().sampled());

    scene.present().unwrap();
    assert_eq!(scene.backend().surface_size(), (512, 512));
}

#[test]
fn drag_pushes_fluid_along() {
    let config = SimConfig {
        curl: 0.0,
        iterations: 10,
        ..Default::default()
    };
    let mut scene = Scene::<CpuBackend>::new()
        .sim_resolution(128)
        .dye_resolution(256)
        .config(config)
        .build(CpuBackend::new())
        .unwrap();

    // Viewport is 256x256 px; the drag ends at the center of the grid.
    scene.press();
    scene.move_pointer(118.0, 128.0);
    scene.move_pointer(128.0, 128.0);
    scene.step_once(0.01).unwrap();

    let velocity = scene
        .backend()
        .read_back(scene.fluid.velocity().read().sampled())
        .unwrap();

    assert!(velocity[(64, 64)].x > 0.0);
    for corner in [(0, 0), (127, 0), (0, 127), (127, 127)] {
        let v = velocity[corner];
        assert!(Vec2::new(v.x, v.y).length() < 1e-3, "{corner:?}: {v}");
    }

    let dye = scene.backend().read_back(scene.fluid.dye().read().sampled()).unwrap();
    assert!(dye[(128, 128)].truncate().length() > 0.0);
    assert_eq!(dye[(0, 0)].truncate(), glam::Vec3::ZERO);
}
