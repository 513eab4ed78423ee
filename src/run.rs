use std::{f32::consts::TAU, path::PathBuf};

use anyhow::Context;
use clap::Args;
use dyeflow_fluids::{backend::cpu::CpuBackend, forcing::Viewport, ConfigOverrides, Scene, SimConfig};
use dyeflow_io::encode::FrameSequenceEncoder;
use glam::Vec2;
use indicatif::{ProgressBar, ProgressIterator, ProgressStyle};
use log::info;

#[derive(Args)]
pub struct RunArgs {
    /// Directory the frames are recorded into.
    #[arg(short, long, default_value = "output/dyeflow")]
    output: PathBuf,
    /// Number of frames to simulate.
    #[arg(short, long, default_value_t = 300)]
    frames: u64,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    #[arg(long, default_value_t = 128)]
    sim_resolution: u32,
    #[arg(long, default_value_t = 256)]
    dye_resolution: u32,
    /// Seed of the splat colors.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// JSON file of configuration overrides, e.g. `{ "CURL": 30 }`.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Configuration override `KEY=VALUE`, applied after `--config`. Repeatable.
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
    /// Simulate without writing frames.
    #[arg(long)]
    no_record: bool,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut overrides = match &args.config {
        Some(path) => ConfigOverrides::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigOverrides::default(),
    };
    for assignment in &args.set {
        overrides.merge(ConfigOverrides::parse_assignment(assignment)?);
    }

    let mut config = SimConfig::default();
    config.apply(&overrides);

    let mut scene = Scene::<CpuBackend>::new()
        .sim_resolution(args.sim_resolution)
        .dye_resolution(args.dye_resolution)
        .seed(args.seed)
        .config(config)
        .build(CpuBackend::new())
        .context("building the scene")?;

    let mut encoder = if args.no_record {
        None
    } else {
        let mut encoder = FrameSequenceEncoder::new(args.output.clone(), args.frames, args.fps)?;
        encoder.encode_metadata(&scene)?;
        Some(encoder)
    };

    let viewport = scene.viewport();
    let stroke_frames = args.frames / 2;

    let bar_template = "Running Simulation {spinner:.green} [{elapsed}] [{bar:50.white/white}] {pos}/{len} ({eta})";
    let style = ProgressStyle::with_template(bar_template)?
        .progress_chars("=> ").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress = ProgressBar::new(args.frames).with_style(style);

    for frame in (0..args.frames).progress_with(progress) {
        if frame == 0 {
            scene.press();
        }

        if frame < stroke_frames {
            let t = frame as f32 / stroke_frames.max(1) as f32;
            let p = stroke(viewport, t);
            scene.move_pointer(p.x, p.y);
        } else if frame == stroke_frames {
            scene.release();
        }

        scene.frame()?;

        if let Some(encoder) = encoder.as_mut() {
            encoder.encode_frame(&scene)?;
        }
    }

    match encoder {
        Some(encoder) => info!("recorded {} frames to {}", encoder.frames_written(), args.output.display()),
        None => info!("simulated {} frames", scene.frame_count()),
    }

    Ok(())
}

/// Two turns around the center of the viewport, at a quarter of its width.
fn stroke(viewport: Viewport, t: f32) -> Vec2 {
    let theta = 2.0 * TAU * t;
    let center = Vec2::new(viewport.width, viewport.height) / 2.0;

    center + 0.25 * viewport.width * Vec2::new(theta.cos(), theta.sin())
}
