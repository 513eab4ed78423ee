use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dyeflow_io::decode::FrameSequenceDecoder;
use env_logger::Env;

mod run;

#[derive(Parser)]
#[command(version, about = "Dye carried by a stable-fluids simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the simulation with a scripted pointer stroke and record the frames.
    Run(run::RunArgs),
    /// Print the metadata of a recorded sequence.
    Info {
        /// Directory written by `run`.
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Run(args) => run::run(args),
        Command::Info { dir } => info(dir),
    }
}

fn info(dir: PathBuf) -> anyhow::Result<()> {
    let mut decoder = FrameSequenceDecoder::new(dir.clone());
    let meta = decoder
        .decode_metadata()
        .with_context(|| format!("reading metadata of {}", dir.display()))?;

    println!("{}", dir.display());
    println!("  frames: {} at {} fps", meta.num_frames, meta.fps);
    println!("  size:   {}x{}", meta.width, meta.height);

    Ok(())
}
