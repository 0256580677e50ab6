#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the falling-code engine.

mod config;
mod logging;
mod sequence_transfer;
mod text_backend;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use matrix_code_core::{Command, Event, SequenceTuning};
use matrix_code_rendering::{compose_scene, Color, Presentation, RenderingBackend, Scene};
use matrix_code_system_bootstrap::Kernel;
use matrix_code_system_sequence::{GeneratorParams, QuantizedSequenceGenerator};

use crate::{sequence_transfer::SequenceTransfer, text_backend::TextBackend};

/// Command-line arguments accepted by the `matrix-code` binary.
#[derive(Debug, Parser)]
#[command(name = "matrix-code", version, about = "Falling-code glyph engine")]
struct Cli {
    /// Log filter directive, overriding `RUST_LOG`.
    #[arg(long, global = true, value_name = "FILTER")]
    log: Option<String>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Runs the engine and prints frames as ANSI text.
    Run(RunArgs),
    /// Generates a mosaic sequence and prints its transfer string.
    Sequence(SequenceArgs),
    /// Decodes a mosaic transfer string and summarises it.
    Inspect {
        /// Transfer string produced by the `sequence` subcommand.
        value: String,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// TOML configuration file; missing fields keep their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Surface width in pixels.
    #[arg(long, default_value_t = 960.0)]
    width: f32,
    /// Surface height in pixels.
    #[arg(long, default_value_t = 540.0)]
    height: f32,
    /// Frames to print before exiting.
    #[arg(long, default_value_t = 300)]
    frames: u64,
    /// Frames printed per second of simulated time.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Ticks simulated before the first frame so streams fill the screen.
    #[arg(long, default_value_t = 120)]
    warmup: u32,
    /// Overrides the configured seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Effect to trigger once warm-up completes; may be repeated.
    #[arg(long = "trigger", value_name = "NAME")]
    triggers: Vec<String>,
    /// Sleeps between frames to play back in real time.
    #[arg(long)]
    realtime: bool,
}

#[derive(Debug, Args)]
struct SequenceArgs {
    /// Logical grid width.
    #[arg(long, default_value_t = 24)]
    width: u32,
    /// Logical grid height.
    #[arg(long, default_value_t = 16)]
    height: u32,
    /// Number of growth steps.
    #[arg(long, default_value_t = 60)]
    steps: u32,
    /// Emit every operation on this layer.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..4))]
    layer: Option<u8>,
    /// Seed for the generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Entry point for the `matrix-code` command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref())?;

    match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::Sequence(args) => sequence(&args),
        CliCommand::Inspect { value } => inspect(&value),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = config::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let clear_color = Color::from_rgb_u8(0, 0, 0);
    let mut kernel = Kernel::new(config).context("could not start the engine")?;

    let mut events = Vec::new();
    kernel.apply(
        Command::Resize {
            width: args.width,
            height: args.height,
        },
        &mut events,
    );
    for _ in 0..args.warmup {
        kernel.tick(&mut events);
    }
    for name in args.triggers {
        kernel.apply(Command::TriggerEffect { name }, &mut events);
    }
    report(&mut events);

    let presentation = Presentation::new(
        format!(
            "matrix-code {}x{} seed {}",
            kernel.grid().columns(),
            kernel.grid().rows(),
            kernel.config().seed
        ),
        clear_color,
        Scene::empty(),
    );
    let backend = TextBackend::new(args.frames, args.fps).with_realtime(args.realtime);
    backend.run(presentation, move |elapsed, scene| {
        let _ = kernel.advance(elapsed, &mut events);
        report(&mut events);
        *scene = compose_scene(kernel.grid(), kernel.registry(), &kernel.config().palette);
    })
}

fn report(events: &mut Vec<Event>) {
    for event in events.drain(..) {
        match event {
            Event::TriggerRejected { name } => tracing::warn!(%name, "trigger rejected"),
            other => tracing::debug!(event = ?other, "engine event"),
        }
    }
}

fn sequence(args: &SequenceArgs) -> Result<()> {
    let tuning = SequenceTuning {
        forced_layer: args.layer,
        ..SequenceTuning::default()
    };
    let params = GeneratorParams::from_tuning(&tuning, args.seed);
    let steps = QuantizedSequenceGenerator::default().generate(
        args.width,
        args.height,
        args.steps,
        &params,
    );

    let transfer = SequenceTransfer {
        columns: args.width,
        rows: args.height,
        steps,
    };
    println!("{}", transfer.encode().context("could not encode sequence")?);
    Ok(())
}

fn inspect(value: &str) -> Result<()> {
    let transfer = SequenceTransfer::decode(value).context("could not decode sequence string")?;
    let counts = transfer.op_counts();
    println!(
        "{}x{} grid, {} steps, {} ops (add {}, rect {}, line {}, unline {})",
        transfer.columns,
        transfer.rows,
        transfer.steps.len(),
        counts.total(),
        counts.add,
        counts.add_rect,
        counts.add_line,
        counts.rem_line
    );
    Ok(())
}
