//! Edge inference pipeline engine entry point.
//!
//! Parses CLI flags, builds the concrete pipeline (simulation video source,
//! simulated inference engine, the built-in module set, a logging bus
//! client), and runs it until `SIGINT`/`SIGTERM`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use edge_core::bus::{BusClient, LoggingBusClient};
use edge_core::config::Config;
use edge_core::dlpu::{DlpuCoordinator, SystemClock};
use edge_core::ml::{InferenceEngine, SimulatedInferenceEngine};
use edge_core::module::PipelineModule;
use edge_core::module::ModuleRuntime;
use edge_core::orchestrator::CoreOrchestrator;
use edge_core::video::{SimulationVideoSource, VideoSource};
use edge_modules::{DetectionModule, FramePublisherModule};

#[derive(Parser, Debug)]
#[command(name = "edge_engine", about = "Edge inference pipeline engine")]
struct Cli {
    /// Path to a JSON configuration file. Without one, every setting falls
    /// back to its default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// This process's DLPU time-slot index.
    #[arg(long, default_value_t = 0)]
    dlpu_index: u32,

    /// Frame width/height (the fixed capture resolution).
    #[arg(long, default_value_t = 640)]
    frame_size: u32,

    /// Log filter directive (e.g. "info", "debug", "edge_core=trace").
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// The engine's explicit module registration list, in no particular order
/// (`ModuleRuntime` sorts by priority). Kept as a plain function rather
/// than a linker-section registry or a proc-macro DSL.
fn builtin_modules() -> Vec<Box<dyn PipelineModule>> {
    vec![
        Box::new(DetectionModule::new()),
        Box::new(FramePublisherModule::new()),
    ]
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve the configuration source: an explicit `--config` path always
/// wins; otherwise fall back to `<config dir>/edge_engine/config.json` if
/// present, and to an empty (all-defaults) document if not.
fn load_config(path: &Option<PathBuf>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()));
    }

    let default_path = dirs::config_dir().map(|dir| dir.join("edge_engine").join("config.json"));
    match default_path {
        Some(path) if path.exists() => {
            Config::from_file(&path).with_context(|| format!("loading configuration from {}", path.display()))
        }
        _ => Ok(Config::empty()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(&cli.config)?;

    let video: Box<dyn VideoSource> = Box::new(SimulationVideoSource::new(cli.frame_size, cli.frame_size));
    let inference: Box<dyn InferenceEngine> = Box::new(SimulatedInferenceEngine::new());
    let dlpu = DlpuCoordinator::new(cli.dlpu_index);
    let modules = ModuleRuntime::new(builtin_modules());
    let bus: Box<dyn BusClient> = Box::new(LoggingBusClient::default());
    let clock = Box::new(SystemClock);

    let mut orchestrator = CoreOrchestrator::new(config, video, inference, dlpu, modules, bus, clock);
    orchestrator.init().context("engine failed to initialize")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handle = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        shutdown_handle.store(true, Ordering::SeqCst);
    })
    .context("failed to install shutdown signal handler")?;

    tracing::info!(dlpu_index = cli.dlpu_index, "engine starting");
    orchestrator.run(shutdown).context("engine exited with an error")?;
    tracing::info!("engine stopped");
    Ok(())
}
