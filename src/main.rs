#![forbid(unsafe_code)]

//! `kernel-runner` — execution kernel binary.
//!
//! Loads configuration, preloads the optional dataset, then serves
//! commands from stdin until shutdown or end of input.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use kernel_runner::kernel::Kernel;
use kernel_runner::protocol::FrameWriter;
use kernel_runner::script::LuaEvaluator;
use kernel_runner::{AppError, KernelConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "kernel-runner", about = "Persistent code execution kernel", version, long_about = None)]
struct Cli {
    /// Dataset file to preload into the environment.
    dataset: Option<PathBuf>,

    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the identifier the dataset is bound to.
    #[arg(long)]
    binding: Option<String>,
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("kernel-runner bootstrap");

    let config = load_config(&args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;

    let mut kernel = Kernel::new(LuaEvaluator::new(), FrameWriter::stdout(), config);
    kernel.start(args.dataset.as_deref());

    let reason = runtime.block_on(kernel.serve(tokio::io::stdin()));
    if reason.is_clean() {
        info!(?reason, "kernel-runner exiting");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(?reason, "kernel-runner exiting abnormally");
        Ok(ExitCode::FAILURE)
    }
}

fn load_config(args: &Cli) -> Result<KernelConfig> {
    let mut config = match &args.config {
        Some(path) => KernelConfig::load_from_path(path)?,
        None => KernelConfig::default(),
    };

    if let Some(binding) = &args.binding {
        config.dataset_binding.clone_from(binding);
        config.validate()?;
    }

    info!(
        binding = config.dataset_binding.as_str(),
        max_line_bytes = config.max_line_bytes,
        "configuration loaded"
    );
    Ok(config)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout carries the protocol; diagnostics must stay on stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
