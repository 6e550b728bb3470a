//! Command-line front end.
//!
//! [`CliArgs`] is the `clap` argument set; [`CliArgs::into_config`]
//! layers it over an optional TOML file to produce a validated
//! [`PipelineConfig`]. [`init_logging`] sets up `env_logger` for the
//! binary.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use divcurl_engine::{ConfigError, FileConfig, PipelineConfig};
use divcurl_stencil::StencilOrder;
use log::LevelFilter;

// ── CliArgs ───────────────────────────────────────────────────────

/// Streaming divergence and curl of vector fields.
///
/// Reads vector-field components from INPUT step by step and writes
/// Div, Curl_x, Curl_y and Curl_z for at most MAX_STEPS steps. Every
/// option overrides the value from `--config`.
#[derive(Clone, Debug, Default, PartialEq, Parser)]
#[command(name = "divcurl", version, about, long_about = None)]
pub struct CliArgs {
    /// Input step stream
    pub input: Option<PathBuf>,

    /// Maximum number of steps to process
    #[arg(allow_negative_numbers = true)]
    pub max_steps: Option<i64>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output step stream (default: div_curl.bp)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of workers (default: 1)
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// Finite-difference accuracy order: 2, 4 or 6 (default: 2)
    #[arg(long)]
    pub order: Option<u32>,

    /// Log level: error, warn, info, debug or trace (default: RUST_LOG, else info)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Build the run configuration: defaults, then the `--config` file,
    /// then the flags. The result is validated and has an input.
    pub fn into_config(self) -> Result<PipelineConfig, CliError> {
        let mut config = PipelineConfig::default();
        if let Some(path) = &self.config {
            FileConfig::load(path)?.apply(&mut config)?;
        }
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(order) = self.order {
            config.stencil_order = StencilOrder::from_order(order)
                .ok_or(ConfigError::UnsupportedStencilOrder { order })?;
        }
        config.require_input()?;
        config.validate()?;
        Ok(config)
    }
}

// ── Logging ───────────────────────────────────────────────────────

/// Resolve the log level: the explicit `level`, else `RUST_LOG`, else
/// `info`.
pub fn resolve_level(level: Option<&str>) -> Result<LevelFilter, CliError> {
    match level {
        Some(name) => name
            .parse()
            .map_err(|_| CliError::Usage(format!("unknown log level '{name}'"))),
        None => Ok(std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Info)),
    }
}

/// Initialise `env_logger` at the resolved level. Call once.
pub fn init_logging(level: Option<&str>) -> Result<(), CliError> {
    let filter = resolve_level(level)?;
    env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_millis()
        .init();
    Ok(())
}

// ── CliError ──────────────────────────────────────────────────────

/// Errors from the command-line front end.
#[derive(Debug, PartialEq)]
pub enum CliError {
    /// The arguments could not be understood.
    Usage(String),
    /// The assembled configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "{msg}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
