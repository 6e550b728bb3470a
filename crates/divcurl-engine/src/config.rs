//! Pipeline configuration, validation, and error types.
//!
//! [`PipelineConfig`] is the input for a run. It can be built in code,
//! or layered from a TOML file through [`FileConfig`] and then adjusted
//! by command-line flags. [`validate()`](PipelineConfig::validate) checks
//! every structural invariant before any worker starts.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use divcurl_stencil::{DifferentialOperator, GridSpacing, StencilOrder};
use serde::Deserialize;

/// Output path used when none is configured.
pub const DEFAULT_OUTPUT: &str = "div_curl.bp";

// ── ComponentNames ────────────────────────────────────────────────

/// Stream variable names of the vector components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentNames {
    /// x component. Default: `"ux"`.
    pub ux: String,
    /// y component. Default: `"uy"`.
    pub uy: String,
    /// z component, read only for volumetric inputs. Default: `"uz"`.
    pub uz: String,
}

impl Default for ComponentNames {
    fn default() -> Self {
        Self {
            ux: "ux".to_string(),
            uy: "uy".to_string(),
            uz: "uz".to_string(),
        }
    }
}

// ── PollConfig ────────────────────────────────────────────────────

/// How long a worker waits for a producer that reports `NotReady`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between attempts, in milliseconds. Default: 10.
    pub interval_ms: u64,
    /// Attempts before giving up on a step. Default: 1000.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            max_attempts: 1000,
        }
    }
}

impl PollConfig {
    /// The sleep between attempts.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ── PipelineConfig ────────────────────────────────────────────────

/// Everything a run needs besides its stream backends.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Input stream path. Required by the command-line front end only;
    /// library callers may supply sources directly.
    pub input: Option<PathBuf>,
    /// Output stream path. Default: [`DEFAULT_OUTPUT`].
    pub output: PathBuf,
    /// Upper bound on processed steps; must be at least 1.
    pub max_steps: i64,
    /// Number of workers. Default: 1.
    pub workers: usize,
    /// Finite-difference accuracy order. Default: second.
    pub stencil_order: StencilOrder,
    /// Physical sample spacing. Default: 1 on every axis.
    pub spacing: GridSpacing,
    /// Names of the input components.
    pub components: ComponentNames,
    /// `NotReady` polling behaviour.
    pub poll: PollConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            max_steps: 0,
            workers: 1,
            stencil_order: StencilOrder::default(),
            spacing: GridSpacing::default(),
            components: ComponentNames::default(),
            poll: PollConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration processing at most `max_steps` steps.
    pub fn with_max_steps(max_steps: i64) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one step.
        if self.max_steps < 1 {
            return Err(ConfigError::InvalidMaxSteps {
                value: self.max_steps,
            });
        }
        // 2. At least one worker.
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        // 3. Component names non-empty and distinct.
        let names = [
            &self.components.ux,
            &self.components.uy,
            &self.components.uz,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(ConfigError::EmptyComponentName);
        }
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].contains(a) {
                return Err(ConfigError::DuplicateComponentName {
                    name: a.to_string(),
                });
            }
        }
        // 4. Spacing finite and positive.
        self.spacing
            .validate()
            .map_err(|reason| ConfigError::InvalidSpacing { reason })?;
        // 5. Polling must allow at least one attempt.
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::InvalidPoll {
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The input path, or [`ConfigError::MissingInput`].
    pub fn require_input(&self) -> Result<&Path, ConfigError> {
        self.input.as_deref().ok_or(ConfigError::MissingInput)
    }

    /// Ghost samples each worker reads past its partition.
    pub fn halo(&self) -> usize {
        self.stencil_order.halo()
    }

    /// Build the differential operator this configuration describes.
    pub fn operator(&self) -> Result<DifferentialOperator, ConfigError> {
        DifferentialOperator::builder()
            .order(self.stencil_order)
            .spacing(self.spacing)
            .build()
            .map_err(|reason| ConfigError::InvalidSpacing { reason })
    }

    /// Whether `step` is the last one allowed by `max_steps`.
    pub fn is_last_step(&self, step: u64) -> bool {
        let limit = u64::try_from(self.max_steps).unwrap_or(0);
        step.saturating_add(1) >= limit
    }
}

// ── FileConfig ────────────────────────────────────────────────────

/// Optional settings read from a TOML file.
///
/// Every key may be omitted; present keys override the corresponding
/// [`PipelineConfig`] field when [`apply`](Self::apply)ed.
///
/// ```toml
/// input = "fields.bp"
/// max_steps = 100
/// workers = 4
/// stencil_order = 4
///
/// [spacing]
/// dx = 0.5
///
/// [components]
/// ux = "vx"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Input stream path.
    pub input: Option<PathBuf>,
    /// Output stream path.
    pub output: Option<PathBuf>,
    /// Upper bound on processed steps.
    pub max_steps: Option<i64>,
    /// Number of workers.
    pub workers: Option<usize>,
    /// Numeric stencil order (2, 4 or 6).
    pub stencil_order: Option<u32>,
    /// Per-axis spacing overrides.
    pub spacing: Option<FileSpacing>,
    /// Component name overrides.
    pub components: Option<FileComponents>,
    /// Polling overrides.
    pub poll: Option<FilePoll>,
}

/// `[spacing]` table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSpacing {
    /// Spacing along x.
    pub dx: Option<f64>,
    /// Spacing along y.
    pub dy: Option<f64>,
    /// Spacing along z.
    pub dz: Option<f64>,
}

/// `[components]` table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileComponents {
    /// x component name.
    pub ux: Option<String>,
    /// y component name.
    pub uy: Option<String>,
    /// z component name.
    pub uz: Option<String>,
}

/// `[poll]` table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilePoll {
    /// Sleep between attempts, in milliseconds.
    pub interval_ms: Option<u64>,
    /// Attempts before giving up.
    pub max_attempts: Option<u32>,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Override `config` with every key present in this file.
    pub fn apply(self, config: &mut PipelineConfig) -> Result<(), ConfigError> {
        if let Some(order) = self.stencil_order {
            config.stencil_order = StencilOrder::from_order(order)
                .ok_or(ConfigError::UnsupportedStencilOrder { order })?;
        }
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(spacing) = self.spacing {
            let s = &mut config.spacing;
            s.dx = spacing.dx.unwrap_or(s.dx);
            s.dy = spacing.dy.unwrap_or(s.dy);
            s.dz = spacing.dz.unwrap_or(s.dz);
        }
        if let Some(components) = self.components {
            let c = &mut config.components;
            if let Some(ux) = components.ux {
                c.ux = ux;
            }
            if let Some(uy) = components.uy {
                c.uy = uy;
            }
            if let Some(uz) = components.uz {
                c.uz = uz;
            }
        }
        if let Some(poll) = self.poll {
            let p = &mut config.poll;
            p.interval_ms = poll.interval_ms.unwrap_or(p.interval_ms);
            p.max_attempts = poll.max_attempts.unwrap_or(p.max_attempts);
        }
        Ok(())
    }
}

// ── ConfigError ───────────────────────────────────────────────────

/// Errors detected while assembling or validating a [`PipelineConfig`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `max_steps` is below 1.
    InvalidMaxSteps {
        /// The configured value.
        value: i64,
    },
    /// Worker count is zero.
    NoWorkers,
    /// No input path was configured.
    MissingInput,
    /// A component name is empty.
    EmptyComponentName,
    /// Two components share a name.
    DuplicateComponentName {
        /// The repeated name.
        name: String,
    },
    /// Stencil order is not 2, 4 or 6.
    UnsupportedStencilOrder {
        /// The requested order.
        order: u32,
    },
    /// Grid spacing is not finite and positive.
    InvalidSpacing {
        /// Description of the violated bound.
        reason: String,
    },
    /// Polling settings are unusable.
    InvalidPoll {
        /// Description of the violated bound.
        reason: String,
    },
    /// The configuration file could not be read.
    FileRead {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error message.
        reason: String,
    },
    /// The configuration file is not valid TOML for [`FileConfig`].
    Parse {
        /// Parser error message.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMaxSteps { value } => {
                write!(f, "max_steps must be at least 1, got {value}")
            }
            Self::NoWorkers => write!(f, "worker count must be at least 1"),
            Self::MissingInput => write!(f, "no input stream configured"),
            Self::EmptyComponentName => write!(f, "component names must not be empty"),
            Self::DuplicateComponentName { name } => {
                write!(f, "component name '{name}' is used more than once")
            }
            Self::UnsupportedStencilOrder { order } => {
                write!(f, "stencil order {order} is not supported (use 2, 4 or 6)")
            }
            Self::InvalidSpacing { reason } => write!(f, "invalid grid spacing: {reason}"),
            Self::InvalidPoll { reason } => write!(f, "invalid poll settings: {reason}"),
            Self::FileRead { path, reason } => {
                write!(f, "cannot read config {}: {reason}", path.display())
            }
            Self::Parse { reason } => write!(f, "invalid config file: {reason}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PipelineConfig {
        PipelineConfig::with_max_steps(5)
    }

    #[test]
    fn validate_valid_config_succeeds() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn default_max_steps_must_be_set() {
        match PipelineConfig::default().validate() {
            Err(ConfigError::InvalidMaxSteps { value: 0 }) => {}
            other => panic!("expected InvalidMaxSteps, got {other:?}"),
        }
    }

    #[test]
    fn validate_negative_max_steps_fails() {
        let mut cfg = valid_config();
        cfg.max_steps = -3;
        match cfg.validate() {
            Err(ConfigError::InvalidMaxSteps { value: -3 }) => {}
            other => panic!("expected InvalidMaxSteps, got {other:?}"),
        }
    }

    #[test]
    fn validate_zero_workers_fails() {
        let mut cfg = valid_config();
        cfg.workers = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn validate_component_names() {
        let mut cfg = valid_config();
        cfg.components.uy = String::new();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyComponentName));

        let mut cfg = valid_config();
        cfg.components.uz = "ux".to_string();
        match cfg.validate() {
            Err(ConfigError::DuplicateComponentName { name }) => assert_eq!(name, "ux"),
            other => panic!("expected DuplicateComponentName, got {other:?}"),
        }
    }

    #[test]
    fn validate_bad_spacing_fails() {
        let mut cfg = valid_config();
        cfg.spacing.dy = f64::NAN;
        match cfg.validate() {
            Err(ConfigError::InvalidSpacing { reason }) => assert!(reason.contains("dy")),
            other => panic!("expected InvalidSpacing, got {other:?}"),
        }
    }

    #[test]
    fn validate_zero_poll_attempts_fails() {
        let mut cfg = valid_config();
        cfg.poll.max_attempts = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPoll { .. })
        ));
    }

    #[test]
    fn last_step_follows_max_steps() {
        let cfg = PipelineConfig::with_max_steps(3);
        assert!(!cfg.is_last_step(0));
        assert!(!cfg.is_last_step(1));
        assert!(cfg.is_last_step(2));
        assert!(cfg.is_last_step(10));
    }

    #[test]
    fn require_input() {
        let mut cfg = valid_config();
        assert_eq!(cfg.require_input(), Err(ConfigError::MissingInput));
        cfg.input = Some(PathBuf::from("in.bp"));
        assert_eq!(cfg.require_input(), Ok(Path::new("in.bp")));
    }

    #[test]
    fn file_config_overrides_only_present_keys() {
        let file = FileConfig::from_toml_str(
            r#"
            max_steps = 12
            stencil_order = 4

            [spacing]
            dx = 0.5

            [components]
            uz = "vz"

            [poll]
            max_attempts = 3
            "#,
        )
        .unwrap();
        let mut cfg = PipelineConfig::default();
        file.apply(&mut cfg).unwrap();
        assert_eq!(cfg.max_steps, 12);
        assert_eq!(cfg.stencil_order, StencilOrder::Fourth);
        assert_eq!(cfg.spacing.dx, 0.5);
        assert_eq!(cfg.spacing.dy, 1.0);
        assert_eq!(cfg.components.ux, "ux");
        assert_eq!(cfg.components.uz, "vz");
        assert_eq!(cfg.poll.max_attempts, 3);
        assert_eq!(cfg.poll.interval_ms, 10);
        assert_eq!(cfg.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn file_config_rejects_unknown_keys() {
        assert!(matches!(
            FileConfig::from_toml_str("max_step = 3"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn file_config_rejects_unsupported_order() {
        let file = FileConfig::from_toml_str("stencil_order = 3").unwrap();
        let mut cfg = PipelineConfig::default();
        assert_eq!(
            file.apply(&mut cfg),
            Err(ConfigError::UnsupportedStencilOrder { order: 3 })
        );
    }

    #[test]
    fn missing_file_reports_path() {
        match FileConfig::load(Path::new("/nonexistent/divcurl.toml")) {
            Err(ConfigError::FileRead { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/divcurl.toml"))
            }
            other => panic!("expected FileRead, got {other:?}"),
        }
    }
}
