//! Simulation configuration: filter settings, scenario, output and logging in one file.
//!
//! The format is chosen by file extension (`.json`, `.yaml`/`.yml` or `.toml`).
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::io;
use std::path::{Path, PathBuf};

use mcl::config::{MclConfig, read_config_file, write_config_file};
use mcl::particle::PoseEstimator;
use mcl::sim::Scenario;

/// Log verbosity accepted in configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Logging section of a simulation configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file path; logs go to stderr when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_output() -> PathBuf {
    PathBuf::from("localization.csv")
}
fn default_trials() -> usize {
    1
}

/// Everything needed to run one or more localization trials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// CSV file the per-step records are written to
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Number of independent trials; trial `i` reseeds the filter with `seed + 2 * i`
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Run trials on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub estimator: PoseEstimator,
    #[serde(default)]
    pub filter: MclConfig,
    #[serde(default)]
    pub scenario: Scenario,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            output: default_output(),
            trials: default_trials(),
            parallel: false,
            estimator: PoseEstimator::default(),
            filter: MclConfig::default(),
            scenario: Scenario::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Write the configuration; the format follows the file extension (.json/.yaml/.yml/.toml).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        write_config_file(self, path)
    }

    /// Read the configuration; the format follows the file extension (.json/.yaml/.yml/.toml).
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        read_config_file(path)
    }
}
