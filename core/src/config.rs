//! Filter configuration and its file representations.
//!
//! The configuration can be stored as JSON, YAML or TOML; the format is chosen by file extension.
//!
//! ```
//! use mcl::config::MclConfig;
//! use mcl::particle::ParticleResamplingStrategy;
//!
//! let cfg = MclConfig {
//!     num_particles: 500,
//!     map_size: 20.0,
//!     resampling_strategy: ParticleResamplingStrategy::Systematic,
//!     ..Default::default()
//! };
//! assert!(cfg.validate().is_ok());
//! ```
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{LocalizationError, Result};
use crate::particle::ParticleResamplingStrategy;

fn default_num_particles() -> usize {
    100
}
fn default_map_size() -> f64 {
    10.0
}
fn default_sigma() -> f64 {
    1.0
}
fn default_initial_position_std() -> f64 {
    0.5
}
fn default_initial_heading_std() -> f64 {
    0.1
}
/// Default seed value for reproducible simulations
fn default_seed() -> u64 {
    42
}

/// Per-particle Gaussian jitter applied on top of the shared control delta.
///
/// Without it every particle receives the identical delta and the population collapses onto
/// copies of the few hypotheses that survive resampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionNoise {
    /// Standard deviation added to `dx`
    pub x_std: f64,
    /// Standard deviation added to `dy`
    pub y_std: f64,
    /// Standard deviation added to `dtheta` (radians)
    pub theta_std: f64,
}

impl MotionNoise {
    pub fn new(x_std: f64, y_std: f64, theta_std: f64) -> Self {
        MotionNoise {
            x_std,
            y_std,
            theta_std,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, std) in [
            ("x_std", self.x_std),
            ("y_std", self.y_std),
            ("theta_std", self.theta_std),
        ] {
            if !std.is_finite() || std < 0.0 {
                return Err(LocalizationError::InvalidConfiguration(format!(
                    "motion noise {name} must be finite and non-negative, got {std}"
                )));
            }
        }
        Ok(())
    }
}

/// Monte Carlo localization filter configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MclConfig {
    /// Number of particles, fixed for the lifetime of the filter
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,
    /// Side length of the square area particles are drawn from, `[0, map_size)`
    #[serde(default = "default_map_size")]
    pub map_size: f64,
    /// Measurement noise standard deviation used by `correct_default`
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default)]
    pub resampling_strategy: ParticleResamplingStrategy,
    /// Position spread around a start pose hint passed to `initialize`
    #[serde(default = "default_initial_position_std")]
    pub initial_position_std: f64,
    /// Heading spread (radians) around a start pose hint passed to `initialize`
    #[serde(default = "default_initial_heading_std")]
    pub initial_heading_std: f64,
    /// Random number generator seed for deterministic runs.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Optional per-particle jitter in `predict`; `None` applies the control delta verbatim
    #[serde(default)]
    pub motion_noise: Option<MotionNoise>,
}

impl Default for MclConfig {
    fn default() -> Self {
        MclConfig {
            num_particles: default_num_particles(),
            map_size: default_map_size(),
            sigma: default_sigma(),
            resampling_strategy: ParticleResamplingStrategy::default(),
            initial_position_std: default_initial_position_std(),
            initial_heading_std: default_initial_heading_std(),
            seed: default_seed(),
            motion_noise: None,
        }
    }
}

impl MclConfig {
    /// Check every field is in its valid domain.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(LocalizationError::InvalidConfiguration(
                "number of particles must be positive".to_string(),
            ));
        }
        if !(self.map_size.is_finite() && self.map_size > 0.0) {
            return Err(LocalizationError::InvalidConfiguration(format!(
                "map size must be positive and finite, got {}",
                self.map_size
            )));
        }
        validate_sigma(self.sigma)?;
        for (name, std) in [
            ("initial_position_std", self.initial_position_std),
            ("initial_heading_std", self.initial_heading_std),
        ] {
            if !std.is_finite() || std < 0.0 {
                return Err(LocalizationError::InvalidConfiguration(format!(
                    "{name} must be finite and non-negative, got {std}"
                )));
            }
        }
        if let Some(noise) = &self.motion_noise {
            noise.validate()?;
        }
        Ok(())
    }

    /// Write the configuration; the format follows the file extension (.json/.yaml/.yml/.toml).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        write_config_file(self, path)
    }

    /// Read a configuration written by [`to_file`](Self::to_file) or by hand.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        read_config_file(path)
    }
}

/// On-disk configuration format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension (`.json`, `.yaml`, `.yml` or `.toml`, any case).
    pub fn from_path(path: &Path) -> io::Result<Self> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported file extension: {}", path.display()),
            )),
        }
    }
}

/// Serialize `value` to `path` in the format chosen by the file extension. JSON is
/// pretty-printed.
pub fn write_config_file<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> io::Result<()> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let mut file = File::create(path)?;
    match format {
        ConfigFormat::Json => serde_json::to_writer_pretty(file, value).map_err(io::Error::other),
        ConfigFormat::Yaml => {
            let s = serde_yaml::to_string(value).map_err(io::Error::other)?;
            file.write_all(s.as_bytes())
        }
        ConfigFormat::Toml => {
            let s = toml::to_string(value).map_err(io::Error::other)?;
            file.write_all(s.as_bytes())
        }
    }
}

/// Deserialize a value from `path` in the format chosen by the file extension.
pub fn read_config_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> io::Result<T> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let file = File::open(path)?;
    match format {
        ConfigFormat::Json => serde_json::from_reader(file).map_err(io::Error::other),
        ConfigFormat::Yaml => serde_yaml::from_reader(file).map_err(io::Error::other),
        ConfigFormat::Toml => {
            let mut s = String::new();
            let mut file = file;
            file.read_to_string(&mut s)?;
            toml::from_str(&s).map_err(io::Error::other)
        }
    }
}

/// Measurement noise must be a positive, finite standard deviation.
pub(crate) fn validate_sigma(sigma: f64) -> Result<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(LocalizationError::InvalidConfiguration(format!(
            "sigma must be positive and finite, got {sigma}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> MclConfig {
        MclConfig {
            num_particles: 250,
            map_size: 12.5,
            sigma: 0.4,
            resampling_strategy: ParticleResamplingStrategy::Stratified,
            motion_noise: Some(MotionNoise::new(0.05, 0.05, 0.01)),
            initial_position_std: 1.0,
            initial_heading_std: 0.2,
            seed: 7,
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(MclConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let bad = [
            MclConfig {
                num_particles: 0,
                ..Default::default()
            },
            MclConfig {
                map_size: 0.0,
                ..Default::default()
            },
            MclConfig {
                map_size: f64::INFINITY,
                ..Default::default()
            },
            MclConfig {
                sigma: -1.0,
                ..Default::default()
            },
            MclConfig {
                sigma: f64::NAN,
                ..Default::default()
            },
            MclConfig {
                initial_heading_std: -0.1,
                ..Default::default()
            },
            MclConfig {
                motion_noise: Some(MotionNoise::new(0.1, f64::NAN, 0.0)),
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(LocalizationError::InvalidConfiguration(_))),
                "{cfg:?} should be rejected"
            );
        }
    }

    #[test]
    fn file_formats_round_trip() {
        let cfg = sample_config();
        for ext in ["json", "yaml", "toml"] {
            let path = std::env::temp_dir().join(format!("mcl_config_round_trip.{ext}"));
            cfg.to_file(&path).expect("write config");
            let read = MclConfig::from_file(&path).expect("read config");
            assert_eq!(read, cfg, "round trip through .{ext}");
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: MclConfig = toml::from_str("num_particles = 42\n").unwrap();
        assert_eq!(cfg.num_particles, 42);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.motion_noise, None);
        assert_eq!(cfg.resampling_strategy, ParticleResamplingStrategy::Multinomial);
    }

    #[test]
    fn unsupported_extension() {
        let err = MclConfig::default().to_file("config.ini").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = MclConfig::from_file("config").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn format_from_extension() {
        for (name, format) in [
            ("a.json", ConfigFormat::Json),
            ("a.JSON", ConfigFormat::Json),
            ("a.yml", ConfigFormat::Yaml),
            ("dir/a.yaml", ConfigFormat::Yaml),
            ("a.toml", ConfigFormat::Toml),
        ] {
            assert_eq!(ConfigFormat::from_path(Path::new(name)).unwrap(), format);
        }
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
    }

    #[test]
    fn generic_helpers_handle_any_serde_type() {
        let noise = MotionNoise::new(0.25, 0.5, 0.125);
        for ext in ["json", "yml", "toml"] {
            let path = std::env::temp_dir().join(format!("mcl_motion_noise.{ext}"));
            write_config_file(&noise, &path).unwrap();
            let read: MotionNoise = read_config_file(&path).unwrap();
            assert_eq!(read, noise, "round trip through .{ext}");
            let _ = std::fs::remove_file(&path);
        }
    }
}
