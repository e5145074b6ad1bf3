//! Common utility functions for the simulation binary.
//!
//! This module contains shared utilities for the CLI:
//! - Logger initialization
//! - Output path preparation
//! - Parsers for the comma separated values accepted on the command line

use std::error::Error;
use std::path::{Path, PathBuf};

use mcl::Pose;
use mcl::config::MotionNoise;
use mcl::sim::Control;
use nalgebra::Point2;

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        create_parent_dirs(log_path)?;
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

/// Create the parent directories of a file path if they are missing.
pub fn create_parent_dirs(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Output file for one trial.
///
/// A single trial writes to `output` itself; multiple trials write `<stem>_trial<N>.<ext>` next
/// to it.
pub fn trial_output_path(output: &Path, trial: usize, trials: usize) -> PathBuf {
    if trials <= 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("localization");
    let ext = output.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    output.with_file_name(format!("{stem}_trial{trial}.{ext}"))
}

fn parse_fields<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let fields: Vec<&str> = s.split(',').map(str::trim).collect();
    if fields.len() != N {
        return Err(format!(
            "expected {N} comma separated values for {what}, got '{s}'"
        ));
    }
    let mut values = [0.0; N];
    for (value, field) in values.iter_mut().zip(fields) {
        *value = field
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{field}' in {what}: {e}"))?;
    }
    Ok(values)
}

/// Parse a landmark given as `x,y`.
pub fn parse_point(s: &str) -> Result<Point2<f64>, String> {
    let [x, y] = parse_fields::<2>(s, "landmark")?;
    Ok(Point2::new(x, y))
}

/// Parse a pose given as `x,y,theta`.
pub fn parse_pose(s: &str) -> Result<Pose, String> {
    let [x, y, theta] = parse_fields::<3>(s, "pose")?;
    Ok(Pose::new(x, y, theta))
}

/// Parse a control given as `dx,dy,dtheta`.
pub fn parse_control(s: &str) -> Result<Control, String> {
    let [dx, dy, dtheta] = parse_fields::<3>(s, "control")?;
    Ok(Control::new(dx, dy, dtheta))
}

/// Parse motion noise given as `x_std,y_std,theta_std`.
pub fn parse_motion_noise(s: &str) -> Result<MotionNoise, String> {
    let [x_std, y_std, theta_std] = parse_fields::<3>(s, "motion noise")?;
    Ok(MotionNoise::new(x_std, y_std, theta_std))
}
