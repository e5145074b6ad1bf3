//! MCL SIM: A simulation and analysis tool for Monte Carlo localization.
//!
//! A ground-truth agent moves through a landmark field following a control sequence and senses
//! every landmark in its body frame. A particle filter receives the same controls and the
//! (optionally noisy) measurements and estimates the agent's pose. Per-step ground truth, estimate
//! and error are written to CSV.
//!
//! You can run simulations either by:
//!   1. Loading all parameters from a configuration file (TOML/JSON/YAML)
//!   2. Specifying parameters via command-line flags

mod common;
mod config;

use clap::{Args, Parser, Subcommand};
use common::{
    create_parent_dirs, init_logger, parse_control, parse_motion_noise, parse_point, parse_pose,
    trial_output_path,
};
use config::SimulationConfig;
use log::{error, info, warn};
use mcl::Pose;
use mcl::config::{MclConfig, MotionNoise};
use mcl::map::LandmarkMap;
use mcl::particle::{ParticleResamplingStrategy, PoseEstimator};
use mcl::sim::{Control, LocalizationResult, Scenario, run_localization};
use nalgebra::Point2;
use rayon::prelude::*;
use std::error::Error;
use std::path::PathBuf;

const LONG_ABOUT: &str = "MCL SIM: A simulation and analysis tool for Monte Carlo localization.

A ground-truth agent moves through a field of known landmarks following a control sequence and
senses every landmark relative to its own pose. A particle filter receives the same controls and
measurements and estimates the agent's pose. Per-step ground truth, estimate and error are written
to CSV.

You can run simulations either by:
  1. Loading all parameters from a configuration file (TOML/JSON/YAML)
  2. Specifying parameters via command-line flags";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "A simulation and analysis tool for Monte Carlo localization.", long_about = LONG_ABOUT)]
struct Cli {
    /// Run simulation from a configuration file (TOML/JSON/YAML)
    /// This option overrides any subcommand arguments
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute (ignored if --config is provided)
    #[command(subcommand)]
    command: Option<Command>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Run trials in parallel
    #[arg(long, global = true)]
    parallel: bool,

    /// Number of independent trials (overrides the configuration file)
    #[arg(long, global = true)]
    trials: Option<usize>,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Run a localization simulation from command-line flags",
        long_about = "Run a localization simulation. Landmarks and controls are given as comma separated values and may be repeated. Without any --landmark the default landmarks (2,3) and (5,7) are used; without any --control a single (1, 0.5, pi/4) step is applied."
    )]
    Run(RunArgs),
    #[command(
        name = "config",
        about = "Write a configuration file template",
        long_about = "Write a configuration file populated with default values. The format follows the file extension (.toml, .json, .yaml or .yml)."
    )]
    CreateConfig(CreateConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Output CSV file for the per-step records
    #[arg(short, long, default_value = "localization.csv")]
    output: PathBuf,
    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 100)]
    particles: usize,
    /// Side length of the square initialization area
    #[arg(long, default_value_t = 10.0)]
    map_size: f64,
    /// Measurement noise standard deviation used by the filter
    #[arg(long, default_value_t = 1.0)]
    sigma: f64,
    /// Resampling strategy (multinomial, systematic, stratified, residual)
    #[arg(long, default_value = "multinomial")]
    resampling: ParticleResamplingStrategy,
    /// Point estimate (weighted_average, unweighted_average, highest_weight)
    #[arg(long, default_value = "weighted_average")]
    estimator: PoseEstimator,
    /// Per-particle motion jitter as x_std,y_std,theta_std
    #[arg(long, value_parser = parse_motion_noise)]
    motion_noise: Option<MotionNoise>,
    /// Landmark position as x,y (repeatable)
    #[arg(short, long = "landmark", value_parser = parse_point)]
    landmarks: Vec<Point2<f64>>,
    /// Register landmarks on an integer grid of this size instead of using them verbatim
    #[arg(long)]
    grid: Option<usize>,
    /// Control step as dx,dy,dtheta (repeatable)
    #[arg(long = "control", value_parser = parse_control, allow_hyphen_values = true)]
    controls: Vec<Control>,
    /// Repeat the control sequence this many times
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    /// True start pose as x,y,theta
    #[arg(long, value_parser = parse_pose, default_value = "0,0,0", allow_hyphen_values = true)]
    start: Pose,
    /// Initialize the filter around the start pose instead of uniformly
    #[arg(long)]
    start_hint: bool,
    /// Position spread around the start pose hint
    #[arg(long, default_value_t = 0.5)]
    initial_position_std: f64,
    /// Heading spread around the start pose hint
    #[arg(long, default_value_t = 0.1)]
    initial_heading_std: f64,
    /// Standard deviation of the synthetic measurement noise
    #[arg(long, default_value_t = 0.0)]
    measurement_noise: f64,
    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output path for the configuration file
    #[arg(short, long, default_value = "mcl_config.toml")]
    output: PathBuf,
}

impl RunArgs {
    /// Build a simulation configuration from the flags.
    fn to_config(&self) -> Result<SimulationConfig, Box<dyn Error>> {
        let filter = MclConfig {
            num_particles: self.particles,
            map_size: self.map_size,
            sigma: self.sigma,
            resampling_strategy: self.resampling,
            initial_position_std: self.initial_position_std,
            initial_heading_std: self.initial_heading_std,
            seed: self.seed,
            motion_noise: self.motion_noise,
        };

        let defaults = Scenario::default();
        let mut scenario = Scenario {
            landmarks: if self.landmarks.is_empty() {
                defaults.landmarks
            } else {
                self.landmarks.clone()
            },
            measurement_noise_std: self.measurement_noise,
            use_start_hint: self.start_hint,
            start_pose: self.start,
            controls: if self.controls.is_empty() {
                defaults.controls
            } else {
                self.controls.clone()
            },
        };
        if let Some(size) = self.grid {
            let mut map = LandmarkMap::new(size)?;
            for landmark in &scenario.landmarks {
                let (x, y) = (landmark.x.round() as i64, landmark.y.round() as i64);
                if !map.is_valid_position(x, y) {
                    warn!("Landmark ({x}, {y}) lies outside the {size}x{size} grid and is ignored");
                }
                map.add_landmark(x, y);
            }
            scenario = scenario.with_map_landmarks(&map);
        }
        scenario.controls = scenario
            .controls
            .iter()
            .copied()
            .cycle()
            .take(scenario.controls.len() * self.repeat)
            .collect();

        Ok(SimulationConfig {
            output: self.output.clone(),
            estimator: self.estimator,
            filter,
            scenario,
            ..SimulationConfig::default()
        })
    }
}

/// Run every trial of `config` and write one CSV per trial.
fn run_simulation(config: &SimulationConfig) -> Result<(), Box<dyn Error>> {
    config.filter.validate()?;
    config.scenario.validate()?;
    if config.trials == 0 {
        return Err("number of trials must be positive".into());
    }
    if config.scenario.landmarks.is_empty() {
        return Err("at least one landmark is required".into());
    }
    info!(
        "Running {} trial(s) of {} particles over {} landmarks ({} resampling, {} estimate)",
        config.trials,
        config.filter.num_particles,
        config.scenario.landmarks.len(),
        config.filter.resampling_strategy,
        config.estimator
    );

    let run_trial = |trial: usize| -> Result<LocalizationResult, String> {
        let filter = MclConfig {
            seed: config.filter.seed.wrapping_add(2 * trial as u64),
            ..config.filter.clone()
        };
        let mut result = run_localization(&filter, &config.scenario, config.estimator)
            .map_err(|e| format!("trial {trial}: {e}"))?;
        result.name = format!("trial{trial}");
        Ok(result)
    };

    let results: Vec<Result<LocalizationResult, String>> = if config.parallel {
        (0..config.trials).into_par_iter().map(run_trial).collect()
    } else {
        (0..config.trials).map(run_trial).collect()
    };

    create_parent_dirs(&config.output)?;
    let mut final_errors = Vec::with_capacity(config.trials);
    for (trial, result) in results.into_iter().enumerate() {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!("{e}");
                continue;
            }
        };
        let path = trial_output_path(&config.output, trial, config.trials);
        result.to_csv(&path)?;
        if result.degenerate_steps() > 0 {
            warn!(
                "Trial {trial}: {} of {} steps had degenerate weights",
                result.degenerate_steps(),
                result.records.len().saturating_sub(1)
            );
        }
        if let (Some(last), Some(mean), Some(rms)) = (
            result.final_position_error(),
            result.mean_position_error(),
            result.rms_position_error(),
        ) {
            info!(
                "Trial {trial}: final error {last:.4}, mean error {mean:.4}, rms error {rms:.4} -> {}",
                path.display()
            );
            final_errors.push(last);
        }
    }

    if final_errors.is_empty() {
        return Err("every trial failed".into());
    }
    if final_errors.len() > 1 {
        let mean = final_errors.iter().sum::<f64>() / final_errors.len() as f64;
        info!(
            "Mean final position error over {} trials: {mean:.4}",
            final_errors.len()
        );
    }
    Ok(())
}

fn create_config_file(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    create_parent_dirs(&args.output)?;
    SimulationConfig::default().to_file(&args.output)?;
    info!("Configuration template written to {}", args.output.display());
    println!("Configuration template written to {}", args.output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(ref config_path) = cli.config {
        let mut config = SimulationConfig::from_file(config_path)?;

        // CLI log file takes precedence over the config file
        let config_log_file = config.logging.file.as_ref().map(PathBuf::from);
        let log_file = cli.log_file.as_ref().or(config_log_file.as_ref());
        init_logger(&config.logging.level.to_string(), log_file)?;

        info!("Loaded configuration from {}", config_path.display());
        config.parallel |= cli.parallel;
        if let Some(trials) = cli.trials {
            config.trials = trials;
        }
        return run_simulation(&config);
    }

    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match cli.command {
        Some(Command::Run(args)) => {
            let mut config = args.to_config()?;
            config.parallel = cli.parallel;
            config.trials = cli.trials.unwrap_or(1);
            run_simulation(&config)
        }
        Some(Command::CreateConfig(args)) => create_config_file(&args),
        None => {
            eprintln!("Error: No command provided. Use -h or --help for usage information.");
            std::process::exit(1);
        }
    }
}
