//! Monte Carlo localization particle filter.
//!
//! The filter owns a population of exactly `N` pose hypotheses. Each control cycle the caller
//! moves the population with [`ParticleFilter::predict`] and then weights and resamples it
//! against a landmark measurement vector with [`ParticleFilter::correct`].
//!
//! # Usage
//!
//! ```rust
//! use mcl::Pose;
//! use mcl::measurements::observe_landmarks;
//! use mcl::particle::ParticleFilter;
//! use nalgebra::Point2;
//!
//! let landmarks = vec![Point2::new(2.0, 3.0), Point2::new(5.0, 7.0)];
//! let mut pf = ParticleFilter::new(200, 10.0, 0.5, landmarks.clone()).unwrap();
//! pf.initialize(None).unwrap();
//!
//! let mut truth = Pose::new(1.0, 1.0, 0.0);
//! truth.translate(1.0, 0.5, 0.1);
//! pf.predict(1.0, 0.5, 0.1).unwrap();
//!
//! let measurements = observe_landmarks(&truth, &landmarks);
//! match pf.correct(&measurements, 0.5) {
//!     Ok(weights) => assert_eq!(weights.len(), 200),
//!     Err(e) => eprintln!("update skipped: {e}"),
//! }
//! ```
use log::{debug, trace};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;
use std::sync::Arc;

use crate::Pose;
use crate::config::{MclConfig, MotionNoise, validate_sigma};
use crate::error::{LocalizationError, Result};
use crate::measurements::{measurement_likelihood, observe_landmarks};

/// A pose hypothesis and its importance weight.
///
/// The weight is `None` between a resampling event and the next measurement update; a particle's
/// weight is never carried forward into the next cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub pose: Pose,
    pub weight: Option<f64>,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("x", &self.pose.x)
            .field("y", &self.pose.y)
            .field("theta", &self.pose.theta)
            .field("weight", &self.weight)
            .finish()
    }
}
impl Particle {
    pub fn new(pose: Pose) -> Particle {
        Particle { pose, weight: None }
    }
}

/// How a new population is drawn from normalized weights.
///
/// Every strategy draws exactly as many indices as there are weights and never selects an index
/// whose weight is zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleResamplingStrategy {
    /// Independent draws proportional to weight.
    #[default]
    Multinomial,
    /// One uniform offset, evenly spaced pointers.
    Systematic,
    /// One uniform draw per stratum.
    Stratified,
    /// Deterministic copies of `floor(N w)` followed by systematic draws over the remainders.
    Residual,
}

impl Display for ParticleResamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticleResamplingStrategy::Multinomial => "multinomial",
            ParticleResamplingStrategy::Systematic => "systematic",
            ParticleResamplingStrategy::Stratified => "stratified",
            ParticleResamplingStrategy::Residual => "residual",
        };
        f.write_str(name)
    }
}

impl FromStr for ParticleResamplingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multinomial" => Ok(ParticleResamplingStrategy::Multinomial),
            "systematic" => Ok(ParticleResamplingStrategy::Systematic),
            "stratified" => Ok(ParticleResamplingStrategy::Stratified),
            "residual" => Ok(ParticleResamplingStrategy::Residual),
            other => Err(format!("unknown resampling strategy '{other}'")),
        }
    }
}

impl ParticleResamplingStrategy {
    /// Draw `weights.len()` indices into the population.
    ///
    /// `weights` must be non-negative with a positive finite sum; they need not be normalized.
    pub fn resample_indices<R: Rng + ?Sized>(&self, weights: &[f64], rng: &mut R) -> Vec<usize> {
        let n = weights.len();
        if n == 0 {
            return Vec::new();
        }
        let cdf = cumulative(weights);
        let last = last_positive(weights);
        match self {
            ParticleResamplingStrategy::Multinomial => multinomial(&cdf, n, last, rng),
            ParticleResamplingStrategy::Systematic => {
                let total = cdf[n - 1];
                let u0 = rng.random::<f64>() / n as f64;
                let positions: Vec<f64> = (0..n)
                    .map(|i| (u0 + i as f64 / n as f64) * total)
                    .collect();
                walk(&cdf, &positions, last)
            }
            ParticleResamplingStrategy::Stratified => {
                let total = cdf[n - 1];
                let positions: Vec<f64> = (0..n)
                    .map(|i| (i as f64 + rng.random::<f64>()) / n as f64 * total)
                    .collect();
                walk(&cdf, &positions, last)
            }
            ParticleResamplingStrategy::Residual => residual(weights, &cdf, last, rng),
        }
    }
}

fn cumulative(weights: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .scan(0.0, |acc, &w| {
            *acc += w;
            Some(*acc)
        })
        .collect()
}

fn last_positive(weights: &[f64]) -> usize {
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}

fn multinomial<R: Rng + ?Sized>(cdf: &[f64], n: usize, last: usize, rng: &mut R) -> Vec<usize> {
    let total = cdf[cdf.len() - 1];
    (0..n)
        .map(|_| {
            let u = rng.random::<f64>() * total;
            cdf.partition_point(|&c| c <= u).min(last)
        })
        .collect()
}

/// Map sorted positions in `[0, total)` onto the cumulative weights.
fn walk(cdf: &[f64], positions: &[f64], last: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity(positions.len());
    let mut j = 0;
    for &position in positions {
        while j < last && cdf[j] <= position {
            j += 1;
        }
        indices.push(j);
    }
    indices
}

fn residual<R: Rng + ?Sized>(weights: &[f64], cdf: &[f64], last: usize, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let total = cdf[n - 1];
    let mut indices = Vec::<usize>::with_capacity(n);
    let mut remainders: Vec<f64> = vec![0.0; n];
    for (i, &w) in weights.iter().enumerate() {
        let scaled = w / total * n as f64;
        let copies = scaled.floor() as usize;
        remainders[i] = scaled - copies as f64;
        for _ in 0..copies {
            indices.push(i);
        }
    }
    indices.truncate(n);
    let residual_particles = n - indices.len();
    if residual_particles > 0 {
        let remainder_cdf = cumulative(&remainders);
        let sum_residual = remainder_cdf[n - 1];
        if sum_residual > 0.0 {
            let remainder_last = last_positive(&remainders);
            let step = sum_residual / residual_particles as f64;
            let u = rng.random::<f64>() * step;
            let positions: Vec<f64> = (0..residual_particles)
                .map(|k| u + k as f64 * step)
                .collect();
            indices.extend(walk(&remainder_cdf, &positions, remainder_last));
        } else {
            indices.extend(multinomial(cdf, residual_particles, last, rng));
        }
    }
    indices
}

/// Point estimates computed from a population snapshot.
///
/// The filter does not estimate a pose itself; consumers pick the estimator that suits them.
/// Headings are averaged on the circle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseEstimator {
    /// Weighted mean using the last normalized weights, unweighted when none are available.
    #[default]
    WeightedAverage,
    UnweightedAverage,
    /// Pose of the highest-weight particle, first particle when no weights are available.
    HighestWeight,
}

impl Display for PoseEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoseEstimator::WeightedAverage => "weighted_average",
            PoseEstimator::UnweightedAverage => "unweighted_average",
            PoseEstimator::HighestWeight => "highest_weight",
        };
        f.write_str(name)
    }
}

impl FromStr for PoseEstimator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "weighted_average" | "weighted" => Ok(PoseEstimator::WeightedAverage),
            "unweighted_average" | "unweighted" => Ok(PoseEstimator::UnweightedAverage),
            "highest_weight" | "best" => Ok(PoseEstimator::HighestWeight),
            other => Err(format!("unknown pose estimator '{other}'")),
        }
    }
}

impl PoseEstimator {
    /// Estimate a pose from `poses`, optionally weighted.
    ///
    /// Returns `None` for an empty population or when `weights` does not match `poses` in
    /// length.
    pub fn estimate(&self, poses: &[Pose], weights: Option<&[f64]>) -> Option<Pose> {
        if poses.is_empty() {
            return None;
        }
        if let Some(w) = weights
            && w.len() != poses.len()
        {
            return None;
        }
        match (self, weights) {
            (PoseEstimator::WeightedAverage, Some(w)) => weighted_mean(poses, w),
            (PoseEstimator::HighestWeight, Some(w)) => w
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| poses[i]),
            (PoseEstimator::HighestWeight, None) => Some(poses[0]),
            (_, _) => {
                let uniform = vec![1.0; poses.len()];
                weighted_mean(poses, &uniform)
            }
        }
    }
}

fn weighted_mean(poses: &[Pose], weights: &[f64]) -> Option<Pose> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    let mut mean = Pose::default();
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    for (pose, &w) in poses.iter().zip(weights.iter()) {
        mean.x += w * pose.x;
        mean.y += w * pose.y;
        sin_sum += w * pose.theta.sin();
        cos_sum += w * pose.theta.cos();
    }
    mean.x /= total;
    mean.y /= total;
    mean.theta = sin_sum.atan2(cos_sum);
    Some(mean)
}

/// Monte Carlo localization filter over a fixed landmark sequence.
#[derive(Clone)]
pub struct ParticleFilter {
    particles: Vec<Particle>,
    num_particles: usize,
    map_size: f64,
    sigma_default: f64,
    landmarks: Arc<[Point2<f64>]>,
    resampling_strategy: ParticleResamplingStrategy,
    motion_noise: Option<MotionNoise>,
    initial_position_std: f64,
    initial_heading_std: f64,
    last_weights: Option<Vec<f64>>,
    weighted_poses: Option<Vec<Pose>>,
    rng: StdRng,
}

/// Alternative name for [`ParticleFilter`].
pub type MonteCarloLocalization = ParticleFilter;

impl Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = match self.weighted_particles() {
            Some(weighted) => {
                let poses: Vec<Pose> = weighted.iter().map(|p| p.pose).collect();
                PoseEstimator::WeightedAverage.estimate(&poses, self.last_weights())
            }
            None => PoseEstimator::UnweightedAverage.estimate(&self.poses(), None),
        };
        let weight_range = self.last_weights().map(|w| {
            let min_weight = w.iter().copied().fold(f64::INFINITY, f64::min);
            let max_weight = w.iter().copied().fold(0.0, f64::max);
            (min_weight, max_weight)
        });
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.num_particles)
            .field("initialized", &self.is_initialized())
            .field("landmarks", &self.landmarks.len())
            .field("effective_particles", &self.effective_sample_size())
            .field("weight_range", &weight_range)
            .field("mean_pose", &mean)
            .field("resampling_strategy", &self.resampling_strategy)
            .finish()
    }
}

impl ParticleFilter {
    /// Create an uninitialized filter with the default configuration for everything but the
    /// particle count, map size and default measurement sigma.
    ///
    /// # Errors
    /// `InvalidConfiguration` when any of the three is non-positive or non-finite.
    pub fn new(
        num_particles: usize,
        map_size: f64,
        sigma_default: f64,
        landmarks: impl Into<Arc<[Point2<f64>]>>,
    ) -> Result<Self> {
        let config = MclConfig {
            num_particles,
            map_size,
            sigma: sigma_default,
            ..MclConfig::default()
        };
        Self::from_config(&config, landmarks)
    }

    /// Create an uninitialized filter from a full configuration.
    pub fn from_config(
        config: &MclConfig,
        landmarks: impl Into<Arc<[Point2<f64>]>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(ParticleFilter {
            particles: Vec::new(),
            num_particles: config.num_particles,
            map_size: config.map_size,
            sigma_default: config.sigma,
            landmarks: landmarks.into(),
            resampling_strategy: config.resampling_strategy,
            motion_noise: config.motion_noise,
            initial_position_std: config.initial_position_std,
            initial_heading_std: config.initial_heading_std,
            last_weights: None,
            weighted_poses: None,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Replace the random number source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn set_motion_noise(&mut self, motion_noise: Option<MotionNoise>) -> Result<()> {
        if let Some(noise) = &motion_noise {
            noise.validate()?;
        }
        self.motion_noise = motion_noise;
        Ok(())
    }

    pub fn set_resampling_strategy(&mut self, strategy: ParticleResamplingStrategy) {
        self.resampling_strategy = strategy;
    }

    /// Draw a fresh population, replacing any existing one.
    ///
    /// Without a hint, x and y are uniform in `[0, map_size)` and theta uniform in `[0, 2π)`.
    /// With a hint, each component is drawn from a normal distribution centred on the hint using
    /// the configured initial spreads; a zero spread puts every particle exactly on the hint.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the hint is not finite; the population is left untouched.
    pub fn initialize(&mut self, start_pose_hint: Option<Pose>) -> Result<()> {
        if let Some(hint) = start_pose_hint
            && !hint.is_finite()
        {
            return Err(LocalizationError::InvalidConfiguration(format!(
                "start pose hint must be finite, got {hint}"
            )));
        }
        let particles: Vec<Particle> = match start_pose_hint {
            None => (0..self.num_particles)
                .map(|_| {
                    let x = self.rng.random::<f64>() * self.map_size;
                    let y = self.rng.random::<f64>() * self.map_size;
                    let theta = self.rng.random::<f64>() * 2.0 * PI;
                    Particle::new(Pose::new(x, y, theta))
                })
                .collect(),
            Some(hint) => {
                let position = Normal::new(0.0, self.initial_position_std).ok();
                let heading = Normal::new(0.0, self.initial_heading_std).ok();
                (0..self.num_particles)
                    .map(|_| {
                        let mut pose = hint;
                        pose.translate(
                            jitter(position.as_ref(), &mut self.rng),
                            jitter(position.as_ref(), &mut self.rng),
                            jitter(heading.as_ref(), &mut self.rng),
                        );
                        Particle::new(pose)
                    })
                    .collect()
            }
        };
        debug!(
            "Initialized {} particles ({})",
            particles.len(),
            match start_pose_hint {
                Some(hint) => format!("around {hint}"),
                None => format!("uniform over [0, {})", self.map_size),
            }
        );
        self.particles = particles;
        self.last_weights = None;
        self.weighted_poses = None;
        Ok(())
    }

    /// Apply the control `(dx, dy, dtheta)` to every particle.
    ///
    /// With no motion noise configured every particle receives exactly the same delta. With
    /// motion noise, each particle gets its own Gaussian perturbation of the delta.
    ///
    /// # Errors
    /// * `Uninitialized` before the first [`initialize`](Self::initialize).
    /// * `InvalidConfiguration` when any component of the control is not finite.
    pub fn predict(&mut self, dx: f64, dy: f64, dtheta: f64) -> Result<()> {
        self.ensure_initialized()?;
        if !(dx.is_finite() && dy.is_finite() && dtheta.is_finite()) {
            return Err(LocalizationError::InvalidConfiguration(format!(
                "control must be finite, got ({dx}, {dy}, {dtheta})"
            )));
        }
        match self.motion_noise {
            None => {
                for particle in &mut self.particles {
                    particle.pose.translate(dx, dy, dtheta);
                }
            }
            Some(noise) => {
                let x_noise = Normal::new(0.0, noise.x_std).ok();
                let y_noise = Normal::new(0.0, noise.y_std).ok();
                let theta_noise = Normal::new(0.0, noise.theta_std).ok();
                for particle in &mut self.particles {
                    particle.pose.translate(
                        dx + jitter(x_noise.as_ref(), &mut self.rng),
                        dy + jitter(y_noise.as_ref(), &mut self.rng),
                        dtheta + jitter(theta_noise.as_ref(), &mut self.rng),
                    );
                }
            }
        }
        trace!("Predicted with control ({dx}, {dy}, {dtheta})");
        Ok(())
    }

    /// Weight every particle against `measurements` and resample the population.
    ///
    /// `measurements[i]` must be the body-frame observation of `landmarks[i]`. Returns the
    /// normalized weights of the population as it was before resampling, index aligned with
    /// the pre-resample particles. The new population carries no weights.
    ///
    /// # Errors
    /// * `Uninitialized` before the first [`initialize`](Self::initialize).
    /// * `InvalidConfiguration` when `sigma` is not positive and finite.
    /// * `MeasurementArityMismatch` when the measurement count differs from the landmark count.
    /// * `DegenerateWeights` when the raw weights sum to zero or a non-finite value. The
    ///   population is left untouched so the caller may widen sigma, skip or re-initialize.
    pub fn correct(&mut self, measurements: &[Point2<f64>], sigma: f64) -> Result<Vec<f64>> {
        self.ensure_initialized()?;
        validate_sigma(sigma)?;
        if measurements.len() != self.landmarks.len() {
            return Err(LocalizationError::MeasurementArityMismatch {
                expected: self.landmarks.len(),
                found: measurements.len(),
            });
        }
        let raw_weights: Vec<f64> = self
            .particles
            .iter()
            .map(|particle| {
                let predicted = observe_landmarks(&particle.pose, &self.landmarks);
                measurement_likelihood(measurements, &predicted, sigma)
            })
            .collect();
        let sum: f64 = raw_weights.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(LocalizationError::DegenerateWeights { sum });
        }
        let weights: Vec<f64> = raw_weights.iter().map(|w| w / sum).collect();

        let indices = self
            .resampling_strategy
            .resample_indices(&weights, &mut self.rng);
        let resampled: Vec<Particle> = indices
            .iter()
            .map(|&i| Particle::new(self.particles[i].pose))
            .collect();
        let weighted = std::mem::replace(&mut self.particles, resampled);
        self.weighted_poses = Some(weighted.into_iter().map(|p| p.pose).collect());
        self.last_weights = Some(weights.clone());
        debug!(
            "Corrected {} particles with sigma {sigma}, effective sample size {:.2}",
            self.num_particles,
            effective_sample_size(&weights)
        );
        Ok(weights)
    }

    /// [`correct`](Self::correct) using the configured default sigma.
    pub fn correct_default(&mut self, measurements: &[Point2<f64>]) -> Result<Vec<f64>> {
        self.correct(measurements, self.sigma_default)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Snapshot of the population's poses.
    pub fn poses(&self) -> Vec<Pose> {
        self.particles.iter().map(|p| p.pose).collect()
    }

    /// Normalized weights returned by the most recent successful [`correct`](Self::correct),
    /// cleared by [`initialize`](Self::initialize).
    pub fn last_weights(&self) -> Option<&[f64]> {
        self.last_weights.as_deref()
    }

    /// The population as it was weighted by the most recent successful
    /// [`correct`](Self::correct), before resampling replaced it.
    pub fn weighted_particles(&self) -> Option<Vec<Particle>> {
        let poses = self.weighted_poses.as_ref()?;
        let weights = self.last_weights.as_ref()?;
        Some(
            poses
                .iter()
                .zip(weights.iter())
                .map(|(&pose, &weight)| Particle {
                    pose,
                    weight: Some(weight),
                })
                .collect(),
        )
    }

    /// `1 / Σ w²` over the last normalized weights.
    pub fn effective_sample_size(&self) -> Option<f64> {
        self.last_weights().map(effective_sample_size)
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    pub fn is_initialized(&self) -> bool {
        !self.particles.is_empty()
    }

    pub fn landmarks(&self) -> &[Point2<f64>] {
        &self.landmarks
    }

    pub fn map_size(&self) -> f64 {
        self.map_size
    }

    pub fn sigma_default(&self) -> f64 {
        self.sigma_default
    }

    pub fn resampling_strategy(&self) -> ParticleResamplingStrategy {
        self.resampling_strategy
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(LocalizationError::Uninitialized)
        }
    }
}

fn jitter<R: Rng + ?Sized>(distribution: Option<&Normal<f64>>, rng: &mut R) -> f64 {
    match distribution {
        Some(normal) if normal.std_dev() > 0.0 => normal.sample(rng),
        _ => 0.0,
    }
}

fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_of_squares: f64 = weights.iter().map(|w| w * w).sum();
    if sum_of_squares > 0.0 {
        1.0 / sum_of_squares
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const ALL_STRATEGIES: [ParticleResamplingStrategy; 4] = [
        ParticleResamplingStrategy::Multinomial,
        ParticleResamplingStrategy::Systematic,
        ParticleResamplingStrategy::Stratified,
        ParticleResamplingStrategy::Residual,
    ];

    fn landmarks() -> Vec<Point2<f64>> {
        vec![Point2::new(2.0, 3.0), Point2::new(5.0, 7.0)]
    }

    fn filter(num_particles: usize) -> ParticleFilter {
        ParticleFilter::new(num_particles, 10.0, 1.0, landmarks()).unwrap()
    }

    #[test]
    fn construction_validates() {
        assert!(matches!(
            ParticleFilter::new(0, 10.0, 1.0, landmarks()),
            Err(LocalizationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ParticleFilter::new(10, -1.0, 1.0, landmarks()),
            Err(LocalizationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ParticleFilter::new(10, 10.0, 0.0, landmarks()),
            Err(LocalizationError::InvalidConfiguration(_))
        ));
        let pf = filter(10);
        assert!(!pf.is_initialized());
        assert!(pf.particles().is_empty());
    }

    #[test]
    fn uniform_initialization_bounds() {
        for n in [1, 2, 17, 1000] {
            let mut pf = filter(n);
            pf.initialize(None).unwrap();
            assert_eq!(pf.particles().len(), n);
            for p in pf.particles() {
                assert!((0.0..10.0).contains(&p.pose.x));
                assert!((0.0..10.0).contains(&p.pose.y));
                assert!((0.0..2.0 * PI).contains(&p.pose.theta));
                assert_eq!(p.weight, None);
            }
        }
    }

    #[test]
    fn initialize_replaces_population() {
        let mut pf = filter(50);
        pf.initialize(None).unwrap();
        let first = pf.poses();
        pf.initialize(None).unwrap();
        assert_eq!(pf.particles().len(), 50);
        assert_ne!(first, pf.poses());
    }

    #[test]
    fn hint_with_zero_spread_is_exact() {
        let config = MclConfig {
            num_particles: 20,
            initial_position_std: 0.0,
            initial_heading_std: 0.0,
            ..MclConfig::default()
        };
        let mut pf = ParticleFilter::from_config(&config, landmarks()).unwrap();
        let hint = Pose::new(3.0, 4.0, 0.25);
        pf.initialize(Some(hint)).unwrap();
        assert!(pf.poses().iter().all(|p| *p == hint));
    }

    #[test]
    fn hint_concentrates_population() {
        let mut pf = filter(500);
        pf.initialize(Some(Pose::new(3.0, 4.0, 1.0))).unwrap();
        let mean = PoseEstimator::UnweightedAverage
            .estimate(&pf.poses(), None)
            .unwrap();
        assert_approx_eq!(mean.x, 3.0, 0.2);
        assert_approx_eq!(mean.y, 4.0, 0.2);
        assert_approx_eq!(mean.theta, 1.0, 0.05);
    }

    #[test]
    fn predict_shifts_every_particle_exactly() {
        let mut pf = filter(100);
        pf.initialize(None).unwrap();
        let before = pf.poses();
        pf.predict(1.0, 0.5, PI / 4.0).unwrap();
        for (old, new) in before.iter().zip(pf.poses().iter()) {
            assert_eq!(new.x, old.x + 1.0);
            assert_eq!(new.y, old.y + 0.5);
            assert_eq!(new.theta, old.theta + PI / 4.0);
        }
    }

    #[test]
    fn predict_with_noise_diversifies() {
        let mut pf = filter(100);
        pf.set_motion_noise(Some(MotionNoise::new(0.1, 0.1, 0.01)))
            .unwrap();
        pf.initialize(Some(Pose::default())).unwrap();
        let before = pf.poses();
        pf.predict(1.0, 0.0, 0.0).unwrap();
        let deltas: Vec<f64> = before
            .iter()
            .zip(pf.poses().iter())
            .map(|(old, new)| new.x - old.x)
            .collect();
        assert!(deltas.iter().any(|d| (d - deltas[0]).abs() > 1e-9));
        let mean_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;
        assert_approx_eq!(mean_delta, 1.0, 0.05);
    }

    #[test]
    fn invalid_motion_noise_is_rejected() {
        let mut pf = filter(10);
        assert!(pf.set_motion_noise(Some(MotionNoise::new(-1.0, 0.0, 0.0))).is_err());
    }

    #[test]
    fn cycle_before_initialize_fails() {
        let mut pf = filter(10);
        assert_eq!(pf.predict(1.0, 0.0, 0.0), Err(LocalizationError::Uninitialized));
        assert_eq!(
            pf.correct(&landmarks(), 1.0),
            Err(LocalizationError::Uninitialized)
        );
    }

    #[test]
    fn non_finite_hint_and_control_are_rejected() {
        let mut pf = filter(10);
        for hint in [
            Pose::new(f64::NAN, 0.0, 0.0),
            Pose::new(0.0, f64::INFINITY, 0.0),
            Pose::new(0.0, 0.0, f64::NEG_INFINITY),
        ] {
            assert!(matches!(
                pf.initialize(Some(hint)),
                Err(LocalizationError::InvalidConfiguration(_))
            ));
        }
        assert!(!pf.is_initialized());

        pf.initialize(None).unwrap();
        let before = pf.poses();
        for (dx, dy, dtheta) in [
            (f64::NAN, 0.0, 0.0),
            (0.0, f64::INFINITY, 0.0),
            (0.0, 0.0, f64::NAN),
        ] {
            assert!(matches!(
                pf.predict(dx, dy, dtheta),
                Err(LocalizationError::InvalidConfiguration(_))
            ));
        }
        assert_eq!(pf.poses(), before);
    }

    #[test]
    fn weights_are_normalized() {
        let mut pf = filter(300);
        pf.initialize(None).unwrap();
        let truth = Pose::new(4.0, 4.0, 0.3);
        let measurements = observe_landmarks(&truth, &landmarks());
        for sigma in [0.5, 1.0, 5.0] {
            let weights = pf.correct(&measurements, sigma).unwrap();
            assert_eq!(weights.len(), 300);
            assert!(weights.iter().all(|w| *w >= 0.0));
            assert_approx_eq!(weights.iter().sum::<f64>(), 1.0, 1e-9);
            assert_eq!(pf.last_weights(), Some(weights.as_slice()));
            assert!(pf.particles().iter().all(|p| p.weight.is_none()));
            let weighted = pf.weighted_particles().unwrap();
            assert_eq!(weighted.len(), 300);
            assert_eq!(weighted[7].weight, Some(weights[7]));
        }
    }

    #[test]
    fn resampling_only_copies_existing_poses() {
        for strategy in ALL_STRATEGIES {
            let mut pf = filter(200);
            pf.set_resampling_strategy(strategy);
            pf.initialize(None).unwrap();
            let before = pf.poses();
            let measurements = observe_landmarks(&Pose::new(5.0, 5.0, 0.0), &landmarks());
            pf.correct(&measurements, 2.0).unwrap();
            assert_eq!(pf.particles().len(), 200);
            for pose in pf.poses() {
                assert!(
                    before.iter().any(|b| b.x.to_bits() == pose.x.to_bits()
                        && b.y.to_bits() == pose.y.to_bits()
                        && b.theta.to_bits() == pose.theta.to_bits()),
                    "{strategy} invented a pose"
                );
            }
        }
    }

    #[test]
    fn arity_mismatch() {
        let mut pf = filter(10);
        pf.initialize(None).unwrap();
        let result = pf.correct(&[Point2::new(0.0, 0.0)], 1.0);
        assert_eq!(
            result,
            Err(LocalizationError::MeasurementArityMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn invalid_sigma_in_correct() {
        let mut pf = filter(10);
        pf.initialize(None).unwrap();
        for sigma in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                pf.correct(&landmarks(), sigma),
                Err(LocalizationError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn degenerate_weights_leave_population_untouched() {
        let mut pf = filter(50);
        pf.initialize(None).unwrap();
        let before = pf.poses();
        let far_away = vec![Point2::new(1e6, 1e6), Point2::new(-1e6, 1e6)];
        let result = pf.correct(&far_away, 1e-3);
        assert!(matches!(
            result,
            Err(LocalizationError::DegenerateWeights { sum }) if sum == 0.0
        ));
        assert_eq!(pf.poses(), before);
        assert_eq!(pf.last_weights(), None);
    }

    #[test]
    fn non_finite_measurements_are_degenerate() {
        let mut pf = filter(10);
        pf.initialize(None).unwrap();
        let result = pf.correct(&[Point2::new(f64::NAN, 0.0), Point2::new(0.0, 0.0)], 1.0);
        assert!(matches!(result, Err(LocalizationError::DegenerateWeights { .. })));
    }

    #[test]
    fn seeded_filters_are_reproducible() {
        let run = || {
            let mut pf = filter(64);
            pf.initialize(None).unwrap();
            pf.predict(0.5, 0.5, 0.1).unwrap();
            let measurements = observe_landmarks(&Pose::new(5.0, 5.0, 0.1), &landmarks());
            pf.correct(&measurements, 1.0).unwrap();
            pf.poses()
        };
        assert_eq!(run(), run());
        let mut a = filter(64).with_rng(StdRng::seed_from_u64(1));
        let mut b = filter(64).with_rng(StdRng::seed_from_u64(2));
        a.initialize(None).unwrap();
        b.initialize(None).unwrap();
        assert_ne!(a.poses(), b.poses());
    }

    #[test]
    fn effective_sample_size_bounds() {
        let mut pf = filter(100);
        assert_eq!(pf.effective_sample_size(), None);
        pf.initialize(None).unwrap();
        let measurements = observe_landmarks(&Pose::new(5.0, 5.0, 0.0), &landmarks());
        pf.correct(&measurements, 100.0).unwrap();
        let ess = pf.effective_sample_size().unwrap();
        assert!(ess > 1.0 && ess <= 100.0 + 1e-9);
    }

    #[test]
    fn strategies_skip_zero_weights() {
        let weights = [0.0, 0.5, 0.0, 0.5, 0.0];
        let mut rng = StdRng::seed_from_u64(3);
        for strategy in ALL_STRATEGIES {
            for _ in 0..50 {
                let indices = strategy.resample_indices(&weights, &mut rng);
                assert_eq!(indices.len(), weights.len());
                assert!(indices.iter().all(|&i| i == 1 || i == 3), "{strategy}: {indices:?}");
            }
        }
    }

    #[test]
    fn strategies_follow_weights() {
        let weights = [0.1, 0.6, 0.3];
        let mut rng = StdRng::seed_from_u64(11);
        for strategy in ALL_STRATEGIES {
            let mut counts = [0usize; 3];
            for _ in 0..5000 {
                for i in strategy.resample_indices(&weights, &mut rng) {
                    counts[i] += 1;
                }
            }
            let total = counts.iter().sum::<usize>() as f64;
            for (count, w) in counts.iter().zip(weights.iter()) {
                assert_approx_eq!(*count as f64 / total, *w, 0.02);
            }
        }
    }

    #[test]
    fn residual_keeps_deterministic_copies() {
        let weights = [0.5, 0.25, 0.25, 0.0];
        let mut rng = StdRng::seed_from_u64(5);
        let mut indices = ParticleResamplingStrategy::Residual.resample_indices(&weights, &mut rng);
        indices.sort();
        assert_eq!(indices, vec![0, 0, 1, 2]);
    }

    #[test]
    fn single_particle() {
        let mut pf = filter(1);
        pf.initialize(Some(Pose::new(5.0, 5.0, 0.0))).unwrap();
        let measurements = observe_landmarks(&Pose::new(5.0, 5.0, 0.0), &landmarks());
        let weights = pf.correct(&measurements, 1.0).unwrap();
        assert_eq!(weights, vec![1.0]);
        assert_eq!(pf.particles().len(), 1);
    }

    #[test]
    fn names_round_trip() {
        for strategy in ALL_STRATEGIES {
            assert_eq!(strategy.to_string().parse::<ParticleResamplingStrategy>(), Ok(strategy));
        }
        assert!("bogus".parse::<ParticleResamplingStrategy>().is_err());
        for estimator in [
            PoseEstimator::WeightedAverage,
            PoseEstimator::UnweightedAverage,
            PoseEstimator::HighestWeight,
        ] {
            assert_eq!(estimator.to_string().parse::<PoseEstimator>(), Ok(estimator));
        }
        assert_eq!("best".parse::<PoseEstimator>(), Ok(PoseEstimator::HighestWeight));
    }

    #[test]
    fn estimators() {
        let poses = [Pose::new(0.0, 0.0, 0.1), Pose::new(2.0, 4.0, -0.1)];
        let weighted = PoseEstimator::WeightedAverage
            .estimate(&poses, Some(&[0.25, 0.75]))
            .unwrap();
        assert_approx_eq!(weighted.x, 1.5, 1e-12);
        assert_approx_eq!(weighted.y, 3.0, 1e-12);
        let unweighted = PoseEstimator::UnweightedAverage
            .estimate(&poses, Some(&[0.25, 0.75]))
            .unwrap();
        assert_approx_eq!(unweighted.x, 1.0, 1e-12);
        assert_approx_eq!(unweighted.theta, 0.0, 1e-12);
        let best = PoseEstimator::HighestWeight
            .estimate(&poses, Some(&[0.25, 0.75]))
            .unwrap();
        assert_eq!(best, poses[1]);
        assert_eq!(PoseEstimator::WeightedAverage.estimate(&[], None), None);
        assert_eq!(PoseEstimator::WeightedAverage.estimate(&poses, Some(&[1.0])), None);
    }

    #[test]
    fn circular_heading_mean() {
        let poses = [Pose::new(0.0, 0.0, PI - 0.1), Pose::new(0.0, 0.0, -PI + 0.1)];
        let mean = PoseEstimator::UnweightedAverage.estimate(&poses, None).unwrap();
        assert_approx_eq!(mean.theta.abs(), PI, 1e-9);
    }
}
