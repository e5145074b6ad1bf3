//! Landmark sensing model and measurement likelihood.
//!
//! The sensor reports every landmark in the agent's body frame: each landmark is rotated about
//! the agent's position by the negative of the agent's heading and then expressed as an offset
//! from the agent. Outputs keep the order of the landmark sequence, and the likelihood pairs
//! observed and predicted measurements by position. Nothing here matches measurements to
//! landmarks by identity.
use nalgebra::Point2;
use std::f64::consts::PI;

use crate::Pose;
use crate::geometry::{distance, rotate_point};

/// Express each landmark in the body frame of `pose`.
///
/// A landmark sitting exactly at the observer's position is observed at the origin, and the
/// observed distance to every landmark equals its map-frame distance from the observer.
///
/// # Arguments
/// * `pose` - Observer pose
/// * `landmarks` - Landmark positions in the map frame
///
/// # Returns
/// One point per landmark, in the same order as `landmarks`.
pub fn observe_landmarks(pose: &Pose, landmarks: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let origin = pose.position();
    landmarks
        .iter()
        .map(|landmark| {
            let rotated = rotate_point(landmark, &origin, -pose.theta);
            Point2::new(rotated.x - origin.x, rotated.y - origin.y)
        })
        .collect()
}

/// Zero-mean normal probability density evaluated at `error`.
///
/// $$
/// g(e, \sigma) = \frac{1}{\sigma \sqrt{2\pi}} \exp\left(-\frac{1}{2}\left(\frac{e}{\sigma}\right)^2\right)
/// $$
pub fn gaussian(error: f64, sigma: f64) -> f64 {
    let coefficient = 1.0 / (sigma * (2.0 * PI).sqrt());
    let exponent = -0.5 * (error / sigma).powi(2);
    coefficient * exponent.exp()
}

/// Unnormalized importance weight of a hypothesis.
///
/// Product over landmark index `i` of `gaussian(distance(observed[i], predicted[i]), sigma)`.
/// Callers are responsible for passing equal-length sequences; extra trailing entries of the
/// longer one are ignored.
pub fn measurement_likelihood(
    observed: &[Point2<f64>],
    predicted: &[Point2<f64>],
    sigma: f64,
) -> f64 {
    observed
        .iter()
        .zip(predicted.iter())
        .map(|(z, z_hat)| gaussian(distance(z, z_hat), sigma))
        .product()
}
