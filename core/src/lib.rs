//! Monte Carlo localization toolbox for a planar mobile agent
//!
//! This crate provides the pieces needed to estimate the unknown pose (position and heading) of a
//! mobile agent moving in the plane from noisy relative observations of landmarks whose positions
//! are known. The estimate is held as a population of weighted pose hypotheses (particles) that is
//! repeatedly predicted with the agent's motion, corrected against the observations and resampled.
//! The crate does not build maps; landmark positions are ground truth shared by the caller and the
//! filter.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the point and grid types.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr):
//!   Provides random number generation for particle initialization, motion jitter and resampling.
//! - [`serde`](https://crates.io/crates/serde): Provides configuration and result (de)serialization.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [geometry]: Point rotation, Euclidean distance and heading wrap helpers.
//! - [map]: A bounded landmark registry over integer grid coordinates.
//! - [measurements]: The landmark sensing model and the Gaussian measurement likelihood.
//! - [particle]: The particle filter itself, resampling strategies and pose estimators.
//! - [config]: File backed filter configuration.
//! - [sim]: A simulation driver producing ground truth and synthetic measurements.
//! - [error]: The error type shared by all of the above.
//!
//! ## Pose convention
//!
//! A pose is the triple $(x, y, \theta)$ with $\theta$ the heading in radians measured
//! counter-clockwise from the $x$ axis. Headings accumulate freely and are never wrapped to a
//! canonical range by the crate; see [`geometry::wrap_to_pi`] if a consumer needs one.
//!
//! ## Measurement ordering
//!
//! Landmarks are an ordered sequence. A measurement vector passed to the filter pairs with the
//! landmark sequence by position, so the order used to produce real measurements must be the
//! order the filter was constructed with.
pub mod config;
pub mod error;
pub mod geometry;
pub mod map;
pub mod measurements;
pub mod particle;
pub mod sim;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use error::{LocalizationError, Result};

/// Planar pose of the agent (or of a hypothesis about it).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position along the map x axis
    pub x: f64,
    /// Position along the map y axis
    pub y: f64,
    /// Heading in radians, unwrapped
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Pose {
        Pose { x, y, theta }
    }

    /// Position component as a point.
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Additive motion model: $(x + dx, y + dy, \theta + d\theta)$. No noise is injected.
    pub fn translate(&mut self, dx: f64, dy: f64, dtheta: f64) {
        self.x += dx;
        self.y += dy;
        self.theta += dtheta;
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4} rad)", self.x, self.y, self.theta)
    }
}

impl From<(f64, f64, f64)> for Pose {
    fn from(tuple: (f64, f64, f64)) -> Self {
        let (x, y, theta) = tuple;
        Pose { x, y, theta }
    }
}
