//! Planar geometry helpers shared by the sensing model and the filter.
//!
//! Points are `nalgebra::Point2<f64>`. Headings are plain `f64` radians and are never wrapped
//! implicitly; [`wrap_to_pi`] and [`wrap_to_two_pi`] are offered to consumers who need a
//! canonical range.
use nalgebra::Point2;
use std::f64::consts::PI;

/// Rotate a point counter-clockwise by `angle` radians about `origin`.
///
/// Uses the standard rotation matrix written out term by term:
///
/// $$
/// q_x = o_x + \cos(a)(x - o_x) - \sin(a)(y - o_y)
/// $$
/// $$
/// q_y = o_y + \sin(a)(x - o_x) + \cos(a)(y - o_y)
/// $$
///
/// # Example
/// ```rust
/// use mcl::geometry::rotate_point;
/// use nalgebra::Point2;
/// use std::f64::consts::FRAC_PI_2;
///
/// let q = rotate_point(&Point2::new(1.0, 0.0), &Point2::origin(), FRAC_PI_2);
/// assert!((q.x - 0.0).abs() < 1e-12);
/// assert!((q.y - 1.0).abs() < 1e-12);
/// ```
pub fn rotate_point(point: &Point2<f64>, origin: &Point2<f64>, angle: f64) -> Point2<f64> {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - origin.x;
    let dy = point.y - origin.y;
    Point2::new(
        origin.x + cos * dx - sin * dy,
        origin.y + sin * dx + cos * dy,
    )
}

/// Euclidean distance between two points.
pub fn distance(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    ((p2.x - p1.x).powi(2) + (p2.y - p1.y).powi(2)).sqrt()
}

/// Wrap an angle to the half-open range $(-\pi, \pi]$ radians
///
/// Computed in closed form, so arbitrarily large finite headings wrap in constant time. Non-finite
/// input yields NaN.
///
/// # Example
/// ```rust
/// use mcl::geometry::wrap_to_pi;
/// use std::f64::consts::PI;
/// assert!((wrap_to_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
/// assert_eq!(wrap_to_pi(-PI), PI);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { PI } else { wrapped }
}

/// Wrap an angle to the half-open range $[0, 2\pi)$ radians
pub fn wrap_to_two_pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= 2.0 * PI { 0.0 } else { wrapped }
}
