//! Bounded landmark registry over integer grid coordinates.
//!
//! The map is a passive registry: additions and queries outside `[0, size)` are silently
//! ignored (additions) or answered with `false` (queries). Cells can only be marked, never
//! cleared.
use nalgebra::{DMatrix, Point2};

use crate::error::{LocalizationError, Result};

/// Square occupancy grid where each cell is either a landmark or empty.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkMap {
    size: usize,
    grid: DMatrix<bool>,
}

impl LandmarkMap {
    /// Create an empty `size` x `size` map.
    ///
    /// # Errors
    /// `InvalidConfiguration` when `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(LocalizationError::InvalidConfiguration(
                "map size must be positive".to_string(),
            ));
        }
        Ok(LandmarkMap {
            size,
            grid: DMatrix::from_element(size, size, false),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `(x, y)` lies inside the grid.
    pub fn is_valid_position(&self, x: i64, y: i64) -> bool {
        let size = self.size as i64;
        (0..size).contains(&x) && (0..size).contains(&y)
    }

    /// Mark `(x, y)` as a landmark. Out-of-range coordinates are ignored.
    pub fn add_landmark(&mut self, x: i64, y: i64) {
        if self.is_valid_position(x, y) {
            self.grid[(x as usize, y as usize)] = true;
        }
    }

    /// `true` iff `(x, y)` is in range and marked.
    pub fn is_landmark(&self, x: i64, y: i64) -> bool {
        self.is_valid_position(x, y) && self.grid[(x as usize, y as usize)]
    }

    pub fn landmark_count(&self) -> usize {
        self.grid.iter().filter(|&&cell| cell).count()
    }

    /// Marked cells as points, ordered by `x` then `y`.
    ///
    /// The order is stable for a given map, so the returned sequence can serve directly as the
    /// landmark sequence shared by the sensing model and the filter.
    pub fn landmarks(&self) -> Vec<Point2<f64>> {
        let mut points = Vec::with_capacity(self.landmark_count());
        for x in 0..self.size {
            for y in 0..self.size {
                if self.grid[(x, y)] {
                    points.push(Point2::new(x as f64, y as f64));
                }
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query() {
        let mut map = LandmarkMap::new(10).unwrap();
        map.add_landmark(2, 3);
        map.add_landmark(5, 7);
        assert!(map.is_landmark(2, 3));
        assert!(map.is_landmark(5, 7));
        assert!(!map.is_landmark(5, 5));
        assert!(!map.is_landmark(3, 2));
        assert_eq!(map.landmark_count(), 2);
    }

    #[test]
    fn out_of_range_is_permissive() {
        let mut map = LandmarkMap::new(4).unwrap();
        map.add_landmark(-1, 0);
        map.add_landmark(4, 0);
        map.add_landmark(0, 4);
        map.add_landmark(i64::MAX, i64::MIN);
        assert_eq!(map.landmark_count(), 0);
        assert!(!map.is_landmark(-1, 0));
        assert!(!map.is_landmark(100, 100));
    }

    #[test]
    fn boundary_cells() {
        let mut map = LandmarkMap::new(3).unwrap();
        map.add_landmark(0, 0);
        map.add_landmark(2, 2);
        assert!(map.is_landmark(0, 0));
        assert!(map.is_landmark(2, 2));
        assert!(!map.is_valid_position(3, 0));
    }

    #[test]
    fn repeated_addition_is_idempotent() {
        let mut map = LandmarkMap::new(5).unwrap();
        map.add_landmark(1, 1);
        map.add_landmark(1, 1);
        assert_eq!(map.landmark_count(), 1);
    }

    #[test]
    fn landmark_order_is_x_major() {
        let mut map = LandmarkMap::new(10).unwrap();
        map.add_landmark(5, 7);
        map.add_landmark(2, 3);
        map.add_landmark(2, 1);
        assert_eq!(
            map.landmarks(),
            vec![
                Point2::new(2.0, 1.0),
                Point2::new(2.0, 3.0),
                Point2::new(5.0, 7.0)
            ]
        );
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            LandmarkMap::new(0),
            Err(LocalizationError::InvalidConfiguration(_))
        ));
    }
}
