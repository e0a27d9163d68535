//! Timestamped pointer samples

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single pointer sample on the canvas
///
/// Points are plain values: once sampled they are copied, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Sample time in Unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl Point {
    /// Create a point with an explicit timestamp
    pub fn new(x: f64, y: f64, timestamp: i64) -> Self {
        Self { x, y, timestamp }
    }

    /// Create a point stamped with the current wall-clock time
    pub fn now(x: f64, y: f64) -> Self {
        Self::new(x, y, Utc::now().timestamp_millis())
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Whether both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0, 0);
        let b = Point::new(3.0, 4.0, 10);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_finite() {
        assert!(Point::new(1.0, 2.0, 0).is_finite());
        assert!(!Point::new(f64::NAN, 2.0, 0).is_finite());
        assert!(!Point::new(1.0, f64::INFINITY, 0).is_finite());
    }

    #[test]
    fn test_missing_timestamp_defaults_to_zero() {
        let point: Point = serde_json::from_str(r#"{"x":1.5,"y":2.5}"#).unwrap();
        assert_eq!(point, Point::new(1.5, 2.5, 0));
    }
}
