//! Coordinate tuples and the per-point failure sentinel.

use serde::{Deserialize, Serialize};

/// A coordinate tuple in whatever space the current pipeline step uses.
///
/// For geographic spaces `x` is longitude and `y` is latitude; for
/// projected spaces they are easting and northing in metres. `z` is an
/// ellipsoidal height in metres and passes through untouched by the 2D
/// step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    /// Create a 3D coordinate.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a 2D coordinate with zero height.
    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// The sentinel returned for points that failed during batch
    /// application (out-of-domain grid shift, non-finite math).
    pub fn undefined() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            z: f64::NAN,
        }
    }

    /// False for the undefined sentinel and for any non-finite result.
    pub fn is_defined(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_sentinel() {
        let c = Coordinate::undefined();
        assert!(!c.is_defined());
        assert!(c.x.is_nan());
    }

    #[test]
    fn test_defined() {
        assert!(Coordinate::xy(-97.5, 38.5).is_defined());
        assert!(!Coordinate::new(0.0, f64::INFINITY, 0.0).is_defined());
    }
}
