//! Area-of-use regions.

use serde::{Deserialize, Serialize};

/// A geographic area of use as an axis-aligned bounding box in degrees.
///
/// Used both for operation applicability (the authority database stores
/// one per operation) and for caller-supplied constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Region {
    /// Whole-world coverage.
    pub const GLOBAL: Region = Region {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    /// Create a region from corner coordinates.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check if this region fully contains another.
    pub fn contains(&self, other: &Region) -> bool {
        self.west <= other.west
            && self.east >= other.east
            && self.south <= other.south
            && self.north >= other.north
    }

    /// Check if this region intersects another.
    ///
    /// Boundaries are inclusive, matching `contains` and
    /// `contains_point`: regions touching along an edge intersect, and
    /// a degenerate point region (west == east, south == north) still
    /// intersects any region containing that point.
    pub fn intersects(&self, other: &Region) -> bool {
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// Compute the intersection of two regions.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }

        Some(Region {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
        })
    }

    /// Check if a point (longitude, latitude in degrees) lies within.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::GLOBAL
    }
}
