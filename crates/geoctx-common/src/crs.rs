//! Coordinate reference system handles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Region;

/// Broad classification of a CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsKind {
    /// Latitude/longitude on a datum.
    Geographic,
    /// Planar, in metres.
    Projected,
}

/// Horizontal unit of a CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsUnit {
    Degree,
    Metre,
}

/// Axis order for coordinate interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    /// Easting/longitude first.
    EastNorth,
    /// Latitude first (the registered order of many geographic CRSs).
    NorthEast,
}

/// An opaque, read-only handle to a coordinate reference system.
///
/// Produced by the authority database; the engine only reads it. The
/// pair `authority:code` identifies the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsHandle {
    pub authority: String,
    pub code: String,
    pub name: String,
    pub kind: CrsKind,
    pub axis_order: AxisOrder,
    pub unit: CrsUnit,
    pub datum: String,
    /// Domain of validity. `Region::GLOBAL` when the record carries no
    /// explicit extent.
    pub domain: Region,
}

impl CrsHandle {
    /// The `AUTH:CODE` identifier string.
    pub fn id(&self) -> String {
        format!("{}:{}", self.authority, self.code)
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }
}

impl fmt::Display for CrsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

/// Split an `AUTH:CODE` identifier into its parts.
pub fn split_crs_id(id: &str) -> Option<(&str, &str)> {
    let (auth, code) = id.split_once(':')?;
    if auth.is_empty() || code.is_empty() {
        return None;
    }
    Some((auth, code))
}
