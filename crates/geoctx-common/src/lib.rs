//! Shared types for the geoctx transformation engine.
//!
//! This crate holds the vocabulary the other geoctx crates speak:
//! coordinates, areas of use, CRS handles, candidate operations and the
//! error taxonomy. It has no I/O of its own.

pub mod coord;
pub mod crs;
pub mod error;
pub mod operation;
pub mod region;

pub use coord::Coordinate;
pub use crs::{AxisOrder, CrsHandle, CrsKind, CrsUnit};
pub use error::{ConfigError, GridError, LookupError, PipelineError};
pub use operation::{
    CandidateOperation, CoordSpace, Direction, GridStatus, PipelineStep, StepDef,
};
pub use region::Region;
