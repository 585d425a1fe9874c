//! Candidate coordinate operations and their step definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Region;

/// The coordinate space a step consumes or produces.
///
/// Consecutive steps of a pipeline must agree on this boundary; `bind`
/// rejects pipelines where they do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSpace {
    GeographicDegrees,
    GeographicRadians,
    ProjectedMetres,
}

impl fmt::Display for CoordSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordSpace::GeographicDegrees => "geographic_degrees",
            CoordSpace::GeographicRadians => "geographic_radians",
            CoordSpace::ProjectedMetres => "projected_metres",
        };
        write!(f, "{}", s)
    }
}

/// Application direction for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// One transform primitive, as stored in the authority database
/// (JSON array in the `steps` column of `coordinate_operation`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDef {
    /// Planar affine transform `x' = a*x + b*y + tx`,
    /// `y' = c*x + d*y + ty`. Metres in, metres out.
    Affine {
        a: f64,
        b: f64,
        tx: f64,
        c: f64,
        d: f64,
        ty: f64,
    },

    /// Datum shift through a named correction grid holding arc-second
    /// longitude/latitude offsets. Degrees in, degrees out.
    GridShift { grid: String },

    /// Scale both horizontal components by `factor`, moving between the
    /// named spaces (e.g. degrees to radians).
    UnitConversion {
        factor: f64,
        from: CoordSpace,
        to: CoordSpace,
    },

    /// Spherical Mercator projection. Radians in, metres out.
    Mercator { lon0: f64, radius: f64 },

    /// Spherical Lambert Conformal Conic, tangent or secant cone.
    /// Radians in, metres out.
    LambertConformal {
        lon0: f64,
        lat0: f64,
        latin1: f64,
        latin2: f64,
        radius: f64,
    },
}

impl StepDef {
    /// Space consumed when the step is applied forward.
    pub fn input_space(&self) -> CoordSpace {
        match self {
            StepDef::Affine { .. } => CoordSpace::ProjectedMetres,
            StepDef::GridShift { .. } => CoordSpace::GeographicDegrees,
            StepDef::UnitConversion { from, .. } => *from,
            StepDef::Mercator { .. } | StepDef::LambertConformal { .. } => {
                CoordSpace::GeographicRadians
            }
        }
    }

    /// Space produced when the step is applied forward.
    pub fn output_space(&self) -> CoordSpace {
        match self {
            StepDef::Affine { .. } => CoordSpace::ProjectedMetres,
            StepDef::GridShift { .. } => CoordSpace::GeographicDegrees,
            StepDef::UnitConversion { to, .. } => *to,
            StepDef::Mercator { .. } | StepDef::LambertConformal { .. } => {
                CoordSpace::ProjectedMetres
            }
        }
    }

    /// Whether the step has a usable inverse.
    pub fn is_reversible(&self) -> bool {
        match self {
            StepDef::Affine { a, b, c, d, .. } => (a * d - b * c).abs() >= 1e-12,
            StepDef::UnitConversion { factor, .. } => factor.abs() >= 1e-300,
            // Grid shifts invert by fixed-point iteration; projections
            // have closed-form inverses.
            StepDef::GridShift { .. }
            | StepDef::Mercator { .. }
            | StepDef::LambertConformal { .. } => true,
        }
    }

    /// Grid name for grid-dependent steps.
    pub fn grid_name(&self) -> Option<&str> {
        match self {
            StepDef::GridShift { grid } => Some(grid.as_str()),
            _ => None,
        }
    }
}

/// A step definition plus the sense in which the pipeline uses it.
///
/// Reversed operations (and the reversed leg of a hub composition) use
/// the same stored primitives with `inverse` set; a pipeline applied
/// `Direction::Inverse` flips this once more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    #[serde(flatten)]
    pub def: StepDef,
    #[serde(default)]
    pub inverse: bool,
}

impl PipelineStep {
    pub fn forward(def: StepDef) -> Self {
        Self {
            def,
            inverse: false,
        }
    }

    pub fn inverted(def: StepDef) -> Self {
        Self { def, inverse: true }
    }

    /// Space consumed when the pipeline runs forward.
    pub fn input_space(&self) -> CoordSpace {
        if self.inverse {
            self.def.output_space()
        } else {
            self.def.input_space()
        }
    }

    /// Space produced when the pipeline runs forward.
    pub fn output_space(&self) -> CoordSpace {
        if self.inverse {
            self.def.input_space()
        } else {
            self.def.output_space()
        }
    }

    pub fn is_reversible(&self) -> bool {
        self.def.is_reversible()
    }

    pub fn grid_name(&self) -> Option<&str> {
        self.def.grid_name()
    }
}

/// Local availability of a grid a candidate depends on, annotated by
/// the operation factory without forcing a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridStatus {
    pub grid: String,
    /// True when the grid is already present on a local search path (or
    /// cached from an earlier fetch).
    pub locally_available: bool,
}

/// A transformation candidate between two CRSs.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOperation {
    /// `AUTH:CODE` of the operation record; composed operations join
    /// the leg codes with `+`.
    pub code: String,
    pub name: String,
    /// Steps composing left-to-right for forward application.
    pub steps: Vec<PipelineStep>,
    /// Positional accuracy in metres; `None` means unknown.
    pub accuracy_m: Option<f64>,
    /// Area of use. `Region::GLOBAL` when unbounded.
    pub area_of_use: Region,
    /// Whether the whole operation may be applied inverse.
    pub reversible: bool,
    /// Availability of every grid the steps depend on; filled in by the
    /// operation factory, empty until then.
    pub grid_status: Vec<GridStatus>,
}

impl CandidateOperation {
    /// Names of all grids the steps depend on, in step order.
    pub fn required_grids(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(PipelineStep::grid_name)
            .collect()
    }

    /// True when every required grid is locally available (trivially
    /// true for grid-free pipelines).
    pub fn grids_locally_available(&self) -> bool {
        self.grid_status.iter().all(|g| g.locally_available)
    }
}
