//! Pipeline lifecycle: bind, prepare, apply.
//!
//! A candidate operation becomes a `BoundPipeline` once its step chain
//! validates, a `ReadyPipeline` once every grid-dependent step has a
//! resolved grid, and only then may coordinates flow through it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use geoctx_common::error::{PipelineError, PipelineResult};
use geoctx_common::{CandidateOperation, Coordinate, Direction};
use geoctx_grids::{GridIntegrity, GridResolver, GridSources, ShiftGrid};

use crate::steps::apply_step;

/// A validated pipeline whose grids have not yet been resolved.
pub struct BoundPipeline {
    op: CandidateOperation,
}

impl BoundPipeline {
    /// Validate that consecutive steps chain: each step must consume
    /// the space the previous one produced.
    pub fn bind(op: CandidateOperation) -> PipelineResult<Self> {
        for pair in op.steps.windows(2) {
            let produced = pair[0].output_space();
            let consumed = pair[1].input_space();
            if produced != consumed {
                return Err(PipelineError::Incompatible(format!(
                    "{}: step produces {} but the next consumes {}",
                    op.code, produced, consumed
                )));
            }
        }

        debug!(operation = %op.code, steps = op.steps.len(), "pipeline bound");
        Ok(Self { op })
    }

    pub fn operation(&self) -> &CandidateOperation {
        &self.op
    }

    /// Resolve and load every grid the steps depend on.
    ///
    /// The first unresolvable grid fails the whole call; nothing is
    /// partially prepared (already-cached grids simply stay cached, so
    /// repeating the call after fixing the problem is cheap and a
    /// second successful call never re-fetches).
    pub async fn prepare(
        self,
        resolver: &GridResolver,
        sources: &GridSources,
    ) -> PipelineResult<ReadyPipeline> {
        self.prepare_with_integrity(resolver, sources, &HashMap::new(), None)
            .await
    }

    /// Like [`prepare`](Self::prepare), with per-grid integrity
    /// expectations and a fetch timeout. The context supplies integrity
    /// from the authority database's grid table.
    pub async fn prepare_with_integrity(
        self,
        resolver: &GridResolver,
        sources: &GridSources,
        integrity: &HashMap<String, GridIntegrity>,
        timeout: Option<Duration>,
    ) -> PipelineResult<ReadyPipeline> {
        let mut grids: HashMap<String, Arc<ShiftGrid>> = HashMap::new();

        for name in self.op.required_grids() {
            if grids.contains_key(name) {
                continue;
            }

            let grid = resolver
                .load(sources, name, integrity.get(name), timeout)
                .await
                .map_err(|e| {
                    warn!(operation = %self.op.code, grid = %name, error = %e, "pipeline prepare failed");
                    PipelineError::from(e)
                })?;

            grids.insert(name.to_string(), grid);
        }

        debug!(operation = %self.op.code, grids = grids.len(), "pipeline ready");
        Ok(ReadyPipeline { op: self.op, grids })
    }
}

/// A pipeline with all grids resolved, ready for coordinates.
#[derive(Debug)]
pub struct ReadyPipeline {
    op: CandidateOperation,
    grids: HashMap<String, Arc<ShiftGrid>>,
}

impl ReadyPipeline {
    pub fn operation(&self) -> &CandidateOperation {
        &self.op
    }

    /// Transform a batch of coordinates.
    ///
    /// Forward runs the steps left to right; inverse runs them right to
    /// left with each primitive inverted. A point that fails inside any
    /// step comes back as the undefined sentinel without disturbing the
    /// rest of the batch.
    pub fn apply(
        &self,
        coords: &[Coordinate],
        direction: Direction,
    ) -> PipelineResult<Vec<Coordinate>> {
        if direction == Direction::Inverse && !self.op.reversible {
            return Err(PipelineError::Incompatible(format!(
                "{} is not reversible",
                self.op.code
            )));
        }

        Ok(coords
            .iter()
            .map(|&coord| self.apply_point(coord, direction))
            .collect())
    }

    fn apply_point(&self, mut coord: Coordinate, direction: Direction) -> Coordinate {
        if !coord.is_defined() {
            return Coordinate::undefined();
        }

        match direction {
            Direction::Forward => {
                for step in &self.op.steps {
                    match apply_step(&step.def, step.inverse, coord, &self.grids) {
                        Some(next) => coord = next,
                        None => return Coordinate::undefined(),
                    }
                }
            }
            Direction::Inverse => {
                for step in self.op.steps.iter().rev() {
                    match apply_step(&step.def, !step.inverse, coord, &self.grids) {
                        Some(next) => coord = next,
                        None => return Coordinate::undefined(),
                    }
                }
            }
        }

        coord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoctx_common::{CoordSpace, PipelineStep, Region, StepDef};

    fn candidate(steps: Vec<PipelineStep>) -> CandidateOperation {
        CandidateOperation {
            code: "GEOCTX:TEST".to_string(),
            name: "test".to_string(),
            steps,
            accuracy_m: Some(1.0),
            area_of_use: Region::GLOBAL,
            reversible: true,
            grid_status: Vec::new(),
        }
    }

    #[test]
    fn test_bind_accepts_chained_steps() {
        let op = candidate(vec![
            PipelineStep::forward(StepDef::UnitConversion {
                factor: std::f64::consts::PI / 180.0,
                from: CoordSpace::GeographicDegrees,
                to: CoordSpace::GeographicRadians,
            }),
            PipelineStep::forward(StepDef::Mercator {
                lon0: 0.0,
                radius: 6_378_137.0,
            }),
        ]);

        assert!(BoundPipeline::bind(op).is_ok());
    }

    #[test]
    fn test_bind_rejects_space_mismatch() {
        // Degrees flowing straight into a radians-consuming projection.
        let op = candidate(vec![
            PipelineStep::forward(StepDef::GridShift {
                grid: "g".to_string(),
            }),
            PipelineStep::forward(StepDef::Mercator {
                lon0: 0.0,
                radius: 6_378_137.0,
            }),
        ]);

        assert!(matches!(
            BoundPipeline::bind(op),
            Err(PipelineError::Incompatible(_))
        ));
    }

    #[test]
    fn test_bind_respects_inverted_step_spaces() {
        // An inverted Mercator consumes metres and produces radians, so
        // it chains onto a radians conversion going the other way.
        let op = candidate(vec![
            PipelineStep::inverted(StepDef::Mercator {
                lon0: 0.0,
                radius: 6_378_137.0,
            }),
            PipelineStep::inverted(StepDef::UnitConversion {
                factor: std::f64::consts::PI / 180.0,
                from: CoordSpace::GeographicDegrees,
                to: CoordSpace::GeographicRadians,
            }),
        ]);

        assert!(BoundPipeline::bind(op).is_ok());
    }
}
