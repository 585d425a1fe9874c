//! Candidate operation resolution and ranking.

use std::cmp::Ordering;

use tracing::debug;

use geoctx_authority::AuthorityDatabase;
use geoctx_common::error::LookupResult;
use geoctx_common::{CandidateOperation, CrsHandle, GridStatus, Region};
use geoctx_grids::{GridResolver, GridSources};

/// Caller constraints on operation resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveConstraint {
    /// Keep only operations usable over this area; also drives the
    /// containment tier of the ranking.
    pub area_of_use: Option<Region>,
    /// Drop candidates whose accuracy is worse than this, or unknown.
    pub min_accuracy: Option<f64>,
}

/// Resolves source/target CRS pairs into ranked candidate pipelines.
pub struct OperationFactory<'a> {
    db: &'a AuthorityDatabase,
    resolver: &'a GridResolver,
    sources: GridSources,
}

impl<'a> OperationFactory<'a> {
    pub fn new(db: &'a AuthorityDatabase, resolver: &'a GridResolver, sources: GridSources) -> Self {
        Self {
            db,
            resolver,
            sources,
        }
    }

    /// All usable operations from `source` to `target`, best first.
    ///
    /// An empty result means no transformation path is registered; that
    /// is an answer, not an error. Grid-dependent candidates carry
    /// availability annotations so callers can prefer an operation whose
    /// grids are already on disk; the check never triggers a fetch.
    pub async fn resolve(
        &self,
        source: &CrsHandle,
        target: &CrsHandle,
        constraint: &ResolveConstraint,
    ) -> LookupResult<Vec<CandidateOperation>> {
        let mut candidates = self
            .db
            .find_operations(source, target, constraint.area_of_use.as_ref())
            .await?;

        if let Some(min) = constraint.min_accuracy {
            candidates.retain(|c| matches!(c.accuracy_m, Some(a) if a <= min));
        }

        for candidate in &mut candidates {
            candidate.grid_status = self.annotate_grids(candidate).await;
        }

        rank_candidates(&mut candidates, constraint.area_of_use.as_ref());

        debug!(
            source = %source.id(),
            target = %target.id(),
            count = candidates.len(),
            "resolved candidate operations"
        );

        Ok(candidates)
    }

    async fn annotate_grids(&self, candidate: &CandidateOperation) -> Vec<GridStatus> {
        let mut status = Vec::new();
        for grid in candidate.required_grids() {
            let available = self.resolver.is_locally_available(&self.sources, grid).await;
            status.push(GridStatus {
                grid: grid.to_string(),
                locally_available: available,
            });
        }
        status
    }
}

/// Order candidates best-first, stably:
/// full containment of the requested area beats mere intersection,
/// then smaller accuracy wins with unknown accuracy last, then fewer
/// steps. Equal candidates keep their lookup order.
pub fn rank_candidates(candidates: &mut [CandidateOperation], area: Option<&Region>) {
    candidates.sort_by(|a, b| {
        containment_tier(a, area)
            .cmp(&containment_tier(b, area))
            .then_with(|| accuracy_order(a.accuracy_m, b.accuracy_m))
            .then_with(|| a.steps.len().cmp(&b.steps.len()))
    });
}

fn containment_tier(candidate: &CandidateOperation, area: Option<&Region>) -> u8 {
    match area {
        Some(area) if candidate.area_of_use.contains(area) => 0,
        Some(_) => 1,
        None => 0,
    }
}

fn accuracy_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoctx_common::{PipelineStep, StepDef};

    fn candidate(code: &str, accuracy: Option<f64>, area: Region, steps: usize) -> CandidateOperation {
        let step = PipelineStep::forward(StepDef::UnitConversion {
            factor: 1.0,
            from: geoctx_common::CoordSpace::GeographicDegrees,
            to: geoctx_common::CoordSpace::GeographicDegrees,
        });

        CandidateOperation {
            code: code.to_string(),
            name: code.to_string(),
            steps: vec![step; steps],
            accuracy_m: accuracy,
            area_of_use: area,
            reversible: true,
            grid_status: Vec::new(),
        }
    }

    #[test]
    fn test_rank_by_accuracy_unknown_last() {
        let mut candidates = vec![
            candidate("five", Some(5.0), Region::GLOBAL, 1),
            candidate("unknown", None, Region::GLOBAL, 1),
            candidate("one", Some(1.0), Region::GLOBAL, 1),
        ];

        rank_candidates(&mut candidates, None);

        let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["one", "five", "unknown"]);
    }

    #[test]
    fn test_rank_containment_beats_accuracy() {
        let kansas = Region::new(-102.0, 37.0, -94.6, 40.0);
        let sliver = Region::new(-96.0, 39.0, -90.0, 45.0);

        let mut candidates = vec![
            candidate("partial_but_precise", Some(0.1), sliver, 1),
            candidate("containing", Some(5.0), Region::GLOBAL, 1),
        ];

        rank_candidates(&mut candidates, Some(&kansas));
        assert_eq!(candidates[0].code, "containing");
    }

    #[test]
    fn test_rank_fewer_steps_breaks_ties() {
        let mut candidates = vec![
            candidate("long", Some(1.0), Region::GLOBAL, 3),
            candidate("short", Some(1.0), Region::GLOBAL, 1),
        ];

        rank_candidates(&mut candidates, None);
        assert_eq!(candidates[0].code, "short");
    }

    #[test]
    fn test_rank_is_stable_for_equal_candidates() {
        let mut candidates = vec![
            candidate("first", Some(1.0), Region::GLOBAL, 1),
            candidate("second", Some(1.0), Region::GLOBAL, 1),
        ];

        rank_candidates(&mut candidates, None);
        assert_eq!(candidates[0].code, "first");
        assert_eq!(candidates[1].code, "second");
    }
}
