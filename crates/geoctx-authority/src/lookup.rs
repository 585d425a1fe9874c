//! CRS and coordinate-operation queries.
//!
//! Lookups walk the attached schemas in precedence order (primary
//! first). `find_operations` returns candidates unordered; ranking is
//! the operation factory's job.

use std::collections::HashSet;

use tracing::debug;

use geoctx_common::error::{LookupError, LookupResult};
use geoctx_common::{crs::split_crs_id, CandidateOperation, CrsHandle, Region};

use crate::db::AuthorityDatabase;
use crate::records::{
    crs_from_row, grid_from_row, operation_from_row, GridMetadata, OperationRecord,
};

const CRS_COLUMNS: &str =
    "auth_name, code, name, kind, axis_order, unit, datum, west, south, east, north";

const OPERATION_COLUMNS: &str = "auth_name, code, name, source_auth, source_code, \
     target_auth, target_code, accuracy, west, south, east, north, reversible, steps";

impl AuthorityDatabase {
    /// Look up a CRS by its `AUTH:CODE` identifier.
    pub async fn find_crs(&self, id: &str) -> LookupResult<CrsHandle> {
        let (auth, code) =
            split_crs_id(id).ok_or_else(|| LookupError::NotFound(id.to_string()))?;

        for schema in self.schemas() {
            // Schema names are generated internally (main, aux0, ...),
            // never caller-supplied.
            let sql = format!(
                "SELECT {} FROM {}.crs WHERE auth_name = ?1 AND code = ?2",
                CRS_COLUMNS, schema
            );

            let row = sqlx::query(&sql)
                .bind(auth)
                .bind(code)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| LookupError::DatabaseError(e.to_string()))?;

            if let Some(row) = row {
                return crs_from_row(&row);
            }
        }

        Err(LookupError::NotFound(id.to_string()))
    }

    /// All registered transformation paths from `source` to `target`:
    /// direct operations, reversed operations (when the record is
    /// reversible), and two-leg compositions through hub CRSs.
    ///
    /// `area` keeps only candidates whose area of use intersects it.
    /// The result is unordered; an empty vector means no path exists
    /// and is not an error.
    pub async fn find_operations(
        &self,
        source: &CrsHandle,
        target: &CrsHandle,
        area: Option<&Region>,
    ) -> LookupResult<Vec<CandidateOperation>> {
        let source_id = source.id();
        let target_id = target.id();

        let records = self.operations_touching(source, target).await?;

        let mut candidates: Vec<CandidateOperation> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // Direct and reversed-direct paths.
        for rec in &records {
            if rec.source == source_id && rec.target == target_id {
                push_unique(&mut candidates, &mut seen, rec.clone().into_candidate());
            } else if rec.reversible && rec.source == target_id && rec.target == source_id {
                push_unique(
                    &mut candidates,
                    &mut seen,
                    rec.clone().into_reversed_candidate(),
                );
            }
        }

        // Two-leg compositions through a hub CRS.
        let from_source = legs_from(&records, &source_id, &target_id);
        let to_target = legs_to(&records, &target_id, &source_id);

        for (hub_a, leg_a) in &from_source {
            for (hub_b, leg_b) in &to_target {
                if hub_a != hub_b {
                    continue;
                }

                let Some(area_of_use) = leg_a.area_of_use.intersection(&leg_b.area_of_use)
                else {
                    continue;
                };

                let accuracy_m = match (leg_a.accuracy_m, leg_b.accuracy_m) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    // Unknown accuracy dominates the composition.
                    _ => None,
                };

                let mut steps = leg_a.steps.clone();
                steps.extend(leg_b.steps.iter().cloned());

                let composed = CandidateOperation {
                    code: format!("{}+{}", leg_a.code, leg_b.code),
                    name: format!("{} + {}", leg_a.name, leg_b.name),
                    steps,
                    accuracy_m,
                    area_of_use,
                    reversible: leg_a.reversible && leg_b.reversible,
                    grid_status: Vec::new(),
                };

                push_unique(&mut candidates, &mut seen, composed);
            }
        }

        if let Some(area) = area {
            candidates.retain(|c| c.area_of_use.intersects(area));
        }

        debug!(
            source = %source_id,
            target = %target_id,
            count = candidates.len(),
            "operation lookup"
        );

        Ok(candidates)
    }

    /// Expected size/checksum metadata for a grid, when registered.
    pub async fn grid_metadata(&self, name: &str) -> LookupResult<Option<GridMetadata>> {
        for schema in self.schemas() {
            let sql = format!(
                "SELECT name, remote_path, size_bytes, crc32 FROM {}.grid WHERE name = ?1",
                schema
            );

            let row = sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| LookupError::DatabaseError(e.to_string()))?;

            if let Some(row) = row {
                return Ok(Some(grid_from_row(&row)?));
            }
        }

        Ok(None)
    }

    /// Fetch every operation row touching either endpoint, primary
    /// schema first. Rows shadowed by an earlier schema (same
    /// `AUTH:CODE`) are dropped.
    async fn operations_touching(
        &self,
        source: &CrsHandle,
        target: &CrsHandle,
    ) -> LookupResult<Vec<OperationRecord>> {
        let mut records: Vec<OperationRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for schema in self.schemas() {
            let sql = format!(
                "SELECT {} FROM {}.coordinate_operation \
                 WHERE (source_auth = ?1 AND source_code = ?2) \
                    OR (target_auth = ?1 AND target_code = ?2) \
                    OR (source_auth = ?3 AND source_code = ?4) \
                    OR (target_auth = ?3 AND target_code = ?4)",
                OPERATION_COLUMNS, schema
            );

            let rows = sqlx::query(&sql)
                .bind(&source.authority)
                .bind(&source.code)
                .bind(&target.authority)
                .bind(&target.code)
                .fetch_all(self.pool())
                .await
                .map_err(|e| LookupError::DatabaseError(e.to_string()))?;

            for row in &rows {
                let rec = operation_from_row(row)?;
                if seen.insert(rec.code.clone()) {
                    records.push(rec);
                }
            }
        }

        Ok(records)
    }
}

fn push_unique(
    candidates: &mut Vec<CandidateOperation>,
    seen: &mut HashSet<String>,
    candidate: CandidateOperation,
) {
    if seen.insert(candidate.code.clone()) {
        candidates.push(candidate);
    }
}

/// Legs leaving `from`, keyed by the hub CRS they reach. Legs that
/// land directly on `exclude` are the direct paths handled separately.
fn legs_from(
    records: &[OperationRecord],
    from: &str,
    exclude: &str,
) -> Vec<(String, CandidateOperation)> {
    let mut legs = Vec::new();

    for rec in records {
        if rec.source == from && rec.target != exclude && rec.target != from {
            legs.push((rec.target.clone(), rec.clone().into_candidate()));
        } else if rec.reversible && rec.target == from && rec.source != exclude && rec.source != from
        {
            legs.push((rec.source.clone(), rec.clone().into_reversed_candidate()));
        }
    }

    legs
}

/// Legs arriving at `to`, keyed by the hub CRS they leave from.
fn legs_to(
    records: &[OperationRecord],
    to: &str,
    exclude: &str,
) -> Vec<(String, CandidateOperation)> {
    let mut legs = Vec::new();

    for rec in records {
        if rec.target == to && rec.source != exclude && rec.source != to {
            legs.push((rec.source.clone(), rec.clone().into_candidate()));
        } else if rec.reversible && rec.source == to && rec.target != exclude && rec.target != to {
            legs.push((rec.target.clone(), rec.clone().into_reversed_candidate()));
        }
    }

    legs
}
