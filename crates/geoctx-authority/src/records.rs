//! Row decoding for authority database tables.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use geoctx_common::error::{LookupError, LookupResult};
use geoctx_common::{
    AxisOrder, CandidateOperation, CrsHandle, CrsKind, CrsUnit, PipelineStep, Region, StepDef,
};

/// A decoded `coordinate_operation` row.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub code: String,
    pub name: String,
    /// `AUTH:CODE` of the source CRS.
    pub source: String,
    /// `AUTH:CODE` of the target CRS.
    pub target: String,
    pub accuracy_m: Option<f64>,
    pub area_of_use: Region,
    pub reversible: bool,
    pub steps: Vec<StepDef>,
}

impl OperationRecord {
    /// Turn the record into a forward candidate.
    pub fn into_candidate(self) -> CandidateOperation {
        CandidateOperation {
            code: self.code,
            name: self.name,
            steps: self.steps.into_iter().map(PipelineStep::forward).collect(),
            accuracy_m: self.accuracy_m,
            area_of_use: self.area_of_use,
            reversible: self.reversible,
            grid_status: Vec::new(),
        }
    }

    /// Turn the record into a candidate applied target-to-source.
    ///
    /// Steps run in reverse order with each primitive inverted. Only
    /// meaningful when `reversible` is set.
    pub fn into_reversed_candidate(self) -> CandidateOperation {
        let steps = self
            .steps
            .into_iter()
            .rev()
            .map(PipelineStep::inverted)
            .collect();

        CandidateOperation {
            code: self.code,
            name: format!("{} (inverse)", self.name),
            steps,
            accuracy_m: self.accuracy_m,
            area_of_use: self.area_of_use,
            reversible: self.reversible,
            grid_status: Vec::new(),
        }
    }
}

/// Grid metadata registered alongside operations, used to verify
/// network fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMetadata {
    pub name: String,
    /// Path under the network endpoint, when it differs from the name.
    pub remote_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub crc32: Option<u32>,
}

fn decode_err(e: impl std::fmt::Display) -> LookupError {
    LookupError::DatabaseError(format!("row decode failed: {}", e))
}

/// Area-of-use columns are nullable as a group; a row without an
/// explicit extent is treated as global.
fn region_from_row(row: &SqliteRow) -> LookupResult<Region> {
    let west: Option<f64> = row.try_get("west").map_err(decode_err)?;
    let south: Option<f64> = row.try_get("south").map_err(decode_err)?;
    let east: Option<f64> = row.try_get("east").map_err(decode_err)?;
    let north: Option<f64> = row.try_get("north").map_err(decode_err)?;

    match (west, south, east, north) {
        (Some(w), Some(s), Some(e), Some(n)) => Ok(Region::new(w, s, e, n)),
        _ => Ok(Region::GLOBAL),
    }
}

/// Decode a `crs` row into a handle.
pub(crate) fn crs_from_row(row: &SqliteRow) -> LookupResult<CrsHandle> {
    let kind_s: String = row.try_get("kind").map_err(decode_err)?;
    let kind = match kind_s.as_str() {
        "geographic" => CrsKind::Geographic,
        "projected" => CrsKind::Projected,
        other => return Err(decode_err(format!("unknown CRS kind '{}'", other))),
    };

    let axis_s: String = row.try_get("axis_order").map_err(decode_err)?;
    let axis_order = match axis_s.as_str() {
        "east_north" => AxisOrder::EastNorth,
        "north_east" => AxisOrder::NorthEast,
        other => return Err(decode_err(format!("unknown axis order '{}'", other))),
    };

    let unit_s: String = row.try_get("unit").map_err(decode_err)?;
    let unit = match unit_s.as_str() {
        "degree" => CrsUnit::Degree,
        "metre" => CrsUnit::Metre,
        other => return Err(decode_err(format!("unknown unit '{}'", other))),
    };

    Ok(CrsHandle {
        authority: row.try_get("auth_name").map_err(decode_err)?,
        code: row.try_get("code").map_err(decode_err)?,
        name: row.try_get("name").map_err(decode_err)?,
        kind,
        axis_order,
        unit,
        datum: row.try_get("datum").map_err(decode_err)?,
        domain: region_from_row(row)?,
    })
}

/// Decode a `coordinate_operation` row, including its JSON step list.
pub(crate) fn operation_from_row(row: &SqliteRow) -> LookupResult<OperationRecord> {
    let auth: String = row.try_get("auth_name").map_err(decode_err)?;
    let code: String = row.try_get("code").map_err(decode_err)?;

    let source_auth: String = row.try_get("source_auth").map_err(decode_err)?;
    let source_code: String = row.try_get("source_code").map_err(decode_err)?;
    let target_auth: String = row.try_get("target_auth").map_err(decode_err)?;
    let target_code: String = row.try_get("target_code").map_err(decode_err)?;

    let steps_json: String = row.try_get("steps").map_err(decode_err)?;
    let steps: Vec<StepDef> = serde_json::from_str(&steps_json)
        .map_err(|e| decode_err(format!("steps for {}:{}: {}", auth, code, e)))?;

    let reversible: i64 = row.try_get("reversible").map_err(decode_err)?;

    Ok(OperationRecord {
        code: format!("{}:{}", auth, code),
        name: row.try_get("name").map_err(decode_err)?,
        source: format!("{}:{}", source_auth, source_code),
        target: format!("{}:{}", target_auth, target_code),
        accuracy_m: row.try_get("accuracy").map_err(decode_err)?,
        area_of_use: region_from_row(row)?,
        reversible: reversible != 0,
        steps,
    })
}

/// Decode a `grid` row. Size and checksum live in SQLite integer
/// columns; values outside their unsigned ranges are corruption, not
/// something to wrap.
pub(crate) fn grid_from_row(row: &SqliteRow) -> LookupResult<GridMetadata> {
    let size_bytes: Option<i64> = row.try_get("size_bytes").map_err(decode_err)?;
    let crc32: Option<i64> = row.try_get("crc32").map_err(decode_err)?;

    let size_bytes = size_bytes
        .map(|v| {
            u64::try_from(v).map_err(|_| decode_err(format!("grid size_bytes out of range: {}", v)))
        })
        .transpose()?;
    let crc32 = crc32
        .map(|v| u32::try_from(v).map_err(|_| decode_err(format!("grid crc32 out of range: {}", v))))
        .transpose()?;

    Ok(GridMetadata {
        name: row.try_get("name").map_err(decode_err)?,
        remote_path: row.try_get("remote_path").map_err(decode_err)?,
        size_bytes,
        crc32,
    })
}
