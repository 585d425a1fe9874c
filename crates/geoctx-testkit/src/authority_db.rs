//! Builder for throwaway authority databases.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use geoctx_common::{CoordSpace, Region, StepDef};

/// Schema matching what `geoctx-authority` expects to find.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE crs (
    auth_name TEXT NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    axis_order TEXT NOT NULL,
    unit TEXT NOT NULL,
    datum TEXT NOT NULL,
    west REAL, south REAL, east REAL, north REAL,
    PRIMARY KEY (auth_name, code)
);
CREATE TABLE coordinate_operation (
    auth_name TEXT NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    source_auth TEXT NOT NULL,
    source_code TEXT NOT NULL,
    target_auth TEXT NOT NULL,
    target_code TEXT NOT NULL,
    accuracy REAL,
    west REAL, south REAL, east REAL, north REAL,
    reversible INTEGER NOT NULL DEFAULT 1,
    steps TEXT NOT NULL,
    PRIMARY KEY (auth_name, code)
);
CREATE TABLE grid (
    name TEXT PRIMARY KEY,
    remote_path TEXT,
    size_bytes INTEGER,
    crc32 INTEGER
)
"#;

/// A CRS row to insert.
pub struct CrsRow {
    pub auth: &'static str,
    pub code: &'static str,
    pub name: &'static str,
    pub kind: &'static str,
    pub axis_order: &'static str,
    pub unit: &'static str,
    pub datum: &'static str,
    pub domain: Option<Region>,
}

impl CrsRow {
    /// WGS84 geographic.
    pub fn wgs84() -> Self {
        Self {
            auth: "EPSG",
            code: "4326",
            name: "WGS 84",
            kind: "geographic",
            axis_order: "north_east",
            unit: "degree",
            datum: "WGS84",
            domain: None,
        }
    }

    /// Web Mercator.
    pub fn web_mercator() -> Self {
        Self {
            auth: "EPSG",
            code: "3857",
            name: "WGS 84 / Pseudo-Mercator",
            kind: "projected",
            axis_order: "east_north",
            unit: "metre",
            datum: "WGS84",
            domain: None,
        }
    }

    /// NAD27 geographic, CONUS domain.
    pub fn nad27() -> Self {
        Self {
            auth: "EPSG",
            code: "4267",
            name: "NAD27",
            kind: "geographic",
            axis_order: "north_east",
            unit: "degree",
            datum: "NAD27",
            domain: Some(Region::new(-125.0, 24.0, -66.0, 50.0)),
        }
    }
}

/// An operation row to insert.
pub struct OperationRow {
    pub auth: &'static str,
    pub code: &'static str,
    pub name: &'static str,
    pub source: (&'static str, &'static str),
    pub target: (&'static str, &'static str),
    pub accuracy: Option<f64>,
    pub area: Option<Region>,
    pub reversible: bool,
    pub steps: Vec<StepDef>,
}

/// Degrees-to-radians then spherical Mercator: the usual geographic to
/// Web-Mercator pipeline.
pub fn web_mercator_steps() -> Vec<StepDef> {
    vec![
        StepDef::UnitConversion {
            factor: std::f64::consts::PI / 180.0,
            from: CoordSpace::GeographicDegrees,
            to: CoordSpace::GeographicRadians,
        },
        StepDef::Mercator {
            lon0: 0.0,
            radius: 6_378_137.0,
        },
    ]
}

/// Single grid-shift step through the named correction grid.
pub fn grid_shift_steps(grid: &str) -> Vec<StepDef> {
    vec![StepDef::GridShift {
        grid: grid.to_string(),
    }]
}

/// Accumulates rows, then writes them to a SQLite file.
#[derive(Default)]
pub struct AuthorityDbBuilder {
    crs: Vec<CrsRow>,
    operations: Vec<OperationRow>,
    grids: Vec<(String, Option<u64>, Option<u32>)>,
}

impl AuthorityDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard three-CRS scenario: WGS84, Web Mercator, NAD27,
    /// with a Mercator conversion and a grid-shift datum transformation.
    pub fn standard() -> Self {
        let mut b = Self::new();
        b = b
            .crs(CrsRow::wgs84())
            .crs(CrsRow::web_mercator())
            .crs(CrsRow::nad27())
            .operation(OperationRow {
                auth: "GEOCTX",
                code: "WEBMERC",
                name: "WGS 84 to Pseudo-Mercator",
                source: ("EPSG", "4326"),
                target: ("EPSG", "3857"),
                accuracy: Some(0.0),
                area: None,
                reversible: true,
                steps: web_mercator_steps(),
            })
            .operation(OperationRow {
                auth: "GEOCTX",
                code: "NADSHIFT",
                name: "NAD27 to WGS 84 (CONUS)",
                source: ("EPSG", "4267"),
                target: ("EPSG", "4326"),
                accuracy: Some(1.0),
                area: Some(Region::new(-125.0, 24.0, -66.0, 50.0)),
                reversible: true,
                steps: grid_shift_steps("us_nad27_conus"),
            })
            .grid("us_nad27_conus", None, None);
        b
    }

    pub fn crs(mut self, row: CrsRow) -> Self {
        self.crs.push(row);
        self
    }

    pub fn operation(mut self, row: OperationRow) -> Self {
        self.operations.push(row);
        self
    }

    pub fn grid(mut self, name: &str, size_bytes: Option<u64>, crc32: Option<u32>) -> Self {
        self.grids.push((name.to_string(), size_bytes, crc32));
        self
    }

    /// Write the database to `path`. The connection is closed before
    /// returning so the file can be reopened read-only.
    pub async fn write(self, path: &Path) -> PathBuf {
        let pool = create_pool(path).await;

        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&pool)
                    .await
                    .expect("schema statement failed");
            }
        }

        for row in &self.crs {
            let (west, south, east, north) = match row.domain {
                Some(r) => (Some(r.west), Some(r.south), Some(r.east), Some(r.north)),
                None => (None, None, None, None),
            };

            sqlx::query(
                "INSERT INTO crs (auth_name, code, name, kind, axis_order, unit, datum, \
                 west, south, east, north) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .bind(row.auth)
            .bind(row.code)
            .bind(row.name)
            .bind(row.kind)
            .bind(row.axis_order)
            .bind(row.unit)
            .bind(row.datum)
            .bind(west)
            .bind(south)
            .bind(east)
            .bind(north)
            .execute(&pool)
            .await
            .expect("crs insert failed");
        }

        for row in &self.operations {
            let (west, south, east, north) = match row.area {
                Some(r) => (Some(r.west), Some(r.south), Some(r.east), Some(r.north)),
                None => (None, None, None, None),
            };

            let steps_json = serde_json::to_string(&row.steps).expect("steps serialize");

            sqlx::query(
                "INSERT INTO coordinate_operation (auth_name, code, name, \
                 source_auth, source_code, target_auth, target_code, accuracy, \
                 west, south, east, north, reversible, steps) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )
            .bind(row.auth)
            .bind(row.code)
            .bind(row.name)
            .bind(row.source.0)
            .bind(row.source.1)
            .bind(row.target.0)
            .bind(row.target.1)
            .bind(row.accuracy)
            .bind(west)
            .bind(south)
            .bind(east)
            .bind(north)
            .bind(i64::from(row.reversible))
            .bind(steps_json)
            .execute(&pool)
            .await
            .expect("operation insert failed");
        }

        for (name, size_bytes, crc32) in &self.grids {
            sqlx::query(
                "INSERT INTO grid (name, remote_path, size_bytes, crc32) \
                 VALUES (?1, NULL, ?2, ?3)",
            )
            .bind(name)
            .bind(size_bytes.map(|v| v as i64))
            .bind(crc32.map(i64::from))
            .execute(&pool)
            .await
            .expect("grid insert failed");
        }

        pool.close().await;
        path.to_path_buf()
    }
}

async fn create_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("failed to create fixture database")
}
