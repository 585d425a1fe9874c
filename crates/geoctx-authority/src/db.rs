//! SQLite connection management for the authority database.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use geoctx_common::error::{LookupError, LookupResult};

/// Tables every authority database must carry.
const REQUIRED_TABLES: [&str; 3] = ["crs", "coordinate_operation", "grid"];

/// An open, read-only authority database: one primary SQLite file plus
/// zero or more attached auxiliary files.
///
/// The pool is capped at a single connection so attached schemas and
/// query ordering behave deterministically; a context therefore holds
/// at most one live database connection.
pub struct AuthorityDatabase {
    pool: SqlitePool,
    /// Schema names to consult, primary first: `main`, `aux0`, `aux1`..
    schemas: Vec<String>,
    primary_path: PathBuf,
}

impl AuthorityDatabase {
    /// Open the primary database and attach auxiliary databases.
    ///
    /// Fails if the primary file cannot be opened as SQLite or is
    /// missing the authority schema. Auxiliary files are attached
    /// read-only; a broken auxiliary fails the open as a whole rather
    /// than silently narrowing lookups.
    pub async fn open(primary: &Path, aux: &[PathBuf]) -> LookupResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(primary)
            .read_only(true);

        let attach_stmts: Vec<String> = aux
            .iter()
            .enumerate()
            .map(|(i, path)| attach_statement(path, i))
            .collect();

        let stmts_for_connect = attach_stmts.clone();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .after_connect(move |conn, _meta| {
                let stmts = stmts_for_connect.clone();
                Box::pin(async move {
                    for stmt in &stmts {
                        sqlx::query(stmt).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| LookupError::DatabaseError(format!("open failed: {}", e)))?;

        let mut schemas = Vec::with_capacity(1 + aux.len());
        schemas.push("main".to_string());
        for i in 0..aux.len() {
            schemas.push(format!("aux{}", i));
        }

        let db = Self {
            pool,
            schemas,
            primary_path: primary.to_path_buf(),
        };

        db.check_schema().await?;

        info!(
            path = %primary.display(),
            aux_count = aux.len(),
            "opened authority database"
        );

        Ok(db)
    }

    /// Verify the primary schema so an unrelated SQLite file (or a
    /// non-database file) is rejected at configuration time rather than
    /// at first lookup.
    async fn check_schema(&self) -> LookupResult<()> {
        let row = sqlx::query(
            "SELECT count(*) AS n FROM sqlite_master \
             WHERE type = 'table' AND name IN ('crs', 'coordinate_operation', 'grid')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LookupError::DatabaseError(format!("schema probe failed: {}", e)))?;

        let n: i64 = row
            .try_get("n")
            .map_err(|e| LookupError::DatabaseError(e.to_string()))?;

        if n != REQUIRED_TABLES.len() as i64 {
            return Err(LookupError::DatabaseError(format!(
                "{} is not an authority database (expected tables: {})",
                self.primary_path.display(),
                REQUIRED_TABLES.join(", ")
            )));
        }

        debug!(path = %self.primary_path.display(), "authority schema verified");
        Ok(())
    }

    /// The connection pool, for query modules in this crate.
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema names in lookup precedence order.
    pub(crate) fn schemas(&self) -> &[String] {
        &self.schemas
    }

    /// Path of the primary database file.
    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }
}

/// Build an `ATTACH DATABASE` statement for an auxiliary file.
///
/// Attached databases inherit the connection's read-only flags; single
/// quotes in the path are doubled for the SQL literal.
fn attach_statement(path: &Path, index: usize) -> String {
    let escaped = path.display().to_string().replace('\'', "''");
    format!("ATTACH DATABASE '{}' AS aux{}", escaped, index)
}
