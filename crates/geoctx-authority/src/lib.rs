//! Authority database access for geoctx.
//!
//! The authority database is a read-only SQLite file holding CRS
//! definitions, coordinate operations (with their step pipelines as
//! JSON), and grid metadata. A context opens one primary database and
//! may attach any number of auxiliary databases; lookups consult the
//! primary first, then each auxiliary in attach order.

pub mod db;
pub mod lookup;
pub mod records;

pub use db::AuthorityDatabase;
pub use records::{GridMetadata, OperationRecord};
