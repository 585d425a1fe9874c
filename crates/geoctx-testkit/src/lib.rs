//! Shared test fixtures for the geoctx workspace.
//!
//! Provides builders for throwaway authority databases and shift-grid
//! files so integration tests across crates assemble the same scenario
//! without duplicating SQL or JSON by hand.

pub mod authority_db;
pub mod grids;

pub use authority_db::{
    grid_shift_steps, web_mercator_steps, AuthorityDbBuilder, CrsRow, OperationRow,
};
pub use grids::write_shift_grid;
