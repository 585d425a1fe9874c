//! Grid location and loading for geoctx.
//!
//! Correction grids (datum-shift offsets) are found on the configured
//! search paths first; when a grid is absent locally and the context
//! allows it, the resolver fetches it from the network endpoint into
//! the user-writable directory. Resolved references and parsed grids
//! are cached for the life of the resolver and never evicted.

pub mod format;
pub mod reference;
pub mod resolver;

#[cfg(feature = "network")]
mod fetch;

pub use format::ShiftGrid;
pub use reference::{GridOrigin, GridReference};
pub use resolver::{GridIntegrity, GridResolver, GridSources};
