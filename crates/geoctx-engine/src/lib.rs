//! Transformation context, operation factory and pipeline executor.
//!
//! The engine ties the other geoctx crates together: a [`Context`]
//! carries per-session configuration, an open authority database and a
//! grid resolver; an [`OperationFactory`] turns a CRS pair into ranked
//! candidate pipelines; a [`BoundPipeline`] validates, prepares and
//! finally executes one of them.
//!
//! ```no_run
//! use geoctx_engine::{Context, BoundPipeline, ResolveConstraint};
//! use geoctx_common::{Coordinate, Direction};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = Context::new();
//! ctx.set_database_path(Some("geoctx.db".as_ref()), &[]).await?;
//!
//! let source = ctx.find_crs("EPSG:4326").await??;
//! let target = ctx.find_crs("EPSG:3857").await??;
//!
//! let candidates = ctx
//!     .resolve_operations(&source, &target, &ResolveConstraint::default())
//!     .await??;
//! let bound = BoundPipeline::bind(candidates.into_iter().next().unwrap())?;
//! let ready = ctx.prepare(bound, None).await?;
//!
//! let out = ready.apply(&[Coordinate::xy(-97.5, 38.5)], Direction::Forward)?;
//! # let _ = out;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod factory;
pub mod logging;
pub mod pipeline;

mod steps;

pub use config::{ConfigStore, LogLevel, DEFAULT_ENDPOINT};
pub use context::Context;
pub use factory::{rank_candidates, OperationFactory, ResolveConstraint};
pub use logging::init_logging;
pub use pipeline::{BoundPipeline, ReadyPipeline};
