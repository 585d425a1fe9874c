//! Global diagnostics setup.

use tracing_subscriber::FmtSubscriber;

use crate::config::LogLevel;

/// Install a formatting subscriber at the given level.
///
/// Returns true only when this call installed a subscriber. That is
/// false in two cases: `LogLevel::None` asks for nothing to be
/// installed, and an already-set global subscriber keeps collecting at
/// its own level. Either way a context's stored level stays advisory;
/// emission is gated by the process-wide subscriber.
pub fn init_logging(level: LogLevel) -> bool {
    let Some(level) = level.as_level() else {
        return false;
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
