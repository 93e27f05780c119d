pub mod logging;

pub use tracing;

/// Target prefix shared by every Aspirin crate; the subscriber installed by
/// [`logging::init`] only admits events from targets starting with it.
pub const LOG_TARGET_PREFIX: &str = "aspirin";
