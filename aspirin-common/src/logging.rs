use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Environment variable holding the requested log level (`error` .. `trace`, `off`).
pub const LOG_LEVEL_VAR: &str = "ASPIRIN_LOG_LEVEL";

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:tt)*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg)*)
    }};
}

/// Events about parameter storage, overrides and change notification.
#[macro_export]
macro_rules! registry {
    (level = $level:ident, $($msg:tt)*) => {
        $crate::log!($crate::tracing::Level::$level, "registry", $($msg)*)
    };

    ($($msg:tt)*) => {
        $crate::registry!(level = TRACE, $($msg)*)
    };
}

/// Events about store backend resolution and the stores themselves.
#[macro_export]
macro_rules! backend {
    (level = $level:ident, $($msg:tt)*) => {
        $crate::log!($crate::tracing::Level::$level, "backend", $($msg)*)
    };

    ($($msg:tt)*) => {
        $crate::backend!(level = TRACE, $($msg)*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Resolve the level filter from the raw environment value, falling back to
/// the build default when it is missing or unparseable.
pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    let default = default_level();

    raw.map_or(default, |level| {
        LevelFilter::from_str(level.trim()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// Whether the process logging level currently admits `DEBUG` events.
///
/// This is the "global" half of the SMTP debug switch; delivery sessions only
/// log their wire traffic when both this and `delivery.debug` are on.
pub fn debug_enabled() -> bool {
    LevelFilter::current() >= LevelFilter::DEBUG
}

/// Install the process-wide subscriber.
///
/// Only events whose target starts with [`crate::LOG_TARGET_PREFIX`] are kept.
/// Calling this twice is harmless; the second installation is ignored.
pub fn init() {
    let level = parse_level(std::env::var(LOG_LEVEL_VAR).ok().as_deref());

    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with(crate::LOG_TARGET_PREFIX)
                })),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_explicit_levels_are_honoured() {
        assert_eq!(parse_level(Some("warn")), LevelFilter::WARN);
        assert_eq!(parse_level(Some(" DEBUG ")), LevelFilter::DEBUG);
        assert_eq!(parse_level(Some("off")), LevelFilter::OFF);
    }

    #[test]
    fn test_missing_or_garbage_level_uses_build_default() {
        assert_eq!(parse_level(None), default_level());
        assert_eq!(parse_level(Some("loud")), default_level());
    }
}
