//! Transport session settings derived from the registry.
//!
//! The SMTP transport never reads `hostname`, `encoding`, `delivery.timeout`
//! or `delivery.debug` directly; it takes the current [`SessionSnapshot`],
//! which the registry rebuilds whenever one of those four changes.

use std::time::Duration;

use serde::Serialize;

use crate::parameter::{Parameter, ParameterValues, defaults};

/// Decides whether debug output is enabled process-wide
pub type DebugProbe = fn() -> bool;

/// Immutable session settings for the SMTP transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Server to connect to
    pub smtp_host: String,
    /// Name announced in EHLO/HELO
    pub smtp_local_host: String,
    /// Charset for encoded words and text parts without one
    pub mime_charset: String,
    /// Socket connect timeout in milliseconds, 0 = none
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout in milliseconds, 0 = none
    pub io_timeout_ms: u64,
    /// Log the full SMTP conversation.
    ///
    /// Already combines the global debug level with `delivery.debug`; do not
    /// re-derive it.
    pub debug: bool,
    /// Number of rebuilds before this snapshot, starting at 0
    pub revision: u64,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        timeout(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn io_timeout(&self) -> Option<Duration> {
        timeout(self.io_timeout_ms)
    }
}

const fn timeout(millis: u64) -> Option<Duration> {
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}

/// Builds [`SessionSnapshot`]s from parameter values
#[derive(Debug, Clone, Copy)]
pub struct SessionBuilder {
    debug_probe: DebugProbe,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new(aspirin_common::logging::debug_enabled)
    }
}

impl SessionBuilder {
    #[must_use]
    pub const fn new(debug_probe: DebugProbe) -> Self {
        Self { debug_probe }
    }

    /// Derive a snapshot from the current values.
    ///
    /// A negative `delivery.timeout` means no timeout.
    #[must_use]
    pub fn rebuild(&self, values: &ParameterValues, revision: u64) -> SessionSnapshot {
        let host = values
            .string(Parameter::Hostname)
            .unwrap_or(defaults::HOSTNAME);
        let charset = values
            .string(Parameter::Encoding)
            .unwrap_or(defaults::ENCODING);
        let timeout_ms = u64::try_from(values.integer(Parameter::DeliveryTimeout)).unwrap_or(0);

        SessionSnapshot {
            smtp_host: host.to_string(),
            smtp_local_host: host.to_string(),
            mime_charset: charset.to_string(),
            connect_timeout_ms: timeout_ms,
            io_timeout_ms: timeout_ms,
            debug: (self.debug_probe)() && values.boolean(Parameter::DeliveryDebug),
            revision,
        }
    }
}
