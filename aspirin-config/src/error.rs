//! Error types for the aspirin-config crate.
//!
//! None of these escape a getter or setter: each is recovered where it occurs
//! (default value, previous address, baseline backend, next listener) and then
//! logged. They are still returned from [`Configuration::init`] and kept by
//! the store resolver so callers and tests can see what was recovered.
//!
//! [`Configuration::init`]: crate::Configuration::init

use thiserror::Error;

use crate::{parameter::ParameterKind, resolver::StoreKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An override string does not fit the parameter's declared type.
    #[error("Cannot use {value:?} for {parameter}: expected {expected}")]
    TypeCoercion {
        parameter: String,
        value: String,
        expected: ParameterKind,
    },

    /// The postmaster address could not be parsed.
    #[error("Unparseable postmaster address {address:?}: {reason}")]
    AddressParse { address: String, reason: String },

    /// A store backend could not be produced from its class identifier.
    #[error("Could not resolve {kind} store {class_name:?}: {reason}")]
    BackendResolution {
        kind: StoreKind,
        class_name: String,
        #[source]
        reason: ResolutionFailure,
    },

    /// A change listener returned an error or panicked.
    #[error("Listener failed on change of {parameter}: {reason}")]
    ListenerDispatch { parameter: String, reason: String },

    /// An override document is not a valid RON map.
    #[error("Invalid override document: {0}")]
    OverrideFile(#[from] ron::error::SpannedError),
}

/// Why a backend class identifier did not yield a store.
#[derive(Debug, Error)]
pub enum ResolutionFailure {
    #[error("no backend is registered under this identifier")]
    NotRegistered,

    #[error("identifier names a {actual} store backend")]
    WrongCapability { actual: StoreKind },

    #[error("construction failed: {0:#}")]
    Construction(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_coercion_message_names_parameter_and_kind() {
        let error = ConfigError::TypeCoercion {
            parameter: "delivery.timeout".to_string(),
            value: "soon".to_string(),
            expected: ParameterKind::Integer,
        };

        let message = error.to_string();
        assert!(message.contains("delivery.timeout"));
        assert!(message.contains("\"soon\""));
        assert!(message.contains("Integer"));
    }

    #[test]
    fn test_resolution_failure_is_the_source() {
        let error = ConfigError::BackendResolution {
            kind: StoreKind::Mail,
            class_name: "com.example.Missing".to_string(),
            reason: ResolutionFailure::NotRegistered,
        };

        let source = error.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("no backend is registered under this identifier")
        );
    }

    #[test]
    fn test_construction_failure_keeps_context_chain() {
        let cause = anyhow::anyhow!("disk full").context("opening store");
        let failure = ResolutionFailure::Construction(cause);

        assert_eq!(
            failure.to_string(),
            "construction failed: opening store: disk full"
        );
    }
}
