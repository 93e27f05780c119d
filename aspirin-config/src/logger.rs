use std::{fmt, sync::Arc};

/// Logger identity handed to delivery collaborators.
///
/// Built from `logger.name` and `logger.prefix`. The registry replaces it on
/// every change of either parameter, so collaborators should fetch it again
/// from the configuration instead of holding on to an old copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: Arc<str>,
    prefix: Arc<str>,
}

impl Logger {
    #[must_use]
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: Arc::from(name),
            prefix: Arc::from(prefix),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A span tagging everything recorded inside it with this logger's name
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("logger", name = %self.name)
    }

    /// `message` with the configured prefix in front
    #[must_use]
    pub fn prefixed(&self, message: impl fmt::Display) -> String {
        format!("{}{message}", self.prefix)
    }
}
