//! Known configuration parameters, their types and defaults.
//!
//! | Name                          | Kind    | Default                      |
//! |-------------------------------|---------|------------------------------|
//! | `delivery.attempt.count`      | Integer | 3                            |
//! | `delivery.attempt.delay`      | Integer | 300000 (ms)                  |
//! | `delivery.bounce-on-failure`  | Boolean | true                         |
//! | `delivery.debug`              | Boolean | false                        |
//! | `delivery.expiry`             | Long    | -1 (never)                   |
//! | `delivery.threads.active.max` | Integer | 3                            |
//! | `delivery.threads.idle.max`   | Integer | 3                            |
//! | `delivery.timeout`            | Integer | 30000 (ms)                   |
//! | `encoding`                    | String  | `UTF-8`                      |
//! | `hostname`                    | String  | `localhost`                  |
//! | `logger.name`                 | String  | `Aspirin`                    |
//! | `logger.prefix`               | String  | `Aspirin `                   |
//! | `mailstore.class`             | String  | [`BASELINE_MAIL_STORE`]      |
//! | `postmaster.email`            | String  | unset                        |
//! | `queuestore.class`            | String  | [`BASELINE_QUEUE_STORE`]     |
//!
//! [`BASELINE_MAIL_STORE`]: crate::BASELINE_MAIL_STORE
//! [`BASELINE_QUEUE_STORE`]: crate::BASELINE_QUEUE_STORE

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    resolver::{BASELINE_MAIL_STORE, BASELINE_QUEUE_STORE},
};

/// Built-in default values.
pub mod defaults {
    pub const DELIVERY_ATTEMPT_COUNT: i32 = 3;
    pub const DELIVERY_ATTEMPT_DELAY_MS: i32 = 300_000;
    pub const DELIVERY_BOUNCE_ON_FAILURE: bool = true;
    pub const DELIVERY_DEBUG: bool = false;
    /// Negative means mails never expire
    pub const DELIVERY_EXPIRY_MS: i64 = -1;
    pub const DELIVERY_THREADS_ACTIVE_MAX: i32 = 3;
    pub const DELIVERY_THREADS_IDLE_MAX: i32 = 3;
    pub const DELIVERY_TIMEOUT_MS: i32 = 30_000;
    pub const ENCODING: &str = "UTF-8";
    pub const HOSTNAME: &str = "localhost";
    pub const LOGGER_NAME: &str = "Aspirin";
    pub const LOGGER_PREFIX: &str = "Aspirin ";
}

/// The declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    String,
    Integer,
    Long,
    Boolean,
}

impl Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Boolean => "Boolean",
        })
    }
}

impl ParameterKind {
    /// Convert an override string into a value of this kind.
    ///
    /// Numbers are parsed after trimming surrounding whitespace; booleans accept
    /// `true`/`false` in any case. Strings are taken verbatim.
    ///
    /// # Errors
    /// [`ConfigError::TypeCoercion`] when `raw` is not a valid value of this kind.
    pub fn coerce(self, parameter: &str, raw: &str) -> Result<ParameterValue, ConfigError> {
        let mismatch = || ConfigError::TypeCoercion {
            parameter: parameter.to_string(),
            value: raw.to_string(),
            expected: self,
        };

        match self {
            Self::String => Ok(ParameterValue::String(raw.to_string())),
            Self::Integer => raw
                .trim()
                .parse()
                .map(ParameterValue::Integer)
                .map_err(|_| mismatch()),
            Self::Long => raw
                .trim()
                .parse()
                .map(ParameterValue::Long)
                .map_err(|_| mismatch()),
            Self::Boolean => {
                let trimmed = raw.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(ParameterValue::Boolean(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(ParameterValue::Boolean(false))
                } else {
                    Err(mismatch())
                }
            }
        }
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    String(String),
    Integer(i32),
    Long(i64),
    Boolean(bool),
}

impl ParameterValue {
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        match self {
            Self::String(_) => ParameterKind::String,
            Self::Integer(_) => ParameterKind::Integer,
            Self::Long(_) => ParameterKind::Long,
            Self::Boolean(_) => ParameterKind::Boolean,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Every parameter the registry manages with a fixed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parameter {
    DeliveryAttemptCount,
    DeliveryAttemptDelay,
    DeliveryBounceOnFailure,
    DeliveryDebug,
    DeliveryExpiry,
    DeliveryThreadsActiveMax,
    DeliveryThreadsIdleMax,
    DeliveryTimeout,
    Encoding,
    Hostname,
    LoggerName,
    LoggerPrefix,
    MailStoreClass,
    PostmasterEmail,
    QueueStoreClass,
}

impl Parameter {
    pub const ALL: [Self; 15] = [
        Self::DeliveryAttemptCount,
        Self::DeliveryAttemptDelay,
        Self::DeliveryBounceOnFailure,
        Self::DeliveryDebug,
        Self::DeliveryExpiry,
        Self::DeliveryThreadsActiveMax,
        Self::DeliveryThreadsIdleMax,
        Self::DeliveryTimeout,
        Self::Encoding,
        Self::Hostname,
        Self::LoggerName,
        Self::LoggerPrefix,
        Self::MailStoreClass,
        Self::PostmasterEmail,
        Self::QueueStoreClass,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// The external key of the parameter
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DeliveryAttemptCount => "delivery.attempt.count",
            Self::DeliveryAttemptDelay => "delivery.attempt.delay",
            Self::DeliveryBounceOnFailure => "delivery.bounce-on-failure",
            Self::DeliveryDebug => "delivery.debug",
            Self::DeliveryExpiry => "delivery.expiry",
            Self::DeliveryThreadsActiveMax => "delivery.threads.active.max",
            Self::DeliveryThreadsIdleMax => "delivery.threads.idle.max",
            Self::DeliveryTimeout => "delivery.timeout",
            Self::Encoding => "encoding",
            Self::Hostname => "hostname",
            Self::LoggerName => "logger.name",
            Self::LoggerPrefix => "logger.prefix",
            Self::MailStoreClass => "mailstore.class",
            Self::PostmasterEmail => "postmaster.email",
            Self::QueueStoreClass => "queuestore.class",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|parameter| parameter.name() == name)
    }

    #[must_use]
    pub const fn kind(self) -> ParameterKind {
        match self {
            Self::DeliveryAttemptCount
            | Self::DeliveryAttemptDelay
            | Self::DeliveryThreadsActiveMax
            | Self::DeliveryThreadsIdleMax
            | Self::DeliveryTimeout => ParameterKind::Integer,
            Self::DeliveryBounceOnFailure | Self::DeliveryDebug => ParameterKind::Boolean,
            Self::DeliveryExpiry => ParameterKind::Long,
            Self::Encoding
            | Self::Hostname
            | Self::LoggerName
            | Self::LoggerPrefix
            | Self::MailStoreClass
            | Self::PostmasterEmail
            | Self::QueueStoreClass => ParameterKind::String,
        }
    }

    /// The built-in default, `None` when the parameter is unset by default
    #[must_use]
    pub fn default_value(self) -> Option<ParameterValue> {
        let value = match self {
            Self::DeliveryAttemptCount => defaults::DELIVERY_ATTEMPT_COUNT.into(),
            Self::DeliveryAttemptDelay => defaults::DELIVERY_ATTEMPT_DELAY_MS.into(),
            Self::DeliveryBounceOnFailure => defaults::DELIVERY_BOUNCE_ON_FAILURE.into(),
            Self::DeliveryDebug => defaults::DELIVERY_DEBUG.into(),
            Self::DeliveryExpiry => defaults::DELIVERY_EXPIRY_MS.into(),
            Self::DeliveryThreadsActiveMax => defaults::DELIVERY_THREADS_ACTIVE_MAX.into(),
            Self::DeliveryThreadsIdleMax => defaults::DELIVERY_THREADS_IDLE_MAX.into(),
            Self::DeliveryTimeout => defaults::DELIVERY_TIMEOUT_MS.into(),
            Self::Encoding => defaults::ENCODING.into(),
            Self::Hostname => defaults::HOSTNAME.into(),
            Self::LoggerName => defaults::LOGGER_NAME.into(),
            Self::LoggerPrefix => defaults::LOGGER_PREFIX.into(),
            Self::MailStoreClass => BASELINE_MAIL_STORE.into(),
            Self::QueueStoreClass => BASELINE_QUEUE_STORE.into(),
            Self::PostmasterEmail => return None,
        };

        Some(value)
    }

    /// Whether changing this parameter changes the SMTP session snapshot
    #[must_use]
    pub const fn affects_session(self) -> bool {
        matches!(
            self,
            Self::Hostname | Self::Encoding | Self::DeliveryTimeout | Self::DeliveryDebug
        )
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown parameter: {s}"))
    }
}

/// Current values of the known parameters.
///
/// Every stored value matches its parameter's declared kind; [`Self::set`]
/// refuses anything else, so the typed accessors never see a mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValues {
    values: [Option<ParameterValue>; Parameter::COUNT],
}

impl Default for ParameterValues {
    fn default() -> Self {
        Self {
            values: Parameter::ALL.map(Parameter::default_value),
        }
    }
}

impl ParameterValues {
    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<&ParameterValue> {
        self.values[parameter.index()].as_ref()
    }

    /// Store `value` for `parameter`, or unset it with `None`.
    ///
    /// # Errors
    /// [`ConfigError::TypeCoercion`] when the value's kind differs from the
    /// parameter's declared kind; the stored value is left untouched.
    pub fn set(
        &mut self,
        parameter: Parameter,
        value: Option<ParameterValue>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = value.as_ref()
            && value.kind() != parameter.kind()
        {
            return Err(ConfigError::TypeCoercion {
                parameter: parameter.name().to_string(),
                value: value.to_string(),
                expected: parameter.kind(),
            });
        }

        self.values[parameter.index()] = value;
        Ok(())
    }

    #[must_use]
    pub fn string(&self, parameter: Parameter) -> Option<&str> {
        self.get(parameter).and_then(ParameterValue::as_str)
    }

    #[must_use]
    pub fn integer(&self, parameter: Parameter) -> i32 {
        self.get(parameter)
            .and_then(ParameterValue::as_integer)
            .or_else(|| parameter.default_value()?.as_integer())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn long(&self, parameter: Parameter) -> i64 {
        self.get(parameter)
            .and_then(ParameterValue::as_long)
            .or_else(|| parameter.default_value()?.as_long())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn boolean(&self, parameter: Parameter) -> bool {
        self.get(parameter)
            .and_then(ParameterValue::as_boolean)
            .or_else(|| parameter.default_value()?.as_boolean())
            .unwrap_or_default()
    }
}
