//! Live configuration for the Aspirin delivery core.
//!
//! [`Configuration`] holds every delivery parameter, applies changes
//! immediately, tells registered [`ChangeListener`]s about them, keeps the
//! derived [`SessionSnapshot`] for the SMTP transport current, and hands out
//! the configured mail and queue store backends.

pub mod error;
pub mod logger;
pub mod notifier;
pub mod parameter;
pub mod postmaster;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod source;

pub use error::{ConfigError, ResolutionFailure};
pub use logger::Logger;
pub use notifier::{ChangeListener, ChangeNotifier};
pub use parameter::{Parameter, ParameterKind, ParameterValue, ParameterValues};
pub use postmaster::PostmasterAddress;
pub use registry::{Configuration, ConfigurationBuilder, InitReport};
pub use resolver::{
    BASELINE_MAIL_STORE, BASELINE_QUEUE_STORE, BackendRegistry, StoreKind, StoreResolver,
};
pub use session::{SessionBuilder, SessionSnapshot};
pub use source::{Environment, OverrideSource, Overrides};
