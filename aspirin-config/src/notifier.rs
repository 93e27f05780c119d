use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use aspirin_common::registry;
use parking_lot::Mutex;

use crate::error::ConfigError;

/// Receives the name of every parameter that changed.
///
/// Called synchronously on the thread that made the change, after the new
/// value is visible to readers. A listener must not change the parameter it
/// is being told about from inside the callback.
pub trait ChangeListener: Send + Sync {
    /// # Errors
    /// Any error is logged and reported by the notifier; it never reaches the
    /// code that changed the parameter, and later listeners are still called.
    fn configuration_changed(&self, parameter: &str) -> anyhow::Result<()>;
}

impl<F> ChangeListener for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn configuration_changed(&self, parameter: &str) -> anyhow::Result<()> {
        self(parameter)
    }
}

type Listeners = Vec<Arc<dyn ChangeListener>>;

/// Ordered list of change listeners.
///
/// Each dispatch works on the list as it was when the dispatch started, taken
/// under the same lock as registration and removal. A listener added or
/// removed while a dispatch is running, including from inside a callback,
/// takes effect from the next event.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Mutex<Listeners>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener(a: &Arc<dyn ChangeListener>, b: &Arc<dyn ChangeListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "listener panicked".to_string())
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.lock().push(listener);
    }

    /// Remove the first registration of `listener`.
    ///
    /// Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) -> bool {
        let mut listeners = self.listeners.lock();

        listeners
            .iter()
            .position(|registered| same_listener(registered, listener))
            .map(|index| listeners.remove(index))
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tell every listener, in registration order, that `parameter` changed.
    ///
    /// Returns the failures of listeners that errored or panicked; each has
    /// already been logged.
    pub fn notify(&self, parameter: &str) -> Vec<ConfigError> {
        let listeners: Listeners = self.listeners.lock().clone();

        if listeners.is_empty() {
            return Vec::new();
        }

        registry!(level = INFO, parameter, "Configuration parameter changed");

        listeners
            .iter()
            .filter_map(|listener| {
                let reason = match catch_unwind(AssertUnwindSafe(|| {
                    listener.configuration_changed(parameter)
                })) {
                    Ok(Ok(())) => return None,
                    Ok(Err(error)) => format!("{error:#}"),
                    Err(payload) => panic_reason(payload.as_ref()),
                };

                let error = ConfigError::ListenerDispatch {
                    parameter: parameter.to_string(),
                    reason,
                };
                registry!(level = ERROR, %error, "Change listener failed");
                Some(error)
            })
            .collect()
    }
}
