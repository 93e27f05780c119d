//! Store backend resolution.
//!
//! `mailstore.class` and `queuestore.class` hold backend identifiers. The
//! [`BackendRegistry`] maps each identifier to a constructor; the
//! [`StoreResolver`] builds one instance per store kind on first use, caches
//! it, and falls back to the in-memory baseline when an identifier cannot be
//! turned into a working store.

use std::{
    fmt::{self, Display},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use ahash::AHashMap;
use aspirin_common::backend;
use aspirin_store::{MailStore, MemoryMailStore, MemoryQueueStore, QueueStore};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ResolutionFailure};

/// Identifier of the baseline mail store
pub const BASELINE_MAIL_STORE: &str = "aspirin_store::MemoryMailStore";

/// Identifier of the baseline queue store
pub const BASELINE_QUEUE_STORE: &str = "aspirin_store::MemoryQueueStore";

type MailConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn MailStore>> + Send + Sync>;
type QueueConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn QueueStore>> + Send + Sync>;

/// Which store contract a backend implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    Mail,
    Queue,
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mail => "mail",
            Self::Queue => "queue",
        })
    }
}

#[derive(Clone)]
enum Constructor {
    Mail(MailConstructor),
    Queue(QueueConstructor),
}

impl Constructor {
    const fn kind(&self) -> StoreKind {
        match self {
            Self::Mail(_) => StoreKind::Mail,
            Self::Queue(_) => StoreKind::Queue,
        }
    }
}

/// Run a backend constructor, turning a panic into a construction failure
fn construct<T: ?Sized>(
    constructor: &(dyn Fn() -> anyhow::Result<Arc<T>> + Send + Sync),
) -> Result<Arc<T>, ResolutionFailure> {
    match catch_unwind(AssertUnwindSafe(constructor)) {
        Ok(Ok(store)) => Ok(store),
        Ok(Err(error)) => Err(ResolutionFailure::Construction(error)),
        Err(_) => Err(ResolutionFailure::Construction(anyhow::anyhow!(
            "backend constructor panicked"
        ))),
    }
}

/// Table of store backends, keyed by identifier
///
/// The default table knows the two baseline stores. Other backends are added
/// with [`Self::register_mail_store`] and [`Self::register_queue_store`];
/// registering an identifier again replaces the earlier constructor.
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: AHashMap<String, Constructor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identifiers: Vec<_> = self.constructors.keys().collect();
        identifiers.sort();
        f.debug_struct("BackendRegistry")
            .field("identifiers", &identifiers)
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_mail_store(BASELINE_MAIL_STORE, || {
            Ok(Arc::new(MemoryMailStore::new()))
        });
        registry.register_queue_store(BASELINE_QUEUE_STORE, || {
            Ok(Arc::new(MemoryQueueStore::new()))
        });
        registry
    }
}

impl BackendRegistry {
    /// A table with the baseline stores registered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with nothing registered, not even the baselines
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: AHashMap::new(),
        }
    }

    pub fn register_mail_store<F>(&mut self, identifier: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn MailStore>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(identifier.into(), Constructor::Mail(Arc::new(constructor)));
    }

    pub fn register_queue_store<F>(&mut self, identifier: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn QueueStore>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(identifier.into(), Constructor::Queue(Arc::new(constructor)));
    }

    /// The kind of store registered under `identifier`
    #[must_use]
    pub fn kind_of(&self, identifier: &str) -> Option<StoreKind> {
        self.constructors.get(identifier).map(Constructor::kind)
    }

    /// Build a new mail store from `identifier`.
    ///
    /// # Errors
    /// The identifier is unknown, names a queue store, or its constructor
    /// failed or panicked.
    pub fn create_mail_store(
        &self,
        identifier: &str,
    ) -> Result<Arc<dyn MailStore>, ResolutionFailure> {
        match self.constructors.get(identifier) {
            None => Err(ResolutionFailure::NotRegistered),
            Some(Constructor::Mail(constructor)) => construct(constructor.as_ref()),
            Some(other) => Err(ResolutionFailure::WrongCapability {
                actual: other.kind(),
            }),
        }
    }

    /// Build a new queue store from `identifier`.
    ///
    /// # Errors
    /// The identifier is unknown, names a mail store, or its constructor
    /// failed or panicked.
    pub fn create_queue_store(
        &self,
        identifier: &str,
    ) -> Result<Arc<dyn QueueStore>, ResolutionFailure> {
        match self.constructors.get(identifier) {
            None => Err(ResolutionFailure::NotRegistered),
            Some(Constructor::Queue(constructor)) => construct(constructor.as_ref()),
            Some(other) => Err(ResolutionFailure::WrongCapability {
                actual: other.kind(),
            }),
        }
    }
}

/// The live instance of one store kind, with the identifier it belongs to
struct Cached<T: ?Sized> {
    identifier: String,
    store: Arc<T>,
}

struct Slot<T: ?Sized> {
    cached: Mutex<Option<Cached<T>>>,
    failure: Mutex<Option<Arc<ConfigError>>>,
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self {
            cached: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }
}

impl<T: ?Sized> Slot<T> {
    /// Return the cached store for `identifier`, building it if the cache is
    /// empty or belongs to another identifier.
    ///
    /// The cache lock is held while building, so racing callers wait for and
    /// share the first caller's instance.
    fn get_or_resolve(
        &self,
        kind: StoreKind,
        identifier: &str,
        create: impl FnOnce() -> Result<Arc<T>, ResolutionFailure>,
        fallback: impl FnOnce() -> Arc<T>,
        init: impl FnOnce(&T),
    ) -> Arc<T> {
        let mut cached = self.cached.lock();

        if let Some(current) = cached.as_ref()
            && current.identifier == identifier
        {
            return Arc::clone(&current.store);
        }

        let store = match create() {
            Ok(store) => {
                backend!(level = DEBUG, %kind, identifier, "Resolved store backend");
                *self.failure.lock() = None;
                store
            }
            Err(reason) => {
                let error = ConfigError::BackendResolution {
                    kind,
                    class_name: identifier.to_string(),
                    reason,
                };
                backend!(level = ERROR, %error, "Falling back to the baseline store");
                *self.failure.lock() = Some(Arc::new(error));
                fallback()
            }
        };

        init(&*store);

        *cached = Some(Cached {
            identifier: identifier.to_string(),
            store: Arc::clone(&store),
        });

        store
    }

    fn inject(&self, identifier: &str, store: Option<Arc<T>>) {
        *self.cached.lock() = store.map(|store| Cached {
            identifier: identifier.to_string(),
            store,
        });
    }

    fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn failure(&self) -> Option<Arc<ConfigError>> {
        self.failure.lock().clone()
    }
}

/// Lazily built, cached store instances, one per store kind
#[derive(Default)]
pub struct StoreResolver {
    backends: RwLock<BackendRegistry>,
    mail: Slot<dyn MailStore>,
    queue: Slot<dyn QueueStore>,
}

impl fmt::Debug for StoreResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreResolver")
            .field("backends", &*self.backends.read())
            .finish_non_exhaustive()
    }
}

impl StoreResolver {
    #[must_use]
    pub fn new(backends: BackendRegistry) -> Self {
        Self {
            backends: RwLock::new(backends),
            mail: Slot::default(),
            queue: Slot::default(),
        }
    }

    /// Change the backend table. Already cached instances are kept.
    pub fn with_backends<R>(&self, change: impl FnOnce(&mut BackendRegistry) -> R) -> R {
        change(&mut *self.backends.write())
    }

    /// The mail store for `identifier`.
    ///
    /// Never fails: an unusable identifier yields a fresh [`MemoryMailStore`]
    /// and the reason is kept for [`Self::mail_store_failure`].
    pub fn mail_store(&self, identifier: &str) -> Arc<dyn MailStore> {
        self.mail.get_or_resolve(
            StoreKind::Mail,
            identifier,
            || self.backends.read().create_mail_store(identifier),
            || Arc::new(MemoryMailStore::new()),
            |store| store.init(),
        )
    }

    /// The queue store for `identifier`, with the same fallback rules as
    /// [`Self::mail_store`].
    pub fn queue_store(&self, identifier: &str) -> Arc<dyn QueueStore> {
        self.queue.get_or_resolve(
            StoreKind::Queue,
            identifier,
            || self.backends.read().create_queue_store(identifier),
            || Arc::new(MemoryQueueStore::new()),
            |store| store.init(),
        )
    }

    /// Replace the cached mail store; `None` empties the cache
    pub fn set_mail_store(&self, identifier: &str, store: Option<Arc<dyn MailStore>>) {
        self.mail.inject(identifier, store);
    }

    /// Replace the cached queue store; `None` empties the cache
    pub fn set_queue_store(&self, identifier: &str, store: Option<Arc<dyn QueueStore>>) {
        self.queue.inject(identifier, store);
    }

    /// Drop the cached instance of `kind`
    pub fn invalidate(&self, kind: StoreKind) {
        match kind {
            StoreKind::Mail => self.mail.invalidate(),
            StoreKind::Queue => self.queue.invalidate(),
        }
    }

    /// Why the last mail store resolution fell back, if it did
    #[must_use]
    pub fn mail_store_failure(&self) -> Option<Arc<ConfigError>> {
        self.mail.failure()
    }

    /// Why the last queue store resolution fell back, if it did
    #[must_use]
    pub fn queue_store_failure(&self) -> Option<Arc<ConfigError>> {
        self.queue.failure()
    }
}
