//! The live configuration registry.

use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};

use ahash::AHashMap;
use aspirin_common::registry;
use aspirin_store::{MailStore, QueueStore};
use parking_lot::{Mutex, RwLock};

use crate::{
    error::ConfigError,
    logger::Logger,
    notifier::{ChangeListener, ChangeNotifier},
    parameter::{Parameter, ParameterKind, ParameterValue, ParameterValues, defaults},
    postmaster::PostmasterAddress,
    resolver::{BackendRegistry, StoreKind, StoreResolver},
    session::{DebugProbe, SessionBuilder, SessionSnapshot},
    source::{Environment, OverrideSource, Overrides},
};

static GLOBAL: OnceLock<Configuration> = OnceLock::new();

/// Everything recovered from while running [`Configuration::init`]
#[derive(Debug, Default)]
pub struct InitReport {
    errors: Vec<ConfigError>,
}

impl InitReport {
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ConfigError> {
        self.errors
    }

    /// No override had to be replaced by a default
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Values and the state derived from them, always replaced together
struct State {
    values: ParameterValues,
    extensions: AHashMap<String, ParameterValue>,
    postmaster: Option<PostmasterAddress>,
    session: Arc<SessionSnapshot>,
    logger: Logger,
}

impl State {
    fn logger_from(values: &ParameterValues) -> Logger {
        Logger::new(
            values
                .string(Parameter::LoggerName)
                .unwrap_or(defaults::LOGGER_NAME),
            values
                .string(Parameter::LoggerPrefix)
                .unwrap_or(defaults::LOGGER_PREFIX),
        )
    }

    fn rebuild_session(&mut self, builder: &SessionBuilder) {
        let revision = self.session.revision + 1;
        self.session = Arc::new(builder.rebuild(&self.values, revision));
    }

    /// Bring derived state in line after `parameter` changed
    fn refresh(&mut self, parameter: Parameter, builder: &SessionBuilder) {
        if parameter.affects_session() {
            self.rebuild_session(builder);
        }
        if matches!(parameter, Parameter::LoggerName | Parameter::LoggerPrefix) {
            self.logger = Self::logger_from(&self.values);
        }
    }
}

/// Builder for a [`Configuration`] with non-default collaborators
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    system: Option<Box<dyn OverrideSource>>,
    session_builder: SessionBuilder,
    backends: BackendRegistry,
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the process-wide override source, [`Environment`] by default
    #[must_use]
    pub fn system_source(mut self, source: impl OverrideSource + 'static) -> Self {
        self.system = Some(Box::new(source));
        self
    }

    /// Replace the global debug switch consulted for the session snapshot
    #[must_use]
    pub fn debug_probe(mut self, probe: DebugProbe) -> Self {
        self.session_builder = SessionBuilder::new(probe);
        self
    }

    #[must_use]
    pub fn backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    /// Build the registry and seed it from the system source and defaults
    #[must_use]
    pub fn build(self) -> Configuration {
        let values = ParameterValues::default();
        let state = State {
            session: Arc::new(self.session_builder.rebuild(&values, 0)),
            logger: State::logger_from(&values),
            values,
            extensions: AHashMap::new(),
            postmaster: None,
        };

        let configuration = Configuration {
            state: RwLock::new(state),
            sections: std::array::from_fn(|_| Mutex::new(())),
            notifier: ChangeNotifier::new(),
            resolver: StoreResolver::new(self.backends),
            session_builder: self.session_builder,
            system: self.system.unwrap_or_else(|| Box::new(Environment::new())),
        };

        configuration.init(&Overrides::new());
        configuration
    }
}

/// Live, typed configuration of the delivery core.
///
/// Every setter takes effect immediately: under that parameter's lock the
/// value is stored and derived state (session snapshot, logger identity,
/// cached store) is brought up to date. Readers never see a new value next to
/// stale derived state. Registered listeners are then told the parameter's
/// name, after the lock is released.
///
/// Listeners run on the thread of the setter and may set any parameter,
/// including from several threads at once. A listener that sets the
/// parameter it is being notified about recurses.
pub struct Configuration {
    state: RwLock<State>,
    sections: [Mutex<()>; Parameter::COUNT],
    notifier: ChangeNotifier,
    resolver: StoreResolver,
    session_builder: SessionBuilder,
    system: Box<dyn OverrideSource>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Configuration")
            .field("values", &state.values)
            .field("extensions", &state.extensions)
            .field("session", &state.session)
            .field("notifier", &self.notifier)
            .field("system", &self.system)
            .finish_non_exhaustive()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    /// A registry reading overrides from the process environment
    #[must_use]
    pub fn new() -> Self {
        ConfigurationBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// The process-wide registry, created on first use
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Reseed every known parameter.
    ///
    /// Each value comes from `overrides`, else the system source, else the
    /// built-in default. An override that does not coerce to the parameter's
    /// type is reported and replaced by the default. An unparseable postmaster
    /// address is reported and the previous address kept. Extension properties
    /// are left alone and no listener is notified.
    pub fn init(&self, overrides: &dyn OverrideSource) -> InitReport {
        let _sections: Vec<_> = self.sections.iter().map(|section| section.lock()).collect();
        let mut report = InitReport::default();
        let mut values = ParameterValues::default();

        for parameter in Parameter::ALL {
            let name = parameter.name();
            let Some(raw) = overrides.lookup(name).or_else(|| self.system.lookup(name)) else {
                continue;
            };

            let seeded = parameter
                .kind()
                .coerce(name, &raw)
                .and_then(|value| values.set(parameter, Some(value)));

            if let Err(error) = seeded {
                registry!(level = WARN, %error, "Using the default value");
                report.errors.push(error);
            }
        }

        let mut state = self.state.write();

        if let Some(raw) = values.string(Parameter::PostmasterEmail) {
            match PostmasterAddress::parse(raw) {
                Ok(address) => state.postmaster = Some(address),
                Err(error) => {
                    registry!(level = WARN, %error, "Keeping the previous postmaster address");
                    report.errors.push(error);
                }
            }
        } else {
            state.postmaster = None;
        }

        let postmaster = state
            .postmaster
            .as_ref()
            .map(|address| ParameterValue::String(address.to_string()));
        if let Err(error) = values.set(Parameter::PostmasterEmail, postmaster) {
            report.errors.push(error);
        }

        state.logger = State::logger_from(&values);
        state.values = values;
        state.rebuild_session(&self.session_builder);
        drop(state);

        self.resolver.invalidate(StoreKind::Mail);
        self.resolver.invalidate(StoreKind::Queue);

        registry!(
            level = DEBUG,
            recovered = report.errors.len(),
            "Configuration initialised"
        );
        report
    }

    /// Apply `change` to the state under `parameter`'s lock and refresh
    /// derived state, then notify once the lock is released. Nothing happens
    /// if `change` refuses.
    fn apply(&self, parameter: Parameter, change: impl FnOnce(&mut State) -> bool) {
        {
            let _section = self.sections[parameter.index()].lock();
            let mut state = self.state.write();
            if !change(&mut *state) {
                return;
            }
            state.refresh(parameter, &self.session_builder);
            drop(state);

            match parameter {
                Parameter::MailStoreClass => self.resolver.invalidate(StoreKind::Mail),
                Parameter::QueueStoreClass => self.resolver.invalidate(StoreKind::Queue),
                _ => {}
            }
        }

        self.notifier.notify(parameter.name());
    }

    fn store(&self, parameter: Parameter, value: ParameterValue) {
        self.apply(parameter, |state| match state.values.set(parameter, Some(value)) {
            Ok(()) => true,
            Err(error) => {
                registry!(level = WARN, %error, "Ignoring value of the wrong type");
                false
            }
        });
    }

    fn integer(&self, parameter: Parameter) -> i32 {
        self.state.read().values.integer(parameter)
    }

    fn long(&self, parameter: Parameter) -> i64 {
        self.state.read().values.long(parameter)
    }

    fn boolean(&self, parameter: Parameter) -> bool {
        self.state.read().values.boolean(parameter)
    }

    fn string(&self, parameter: Parameter) -> String {
        let state = self.state.read();
        state
            .values
            .string(parameter)
            .map(str::to_string)
            .or_else(|| parameter.default_value().map(|value| value.to_string()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn delivery_attempt_count(&self) -> i32 {
        self.integer(Parameter::DeliveryAttemptCount)
    }

    pub fn set_delivery_attempt_count(&self, count: i32) {
        self.store(Parameter::DeliveryAttemptCount, count.into());
    }

    /// Milliseconds between delivery attempts
    #[must_use]
    pub fn delivery_attempt_delay(&self) -> i32 {
        self.integer(Parameter::DeliveryAttemptDelay)
    }

    pub fn set_delivery_attempt_delay(&self, delay_ms: i32) {
        self.store(Parameter::DeliveryAttemptDelay, delay_ms.into());
    }

    /// [`Self::delivery_attempt_delay`] as a duration, zero when negative
    #[must_use]
    pub fn delivery_attempt_delay_duration(&self) -> Duration {
        u64::try_from(self.delivery_attempt_delay()).map_or(Duration::ZERO, Duration::from_millis)
    }

    #[must_use]
    pub fn delivery_bounce_on_failure(&self) -> bool {
        self.boolean(Parameter::DeliveryBounceOnFailure)
    }

    pub fn set_delivery_bounce_on_failure(&self, bounce: bool) {
        self.store(Parameter::DeliveryBounceOnFailure, bounce.into());
    }

    #[must_use]
    pub fn delivery_debug(&self) -> bool {
        self.boolean(Parameter::DeliveryDebug)
    }

    pub fn set_delivery_debug(&self, debug: bool) {
        self.store(Parameter::DeliveryDebug, debug.into());
    }

    /// Milliseconds a mail may stay queued, negative for no limit
    #[must_use]
    pub fn delivery_expiry(&self) -> i64 {
        self.long(Parameter::DeliveryExpiry)
    }

    pub fn set_delivery_expiry(&self, expiry_ms: i64) {
        self.store(Parameter::DeliveryExpiry, expiry_ms.into());
    }

    /// [`Self::delivery_expiry`] as a duration, `None` when mails never expire
    #[must_use]
    pub fn expiry_duration(&self) -> Option<Duration> {
        u64::try_from(self.delivery_expiry())
            .ok()
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn delivery_threads_active_max(&self) -> i32 {
        self.integer(Parameter::DeliveryThreadsActiveMax)
    }

    pub fn set_delivery_threads_active_max(&self, max: i32) {
        self.store(Parameter::DeliveryThreadsActiveMax, max.into());
    }

    #[must_use]
    pub fn delivery_threads_idle_max(&self) -> i32 {
        self.integer(Parameter::DeliveryThreadsIdleMax)
    }

    pub fn set_delivery_threads_idle_max(&self, max: i32) {
        self.store(Parameter::DeliveryThreadsIdleMax, max.into());
    }

    /// SMTP socket timeout in milliseconds
    #[must_use]
    pub fn delivery_timeout(&self) -> i32 {
        self.integer(Parameter::DeliveryTimeout)
    }

    pub fn set_delivery_timeout(&self, timeout_ms: i32) {
        self.store(Parameter::DeliveryTimeout, timeout_ms.into());
    }

    #[must_use]
    pub fn encoding(&self) -> String {
        self.string(Parameter::Encoding)
    }

    pub fn set_encoding(&self, encoding: impl Into<String>) {
        self.store(Parameter::Encoding, ParameterValue::String(encoding.into()));
    }

    #[must_use]
    pub fn hostname(&self) -> String {
        self.string(Parameter::Hostname)
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        self.store(Parameter::Hostname, ParameterValue::String(hostname.into()));
    }

    #[must_use]
    pub fn logger_name(&self) -> String {
        self.string(Parameter::LoggerName)
    }

    pub fn set_logger_name(&self, name: impl Into<String>) {
        self.store(Parameter::LoggerName, ParameterValue::String(name.into()));
    }

    #[must_use]
    pub fn logger_prefix(&self) -> String {
        self.string(Parameter::LoggerPrefix)
    }

    pub fn set_logger_prefix(&self, prefix: impl Into<String>) {
        self.store(Parameter::LoggerPrefix, ParameterValue::String(prefix.into()));
    }

    /// Backend identifier of the mail store
    #[must_use]
    pub fn mail_store_class(&self) -> String {
        self.string(Parameter::MailStoreClass)
    }

    /// Switch the mail store backend. The current instance is dropped and the
    /// next [`Self::mail_store`] resolves the new identifier.
    pub fn set_mail_store_class(&self, class_name: impl Into<String>) {
        self.store(Parameter::MailStoreClass, ParameterValue::String(class_name.into()));
    }

    /// Backend identifier of the queue store
    #[must_use]
    pub fn queue_store_class(&self) -> String {
        self.string(Parameter::QueueStoreClass)
    }

    /// Switch the queue store backend, like [`Self::set_mail_store_class`]
    pub fn set_queue_store_class(&self, class_name: impl Into<String>) {
        self.store(Parameter::QueueStoreClass, ParameterValue::String(class_name.into()));
    }

    #[must_use]
    pub fn postmaster(&self) -> Option<PostmasterAddress> {
        self.state.read().postmaster.clone()
    }

    /// The postmaster address as text, `None` when unset
    #[must_use]
    pub fn postmaster_email(&self) -> Option<String> {
        self.state.read().postmaster.as_ref().map(ToString::to_string)
    }

    /// Set or clear the postmaster address.
    ///
    /// An unparseable address is logged and ignored: the previous address is
    /// kept and no listener is notified.
    pub fn set_postmaster_email(&self, address: Option<&str>) {
        let postmaster = match address.map(PostmasterAddress::parse).transpose() {
            Ok(postmaster) => postmaster,
            Err(error) => {
                registry!(level = WARN, %error, "Keeping the previous postmaster address");
                return;
            }
        };

        self.apply(Parameter::PostmasterEmail, |state| {
            let raw = postmaster
                .as_ref()
                .map(|address| ParameterValue::String(address.to_string()));
            if state.values.set(Parameter::PostmasterEmail, raw).is_err() {
                return false;
            }
            state.postmaster = postmaster;
            true
        });
    }

    /// The snapshot the SMTP transport should use right now
    #[must_use]
    pub fn session(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.state.read().session)
    }

    #[must_use]
    pub fn logger(&self) -> Logger {
        self.state.read().logger.clone()
    }

    /// The mail store for the current `mailstore.class`.
    ///
    /// Falls back to the in-memory baseline if the identifier is unusable;
    /// see [`Self::mail_store_failure`].
    pub fn mail_store(&self) -> Arc<dyn MailStore> {
        let class_name = self.mail_store_class();
        self.resolver.mail_store(&class_name)
    }

    /// Use `store` as the mail store, or re-resolve from `mailstore.class` on
    /// the next access when `None`. Notifies as a `mailstore.class` change.
    pub fn set_mail_store(&self, store: Option<Arc<dyn MailStore>>) {
        {
            let _section = self.sections[Parameter::MailStoreClass.index()].lock();
            self.resolver.set_mail_store(&self.mail_store_class(), store);
        }
        self.notifier.notify(Parameter::MailStoreClass.name());
    }

    /// The queue store for the current `queuestore.class`
    pub fn queue_store(&self) -> Arc<dyn QueueStore> {
        let class_name = self.queue_store_class();
        self.resolver.queue_store(&class_name)
    }

    /// Use `store` as the queue store, like [`Self::set_mail_store`]
    pub fn set_queue_store(&self, store: Option<Arc<dyn QueueStore>>) {
        {
            let _section = self.sections[Parameter::QueueStoreClass.index()].lock();
            self.resolver.set_queue_store(&self.queue_store_class(), store);
        }
        self.notifier.notify(Parameter::QueueStoreClass.name());
    }

    /// Why the last mail store resolution fell back to the baseline
    #[must_use]
    pub fn mail_store_failure(&self) -> Option<Arc<ConfigError>> {
        self.resolver.mail_store_failure()
    }

    #[must_use]
    pub fn queue_store_failure(&self) -> Option<Arc<ConfigError>> {
        self.resolver.queue_store_failure()
    }

    /// Make a mail store backend available under `identifier`
    pub fn register_mail_store<F>(&self, identifier: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn MailStore>> + Send + Sync + 'static,
    {
        self.resolver
            .with_backends(|backends| backends.register_mail_store(identifier, constructor));
    }

    /// Make a queue store backend available under `identifier`
    pub fn register_queue_store<F>(&self, identifier: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn QueueStore>> + Send + Sync + 'static,
    {
        self.resolver
            .with_backends(|backends| backends.register_queue_store(identifier, constructor));
    }

    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.notifier.add_listener(listener);
    }

    /// Returns `false` if `listener` was not registered
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) -> bool {
        self.notifier.remove_listener(listener)
    }

    /// Current value of any parameter, known or extension
    #[must_use]
    pub fn property(&self, name: &str) -> Option<ParameterValue> {
        let state = self.state.read();
        match Parameter::from_name(name) {
            Some(parameter) => state.values.get(parameter).cloned(),
            None => state.extensions.get(name).cloned(),
        }
    }

    /// Set any parameter by name.
    ///
    /// Known parameters go through their typed setter; a string is coerced to
    /// the declared type first and an integer is widened for long parameters.
    /// Anything that still does not fit is logged and ignored. Other names are
    /// kept as extension properties, stored as given and without notification.
    pub fn set_property(&self, name: &str, value: impl Into<ParameterValue>) {
        let value = value.into();

        let Some(parameter) = Parameter::from_name(name) else {
            registry!(name, "Storing extension property");
            self.state.write().extensions.insert(name.to_string(), value);
            return;
        };

        let value = match value {
            ParameterValue::String(raw) if parameter.kind() != ParameterKind::String => {
                match parameter.kind().coerce(name, &raw) {
                    Ok(value) => value,
                    Err(error) => {
                        registry!(level = WARN, %error, "Ignoring property");
                        return;
                    }
                }
            }
            ParameterValue::Integer(number) if parameter.kind() == ParameterKind::Long => {
                ParameterValue::Long(i64::from(number))
            }
            value => value,
        };

        if parameter == Parameter::PostmasterEmail {
            match value {
                ParameterValue::String(address) => self.set_postmaster_email(Some(&address)),
                other => registry!(level = WARN, value = %other, "Ignoring non-string postmaster address"),
            }
            return;
        }

        self.store(parameter, value);
    }
}
