#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use aspirin_config::{
    ChangeListener, ConfigError, Configuration, Overrides, Parameter, ParameterKind,
    ParameterValue,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn isolated() -> Configuration {
    Configuration::builder()
        .system_source(Overrides::new())
        .debug_probe(|| true)
        .build()
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl ChangeListener for Recorder {
    fn configuration_changed(&self, parameter: &str) -> anyhow::Result<()> {
        self.seen.lock().push(parameter.to_string());
        Ok(())
    }
}

fn recorded(config: &Configuration) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());
    config.add_listener(recorder.clone());
    recorder
}

#[test]
fn test_every_parameter_starts_at_its_default() {
    let config = isolated();

    for parameter in Parameter::ALL {
        assert_eq!(
            config.property(parameter.name()),
            parameter.default_value(),
            "{parameter}"
        );
    }

    assert_eq!(config.delivery_attempt_count(), 3);
    assert_eq!(config.delivery_attempt_delay(), 300_000);
    assert!(config.delivery_bounce_on_failure());
    assert!(!config.delivery_debug());
    assert_eq!(config.delivery_expiry(), -1);
    assert_eq!(config.delivery_threads_active_max(), 3);
    assert_eq!(config.delivery_threads_idle_max(), 3);
    assert_eq!(config.delivery_timeout(), 30_000);
    assert_eq!(config.encoding(), "UTF-8");
    assert_eq!(config.hostname(), "localhost");
    assert_eq!(config.logger_name(), "Aspirin");
    assert_eq!(config.logger_prefix(), "Aspirin ");
    assert_eq!(config.mail_store_class(), aspirin_config::BASELINE_MAIL_STORE);
    assert_eq!(config.queue_store_class(), aspirin_config::BASELINE_QUEUE_STORE);
    assert_eq!(config.postmaster(), None);
}

#[test]
fn test_uncoercible_overrides_fall_back_to_defaults() {
    let typed: Vec<_> = Parameter::ALL
        .into_iter()
        .filter(|parameter| parameter.kind() != ParameterKind::String)
        .collect();
    assert_eq!(typed.len(), 8);

    let overrides: Overrides = typed
        .iter()
        .map(|parameter| (parameter.name(), "not-a-value"))
        .collect();

    let config = isolated();
    config.set_delivery_attempt_count(12);
    let report = config.init(&overrides);

    assert_eq!(report.errors().len(), typed.len());
    for (parameter, error) in typed.iter().zip(report.errors()) {
        match error {
            ConfigError::TypeCoercion {
                parameter: name,
                expected,
                ..
            } => {
                assert_eq!(name, parameter.name());
                assert_eq!(*expected, parameter.kind());
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(config.property(parameter.name()), parameter.default_value());
    }
    assert_eq!(config.delivery_attempt_count(), 3);
}

#[test]
fn test_init_coerces_valid_overrides() {
    let config = isolated();

    let report = config.init(
        &Overrides::from_ron(
            r#"{
                "delivery.attempt.count": 5,
                "delivery.expiry": 86400000,
                "delivery.bounce-on-failure": "FALSE",
                "hostname": "mx.example.com",
                "postmaster.email": "Postmaster <postmaster@example.com>",
            }"#,
        )
        .unwrap(),
    );

    assert!(report.is_clean(), "{:?}", report.errors());
    assert_eq!(config.delivery_attempt_count(), 5);
    assert_eq!(config.delivery_expiry(), 86_400_000);
    assert!(!config.delivery_bounce_on_failure());
    assert_eq!(config.session().smtp_host, "mx.example.com");
    assert_eq!(
        config.postmaster().map(|address| address.address().to_string()),
        Some("postmaster@example.com".to_string())
    );
}

#[test]
fn test_init_does_not_notify() {
    let config = isolated();
    let recorder = recorded(&config);

    config.init(&Overrides::new().with("hostname", "mx.example.com"));

    assert!(recorder.seen.lock().is_empty());
}

#[test]
fn test_session_parameters_rebuild_exactly_once() {
    let config = isolated();

    let before = config.session();
    config.set_hostname("mx.example.com");
    let after = config.session();
    assert_eq!(after.revision, before.revision + 1);
    assert_eq!(after.smtp_host, "mx.example.com");
    assert_eq!(after.smtp_local_host, "mx.example.com");

    config.set_encoding("ISO-8859-1");
    assert_eq!(config.session().mime_charset, "ISO-8859-1");

    config.set_delivery_timeout(5_000);
    let session = config.session();
    assert_eq!(session.connect_timeout_ms, 5_000);
    assert_eq!(session.io_timeout_ms, 5_000);

    config.set_delivery_debug(true);
    let session = config.session();
    assert!(session.debug);
    assert_eq!(session.revision, before.revision + 4);
}

#[test]
fn test_other_parameters_leave_session_alone() {
    let config = isolated();
    let before = config.session();

    config.set_delivery_attempt_count(7);
    config.set_delivery_attempt_delay(1_000);
    config.set_delivery_bounce_on_failure(false);
    config.set_delivery_expiry(60_000);
    config.set_delivery_threads_active_max(10);
    config.set_delivery_threads_idle_max(2);
    config.set_logger_name("Relay");
    config.set_logger_prefix("[relay] ");
    config.set_mail_store_class(aspirin_config::BASELINE_MAIL_STORE);
    config.set_queue_store_class(aspirin_config::BASELINE_QUEUE_STORE);
    config.set_postmaster_email(Some("a@b.com"));

    assert!(Arc::ptr_eq(&before, &config.session()));
}

#[test]
fn test_each_setter_notifies_once_with_its_name() {
    let config = isolated();
    let recorder = recorded(&config);

    config.set_delivery_attempt_count(4);
    config.set_delivery_attempt_delay(1_000);
    config.set_delivery_bounce_on_failure(false);
    config.set_delivery_debug(true);
    config.set_delivery_expiry(1);
    config.set_delivery_threads_active_max(4);
    config.set_delivery_threads_idle_max(4);
    config.set_delivery_timeout(4);
    config.set_encoding("US-ASCII");
    config.set_hostname("mx.example.com");
    config.set_logger_name("Relay");
    config.set_logger_prefix("> ");
    config.set_mail_store_class(aspirin_config::BASELINE_MAIL_STORE);
    config.set_postmaster_email(Some("a@b.com"));
    config.set_queue_store_class(aspirin_config::BASELINE_QUEUE_STORE);

    let expected: Vec<_> = Parameter::ALL
        .into_iter()
        .map(|parameter| parameter.name().to_string())
        .collect();
    assert_eq!(*recorder.seen.lock(), expected);
}

#[test]
fn test_removed_listener_misses_later_changes() {
    let config = isolated();
    let kept = recorded(&config);
    let removed = Arc::new(Recorder::default());
    let handle: Arc<dyn ChangeListener> = removed.clone();
    config.add_listener(Arc::clone(&handle));

    config.set_hostname("one.example.com");
    assert!(config.remove_listener(&handle));
    config.set_hostname("two.example.com");

    assert_eq!(*removed.seen.lock(), vec!["hostname".to_string()]);
    assert_eq!(kept.seen.lock().len(), 2);
}

#[test]
fn test_failing_listener_does_not_reach_the_setter() {
    let config = isolated();
    config.add_listener(Arc::new(|_: &str| -> anyhow::Result<()> {
        anyhow::bail!("collaborator offline")
    }));
    config.add_listener(Arc::new(|_: &str| -> anyhow::Result<()> {
        panic!("collaborator bug")
    }));
    let recorder = recorded(&config);

    config.set_delivery_attempt_count(8);

    assert_eq!(config.delivery_attempt_count(), 8);
    assert_eq!(*recorder.seen.lock(), vec!["delivery.attempt.count".to_string()]);
}

#[test]
fn test_listener_sees_value_and_session_together() {
    let config = Arc::new(isolated());
    let observed = Arc::new(Mutex::new(None));
    {
        let weak = Arc::downgrade(&config);
        let observed = Arc::clone(&observed);
        config.add_listener(Arc::new(move |parameter: &str| -> anyhow::Result<()> {
            if parameter == "hostname"
                && let Some(config) = weak.upgrade()
            {
                *observed.lock() = Some((config.hostname(), config.session().smtp_host.clone()));
            }
            Ok(())
        }));
    }

    config.set_hostname("mx.example.com");

    assert_eq!(
        *observed.lock(),
        Some(("mx.example.com".to_string(), "mx.example.com".to_string()))
    );
}

#[test]
fn test_listener_may_change_another_parameter() {
    let config = Arc::new(isolated());
    {
        let weak = Arc::downgrade(&config);
        config.add_listener(Arc::new(move |parameter: &str| -> anyhow::Result<()> {
            if parameter == "delivery.threads.active.max"
                && let Some(config) = weak.upgrade()
            {
                config.set_delivery_threads_idle_max(config.delivery_threads_active_max());
            }
            Ok(())
        }));
    }

    config.set_delivery_threads_active_max(9);

    assert_eq!(config.delivery_threads_idle_max(), 9);
}

#[test]
fn test_listener_setting_parameters_does_not_block_init() {
    let config = Arc::new(isolated());
    let barrier = Arc::new(Barrier::new(2));
    {
        let weak = Arc::downgrade(&config);
        let barrier = Arc::clone(&barrier);
        config.add_listener(Arc::new(move |parameter: &str| -> anyhow::Result<()> {
            if parameter == "hostname"
                && let Some(config) = weak.upgrade()
            {
                barrier.wait();
                thread::sleep(Duration::from_millis(300));
                config.set_encoding("US-ASCII");
            }
            Ok(())
        }));
    }
    let (done, finished) = mpsc::channel();

    let setter = {
        let config = Arc::clone(&config);
        let done = done.clone();
        thread::spawn(move || {
            config.set_hostname("mx.example.com");
            done.send("setter").unwrap();
        })
    };

    barrier.wait();
    let initialiser = {
        let config = Arc::clone(&config);
        thread::spawn(move || {
            config.init(&Overrides::new());
            done.send("init").unwrap();
        })
    };

    let mut completed: Vec<_> = (0..2)
        .map_while(|_| finished.recv_timeout(Duration::from_secs(5)).ok())
        .collect();
    completed.sort_unstable();
    assert_eq!(completed, vec!["init", "setter"]);

    setter.join().unwrap();
    initialiser.join().unwrap();
}

#[test]
fn test_invalid_postmaster_keeps_previous_and_is_silent() {
    let config = isolated();
    config.set_postmaster_email(Some("a@b.com"));
    let recorder = recorded(&config);

    config.set_postmaster_email(Some("not-an-address"));

    assert_eq!(config.postmaster_email().as_deref(), Some("a@b.com"));
    assert!(recorder.seen.lock().is_empty());
}

#[test]
fn test_valid_postmaster_is_resolvable_and_notifies_once() {
    let config = isolated();
    let recorder = recorded(&config);

    config.set_postmaster_email(Some("a@b.com"));

    let postmaster = config.postmaster().expect("postmaster set");
    assert_eq!(postmaster.address(), "a@b.com");
    assert_eq!(postmaster.domain(), "b.com");
    assert_eq!(
        config.property("postmaster.email"),
        Some(ParameterValue::String("a@b.com".to_string()))
    );
    assert_eq!(*recorder.seen.lock(), vec!["postmaster.email".to_string()]);
}

#[test]
fn test_concurrent_setters_on_distinct_parameters() {
    const ROUNDS: i32 = 200;
    let parameters = [
        Parameter::DeliveryAttemptCount,
        Parameter::DeliveryAttemptDelay,
        Parameter::DeliveryThreadsActiveMax,
        Parameter::DeliveryThreadsIdleMax,
        Parameter::DeliveryTimeout,
    ];

    let config = Arc::new(isolated());
    let notifications = Arc::new(AtomicUsize::new(0));
    {
        let notifications = Arc::clone(&notifications);
        config.add_listener(Arc::new(move |_: &str| -> anyhow::Result<()> {
            notifications.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));
    }
    let barrier = Arc::new(Barrier::new(parameters.len() + 1));

    let writers: Vec<_> = parameters
        .into_iter()
        .zip(1..)
        .map(|(parameter, base)| {
            let config = Arc::clone(&config);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    config.set_property(parameter.name(), base * 1_000 + round);
                }
            })
        })
        .collect();

    let reader = {
        let config = Arc::clone(&config);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..ROUNDS {
                let session = config.session();
                assert_eq!(session.connect_timeout_ms, session.io_timeout_ms);
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    for (parameter, base) in parameters.into_iter().zip(1..) {
        assert_eq!(
            config.property(parameter.name()),
            Some(ParameterValue::Integer(base * 1_000 + ROUNDS - 1)),
            "{parameter}"
        );
    }
    assert_eq!(
        config.session().connect_timeout_ms,
        u64::try_from(5 * 1_000 + ROUNDS - 1).unwrap()
    );
    assert_eq!(
        notifications.load(Ordering::Relaxed),
        parameters.len() * usize::try_from(ROUNDS).unwrap()
    );
}

#[test]
fn test_durations() {
    let config = isolated();

    config.set_delivery_expiry(90_000);
    config.set_delivery_attempt_delay(-5);

    assert_eq!(
        config.expiry_duration(),
        Some(Duration::from_secs(90))
    );
    assert_eq!(config.delivery_attempt_delay_duration(), Duration::ZERO);
}

#[test]
fn test_global_is_created_once() {
    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| std::ptr::from_ref(Configuration::global()) as usize))
        .collect();

    let addresses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
}
