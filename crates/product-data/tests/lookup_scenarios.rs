//! End-to-end lookup scenarios against scripted sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ciclik_product_data::{
    AdapterOutcome, CircuitState, Gtin, LookupConfig, LookupError, ManualClock, ProductData,
    ProductLookupService, ProductSource, RateLimit,
};

#[derive(Clone)]
enum Behavior {
    Found(&'static str),
    NotFound,
    Transient,
    /// Answers only after the given real delay.
    Slow(Duration, &'static str),
    /// Never answers within any sensible timeout.
    Hang,
    /// Slowly finds the one given GTIN; unreachable for every other.
    SlowOnlyFor(&'static str, Duration, &'static str),
}

struct ScriptedSource {
    id: &'static str,
    priority: u8,
    behavior: Mutex<Behavior>,
    call_count: AtomicUsize,
}

impl ScriptedSource {
    fn new(id: &'static str, priority: u8, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            priority,
            behavior: Mutex::new(behavior),
            call_count: AtomicUsize::new(0),
        })
    }

    fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

fn product(gtin: &Gtin, description: &str) -> AdapterOutcome {
    AdapterOutcome::Found(ProductData {
        gtin: gtin.to_string(),
        description: description.to_string(),
        ..Default::default()
    })
}

#[async_trait]
impl ProductSource for ScriptedSource {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6000,
            burst_capacity: 100,
            max_concurrency: 8,
        }
    }

    async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();

        match behavior {
            Behavior::Found(description) => product(gtin, description),
            Behavior::NotFound => AdapterOutcome::NotFound,
            Behavior::Transient => AdapterOutcome::TransientError("connection reset".to_string()),
            Behavior::Slow(delay, description) => {
                tokio::time::sleep(delay).await;
                product(gtin, description)
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                AdapterOutcome::NotFound
            }
            Behavior::SlowOnlyFor(known, delay, description) => {
                if gtin.as_str() != known {
                    return AdapterOutcome::TransientError("connection reset".to_string());
                }
                tokio::time::sleep(delay).await;
                product(gtin, description)
            }
        }
    }
}

fn config() -> LookupConfig {
    LookupConfig {
        failure_threshold: 2,
        cooldown: Duration::from_secs(60),
        cache_ttl: Duration::from_secs(3600),
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        request_timeout: Duration::from_millis(50),
        ..LookupConfig::default()
    }
}

fn service_with(
    config: LookupConfig,
    sources: &[&Arc<ScriptedSource>],
) -> (Arc<ManualClock>, ProductLookupService) {
    let clock = Arc::new(ManualClock::default());
    let mut builder = ProductLookupService::builder(config).clock(clock.clone());
    for source in sources {
        builder = builder.source((*source).clone());
    }
    (clock, builder.build().unwrap())
}

fn service(sources: &[&Arc<ScriptedSource>]) -> (Arc<ManualClock>, ProductLookupService) {
    service_with(config(), sources)
}

#[tokio::test]
async fn test_cache_idempotence() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Found("Sabonete 90g"));
    let (_, service) = service(&[&a]);

    let first = service.lookup("7891000100103").await.unwrap();
    let second = service.lookup("7891000100103").await.unwrap();

    assert_eq!(a.calls(), 1);
    assert!(second.from_cache);
    assert_eq!(second.product, first.product);
    assert_eq!(second.source, first.source);
    assert_eq!(second.message, first.message);
}

#[tokio::test]
async fn test_cache_expiry_triggers_fresh_lookup() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Found("Sabonete 90g"));
    let (clock, service) = service(&[&a]);

    service.lookup("7891000100103").await.unwrap();
    clock.advance(Duration::from_secs(3601));

    let result = service.lookup("7891000100103").await.unwrap();
    assert!(!result.from_cache);
    assert_eq!(a.calls(), 2);
    assert_eq!(service.stats().cache.total, 1);
}

#[tokio::test]
async fn test_breaker_opens_under_load() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Transient);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::Transient);
    let (_, service) = service(&[&a, &b]);

    for _ in 0..2 {
        let err = service.lookup("7891000100103").await.unwrap_err();
        assert_eq!(err, LookupError::SourcesUnavailable { attempted: 2 });
    }
    let calls_before = a.calls() + b.calls();

    for gtin in ["7891000100103", "7896629642331", "78912939"] {
        let err = service.lookup(gtin).await.unwrap_err();
        assert!(matches!(err, LookupError::CircuitOpen { .. }));
    }

    assert_eq!(a.calls() + b.calls(), calls_before);
    assert!(service.stats().circuit_breaker.is_open);
    assert_eq!(service.stats().cache.total, 0);
}

#[tokio::test]
async fn test_half_open_trial_success_closes_breaker() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Transient);
    let (clock, service) = service_with(
        LookupConfig {
            request_timeout: Duration::from_secs(5),
            ..config()
        },
        &[&a],
    );

    for _ in 0..2 {
        service.lookup("7891000100103").await.unwrap_err();
    }
    assert_eq!(service.stats().circuit_breaker.state, CircuitState::Open);

    clock.advance(Duration::from_secs(60));
    a.set(Behavior::Slow(Duration::from_millis(100), "Sabonete 90g"));

    let (trial, rejected) = tokio::join!(service.lookup("7891000100103"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.lookup("7896629642331").await
    });

    assert!(trial.unwrap().found);
    assert!(matches!(rejected, Err(LookupError::CircuitOpen { .. })));

    let stats = service.stats();
    assert_eq!(stats.circuit_breaker.state, CircuitState::Closed);
    assert_eq!(stats.circuit_breaker.failures, 0);
}

#[tokio::test]
async fn test_half_open_trial_failure_reopens_breaker() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Transient);
    let (clock, service) = service(&[&a]);

    for _ in 0..2 {
        service.lookup("7891000100103").await.unwrap_err();
    }
    clock.advance(Duration::from_secs(60));

    let err = service.lookup("7891000100103").await.unwrap_err();
    assert_eq!(err, LookupError::SourcesUnavailable { attempted: 1 });

    let err = service.lookup("7891000100103").await.unwrap_err();
    assert_eq!(
        err,
        LookupError::CircuitOpen {
            retry_after: Duration::from_secs(60)
        }
    );
    assert_eq!(service.stats().circuit_breaker.state, CircuitState::Open);
}

#[tokio::test]
async fn test_late_success_does_not_close_open_breaker() {
    let a = ScriptedSource::new(
        "ProviderA",
        1,
        Behavior::SlowOnlyFor("22222222", Duration::from_millis(200), "Sabonete 90g"),
    );
    let (_, service) = service_with(
        LookupConfig {
            failure_threshold: 1,
            max_attempts: 1,
            request_timeout: Duration::from_secs(5),
            ..config()
        },
        &[&a],
    );

    // Admitted while the breaker is still closed
    let slow = tokio::spawn({
        let service = service.clone();
        async move { service.lookup("22222222").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = service.lookup("11111111").await.unwrap_err();
    assert_eq!(err, LookupError::SourcesUnavailable { attempted: 1 });
    assert_eq!(service.stats().circuit_breaker.state, CircuitState::Open);

    let late = slow.await.unwrap().unwrap();
    assert!(late.found);

    assert_eq!(service.stats().circuit_breaker.state, CircuitState::Open);
    let err = service.lookup("33333333").await.unwrap_err();
    assert_eq!(
        err,
        LookupError::CircuitOpen {
            retry_after: Duration::from_secs(60)
        }
    );
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_partial_miss_reports_unavailable_sources() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Transient);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::NotFound);
    let (_, service) = service(&[&a, &b]);

    let result = service.lookup("7896629642331").await.unwrap();

    assert!(!result.found);
    assert_eq!(result.message, "Product not found; 1 source(s) unavailable");
    assert_eq!(service.stats().cache.total, 0);
}

#[tokio::test]
async fn test_fallback_ordering() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::NotFound);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::Found("Garrafa PET 2L"));
    let c = ScriptedSource::new("ProviderC", 3, Behavior::Found("Other"));
    let (_, service) = service(&[&c, &a, &b]);

    let result = service.lookup("7896629642331").await.unwrap();

    assert_eq!(result.source.as_deref(), Some("ProviderB"));
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 0);
}

#[tokio::test]
async fn test_retry_exhaustion_then_next_source() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Transient);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::Found("Garrafa PET 2L"));
    let (clock, service) = service(&[&a, &b]);

    let result = service.lookup("7896629642331").await.unwrap();

    assert!(result.found);
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_collapses_concurrent_lookups() {
    let a = ScriptedSource::new(
        "ProviderA",
        1,
        Behavior::Slow(Duration::from_millis(200), "Garrafa PET 2L"),
    );
    let (_, service) = service_with(
        LookupConfig {
            request_timeout: Duration::from_secs(5),
            ..config()
        },
        &[&a],
    );

    let lookups = (0..10).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.lookup("7896629642331").await })
    });
    let results = futures::future::join_all(lookups).await;

    assert_eq!(a.calls(), 1);
    let results: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    assert_eq!(results.len(), 10);
    for result in &results {
        assert!(result.found);
        assert_eq!(result.product, results[0].product);
    }
}

#[tokio::test]
async fn test_lookup_completes_after_caller_gives_up() {
    let a = ScriptedSource::new(
        "ProviderA",
        1,
        Behavior::Slow(Duration::from_millis(100), "Garrafa PET 2L"),
    );
    let (_, service) = service_with(
        LookupConfig {
            request_timeout: Duration::from_secs(5),
            ..config()
        },
        &[&a],
    );

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), service.lookup("7896629642331")).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.stats().cache.total, 1);

    let result = service.lookup("7896629642331").await.unwrap();
    assert!(result.from_cache);
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_scenario_first_source_down_second_knows_product() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Hang);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::Found("Garrafa PET 2L"));
    let c = ScriptedSource::new("ProviderC", 3, Behavior::NotFound);
    let (_, service) = service(&[&a, &b, &c]);

    let result = service.lookup("7896629642331").await.unwrap();

    assert!(result.found);
    assert_eq!(result.source.as_deref(), Some("ProviderB"));
    assert_eq!(
        result.product.as_ref().map(|p| p.description.as_str()),
        Some("Garrafa PET 2L")
    );
    assert_eq!(a.calls(), 3);
    assert_eq!(c.calls(), 0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["encontrado"], true);
    assert_eq!(json["produto"]["descricao"], "Garrafa PET 2L");
    assert_eq!(json["source"], "ProviderB");

    let again = service.lookup("7896629642331").await.unwrap();
    assert!(again.from_cache);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_scenario_unknown_gtin_is_cached_without_failure() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::NotFound);
    let b = ScriptedSource::new("ProviderB", 2, Behavior::NotFound);
    let c = ScriptedSource::new("ProviderC", 3, Behavior::NotFound);
    let (_, service) = service(&[&a, &b, &c]);

    let result = service.lookup("0000000000").await.unwrap();

    assert!(!result.found);
    assert!(!result.message.is_empty());
    assert!(result.product.is_none());

    let stats = service.stats();
    assert_eq!(stats.cache.total, 1);
    assert_eq!(stats.circuit_breaker.failures, 0);
    assert_eq!(stats.circuit_breaker.state, CircuitState::Closed);

    let again = service.lookup("0000000000").await.unwrap();
    assert!(again.from_cache);
    assert_eq!(again.message, result.message);
    assert_eq!(a.calls() + b.calls() + c.calls(), 3);
}

#[tokio::test]
async fn test_scenario_invalid_input_leaves_cache_untouched() {
    let a = ScriptedSource::new("ProviderA", 1, Behavior::Found("Sabonete 90g"));
    let (_, service) = service(&[&a]);

    service.lookup("7891000100103").await.unwrap();
    let before = service.stats().cache.total;

    let err = service.lookup("abc").await.unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(err, LookupError::InvalidGtin { .. }));
    assert_eq!(service.stats().cache.total, before);
    assert_eq!(a.calls(), 1);
}
