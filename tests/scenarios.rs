//! End-to-end behavior through the public API

use ingestwatch::alerts::{
    AlertEvent, AlertLevel, AlertManager, AlertManagerConfig, AlertRule, Condition,
    NotificationManager,
};
use ingestwatch::clock::{Clock, ManualClock};
use ingestwatch::context::ResilienceContext;
use ingestwatch::error::{ExecutionError, OperationError};
use ingestwatch::health::HealthStatus;
use ingestwatch::metrics::{MetricPoint, MetricStore, MetricStoreConfig};
use ingestwatch::resilience::{BreakerConfig, CircuitState, RetryPolicy};
use ingestwatch::services::{Monitor, MonitorConfig};
use ingestwatch::storage::{JsonLinesStore, StoredRecord};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn monitor_with(clock: Arc<ManualClock>, rules: Vec<AlertRule>) -> Monitor {
    let ctx = ResilienceContext::with_clock(
        BreakerConfig::default(),
        MetricStoreConfig::default(),
        clock.clone(),
    );
    let alerts = AlertManager::new(AlertManagerConfig::default(), clock)
        .with_notifier(NotificationManager::new());
    Monitor::new(MonitorConfig::default(), ctx, RetryPolicy::default(), alerts).with_rules(rules)
}

fn error_rate_rule() -> AlertRule {
    AlertRule::new(
        "errorRate",
        Condition::Above,
        0.05,
        AlertLevel::Warning,
        "Error rate above 5%",
    )
    .with_window(Duration::from_secs(300))
}

async fn fail(monitor: &Monitor, calls: &AtomicU32) -> Result<(), ExecutionError> {
    monitor
        .execute(
            "fetch-x",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(OperationError::Network("connection refused".to_string())) }
            },
            Some(&RetryPolicy::no_retry()),
        )
        .await
}

#[tokio::test(start_paused = true)]
async fn fifth_failure_opens_breaker_and_sixth_call_is_rejected() {
    let clock = Arc::new(ManualClock::starting_now());
    let monitor = monitor_with(clock, Vec::new());
    let calls = AtomicU32::new(0);

    for i in 0..4 {
        assert!(fail(&monitor, &calls).await.is_err());
        assert_eq!(
            monitor.circuit_status()["fetch-x"].state,
            CircuitState::Closed,
            "still closed after {} failures",
            i + 1
        );
    }

    assert!(matches!(
        fail(&monitor, &calls).await,
        Err(ExecutionError::ExhaustedRetries { attempts: 1, .. })
    ));
    assert_eq!(monitor.circuit_status()["fetch-x"].state, CircuitState::Open);

    let result = fail(&monitor, &calls).await;
    assert!(matches!(
        result,
        Err(ExecutionError::CircuitOpen { failures: 5, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn breaker_recovers_through_half_open() {
    let clock = Arc::new(ManualClock::starting_now());
    let monitor = monitor_with(clock.clone(), Vec::new());
    let calls = AtomicU32::new(0);

    for _ in 0..5 {
        let _ = fail(&monitor, &calls).await;
    }

    // Exactly the reset timeout is not enough
    clock.advance(Duration::from_secs(60));
    assert!(matches!(
        fail(&monitor, &calls).await,
        Err(ExecutionError::CircuitOpen { .. })
    ));

    clock.advance(Duration::from_secs(1));
    assert!(fail(&monitor, &calls).await.is_err());
    assert_eq!(monitor.circuit_status()["fetch-x"].state, CircuitState::Open);

    clock.advance(Duration::from_secs(61));
    for _ in 0..3 {
        let value = monitor
            .execute("fetch-x", || async { Ok::<_, OperationError>(1) }, None)
            .await;
        assert_eq!(value, Ok(1));
    }

    let status = &monitor.circuit_status()["fetch-x"];
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failures, 0);
}

#[test]
fn retry_schedule_doubles_then_clamps() {
    let policy = RetryPolicy::default();
    let delays: Vec<u64> = (0..7)
        .map(|attempt| policy.delay_for_attempt(attempt).as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
}

#[test]
fn series_keeps_most_recent_points() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = MetricStore::new(
        MetricStoreConfig {
            max_points_per_series: 3,
            ..MetricStoreConfig::default()
        },
        clock.clone(),
    );

    for value in 0..10 {
        store.record("fetched", f64::from(value), None);
        clock.advance(Duration::from_secs(1));
    }

    let values: Vec<f64> = store
        .history("fetched", Duration::from_secs(3600))
        .iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(values, vec![7.0, 8.0, 9.0]);
}

#[tokio::test]
async fn error_rate_triggers_resolves_and_honors_cooldown() {
    let clock = Arc::new(ManualClock::starting_now());
    let monitor = monitor_with(clock.clone(), vec![error_rate_rule()]);
    let mut events = monitor.subscribe();

    for value in [0.05, 0.06, 0.07] {
        monitor.record_metric("errorRate", value, None);
    }
    let report = monitor.tick().await;
    assert_eq!(report.triggered.len(), 1);
    assert_eq!(monitor.active_alerts().len(), 1);
    assert!(matches!(events.recv().await, Ok(AlertEvent::Triggered(_))));

    // Window now only holds lower values
    clock.advance(Duration::from_secs(301));
    for value in [0.01, 0.02, 0.03] {
        monitor.record_metric("errorRate", value, None);
    }
    let report = monitor.tick().await;
    assert_eq!(report.resolved.len(), 1);
    assert!(monitor.active_alerts().is_empty());
    assert!(matches!(events.recv().await, Ok(AlertEvent::Resolved(_))));

    // Cooldown is counted from the last trigger, which was 301s ago
    monitor.record_metric("errorRate", 0.9, None);
    monitor.record_metric("errorRate", 0.9, None);
    monitor.record_metric("errorRate", 0.9, None);
    let report = monitor.tick().await;
    assert_eq!(report.triggered.len(), 1);

    let history = monitor.alerts().all_alerts();
    assert_eq!(history.len(), 1, "one entry per rule identity");
    assert!(history[0].is_active());
}

#[tokio::test]
async fn retrigger_within_cooldown_is_suppressed() {
    let clock = Arc::new(ManualClock::starting_now());
    let rule = error_rate_rule().with_window(Duration::from_secs(30));
    let monitor = monitor_with(clock.clone(), vec![rule]);

    monitor.record_metric("errorRate", 0.06, None);
    assert_eq!(monitor.tick().await.triggered.len(), 1);

    clock.advance(Duration::from_secs(60));
    monitor.record_metric("errorRate", 0.02, None);
    assert_eq!(monitor.tick().await.resolved.len(), 1);

    clock.advance(Duration::from_secs(60));
    monitor.record_metric("errorRate", 0.06, None);
    assert!(monitor.tick().await.triggered.is_empty());
    assert!(monitor.active_alerts().is_empty());
}

#[tokio::test]
async fn queue_size_window_width_decides_trigger() {
    let clock = Arc::new(ManualClock::starting_now());
    let wide = AlertRule::new(
        "queueSize",
        Condition::Above,
        1000.0,
        AlertLevel::Warning,
        "Queue backing up",
    )
    .with_window(Duration::from_secs(300));
    let monitor = monitor_with(clock.clone(), vec![wide.clone()]);

    let start = clock.now();
    for (offset, value) in [(0, 50.0), (100, 1200.0), (200, 1300.0)] {
        monitor.context().metrics().insert(
            "queueSize",
            MetricPoint::new(start + Duration::from_secs(offset), value),
        );
    }
    clock.set(start + Duration::from_secs(200));

    let report = monitor.tick().await;
    assert!(report.triggered.is_empty());

    let narrow = AlertRule {
        window: Duration::from_secs(150),
        threshold: 1000.0,
        ..wide
    };
    monitor.remove_alert_rule("queueSize", Condition::Above);
    monitor.add_alert_rule(narrow);

    let report = monitor.tick().await;
    assert_eq!(report.triggered.len(), 1);
    assert_eq!(report.triggered[0].current_value, 1250.0);
}

#[tokio::test]
async fn acknowledge_is_orthogonal_to_resolution() {
    let clock = Arc::new(ManualClock::starting_now());
    let monitor = monitor_with(clock.clone(), vec![error_rate_rule()]);
    let id = error_rate_rule().id();

    monitor.record_metric("errorRate", 0.2, None);
    monitor.tick().await;

    let acked = monitor.acknowledge_alert(&id).unwrap();
    assert!(acked.acknowledged);
    assert!(acked.resolved_at.is_none());

    clock.advance(Duration::from_secs(400));
    monitor.record_metric("errorRate", 0.0, None);
    let report = monitor.tick().await;
    assert_eq!(report.resolved.len(), 1);
    assert!(report.resolved[0].acknowledged);
    assert!(report.resolved[0].resolved_at.is_some());

    assert!(monitor.acknowledge_alert(&id).is_err());
}

#[tokio::test]
async fn health_follows_active_alerts() {
    let clock = Arc::new(ManualClock::starting_now());
    let rules = vec![
        AlertRule::new("a", Condition::Above, 1.0, AlertLevel::Warning, "a"),
        AlertRule::new("b", Condition::Above, 1.0, AlertLevel::Info, "b"),
        AlertRule::new("c", Condition::Above, 1.0, AlertLevel::Error, "c"),
        AlertRule::new("d", Condition::Above, 1.0, AlertLevel::Critical, "d"),
    ];
    let monitor = monitor_with(clock, rules);
    assert_eq!(monitor.health_summary().status, HealthStatus::Healthy);

    monitor.record_metric("a", 2.0, None);
    monitor.record_metric("b", 2.0, None);
    monitor.tick().await;
    assert_eq!(monitor.health_summary().status, HealthStatus::Healthy);

    monitor.record_metric("c", 2.0, None);
    monitor.tick().await;
    let summary = monitor.health_summary();
    assert_eq!(summary.status, HealthStatus::Degraded);
    assert_eq!(summary.active_alerts, 3);
    assert_eq!(summary.metrics["c"], 2.0);

    monitor.record_metric("d", 2.0, None);
    monitor.tick().await;
    let summary = monitor.health_summary();
    assert_eq!(summary.status, HealthStatus::Critical);
    assert_eq!(summary.critical_alerts, 1);
}

#[tokio::test]
async fn warning_and_critical_rules_on_one_metric_fire_independently() {
    let clock = Arc::new(ManualClock::starting_now());
    let warning = error_rate_rule();
    let critical = AlertRule::new(
        "errorRate",
        Condition::Above,
        0.15,
        AlertLevel::Critical,
        "Error rate above 15%",
    );
    let monitor = monitor_with(clock, vec![warning, critical]);

    monitor.record_metric("errorRate", 0.2, None);
    assert_eq!(monitor.tick().await.triggered.len(), 2);

    let active = monitor.active_alerts();
    assert_eq!(active.len(), 2);
    assert!(active.iter().any(|a| a.level == AlertLevel::Critical));
}

fn persisting_monitor(store: Arc<JsonLinesStore>) -> Monitor {
    let clock = Arc::new(ManualClock::starting_now());
    let ctx = ResilienceContext::with_store(
        BreakerConfig::default(),
        MetricStoreConfig::default(),
        clock.clone(),
        store.clone(),
    );
    let alerts = AlertManager::new(AlertManagerConfig::default(), clock)
        .with_notifier(NotificationManager::new())
        .with_store(store);
    Monitor::new(MonitorConfig::default(), ctx, RetryPolicy::default(), alerts)
        .with_rules(vec![error_rate_rule()])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn alerts_and_points_reach_the_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonLinesStore::new(dir.path().join("events.jsonl")));
    let monitor = persisting_monitor(store.clone());

    monitor.record_metric("errorRate", 0.5, None);
    monitor.tick().await;
    assert_eq!(monitor.flush().await, 2);

    let records = store.read_all().unwrap();
    assert!(records
        .iter()
        .any(|r| matches!(r, StoredRecord::Metric { name, .. } if name == "errorRate")));
    assert!(records
        .iter()
        .any(|r| matches!(r, StoredRecord::Alert { alert } if alert.metric == "errorRate")));
}

#[test]
fn last_tick_is_persisted_when_runtime_shuts_down() {
    for _ in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonLinesStore::new(dir.path().join("events.jsonl")));
        let monitor = persisting_monitor(store.clone());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            monitor.record_metric("errorRate", 0.5, None);
            monitor.tick().await;
            monitor.flush().await;
        });
        drop(runtime);

        let records = store.read_all().unwrap();
        assert!(records
            .iter()
            .any(|r| matches!(r, StoredRecord::Alert { alert } if alert.metric == "errorRate")));
    }
}
