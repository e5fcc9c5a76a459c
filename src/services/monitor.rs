//! Evaluation loop monitor
//!
//! Ties the executor, metric store and alert manager together. Each tick pulls
//! metric providers, expires old points, reloads dynamic rules, evaluates every
//! rule over its window and purges old resolved alerts.

use crate::alerts::{
    evaluate, Aggregation, Alert, AlertEvent, AlertManager, AlertRule, Condition, RuleSet,
    RuleSource, Verdict,
};
use crate::context::ResilienceContext;
use crate::error::{AlertError, ExecutionError, OperationError};
use crate::health::HealthSummary;
use crate::metrics::{Metadata, MetricPoint, MetricProvider};
use crate::resilience::{CircuitStatus, Executor, RetryPolicy};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Configuration for the monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    /// Interval between evaluation ticks
    pub tick_interval: Duration,
    /// Aggregation for rules that do not choose one
    pub default_aggregation: Aggregation,
    /// Whether to exit after one tick
    pub single_use: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            default_aggregation: Aggregation::Mean,
            single_use: false,
        }
    }
}

/// What one evaluation tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Metric values pulled from providers
    pub collected: usize,
    /// Points dropped by retention cleanup
    pub expired: usize,
    /// Rules evaluated
    pub evaluated: usize,
    /// Rules whose window was empty
    pub no_data: usize,
    pub triggered: Vec<Alert>,
    pub resolved: Vec<Alert>,
    /// Resolved alerts dropped from memory
    pub purged: usize,
}

/// Monitoring facade and evaluation loop
pub struct Monitor {
    config: MonitorConfig,
    executor: Executor,
    alerts: AlertManager,
    rules: Mutex<RuleSet>,
    providers: Vec<Arc<dyn MetricProvider>>,
    rule_source: Option<Arc<dyn RuleSource>>,
}

impl Monitor {
    /// Create a monitor with no rules or providers
    pub fn new(
        config: MonitorConfig,
        ctx: ResilienceContext,
        policy: RetryPolicy,
        alerts: AlertManager,
    ) -> Self {
        Self {
            config,
            executor: Executor::new(ctx, policy),
            alerts,
            rules: Mutex::new(RuleSet::default()),
            providers: Vec::new(),
            rule_source: None,
        }
    }

    /// Add static rules
    pub fn with_rules(self, rules: Vec<AlertRule>) -> Self {
        {
            let mut set = self.lock_rules();
            for rule in rules {
                set.add(rule);
            }
        }
        self
    }

    /// Pull metrics from `provider` on every tick
    pub fn with_provider(mut self, provider: Arc<dyn MetricProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Reload dynamic rules from `source` on every tick
    pub fn with_rule_source(mut self, source: Arc<dyn RuleSource>) -> Self {
        self.rule_source = Some(source);
        self
    }

    /// Get the monitor configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Shared context
    pub fn context(&self) -> &ResilienceContext {
        self.executor.context()
    }

    /// Alert manager
    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    fn lock_rules(&self) -> MutexGuard<'_, RuleSet> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `call` with breaker, retry and timeout protection
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        call: F,
        policy: Option<&RetryPolicy>,
    ) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.executor.execute(operation, call, policy).await
    }

    /// Run `call` for every item in chunks of `chunk_size`
    pub async fn execute_batch<I, T, F, Fut>(
        &self,
        operation: &str,
        items: &[I],
        chunk_size: usize,
        call: F,
        policy: Option<&RetryPolicy>,
    ) -> Vec<Result<T, ExecutionError>>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.executor
            .execute_batch(operation, items, chunk_size, call, policy)
            .await
    }

    /// Breaker status per operation
    pub fn circuit_status(&self) -> BTreeMap<String, CircuitStatus> {
        self.context().breakers().status()
    }

    /// Force one breaker closed
    pub fn reset_circuit(&self, operation: &str) -> bool {
        self.context().breakers().reset(operation)
    }

    /// Force every breaker closed
    pub fn reset_all_circuits(&self) {
        self.context().breakers().reset_all();
    }

    /// Record a metric value at the current time
    pub fn record_metric(
        &self,
        name: &str,
        value: f64,
        metadata: Option<Metadata>,
    ) -> MetricPoint {
        self.context().metrics().record(name, value, metadata)
    }

    /// Points for `name` within `window` of now
    pub fn metric_history(&self, name: &str, window: Duration) -> Vec<MetricPoint> {
        self.context().metrics().history(name, window)
    }

    /// Latest point of every series
    pub fn current_metrics(&self) -> BTreeMap<String, MetricPoint> {
        self.context().metrics().current()
    }

    /// Unresolved alerts, newest first
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.active_alerts()
    }

    /// Acknowledge an unresolved alert
    pub fn acknowledge_alert(&self, id: &str) -> Result<Alert, AlertError> {
        self.alerts.acknowledge(id)
    }

    /// Add a static rule, replacing one with the same identity
    pub fn add_alert_rule(&self, rule: AlertRule) {
        log::info!("Adding alert rule {}", rule.id());
        self.lock_rules().add(rule);
    }

    /// Remove rules on `metric` with `condition`; returns how many were removed
    ///
    /// Unresolved alerts raised by the removed rules are resolved.
    pub fn remove_alert_rule(&self, metric: &str, condition: Condition) -> usize {
        let (removed, before) = {
            let mut rules = self.lock_rules();
            let before = rules.ids();
            (rules.remove(metric, condition), before)
        };
        log::info!("Removed {} rule(s) for {} {}", removed, metric, condition);
        self.resolve_orphaned(&before);
        removed
    }

    /// Resolve alerts whose rule is in `before` but no longer in the rule set
    fn resolve_orphaned(&self, before: &HashSet<String>) -> Vec<Alert> {
        let after = self.lock_rules().ids();
        before
            .difference(&after)
            .filter_map(|id| {
                let alert = self.alerts.resolve(id)?;
                log::info!("Rule {} no longer exists, resolved its alert", id);
                Some(alert)
            })
            .collect()
    }

    /// Current rules, static first
    pub fn rules(&self) -> Vec<AlertRule> {
        self.lock_rules().rules()
    }

    /// Health derived from active alerts, metrics and breakers
    pub fn health_summary(&self) -> HealthSummary {
        let metrics = self
            .current_metrics()
            .into_iter()
            .map(|(name, point)| (name, point.value))
            .collect();
        HealthSummary::build(
            &self.active_alerts(),
            self.alerts.config().degraded_threshold,
            metrics,
            &self.circuit_status(),
        )
    }

    /// Wait for metric and alert writes still running in the background
    ///
    /// Call before the runtime shuts down so the last tick is persisted.
    pub async fn flush(&self) -> usize {
        let metrics = self.context().metrics().flush().await;
        metrics + self.alerts.flush().await
    }

    /// Subscribe to alert lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts.subscribe()
    }

    /// Execute a single evaluation tick
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let metrics = self.context().metrics();

        for provider in &self.providers {
            match provider.collect().await {
                Ok(values) => report.collected += metrics.record_batch(&values),
                Err(e) => log::warn!("Metric provider '{}' failed: {}", provider.name(), e),
            }
        }

        report.expired = metrics.cleanup_expired();

        if let Some(source) = &self.rule_source {
            match source.load_rules().await {
                Ok(rules) => {
                    log::debug!("Loaded {} rule(s) from {}", rules.len(), source.name());
                    let before = {
                        let mut set = self.lock_rules();
                        let before = set.ids();
                        set.replace_dynamic(rules);
                        before
                    };
                    report.resolved.extend(self.resolve_orphaned(&before));
                }
                Err(e) => log::warn!(
                    "Rule source '{}' failed, keeping previous rules: {}",
                    source.name(),
                    e
                ),
            }
        }

        for rule in self.rules() {
            let points = metrics.history(&rule.metric, rule.window);
            report.evaluated += 1;

            match evaluate(&rule, &points, self.config.default_aggregation) {
                Verdict::NoData => report.no_data += 1,
                Verdict::Breached { value } => {
                    if !self.alerts.cooldown_elapsed(&rule) {
                        log::debug!("Rule {} in cooldown", rule.id());
                        continue;
                    }
                    if let Some(alert) = self.alerts.trigger(&rule, value) {
                        report.triggered.push(alert);
                    }
                }
                Verdict::Clear { .. } => {
                    if let Some(alert) = self.alerts.resolve(&rule.id()) {
                        report.resolved.push(alert);
                    }
                }
            }
        }

        report.purged = self.alerts.purge_resolved();
        report
    }

    /// Run the evaluation loop until `shutdown` completes
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    log::debug!(
                        "Tick: {} evaluated, {} triggered, {} resolved",
                        report.evaluated,
                        report.triggered.len(),
                        report.resolved.len()
                    );

                    if self.config.single_use {
                        log::info!("Single-use mode: exiting after one tick");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertLevel, AlertManagerConfig};
    use crate::clock::ManualClock;
    use crate::error::CollaboratorError;
    use crate::health::HealthStatus;
    use crate::metrics::{MetricStoreConfig, StaticProvider};
    use crate::resilience::BreakerConfig;
    use crate::storage::{MemoryStore, StoredRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn monitor() -> (Monitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let ctx = ResilienceContext::with_clock(
            BreakerConfig::default(),
            MetricStoreConfig::default(),
            clock.clone(),
        );
        let alerts = AlertManager::new(AlertManagerConfig::default(), clock.clone());
        (
            Monitor::new(MonitorConfig::default(), ctx, RetryPolicy::default(), alerts),
            clock,
        )
    }

    fn error_rule() -> AlertRule {
        AlertRule::new(
            "errorRate",
            Condition::Above,
            0.05,
            AlertLevel::Warning,
            "High error rate",
        )
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RuleSource for FlakySource {
        async fn load_rules(&self) -> Result<Vec<AlertRule>, CollaboratorError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![AlertRule::new(
                    "queueSize",
                    Condition::Above,
                    1000.0,
                    AlertLevel::Warning,
                    "Queue",
                )])
            } else {
                Err(CollaboratorError::RuleSource("database offline".to_string()))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.default_aggregation, Aggregation::Mean);
        assert!(!config.single_use);
    }

    #[tokio::test]
    async fn test_tick_triggers_resolves_and_respects_cooldown() {
        let (monitor, clock) = monitor();
        let monitor = monitor.with_rules(vec![error_rule()]);

        monitor.record_metric("errorRate", 0.10, None);
        let report = monitor.tick().await;
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].current_value, 0.10);

        // Still breached: no duplicate
        assert!(monitor.tick().await.triggered.is_empty());

        clock.advance(Duration::from_secs(301));
        monitor.record_metric("errorRate", 0.01, None);
        let report = monitor.tick().await;
        assert_eq!(report.resolved.len(), 1);
        assert!(monitor.active_alerts().is_empty());

        monitor.record_metric("errorRate", 0.5, None);
        clock.advance(Duration::from_secs(1));
        // Last trigger was 302s ago, so cooldown has passed
        let report = monitor.tick().await;
        assert_eq!(report.triggered.len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_retrigger_after_resolve() {
        let (monitor, clock) = monitor();
        let rule = error_rule().with_window(Duration::from_secs(10));
        let monitor = monitor.with_rules(vec![rule]);

        monitor.record_metric("errorRate", 0.10, None);
        assert_eq!(monitor.tick().await.triggered.len(), 1);

        clock.advance(Duration::from_secs(20));
        monitor.record_metric("errorRate", 0.0, None);
        assert_eq!(monitor.tick().await.resolved.len(), 1);

        // Breached again 40s after the first trigger
        clock.advance(Duration::from_secs(20));
        monitor.record_metric("errorRate", 0.5, None);
        assert!(monitor.tick().await.triggered.is_empty());
        assert!(monitor.active_alerts().is_empty());

        clock.advance(Duration::from_secs(261));
        monitor.record_metric("errorRate", 0.5, None);
        assert_eq!(monitor.tick().await.triggered.len(), 1);
    }

    #[tokio::test]
    async fn test_no_data_skips_rule() {
        let (monitor, _) = monitor();
        let monitor = monitor.with_rules(vec![error_rule()]);

        let report = monitor.tick().await;
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.no_data, 1);
        assert!(report.triggered.is_empty());
    }

    #[tokio::test]
    async fn test_providers_feed_store() {
        let (monitor, _) = monitor();
        let provider = Arc::new(StaticProvider::new());
        provider.set("queueSize", 1500.0);
        let monitor = monitor
            .with_provider(provider.clone())
            .with_rules(vec![AlertRule::new(
                "queueSize",
                Condition::Above,
                1000.0,
                AlertLevel::Critical,
                "Queue",
            )]);

        let report = monitor.tick().await;
        assert_eq!(report.collected, 1);
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(monitor.health_summary().status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn test_rule_source_failure_keeps_previous_rules() {
        let (monitor, _) = monitor();
        let monitor = monitor.with_rule_source(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        }));

        monitor.tick().await;
        assert_eq!(monitor.rules().len(), 1);

        monitor.tick().await;
        assert_eq!(monitor.rules().len(), 1);
        assert_eq!(monitor.rules()[0].metric, "queueSize");
    }

    #[tokio::test]
    async fn test_add_and_remove_rules() {
        let (monitor, _) = monitor();
        monitor.add_alert_rule(error_rule());
        monitor.add_alert_rule(error_rule());
        assert_eq!(monitor.rules().len(), 1);

        assert_eq!(monitor.remove_alert_rule("errorRate", Condition::Above), 1);
        assert!(monitor.rules().is_empty());
    }

    #[tokio::test]
    async fn test_removing_rule_resolves_its_alert() {
        let (monitor, clock) = monitor();
        let critical = AlertRule::new(
            "errorRate",
            Condition::Above,
            0.15,
            AlertLevel::Critical,
            "Error rate critical",
        );
        let monitor = monitor.with_rules(vec![critical.clone()]);

        monitor.record_metric("errorRate", 0.5, None);
        assert_eq!(monitor.tick().await.triggered.len(), 1);
        assert_eq!(monitor.health_summary().status, HealthStatus::Critical);

        assert_eq!(monitor.remove_alert_rule("errorRate", Condition::Above), 1);
        assert!(monitor.active_alerts().is_empty());
        assert!(monitor.alerts().get(&critical.id()).is_some_and(|a| !a.is_active()));

        for _ in 0..5 {
            clock.advance(Duration::from_secs(2 * 24 * 60 * 60));
            monitor.record_metric("errorRate", 0.0, None);
            monitor.tick().await;
        }
        assert_eq!(monitor.health_summary().status, HealthStatus::Healthy);
        assert!(monitor.alerts().get(&critical.id()).is_none());
    }

    struct ShrinkingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RuleSource for ShrinkingSource {
        async fn load_rules(&self) -> Result<Vec<AlertRule>, CollaboratorError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![error_rule()])
            } else {
                Ok(Vec::new())
            }
        }

        fn name(&self) -> &str {
            "shrinking"
        }
    }

    #[tokio::test]
    async fn test_dynamic_rule_dropped_from_source_resolves_alert() {
        let (monitor, _) = monitor();
        let monitor = monitor.with_rule_source(Arc::new(ShrinkingSource {
            calls: AtomicUsize::new(0),
        }));

        monitor.record_metric("errorRate", 0.2, None);
        assert_eq!(monitor.tick().await.triggered.len(), 1);

        let report = monitor.tick().await;
        assert!(monitor.rules().is_empty());
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].id, error_rule().id());
        assert!(monitor.active_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_rule_shadowed_by_static_keeps_alert() {
        let (monitor, _) = monitor();
        let monitor = monitor
            .with_rules(vec![error_rule()])
            .with_rule_source(Arc::new(ShrinkingSource {
                calls: AtomicUsize::new(0),
            }));

        monitor.record_metric("errorRate", 0.2, None);
        assert_eq!(monitor.tick().await.triggered.len(), 1);

        assert!(monitor.tick().await.resolved.is_empty());
        assert_eq!(monitor.active_alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_waits_for_persistence() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::new());
        let ctx = ResilienceContext::with_store(
            BreakerConfig::default(),
            MetricStoreConfig::default(),
            clock.clone(),
            store.clone(),
        );
        let alerts =
            AlertManager::new(AlertManagerConfig::default(), clock).with_store(store.clone());
        let monitor = Monitor::new(MonitorConfig::default(), ctx, RetryPolicy::default(), alerts)
            .with_rules(vec![error_rule()]);

        monitor.record_metric("errorRate", 0.5, None);
        monitor.tick().await;
        assert_eq!(monitor.flush().await, 2);

        let records = store.records();
        assert!(records.iter().any(|r| matches!(r, StoredRecord::Metric { .. })));
        assert!(records.iter().any(|r| matches!(r, StoredRecord::Alert { .. })));
    }

    #[tokio::test]
    async fn test_acknowledge_through_facade() {
        let (monitor, _) = monitor();
        let monitor = monitor.with_rules(vec![error_rule()]);
        monitor.record_metric("errorRate", 0.2, None);
        monitor.tick().await;

        let id = error_rule().id();
        assert!(monitor.acknowledge_alert(&id).unwrap().acknowledged);
        assert_eq!(monitor.active_alerts().len(), 1);
        assert!(matches!(
            monitor.acknowledge_alert("missing"),
            Err(AlertError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_circuit_facade() {
        let (monitor, _) = monitor();
        for _ in 0..5 {
            let _: Result<(), _> = monitor
                .execute(
                    "fetch-x",
                    || async { Err(OperationError::Network("reset".to_string())) },
                    Some(&RetryPolicy::no_retry()),
                )
                .await;
        }

        assert_eq!(monitor.health_summary().open_circuits, vec!["fetch-x".to_string()]);
        assert!(monitor.reset_circuit("fetch-x"));
        assert!(monitor.health_summary().open_circuits.is_empty());
        monitor.reset_all_circuits();
        assert!(!monitor.reset_circuit("unknown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (monitor, _) = monitor();
        let ticks = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider(ticks.clone()));
        let monitor = monitor.with_provider(provider);

        let stopped = AtomicBool::new(false);
        monitor
            .run(async {
                tokio::time::sleep(Duration::from_secs(150)).await;
                stopped.store(true, Ordering::SeqCst);
            })
            .await;

        assert!(stopped.load(Ordering::SeqCst));
        // Ticks at 0s, 60s and 120s
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_single_use() {
        let clock = Arc::new(ManualClock::starting_now());
        let ctx = ResilienceContext::with_clock(
            BreakerConfig::default(),
            MetricStoreConfig::default(),
            clock.clone(),
        );
        let config = MonitorConfig {
            single_use: true,
            ..MonitorConfig::default()
        };
        let ticks = Arc::new(AtomicUsize::new(0));
        let monitor = Monitor::new(
            config,
            ctx,
            RetryPolicy::default(),
            AlertManager::new(AlertManagerConfig::default(), clock),
        )
        .with_provider(Arc::new(CountingProvider(ticks.clone())));

        monitor.run(std::future::pending()).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    struct CountingProvider(Arc<AtomicUsize>);

    #[async_trait]
    impl MetricProvider for CountingProvider {
        async fn collect(&self) -> Result<Vec<(String, f64)>, CollaboratorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }
}
