//! Rule evaluation
//!
//! [`evaluate`] is a pure function of a rule and its window of points;
//! the monitor decides what to do with the verdict.

use super::types::{Aggregation, AlertRule, Condition};
use crate::metrics::MetricPoint;
use std::collections::HashSet;

/// Outcome of evaluating one rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Window held no points
    NoData,
    /// Condition holds for the aggregated value
    Breached { value: f64 },
    /// Condition does not hold
    Clear { value: f64 },
}

/// Reduce window points to the value a condition is checked against
///
/// `change` yields `|last - first|`; other conditions use `aggregation`.
pub fn aggregate(
    condition: Condition,
    aggregation: Aggregation,
    points: &[MetricPoint],
) -> Option<f64> {
    let (first, last) = (points.first()?, points.last()?);

    let value = match (condition, aggregation) {
        (Condition::Change, _) => (last.value - first.value).abs(),
        (_, Aggregation::Mean) => {
            points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64
        }
        (_, Aggregation::Max) => points
            .iter()
            .map(|p| p.value)
            .fold(f64::NEG_INFINITY, f64::max),
    };
    Some(value)
}

/// Evaluate a rule against its window of points
pub fn evaluate(rule: &AlertRule, points: &[MetricPoint], default: Aggregation) -> Verdict {
    let aggregation = rule.aggregation.unwrap_or(default);
    match aggregate(rule.condition, aggregation, points) {
        None => Verdict::NoData,
        Some(value) if rule.condition.evaluate(value, rule.threshold) => {
            Verdict::Breached { value }
        }
        Some(value) => Verdict::Clear { value },
    }
}

/// Static and dynamically loaded rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fixed: Vec<AlertRule>,
    dynamic: Vec<AlertRule>,
}

impl RuleSet {
    /// Create a rule set from static rules
    pub fn new(rules: Vec<AlertRule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            set.add(rule);
        }
        set
    }

    /// Add a static rule, replacing one with the same identity
    pub fn add(&mut self, rule: AlertRule) {
        let id = rule.id();
        match self.fixed.iter_mut().find(|r| r.id() == id) {
            Some(existing) => *existing = rule,
            None => self.fixed.push(rule),
        }
    }

    /// Remove every rule on `metric` with `condition`; returns how many were removed
    ///
    /// Dynamic rules removed here come back on the next successful load.
    pub fn remove(&mut self, metric: &str, condition: Condition) -> usize {
        let before = self.fixed.len() + self.dynamic.len();
        let keep = |r: &AlertRule| !(r.metric == metric && r.condition == condition);
        self.fixed.retain(keep);
        self.dynamic.retain(keep);
        before - self.fixed.len() - self.dynamic.len()
    }

    /// Replace the dynamically loaded rules
    pub fn replace_dynamic(&mut self, rules: Vec<AlertRule>) {
        self.dynamic = rules;
    }

    /// All rules, static first; a dynamic rule sharing a static identity is skipped
    pub fn rules(&self) -> Vec<AlertRule> {
        let mut seen = HashSet::new();
        self.fixed
            .iter()
            .chain(self.dynamic.iter())
            .filter(|r| seen.insert(r.id()))
            .cloned()
            .collect()
    }

    /// Identities of every rule in the set
    pub fn ids(&self) -> HashSet<String> {
        self.fixed
            .iter()
            .chain(self.dynamic.iter())
            .map(AlertRule::id)
            .collect()
    }

    /// Number of distinct rules
    pub fn len(&self) -> usize {
        self.rules().len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.dynamic.is_empty()
    }
}
