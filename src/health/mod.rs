//! System health derived from active alerts
//!
//! - `Critical` when any active alert is critical
//! - `Degraded` when the active alert count exceeds the degraded threshold
//! - `Healthy` otherwise

use crate::alerts::{Alert, AlertLevel};
use crate::resilience::{CircuitState, CircuitStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health status category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Derive status from the currently active alerts
    pub fn from_alerts(active: &[Alert], degraded_threshold: usize) -> Self {
        let active: Vec<&Alert> = active.iter().filter(|a| a.is_active()).collect();

        if active.iter().any(|a| a.level == AlertLevel::Critical) {
            Self::Critical
        } else if active.len() > degraded_threshold {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }

    /// Get color for display
    pub fn color_code(&self) -> &'static str {
        match self {
            Self::Healthy => "green",
            Self::Degraded => "yellow",
            Self::Critical => "red",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Point-in-time health report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    /// Latest value of every live metric
    pub metrics: BTreeMap<String, f64>,
    /// Breakers not currently closed
    pub open_circuits: Vec<String>,
}

impl HealthSummary {
    /// Build a summary from its parts
    pub fn build(
        active: &[Alert],
        degraded_threshold: usize,
        metrics: BTreeMap<String, f64>,
        circuits: &BTreeMap<String, CircuitStatus>,
    ) -> Self {
        let active_alerts = active.iter().filter(|a| a.is_active()).count();
        let critical_alerts = active
            .iter()
            .filter(|a| a.is_active() && a.level == AlertLevel::Critical)
            .count();
        let open_circuits = circuits
            .iter()
            .filter(|(_, status)| status.state != CircuitState::Closed)
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            status: HealthStatus::from_alerts(active, degraded_threshold),
            active_alerts,
            critical_alerts,
            metrics,
            open_circuits,
        }
    }

    /// Whether the system is fully healthy
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
