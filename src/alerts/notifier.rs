//! Alert notification system
//!
//! Notification channels receive a level, a message and a context map.
//! Delivery is best-effort: failures are logged and never propagated.

use super::types::AlertLevel;
use crate::error::CollaboratorError;
use crate::metrics::Metadata;
use std::io::{self, Write};

/// Notification channel trait
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    fn notify(
        &self,
        level: AlertLevel,
        message: &str,
        context: &Metadata,
    ) -> Result<(), CollaboratorError>;

    /// Channel name for identification
    fn name(&self) -> &str;
}

/// Notifier that writes through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        level: AlertLevel,
        message: &str,
        context: &Metadata,
    ) -> Result<(), CollaboratorError> {
        let context = serde_json::Value::Object(context.clone());
        match level {
            AlertLevel::Info => log::info!("[{}] {} {}", level, message, context),
            AlertLevel::Warning => log::warn!("[{}] {} {}", level, message, context),
            AlertLevel::Error | AlertLevel::Critical => {
                log::error!("[{}] {} {}", level, message, context)
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Terminal/console notifier
///
/// Outputs alerts to stdout/stderr with colored formatting
pub struct TerminalNotifier {
    /// Use stderr instead of stdout
    use_stderr: bool,
    /// Use colors (ANSI escape codes)
    use_colors: bool,
}

impl TerminalNotifier {
    /// Create a new terminal notifier
    pub fn new() -> Self {
        Self {
            use_stderr: true,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier that uses stdout
    pub fn stdout() -> Self {
        Self {
            use_stderr: false,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier without colors
    pub fn no_color() -> Self {
        Self {
            use_stderr: true,
            use_colors: false,
        }
    }

    fn supports_color() -> bool {
        std::env::var("TERM")
            .map(|term| term != "dumb")
            .unwrap_or(false)
    }

    fn format_line(&self, level: AlertLevel, message: &str, context: &Metadata) -> String {
        let id = context
            .get("id")
            .and_then(|v| v.as_str())
            .map(|id| format!(" ({})", id))
            .unwrap_or_default();
        format!("{} {}{}", self.format_level(level), message, id)
    }

    fn format_level(&self, level: AlertLevel) -> String {
        if !self.use_colors {
            return format!("[{}]", level);
        }

        let color_code = match level {
            AlertLevel::Info => "\x1b[36m",           // Cyan
            AlertLevel::Warning => "\x1b[33m",        // Yellow
            AlertLevel::Error => "\x1b[31m",          // Red
            AlertLevel::Critical => "\x1b[35m\x1b[1m", // Bold Magenta
        };

        format!("{}[{}]\x1b[0m", color_code, level)
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn notify(
        &self,
        level: AlertLevel,
        message: &str,
        context: &Metadata,
    ) -> Result<(), CollaboratorError> {
        let line = self.format_line(level, message, context);

        if self.use_stderr {
            writeln!(io::stderr().lock(), "{}", line)?;
        } else {
            writeln!(io::stdout().lock(), "{}", line)?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "terminal"
    }
}

/// Notification manager
///
/// Fans notifications out to every registered channel
#[derive(Default)]
pub struct NotificationManager {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationManager {
    /// Create a manager without channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager delivering to the log only
    pub fn with_log() -> Self {
        let mut manager = Self::new();
        manager.add_notifier(Box::new(LogNotifier));
        manager
    }

    /// Add a notifier
    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Send to all channels; returns how many accepted it
    pub fn notify_all(&self, level: AlertLevel, message: &str, context: &Metadata) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.notify(level, message, context) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Failed to notify via {}: {}", notifier.name(), e),
            }
        }
        delivered
    }

    /// Get number of registered notifiers
    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }
}
