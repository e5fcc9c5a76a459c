//! Service layer
//!
//! The monitor runs the evaluation loop and fronts every operation the
//! library exposes.

pub mod monitor;

pub use monitor::{Monitor, MonitorConfig, TickReport};
