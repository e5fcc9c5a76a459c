//! Metric time series and providers

mod provider;
mod store;

pub use provider::{JsonFileProvider, MetricProvider, StaticProvider};
pub use store::{Metadata, MetricPoint, MetricStore, MetricStoreConfig};
