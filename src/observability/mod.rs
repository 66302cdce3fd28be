// Observability: metrics for reconciliation runs (logging setup lives in crate::logging)

pub mod metrics;

pub use metrics::MetricName;
