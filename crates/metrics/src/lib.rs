//! Metrics collection and export for tgrelay.
//!
//! Crates record through the `metrics` facade macros re-exported here; the
//! names live in [`definitions`] so dashboards have one place to look. When the
//! `prometheus` feature is enabled, [`init_metrics`] installs an exporter that
//! serves the Prometheus text format over HTTP.
//!
//! ```rust,ignore
//! use tgrelay_metrics::{counter, relay};
//!
//! counter!(relay::RATE_LIMITED_TOTAL).increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
