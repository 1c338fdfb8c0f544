//! Observability for the price engine
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the compute/publish loops
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("price-engine", LogFormat::Pretty)?;
//!
//! // Optional
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, EngineMetrics};
