//! `logsight-telemetry`: host/process metric sampling and the append-only
//! time-series sink the samples are written to.
//!
//! A [`monitor::Monitor`] runs every [`sampler::Sampler`] concurrently and
//! writes each resulting [`types::MetricPoint`] through a
//! [`sink::TelemetrySink`] one point at a time, so a failed write loses only
//! that point.

pub mod error;
pub mod monitor;
pub mod sampler;
pub mod sink;
pub mod store;
pub mod types;

pub use error::{SampleError, SinkError};
pub use monitor::Monitor;
pub use sampler::{HostSampler, ProcessSampler, Sampler};
pub use sink::{MemorySink, TelemetrySink};
pub use store::SqliteTelemetryStore;
pub use types::MetricPoint;
