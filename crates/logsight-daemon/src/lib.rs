//! The LogSight background daemon: logging setup, the scheduled job set and
//! the process lifecycle that ties storage, telemetry and the scheduler
//! together.

pub mod app;
pub mod jobs;
pub mod logging;
pub mod loki;

pub use app::{Application, LifecycleState};
