//! `logsight-scheduler`: in-process cron-style scheduler.
//!
//! # Overview
//!
//! Jobs are bound to cadence expressions with [`engine::Scheduler::register`].
//! The table is frozen by [`engine::Scheduler::start`], which spawns a single
//! driver task. The driver sleeps until the nearest firing, dispatches every
//! due trigger onto its own task, recomputes, and repeats. A failing or
//! panicking job is logged and never stops the driver.
//!
//! # Cadences
//!
//! | Form            | Example            | Behaviour                              |
//! |-----------------|--------------------|----------------------------------------|
//! | Interval        | `@every 30s`       | Fixed period after the previous firing |
//! | Shorthand       | `every 10 seconds` | Same as `@every 10s`                   |
//! | Cron, 5 fields  | `*/5 * * * *`      | Seconds default to `0`                 |
//! | Cron, 6 fields  | `0 30 4 * * Mon`   | Leading seconds field                  |
//! | Descriptor      | `@daily`           | `@hourly`, `@weekly`, `@monthly`, …    |

pub mod clock;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use clock::{Clock, InstantClock, SystemClock};
pub use engine::{Scheduler, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use schedule::Cadence;
pub use types::{job_fn, Job, TriggerId};
