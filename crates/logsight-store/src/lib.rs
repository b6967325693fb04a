//! `logsight-store`: the relational store used by LogSight.
//!
//! SQLite is the only engine. [`db::Database`] is a cloneable handle over a
//! single connection; the other modules are thin, uncached accessors over the
//! tables it creates.

pub mod checks;
pub mod db;
pub mod error;
pub mod oplog;
pub mod settings;
pub mod users;

pub use db::Database;
pub use error::{Result, StoreError};
pub use settings::Settings;
