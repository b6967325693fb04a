use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;

/// Handle returned by [`crate::Scheduler::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub usize);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger-{}", self.0)
    }
}

/// A unit of work bound to a trigger.
///
/// `run` is invoked once per firing on its own task. Errors and panics are
/// caught at the firing boundary and logged; the trigger stays active.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Label used in log lines.
    fn name(&self) -> &str;

    async fn run(&self) -> anyhow::Result<()>;
}

struct FnJob<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        (self.f)().await
    }
}

/// Wrap an async closure as a [`Job`].
pub fn job_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Job>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnJob {
        name: name.into(),
        f,
    })
}
