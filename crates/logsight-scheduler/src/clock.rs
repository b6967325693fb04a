use chrono::{DateTime, Utc};

/// Source of wall-clock time for the scheduler driver.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time anchored to the tokio clock.
///
/// Reports `wall + (tokio::time::Instant::now() - anchor)`, so under
/// `tokio::time::pause()` the scheduler sees simulated time advance exactly
/// as far as the runtime's timers do.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    wall: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl InstantClock {
    pub fn anchored(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().duration_since(self.anchor);
        self.wall + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn instant_clock_follows_paused_time() {
        let wall = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let clock = InstantClock::anchored(wall);
        assert_eq!(clock.now(), wall);

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), wall + chrono::Duration::seconds(90));
    }
}
