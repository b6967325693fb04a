use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{sampler::Sampler, sink::TelemetrySink};

/// Sample once with `sampler` and write each point individually.
///
/// Returns how many points reached the sink. A failed write is logged and
/// the remaining points are still attempted.
pub fn record(sampler: &dyn Sampler, sink: &dyn TelemetrySink) -> usize {
    let points = match sampler.sample() {
        Ok(points) => points,
        Err(e) => {
            warn!(sampler = sampler.name(), "sampling failed: {e}");
            return 0;
        }
    };

    let mut written = 0;
    for point in &points {
        match sink.insert(std::slice::from_ref(point)) {
            Ok(()) => written += 1,
            Err(e) => error!(
                sampler = sampler.name(),
                metric = %point.metric,
                "add timeseries data error: {e}"
            ),
        }
    }
    debug!(sampler = sampler.name(), written, sampled = points.len(), "sample recorded");
    written
}

/// A set of samplers writing to one sink.
pub struct Monitor {
    samplers: Vec<Arc<dyn Sampler>>,
    sink: Arc<dyn TelemetrySink>,
}

impl Monitor {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            samplers: Vec::new(),
            sink,
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    /// Run every sampler on its own blocking task and wait for all of them.
    ///
    /// A slow or panicking sampler does not delay or abort its siblings.
    /// Returns the total number of points written.
    pub async fn sample_all(&self) -> usize {
        let handles: Vec<_> = self
            .samplers
            .iter()
            .map(|sampler| {
                let sampler = Arc::clone(sampler);
                let sink = Arc::clone(&self.sink);
                let name = sampler.name();
                let handle =
                    tokio::task::spawn_blocking(move || record(sampler.as_ref(), sink.as_ref()));
                (name, handle)
            })
            .collect();

        let mut total = 0;
        for (name, handle) in handles {
            match handle.await {
                Ok(written) => total += written,
                Err(e) => error!(sampler = name, "sampler task failed: {e}"),
            }
        }
        total
    }
}
