//! Remote log sink shipping to a Loki push endpoint.
//!
//! The layer never blocks the caller: events go into a bounded queue and are
//! dropped (and counted) when it is full. A background task batches the
//! queue and POSTs it.

use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use serde_json::json;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{
    field::{Field, Visit},
    warn, Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

const PUSH_PATH: &str = "/loki/api/v1/push";
const BATCH_SIZE: usize = 256;
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Events from the shipper itself and the HTTP stack it drives are never
/// forwarded.
const OWN_TARGET: &str = module_path!();
const HTTP_TARGETS: [&str; 4] = ["reqwest", "hyper", "h2", "rustls"];

#[derive(Debug, Clone)]
pub struct LokiConfig {
    pub api: String,
    pub user: String,
    pub password: String,
    pub job: String,
    pub queue_size: usize,
}

#[derive(Debug)]
struct Line {
    ts_nanos: i64,
    level: Level,
    text: String,
}

pub struct LokiLayer {
    tx: mpsc::Sender<Line>,
    dropped: Arc<AtomicU64>,
}

impl<S: Subscriber> Layer<S> for LokiLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let target = meta.target();
        if target == OWN_TARGET || HTTP_TARGETS.iter().any(|t| target.starts_with(t)) {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = Line {
            ts_nanos: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            level: *meta.level(),
            text: visitor.finish(meta.target()),
        };
        if self.tx.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self, target: &str) -> String {
        format!("{target}: {}{}", self.message, self.fields)
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Handle to the background shipping task.
pub struct LokiShipper {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl LokiShipper {
    /// Lines discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Push whatever is still queued, waiting at most `wait`.
    pub async fn release(self, wait: Duration) {
        self.shutdown.cancel();
        if tokio::time::timeout(wait, self.handle).await.is_err() {
            eprintln!("loki: final flush did not finish within {wait:?}");
        }
    }
}

/// Build the layer and spawn its shipper. Must be called inside a runtime.
pub fn spawn(cfg: LokiConfig) -> (LokiLayer, LokiShipper) {
    let (tx, rx) = mpsc::channel(cfg.queue_size.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let shutdown = CancellationToken::new();
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let handle = tokio::spawn(ship(rx, client, cfg, shutdown.clone()));
    (
        LokiLayer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        LokiShipper {
            handle,
            shutdown,
            dropped,
        },
    )
}

async fn ship(
    mut rx: mpsc::Receiver<Line>,
    client: reqwest::Client,
    cfg: LokiConfig,
    shutdown: CancellationToken,
) {
    let url = endpoint(&cfg.api);
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut tick = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => {
                    batch.push(line);
                    if batch.len() >= BATCH_SIZE {
                        push(&client, &url, &cfg, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = tick.tick() => {
                if !batch.is_empty() {
                    push(&client, &url, &cfg, &mut batch).await;
                }
            }
        }
    }

    while let Ok(line) = rx.try_recv() {
        batch.push(line);
    }
    if !batch.is_empty() {
        push(&client, &url, &cfg, &mut batch).await;
    }
}

async fn push(client: &reqwest::Client, url: &str, cfg: &LokiConfig, batch: &mut Vec<Line>) {
    let body = payload(&cfg.job, batch.drain(..));
    let mut req = client.post(url).json(&body);
    if !cfg.user.is_empty() {
        req = req.basic_auth(&cfg.user, Some(&cfg.password));
    }
    match req.send().await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => warn!(status = %resp.status(), "loki rejected log batch"),
        Err(e) => warn!("loki push failed: {e}"),
    }
}

/// Accept either the server base URL or the full push URL.
fn endpoint(api: &str) -> String {
    let base = api.trim_end_matches('/');
    if base.ends_with(PUSH_PATH) {
        base.to_string()
    } else {
        format!("{base}{PUSH_PATH}")
    }
}

/// One stream per level, labelled with the configured job.
fn payload(job: &str, lines: impl Iterator<Item = Line>) -> serde_json::Value {
    let mut streams: BTreeMap<String, Vec<[String; 2]>> = BTreeMap::new();
    for line in lines {
        streams
            .entry(line.level.to_string().to_ascii_lowercase())
            .or_default()
            .push([line.ts_nanos.to_string(), line.text]);
    }
    let streams: Vec<_> = streams
        .into_iter()
        .map(|(level, values)| {
            json!({
                "stream": { "job": job, "level": level },
                "values": values,
            })
        })
        .collect();
    json!({ "streams": streams })
}
