//! Progress events for a single analysis and the stream that carries them.
//!
//! An analysis runs as a spawned task that reports through a [`ProgressSink`]. The sink
//! only ever emits `progress` events, with percentages clamped so they never go backwards.
//! The terminal `result` or `error` event is produced exactly once by [`event_stream`] from
//! the task's return value, so a run cannot end twice or end silently.

use crate::error::Result;
use futures::{FutureExt, Stream};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error};

/// Events buffered between the analysis task and the client.
const EVENT_BUFFER: usize = 64;

/// Share of the remaining gap closed by each keep-alive tick.
const KEEPALIVE_DECAY: f64 = 0.8;

/// One frame of an analysis stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        step: String,
        percent: u8,
        detail: String,
    },
    Result {
        analysis: String,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }

    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        }
    }
}

/// Percent shown on keep-alive tick `tick` (1-based) of a stage running from `base`
/// toward `ceiling`. Approaches the ceiling without reaching it.
pub fn keepalive_percent(base: u8, ceiling: u8, tick: u32) -> u8 {
    if ceiling <= base.saturating_add(1) {
        return base;
    }
    let span = f64::from(ceiling - base);
    let decay = KEEPALIVE_DECAY.powi(tick.min(i32::MAX as u32) as i32);
    let value = f64::from(ceiling) - span * decay;
    (value.floor() as u8).clamp(base, ceiling - 1)
}

/// Progress reporter handed to a running analysis.
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    last_percent: u8,
}

impl ProgressSink {
    fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            last_percent: 0,
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Emit a progress event. Percent is capped at 100 and never drops below the last one.
    pub async fn progress(&mut self, step: &str, percent: u8, detail: impl Into<String>) {
        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;

        let event = ProgressEvent::Progress {
            step: step.to_string(),
            percent,
            detail: detail.into(),
        };
        if self.tx.send(event).await.is_err() {
            debug!("Progress receiver closed");
        }
    }

    /// Drive `work` to completion, emitting a keep-alive event every `interval` while it runs.
    ///
    /// `detail` receives the elapsed time and renders the event's detail text.
    pub async fn keepalive<F, T, D>(
        &mut self,
        work: F,
        interval: Duration,
        step: &str,
        (base, ceiling): (u8, u8),
        detail: D,
    ) -> T
    where
        F: Future<Output = T>,
        D: Fn(Duration) -> String,
    {
        tokio::pin!(work);
        let started = Instant::now();
        let mut ticker = interval_at(started + interval, interval);
        let mut tick = 0u32;

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick() => {
                    tick = tick.saturating_add(1);
                    let percent = keepalive_percent(base, ceiling, tick);
                    self.progress(step, percent, detail(started.elapsed())).await;
                }
            }
        }
    }
}

/// Aborts the analysis task when the client stops listening.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run an analysis in a background task and return its events as a stream.
///
/// The stream yields every progress event followed by exactly one terminal event: `result`
/// with the analysis text, or `error` with the client-facing message of the failure. A panic
/// inside the analysis is reported as an `error` event as well. Dropping the stream aborts
/// the task.
pub fn event_stream<F, Fut>(run: F) -> impl Stream<Item = ProgressEvent> + Send + 'static
where
    F: FnOnce(ProgressSink) -> Fut,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let work = run(ProgressSink::new(tx.clone()));

    let handle = tokio::spawn(async move {
        let terminal = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(analysis)) => ProgressEvent::Result { analysis },
            Ok(Err(e)) => {
                error!("Analysis failed ({}): {}", e.category(), e);
                ProgressEvent::Error {
                    message: e.client_message(),
                }
            }
            Err(_) => {
                error!("Analysis task panicked");
                ProgressEvent::Error {
                    message: "InternalError: the analysis stopped unexpectedly".to_string(),
                }
            }
        };
        let _ = tx.send(terminal).await;
    });

    futures::stream::unfold(
        (rx, AbortOnDrop(handle)),
        |(mut rx, guard)| async move {
            let event = rx.recv().await?;
            Some((event, (rx, guard)))
        },
    )
}
