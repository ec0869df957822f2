//! Stream drivers: many exchanges over one connection.
//!
//! [`run_sequential`] finishes each exchange before opening the next stream.
//! [`run_concurrent`] gives every message its own stream and task and joins
//! them all; a slow stream only delays itself.

use std::time::Duration;

use lab_proto::cancel::CancelScope;
use lab_proto::config::StreamSettings;
use lab_proto::error::StreamError;
use lab_proto::transport::{LabConnection, StreamId};
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};

use crate::error::{ClientError, Result};
use crate::request::{Response, request};

/// Outcome of one stream's exchange.
#[derive(Debug)]
pub struct StreamReport {
    /// 1-based position of the message in the driver's input.
    pub index: usize,
    pub stream: StreamId,
    /// From opening the stream to reading the last response byte.
    pub elapsed: Duration,
    pub outcome: std::result::Result<Response, StreamError>,
}

/// Aggregate result of a driver run.
#[derive(Debug, Default)]
pub struct DriverReport {
    /// Per-stream reports in the order the exchanges finished.
    pub streams: Vec<StreamReport>,
    /// Wall-clock time for the whole run.
    pub elapsed: Duration,
}

impl DriverReport {
    pub fn completed(&self) -> usize {
        self.streams.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.streams.len() - self.completed()
    }

    /// Successful responses, in completion order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.streams.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    /// Message indices in the order their exchanges finished.
    pub fn completion_order(&self) -> Vec<usize> {
        self.streams.iter().map(|r| r.index).collect()
    }

    pub fn max_latency(&self) -> Duration {
        self.streams.iter().map(|r| r.elapsed).max().unwrap_or_default()
    }

    pub fn sum_latency(&self) -> Duration {
        self.streams.iter().map(|r| r.elapsed).sum()
    }
}

/// `"Hello from stream {index}! Time: HH:MM:SS"`.
pub fn greeting(index: usize, at: OffsetDateTime) -> String {
    let clock = at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "??:??:??".to_string());
    format!("Hello from stream {index}! Time: {clock}")
}

/// Local wall-clock time, falling back to UTC when the offset is unknown.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// One stream at a time: open, send, half-close, read, then the next.
///
/// Any failure ends the run; in this mode there is nothing left to do once a
/// step of the sequence fails.
pub async fn run_sequential(
    conn: &LabConnection,
    messages: impl IntoIterator<Item = Vec<u8>>,
    pause: Duration,
    settings: StreamSettings,
    scope: &CancelScope,
) -> Result<DriverReport> {
    let started = Instant::now();
    let mut report = DriverReport::default();

    for (i, message) in messages.into_iter().enumerate() {
        let index = i + 1;
        if index > 1 && !pause.is_zero() {
            scope
                .run(tokio::time::sleep(pause))
                .await
                .map_err(StreamError::from)?;
        }

        info!(index, "creating stream");
        let unit_started = Instant::now();
        let stream = conn
            .open_stream(scope)
            .await
            .map_err(ClientError::OpenStream)?;
        let id = stream.id();
        let response = request(stream, &message, &settings, scope)
            .instrument(info_span!("stream", index, id = %id))
            .await?;

        report.streams.push(StreamReport {
            index,
            stream: id,
            elapsed: unit_started.elapsed(),
            outcome: Ok(response),
        });
    }

    report.elapsed = started.elapsed();
    info!(streams = report.streams.len(), "all streams completed");
    Ok(report)
}

/// One task per message, each on its own freshly opened stream.
///
/// Waits for every task. A failure to open a stream means the connection
/// is unusable: the remaining tasks are aborted and that error is returned.
/// Read or write failures stay inside their stream's report.
pub async fn run_concurrent(
    conn: &LabConnection,
    messages: Vec<Vec<u8>>,
    settings: StreamSettings,
    scope: &CancelScope,
) -> Result<DriverReport> {
    let started = Instant::now();
    let mut units = JoinSet::new();

    for (i, message) in messages.into_iter().enumerate() {
        let index = i + 1;
        let conn = conn.clone();
        let scope = scope.child();
        units.spawn(
            async move {
                let unit_started = Instant::now();
                let stream = conn.open_stream(&scope).await.map_err(|e| (index, e))?;
                let id = stream.id();
                let outcome = request(stream, &message, &settings, &scope).await;
                if let Err(e) = &outcome {
                    warn!(error = %e, "stream failed");
                }
                Ok::<_, (usize, StreamError)>(StreamReport {
                    index,
                    stream: id,
                    elapsed: unit_started.elapsed(),
                    outcome,
                })
            }
            .instrument(info_span!("stream", index)),
        );
    }

    let mut report = DriverReport {
        streams: Vec::with_capacity(units.len()),
        elapsed: Duration::ZERO,
    };
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Ok(stream_report)) => report.streams.push(stream_report),
            Ok(Err((index, e))) => {
                warn!(index, error = %e, "failed to open stream");
                units.abort_all();
                return Err(ClientError::OpenStream(e));
            }
            Err(e) => {
                units.abort_all();
                return Err(ClientError::Task(e.to_string()));
            }
        }
    }

    report.elapsed = started.elapsed();
    info!(
        completed = report.completed(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "all streams completed"
    );
    Ok(report)
}
