//! Per-connection stream dispatcher.
//!
//! Accepts streams until the connection ends and gives each one its own task
//! running [`handle`](crate::handler::handle). The loop never waits on a
//! handler, so a slow stream cannot hold up the next accept.

use std::sync::Arc;

use lab_proto::cancel::CancelScope;
use lab_proto::config::StreamSettings;
use lab_proto::echo::Responder;
use lab_proto::error::StreamError;
use lab_proto::transport::LabConnection;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::handler::handle;
use crate::stats::ServerStats;

/// Why a dispatcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEnd {
    /// The peer closed the connection, or it idled out.
    ConnectionClosed,
    /// The server is shutting down.
    Cancelled,
    /// The connection failed with a transport fault.
    Failed,
}

/// Serve streams on `conn` until it ends or `scope` is cancelled, then close it.
pub async fn dispatch<R: Responder>(
    conn: LabConnection,
    responder: Arc<R>,
    settings: StreamSettings,
    scope: CancelScope,
    stats: Arc<ServerStats>,
) -> DispatchEnd {
    let end = loop {
        let stream = match conn.accept_stream(&scope).await {
            Ok(stream) => stream,
            Err(e) if e.is_end_of_connection() => {
                debug!(reason = %e, "connection closed");
                break DispatchEnd::ConnectionClosed;
            }
            Err(StreamError::Interrupted(_)) => {
                debug!("dispatcher cancelled");
                break DispatchEnd::Cancelled;
            }
            Err(e) => {
                warn!(error = %e, "connection failed");
                break DispatchEnd::Failed;
            }
        };

        stats.stream_accepted();
        info!(stream = %stream.id(), "new stream opened");

        let span = info_span!("stream", id = %stream.id());
        let responder = Arc::clone(&responder);
        let stats = Arc::clone(&stats);
        let scope = scope.child();
        tokio::spawn(
            async move {
                match handle(stream, &*responder, &settings, &scope).await {
                    Ok(exchange) => {
                        debug!(?exchange, "stream done");
                        stats.stream_completed();
                    }
                    Err(e) if e.is_interrupted() => {
                        debug!(error = %e, "stream interrupted");
                        stats.stream_failed();
                    }
                    Err(e) => {
                        warn!(error = %e, "stream abandoned");
                        stats.stream_failed();
                    }
                }
            }
            .instrument(span),
        );
    };

    conn.close(0, b"");
    end
}
