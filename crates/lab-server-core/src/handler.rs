//! Responder side of the echo protocol, one call per stream.

use lab_proto::cancel::CancelScope;
use lab_proto::config::StreamSettings;
use lab_proto::echo::Responder;
use lab_proto::error::StreamError;
use lab_proto::transport::{LabStream, ReadEnd, StreamId};
use tracing::{debug, info, warn};

/// What one handled stream carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub stream: StreamId,
    pub request_len: usize,
    pub response_len: usize,
    /// The request did not fit the read buffer and was cut short. A request
    /// that exactly fills the buffer is not truncated.
    pub truncated: bool,
}

/// Read one request, write `responder`'s answer, half-close.
///
/// End-of-data from the peer completes the request; it is not an error, even
/// with zero bytes. Each read and write gets its own deadline of
/// `settings.io_timeout` under `scope`.
pub async fn handle<R: Responder>(
    mut stream: LabStream,
    responder: &R,
    settings: &StreamSettings,
    scope: &CancelScope,
) -> Result<Exchange, StreamError> {
    let request = stream
        .read_message(settings.buffer_size, &scope.child_with_timeout(settings.io_timeout))
        .await?;

    match request.end {
        ReadEnd::Truncated => warn!(
            limit = settings.buffer_size,
            "request exceeds read buffer, truncating"
        ),
        ReadEnd::BufferFull => debug!(
            limit = settings.buffer_size,
            "read buffer filled before end-of-data"
        ),
        ReadEnd::PeerFinished => {}
    }
    info!(
        bytes = request.bytes.len(),
        message = %String::from_utf8_lossy(&request.bytes),
        "received"
    );

    let truncated = request.is_truncated();
    let request_len = request.bytes.len();
    let response = responder.respond(request.bytes).await;

    stream
        .write_all(&response, &scope.child_with_timeout(settings.io_timeout))
        .await?;
    stream.finish()?;

    info!(
        bytes = response.len(),
        message = %String::from_utf8_lossy(&response),
        "sent"
    );

    Ok(Exchange {
        stream: stream.id(),
        request_len,
        response_len: response.len(),
        truncated,
    })
}
