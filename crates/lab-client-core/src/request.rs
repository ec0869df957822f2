//! Initiator side of the echo protocol.

use lab_proto::cancel::CancelScope;
use lab_proto::config::StreamSettings;
use lab_proto::error::StreamError;
use lab_proto::transport::{LabStream, StreamId};
use tracing::{info, warn};

/// The server's answer on one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub stream: StreamId,
    pub bytes: Vec<u8>,
    /// The response did not fit the read buffer and was cut short.
    pub truncated: bool,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Write `message`, half-close, then read the response until the server
/// half-closes (or the buffer fills). The stream is closed on return.
pub async fn request(
    mut stream: LabStream,
    message: &[u8],
    settings: &StreamSettings,
    scope: &CancelScope,
) -> Result<Response, StreamError> {
    info!(
        stream = %stream.id(),
        message = %String::from_utf8_lossy(message),
        "sending"
    );

    stream
        .write_all(message, &scope.child_with_timeout(settings.io_timeout))
        .await?;
    stream.finish()?;

    let reply = stream
        .read_message(settings.buffer_size, &scope.child_with_timeout(settings.io_timeout))
        .await?;

    if reply.is_truncated() {
        warn!(
            stream = %stream.id(),
            limit = settings.buffer_size,
            "response exceeds read buffer, truncating"
        );
    }

    let response = Response {
        stream: stream.id(),
        truncated: reply.is_truncated(),
        bytes: reply.bytes,
    };
    info!(stream = %response.stream, message = %response.text(), "received");

    Ok(response)
}
