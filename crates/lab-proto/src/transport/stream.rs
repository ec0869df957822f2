//! One bidirectional stream with independent half-close tracking.
//!
//! quinn splits a bidirectional stream into a `SendStream` and a
//! `RecvStream`; [`LabStream`] keeps both halves together with their states
//! so callers can see that closing one direction leaves the other usable.

use std::time::Duration;

use quinn::{RecvStream, SendStream};
use tracing::{debug, trace};

use crate::cancel::CancelScope;
use crate::error::StreamError;
use crate::transport::connection::Registration;

/// Stream identifier, unique within its connection (the raw QUIC stream id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u64);

impl From<quinn::StreamId> for StreamId {
    fn from(id: quinn::StreamId) -> Self {
        StreamId(quinn::VarInt::from(id).into_inner())
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Open,
    /// The peer finished sending; everything it sent has been read.
    HalfClosedByPeer,
    /// Reading failed or the peer reset the stream.
    Closed,
}

/// Send direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Open,
    /// We signalled end-of-data; no further writes are possible.
    HalfClosedLocally,
    /// Writing failed or the peer stopped the stream.
    Closed,
}

/// How a bounded read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer half-closed its write side. This is the normal completion,
    /// including a message that exactly fills the buffer.
    PeerFinished,
    /// The peer sent more than the buffer holds. The excess is discarded.
    Truncated,
    /// The buffer filled and the peer has neither finished nor sent more
    /// yet. Nothing is known to be lost.
    BufferFull,
}

/// One message read off a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub bytes: Vec<u8>,
    pub end: ReadEnd,
}

impl Message {
    /// Input beyond the buffer was seen and dropped.
    pub fn is_truncated(&self) -> bool {
        self.end == ReadEnd::Truncated
    }
}

/// A bidirectional stream owned by exactly one task.
pub struct LabStream {
    id: StreamId,
    send: SendStream,
    recv: RecvStream,
    read_state: ReadState,
    write_state: WriteState,
    _registration: Registration,
}

impl LabStream {
    pub(crate) fn new(send: SendStream, recv: RecvStream, registration: Registration) -> Self {
        Self {
            id: StreamId::from(send.id()),
            send,
            recv,
            read_state: ReadState::Open,
            write_state: WriteState::Open,
            _registration: registration,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    pub fn write_state(&self) -> WriteState {
        self.write_state
    }

    /// Both directions are finished.
    pub fn is_done(&self) -> bool {
        self.read_state != ReadState::Open && self.write_state != WriteState::Open
    }

    /// Write all of `buf`.
    ///
    /// Fails with [`StreamError::WriteClosed`] once the write side was closed,
    /// without touching the transport.
    pub async fn write_all(&mut self, buf: &[u8], scope: &CancelScope) -> Result<(), StreamError> {
        if self.write_state != WriteState::Open {
            return Err(StreamError::WriteClosed);
        }
        match scope.run(self.send.write_all(buf)).await? {
            Ok(()) => {
                trace!(stream = %self.id, bytes = buf.len(), "wrote");
                Ok(())
            }
            Err(e) => {
                self.write_state = WriteState::Closed;
                Err(e.into())
            }
        }
    }

    /// Half-close: signal that no more data will be sent. Reads stay usable.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if self.write_state != WriteState::Open {
            return Err(StreamError::WriteClosed);
        }
        self.send.finish().map_err(|_| StreamError::WriteClosed)?;
        self.write_state = WriteState::HalfClosedLocally;
        debug!(stream = %self.id, "write side closed");
        Ok(())
    }

    /// Abandon the write side: the peer's reads fail with `code` instead of
    /// seeing end-of-data. Reads on this side stay usable.
    pub fn reset(&mut self, code: u32) -> Result<(), StreamError> {
        if self.write_state == WriteState::Closed {
            return Err(StreamError::WriteClosed);
        }
        self.send
            .reset(quinn::VarInt::from_u32(code))
            .map_err(|_| StreamError::WriteClosed)?;
        self.write_state = WriteState::Closed;
        debug!(stream = %self.id, code, "write side reset");
        Ok(())
    }

    /// Read one message: everything until the peer half-closes, or `limit`
    /// bytes, whichever comes first.
    ///
    /// A full buffer does not wait for more input. Whatever the transport
    /// already holds decides between [`ReadEnd::PeerFinished`] (exact fit),
    /// [`ReadEnd::Truncated`] (excess input, dropped) and
    /// [`ReadEnd::BufferFull`] (nothing more yet).
    ///
    /// End-of-data is a successful outcome ([`ReadEnd::PeerFinished`]), even
    /// with zero bytes. Calling this again after the peer finished yields an
    /// empty message instead of an error.
    pub async fn read_message(
        &mut self,
        limit: usize,
        scope: &CancelScope,
    ) -> Result<Message, StreamError> {
        if self.read_state == ReadState::HalfClosedByPeer {
            return Ok(Message {
                bytes: Vec::new(),
                end: ReadEnd::PeerFinished,
            });
        }

        let mut buf = vec![0u8; limit];
        let mut filled = 0;
        let end = loop {
            if filled == limit {
                break self.classify_full_buffer().await;
            }
            match scope.run(self.recv.read(&mut buf[filled..])).await? {
                Ok(Some(n)) => filled += n,
                Ok(None) => {
                    self.read_state = ReadState::HalfClosedByPeer;
                    break ReadEnd::PeerFinished;
                }
                Err(e) => {
                    self.read_state = ReadState::Closed;
                    return Err(e.into());
                }
            }
        };
        buf.truncate(filled);

        trace!(stream = %self.id, bytes = filled, ?end, "read message");
        Ok(Message { bytes: buf, end })
    }
}

impl LabStream {
    /// Look at what is already buffered after a full read, without waiting.
    async fn classify_full_buffer(&mut self) -> ReadEnd {
        match tokio::time::timeout(Duration::ZERO, self.recv.read_chunk(1, true)).await {
            Ok(Ok(None)) => {
                self.read_state = ReadState::HalfClosedByPeer;
                ReadEnd::PeerFinished
            }
            Ok(Ok(Some(_))) => ReadEnd::Truncated,
            // A failure surfaces on the next operation on this stream.
            Ok(Err(_)) | Err(_) => ReadEnd::BufferFull,
        }
    }
}

impl std::fmt::Debug for LabStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabStream")
            .field("id", &self.id)
            .field("read_state", &self.read_state)
            .field("write_state", &self.write_state)
            .finish()
    }
}
