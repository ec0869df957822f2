//! Connection and stream handles layered over quinn.
//!
//! Both endpoints wrap every accepted or dialed `quinn::Connection` in a
//! [`LabConnection`]; everything above this module works with
//! [`LabStream`] rather than raw quinn halves.

pub mod connection;
pub mod stream;

pub use connection::{ConnectionState, LabConnection};
pub use stream::{LabStream, Message, ReadEnd, ReadState, StreamId, WriteState};
