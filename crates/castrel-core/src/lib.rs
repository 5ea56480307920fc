//! castrel-core: shared protocol library for the castrel relay.
//!
//! Provides the wire envelope types, the length-prefixed CBOR codec,
//! and the error type shared by the server, client library, and CLI.

pub mod codec;
pub mod envelope;
pub mod error;

// Re-export commonly used items at crate root.
pub use codec::{cbor_decode, frame_encode, read_frame, write_frame, MAX_FRAME_SIZE};
pub use envelope::{Envelope, Payload, Route};
pub use error::{RelayError, RelayResult};
