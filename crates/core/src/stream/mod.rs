pub mod decoder;
pub mod envelope;

pub use decoder::{DecodeState, DecodedMessage, StreamDecoder, StreamEvent};
pub use envelope::{normalize_reply, parse_envelope, strip_code_fence, MessageEnvelope};
