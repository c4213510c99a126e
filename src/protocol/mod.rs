//! Wire protocol: header format, frames, reassembly, and envelopes.

mod envelope;
mod frame;
mod frame_buffer;
mod wire_format;

pub use envelope::{decode_reply_payload, encode_reply_payload, RequestEnvelope, Value};
pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{kind, status, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, WIRE_MAGIC};
