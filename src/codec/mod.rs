//! Codec module - serialization/deserialization for payloads.
//!
//! Every payload on the wire is MessagePack, encoded through
//! [`MsgPackCodec`]. The codec is a marker struct with static methods
//! rather than a trait object, so callers get compile-time dispatch and
//! the compiler can see through the encode/decode calls.

mod msgpack;

pub use msgpack::MsgPackCodec;
