//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use apc_client::protocol::{Frame, Header, status};
//! use bytes::Bytes;
//!
//! let header = Header::reply(42, status::OK, 5);
//! let payload = Bytes::from_static(b"hello");
//! let frame = Frame::new(header, payload);
//!
//! assert_eq!(frame.correlation_id(), 42);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the frame kind byte.
    #[inline]
    pub fn kind(&self) -> u8 {
        self.header.kind
    }

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> u16 {
        self.header.status
    }

    /// Get the correlation identifier.
    #[inline]
    pub fn correlation_id(&self) -> u32 {
        self.header.correlation_id
    }

    /// Check if this is a reply frame.
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.header.is_reply()
    }

    /// Check if this is a request frame.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.header.is_request()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the header and appends the payload into a contiguous buffer,
/// ready to be queued on a connection.
///
/// # Example
///
/// ```
/// use apc_client::protocol::{build_frame, Header, HEADER_SIZE};
///
/// let header = Header::request(42, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), HEADER_SIZE + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
