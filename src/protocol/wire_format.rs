//! Wire format encoding and decoding.
//!
//! Implements the 13-byte header format:
//! ```text
//! ┌──────────┬───────┬──────────┬──────────┬──────────┐
//! │ Magic    │ Kind  │ Status   │ Corr ID  │ Length   │
//! │ 2 bytes  │ 1 byte│ 2 bytes  │ 4 bytes  │ 4 bytes  │
//! │ uint16 BE│       │ uint16 BE│ uint32 BE│ uint32 BE│
//! └──────────┴───────┴──────────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The magic doubles as a protocol
//! revision tag: the high byte identifies the protocol, the low byte its
//! revision. A frame with a foreign magic means the peer is speaking
//! something else entirely and the byte stream cannot be resynchronized.

use crate::error::{ApcError, Result};

/// Header size in bytes (fixed, exactly 13).
pub const HEADER_SIZE: usize = 13;

/// Protocol magic: `0xAC` identifies the protocol, `0x01` its revision.
pub const WIRE_MAGIC: u16 = 0xAC01;

/// Default maximum payload size (16 MiB). Payloads are msgpack-encoded
/// text envelopes; anything near this limit indicates a desynced stream.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Frame kind constants.
pub mod kind {
    /// A call submitted to a worker.
    pub const REQUEST: u8 = 0x00;
    /// A worker's answer to a request.
    pub const REPLY: u8 = 0x01;

    /// Check whether a kind byte is one this protocol defines.
    #[inline]
    pub fn is_valid(kind: u8) -> bool {
        matches!(kind, REQUEST | REPLY)
    }
}

/// Status code conventions carried in reply headers.
///
/// `OK` follows the HTTP-ish convention workers use; `TIMED_OUT` is
/// generated locally by the client when a deadline passes unanswered and
/// never appears on the wire. Any other value is forwarded to the caller
/// verbatim from the worker's reply header.
pub mod status {
    /// Successful completion; the payload carries the result.
    pub const OK: u16 = 200;
    /// The request's deadline passed before a reply arrived.
    pub const TIMED_OUT: u16 = 408;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol magic (see [`WIRE_MAGIC`]).
    pub magic: u16,
    /// Frame kind (see [`kind`]).
    pub kind: u8,
    /// Status code: 0 in requests, application status in replies.
    pub status: u16,
    /// Correlation identifier matching a reply to its request.
    pub correlation_id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a request header.
    pub fn request(correlation_id: u32, payload_length: u32) -> Self {
        Self {
            magic: WIRE_MAGIC,
            kind: kind::REQUEST,
            status: 0,
            correlation_id,
            payload_length,
        }
    }

    /// Create a reply header.
    pub fn reply(correlation_id: u32, status: u16, payload_length: u32) -> Self {
        Self {
            magic: WIRE_MAGIC,
            kind: kind::REPLY,
            status,
            correlation_id,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use apc_client::protocol::Header;
    ///
    /// let header = Header::request(42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 13);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_be_bytes());
        buf[2] = self.kind;
        buf[3..5].copy_from_slice(&self.status.to_be_bytes());
        buf[5..9].copy_from_slice(&self.correlation_id.to_be_bytes());
        buf[9..13].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short. Field values are not
    /// checked here; use [`Header::validate`] for that.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            magic: u16::from_be_bytes([buf[0], buf[1]]),
            kind: buf[2],
            status: u16::from_be_bytes([buf[3], buf[4]]),
            correlation_id: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
            payload_length: u32::from_be_bytes([buf[9], buf[10], buf[11], buf[12]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Magic matches this protocol revision
    /// - Kind is a defined frame kind
    /// - Requests carry status 0
    /// - Payload length doesn't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.magic != WIRE_MAGIC {
            return Err(ApcError::Protocol(format!(
                "Bad magic 0x{:04X}, expected 0x{WIRE_MAGIC:04X}",
                self.magic
            )));
        }

        if !kind::is_valid(self.kind) {
            return Err(ApcError::Protocol(format!(
                "Unknown frame kind 0x{:02X}",
                self.kind
            )));
        }

        if self.kind == kind::REQUEST && self.status != 0 {
            return Err(ApcError::Protocol(format!(
                "Request frame carries status {}",
                self.status
            )));
        }

        if self.payload_length > max_payload_size {
            return Err(ApcError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        Ok(())
    }

    /// Check if this is a reply frame.
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.kind == kind::REPLY
    }

    /// Check if this is a request frame.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.kind == kind::REQUEST
    }
}
