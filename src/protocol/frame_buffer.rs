//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 13 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! Headers are validated (magic, kind, size) as soon as they are parsed:
//! a stream that fails header validation is desynced and cannot be
//! recovered, so the owning connection must be reset.
//!
//! # Example
//!
//! ```ignore
//! use apc_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! let frames = buffer.push(&chunk)?;
//! for frame in frames {
//!     println!("Got reply for correlation id {}", frame.correlation_id());
//! }
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 13 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Uses a state machine to handle partial reads efficiently.
/// All data is stored in a single `BytesMut` buffer to minimize allocations.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 16KB, max payload: 16 MiB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// This is the main API for processing incoming data from the socket.
    /// Returns a vector of complete frames. If data is fragmented,
    /// partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error if a parsed header fails validation (foreign
    /// magic, unknown kind, oversized payload). The buffer contents are
    /// unusable after that; reset the connection that feeds it.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();

        // Process as many complete frames as possible
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the header fails protocol validation
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < HEADER_SIZE {
                    return Ok(None);
                }

                // Parse and validate before consuming any bytes
                let header =
                    Header::decode(&self.buffer[..HEADER_SIZE]).expect("Buffer has enough bytes");
                header.validate(self.max_payload_size)?;

                let _ = self.buffer.split_to(HEADER_SIZE);

                if header.payload_length == 0 {
                    // Empty payload, frame is complete
                    return Ok(Some(Frame::new(header, Bytes::new())));
                }

                // Transition to waiting for payload
                self.state = State::WaitingForPayload {
                    header,
                    remaining: header.payload_length,
                };

                // Try to get payload immediately
                self.try_extract_one()
            }

            State::WaitingForPayload { header, remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                // Extract payload (zero-copy freeze)
                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;

                // Reset state for next frame
                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(header, payload)))
            }
        }
    }

    /// Number of buffered bytes not yet part of an extracted frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, status};

    #[test]
    fn test_single_complete_frame() {
        let header = Header::reply(1, status::OK, 5);
        let bytes = build_frame(&header, b"hello");

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].correlation_id(), 1);
        assert_eq!(frames[0].payload(), b"hello");
        assert_eq!(buffer.pending_bytes(), 0);
    }

    #[test]
    fn test_empty_payload_frame() {
        let header = Header::reply(9, status::OK, 0);
        let bytes = build_frame(&header, b"");

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut all_bytes = Vec::new();
        for i in 1u32..=3 {
            let payload = format!("payload_{i}");
            let header = Header::reply(i, status::OK, payload.len() as u32);
            all_bytes.extend(build_frame(&header, payload.as_bytes()));
        }

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&all_bytes).unwrap();

        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.correlation_id(), (i + 1) as u32);
            assert_eq!(frame.payload(), format!("payload_{}", i + 1).as_bytes());
        }
    }

    #[test]
    fn test_fragmented_delivery() {
        let header = Header::reply(77, status::OK, 11);
        let bytes = build_frame(&header, b"fragmented!");

        let mut buffer = FrameBuffer::new();

        // Header split across two pushes
        assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
        assert!(buffer.push(&bytes[4..HEADER_SIZE]).unwrap().is_empty());

        // Payload split again
        let mid = HEADER_SIZE + 5;
        assert!(buffer.push(&bytes[HEADER_SIZE..mid]).unwrap().is_empty());

        let frames = buffer.push(&bytes[mid..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"fragmented!");
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let header = Header::reply(5, status::OK, 3);
        let bytes = build_frame(&header, b"abc");

        let mut buffer = FrameBuffer::new();
        let mut extracted = Vec::new();
        for b in &bytes {
            extracted.extend(buffer.push(std::slice::from_ref(b)).unwrap());
        }

        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].payload(), b"abc");
    }

    #[test]
    fn test_foreign_magic_is_rejected() {
        let mut header = Header::reply(1, status::OK, 0);
        header.magic = 0xBEEF;
        let bytes = build_frame(&header, b"");

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(&bytes).is_err());
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let header = Header::reply(1, status::OK, 1024);
        let bytes = build_frame(&header, &[0u8; 1024]);

        let mut buffer = FrameBuffer::with_max_payload(512);
        assert!(buffer.push(&bytes).is_err());
    }

    #[test]
    fn test_partial_frame_keeps_pending_bytes() {
        let header = Header::reply(2, status::OK, 100);
        let bytes = build_frame(&header, &[7u8; 100]);

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes[..HEADER_SIZE + 10]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.pending_bytes(), 10);
    }
}
