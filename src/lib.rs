//! # apc-client
//!
//! Asynchronous procedure-call client for pooled remote workers.
//!
//! A single-threaded caller submits any number of concurrent requests,
//! each with its own timeout and result callback, then drains them all
//! with one blocking call:
//!
//! - [`Client::start_request`] registers a pending request and queues
//!   its frame; it returns immediately and never touches the network.
//! - [`Client::wait_for_replies`] drives all I/O cooperatively on the
//!   caller's thread, firing each callback exactly once as replies
//!   arrive or deadlines pass.
//!
//! Requests and replies are matched by a correlation identifier carried
//! in a fixed binary header; payloads are MessagePack envelopes that
//! workers in any language can decode.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use apc_client::Client;
//!
//! let mut client = Client::builder()
//!     .endpoint("tcp://127.0.0.1:50000")
//!     .build()?;
//!
//! client.start_request(
//!     "convert",
//!     vec!["你好世界".into()],
//!     Duration::from_millis(2000),
//!     |status, reply| println!("{status} - {}", reply.unwrap_or_default()),
//! );
//!
//! let pending = client.wait_for_replies(Duration::from_millis(4000));
//! # Ok::<(), apc_client::ApcError>(())
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;

mod client;
mod registry;

pub use client::{Client, ClientBuilder, DispatchPolicy, DEFAULT_CONNECT_TIMEOUT};
pub use error::ApcError;
pub use protocol::Value;
