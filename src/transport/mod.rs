//! Transport layer: endpoint addresses and per-endpoint connections.

mod conn;
mod endpoint;

pub(crate) use conn::Connection;
pub use conn::RECONNECT_DELAY;
pub use endpoint::Endpoint;
