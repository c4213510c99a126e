//! Endpoint addresses.
//!
//! An endpoint is written as a connection string:
//!
//! - `tcp://host:port` for TCP
//! - `ipc:///path/to.sock` for Unix domain sockets (Unix only)
//!
//! # Example
//!
//! ```
//! use apc_client::transport::Endpoint;
//!
//! let ep: Endpoint = "tcp://127.0.0.1:50000".parse().unwrap();
//! assert_eq!(ep.to_string(), "tcp://127.0.0.1:50000");
//! ```

use std::fmt;
use std::str::FromStr;

#[cfg(unix)]
use std::path::PathBuf;

use crate::error::ApcError;

/// A parsed endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP destination, `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl FromStr for Endpoint {
    type Err = ApcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(ApcError::Endpoint(format!(
                    "tcp endpoint needs host:port, got {s:?}"
                )));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }

        if let Some(path) = s.strip_prefix("ipc://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(ApcError::Endpoint(format!(
                        "ipc endpoint needs a socket path, got {s:?}"
                    )));
                }
                return Ok(Endpoint::Ipc(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(ApcError::Endpoint(
                    "ipc endpoints are only supported on Unix".to_string(),
                ));
            }
        }

        Err(ApcError::Endpoint(format!(
            "unsupported endpoint scheme: {s:?}"
        )))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let ep: Endpoint = "tcp://127.0.0.1:50000".parse().unwrap();
        assert_eq!(ep, Endpoint::Tcp("127.0.0.1:50000".to_string()));
    }

    #[test]
    fn test_parse_tcp_hostname() {
        let ep: Endpoint = "tcp://worker.internal:9000".parse().unwrap();
        assert_eq!(ep, Endpoint::Tcp("worker.internal:9000".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_ipc() {
        let ep: Endpoint = "ipc:///tmp/workers.sock".parse().unwrap();
        assert_eq!(ep, Endpoint::Ipc(PathBuf::from("/tmp/workers.sock")));
    }

    #[test]
    fn test_reject_unknown_scheme() {
        assert!("http://127.0.0.1:80".parse::<Endpoint>().is_err());
        assert!("127.0.0.1:80".parse::<Endpoint>().is_err());
        assert!("".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_reject_tcp_without_port() {
        assert!("tcp://localhost".parse::<Endpoint>().is_err());
        assert!("tcp://".parse::<Endpoint>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_reject_empty_ipc_path() {
        assert!("ipc://".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["tcp://127.0.0.1:50000", "tcp://broker:5000"] {
            let ep: Endpoint = s.parse().unwrap();
            assert_eq!(ep.to_string(), s);
        }

        #[cfg(unix)]
        {
            let ep: Endpoint = "ipc:///tmp/w.sock".parse().unwrap();
            assert_eq!(ep.to_string(), "ipc:///tmp/w.sock");
        }
    }
}
