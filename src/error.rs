//! Unified error type.

/// Errors from starting or running the [`Server`](crate::Server).
///
/// Application-level failures are HTTP [`Response`](crate::Response) values,
/// and a malformed request id is logged and replaced, never surfaced. This
/// type only covers infrastructure: parsing the bind address, binding the
/// port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn wraps_its_source() {
        let err = Error::from("nonsense".parse::<std::net::SocketAddr>().unwrap_err());
        assert!(err.to_string().starts_with("invalid bind address"));
        assert!(err.source().is_some());
    }
}
