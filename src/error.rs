use thiserror::Error;

/// Raised by the aggregate encoders when nothing survives filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmptyResultError {
    #[error("No active proxies found")]
    NoProxies,

    #[error("No active WireGuard configurations found")]
    NoWireGuard,
}

/// Boundary validation failures for endpoint records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unknown security: {0}")]
    UnknownSecurity(String),

    #[error("reality security requires vless, got {0}")]
    RealityRequiresVless(String),

    #[error("empty server address for endpoint {0}")]
    EmptyServerAddress(String),
}
