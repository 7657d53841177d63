use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] rpc_protocol::CodecError),

    #[error("connection is shutting down")]
    ShuttingDown,

    #[error("call was cancelled")]
    Cancelled,

    #[error("remote returned an error: {0}")]
    Remote(String),

    #[error("reply type did not match the call's expected type")]
    ReplyTypeMismatch,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("registry request failed: {0}")]
    Registry(#[from] reqwest::Error),

    #[error("no available servers for service '{0}'")]
    NoAvailableServers(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
