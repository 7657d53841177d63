use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),

    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] rpc_protocol::CodecError),

    #[error("registry heartbeat failed: {0}")]
    Registry(#[from] reqwest::Error),
}
