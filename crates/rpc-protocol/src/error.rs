use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json encode/decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encode/decode error: {0}")]
    Bin(#[from] bincode::Error),

    #[error("connection closed")]
    Closed,

    #[error("unknown codec type: {0}")]
    UnknownCodec(String),

    #[error("codec '{0}' is already registered")]
    DuplicateCodec(String),

    #[error("magic number mismatch")]
    BadMagic,
}

impl CodecError {
    /// True when the error means the peer is simply gone rather than that
    /// something is wrong with the data on the wire — the distinction
    /// `Connection::run`'s `READ_HEADER` step needs to decide between a
    /// silent teardown and logging a real protocol error.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            CodecError::Closed => true,
            CodecError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
