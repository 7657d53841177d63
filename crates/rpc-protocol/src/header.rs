use serde::{Deserialize, Serialize};

/// Sentinel written as the first four bytes (logically) of every connection's
/// `Settings` value. A mismatch means the peer is not speaking this protocol.
pub const MAGIC_NUMBER: i32 = 0x3BEF5C;

/// Per-message envelope, sent ahead of every body.
///
/// `err` is empty on success; a non-empty value means the method invocation
/// failed and the body carries a zero/invalid value instead of a real reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub service: String,
    pub method: String,
    pub seq: u64,
    #[serde(default)]
    pub err: String,
}

impl Header {
    pub fn request(service: impl Into<String>, method: impl Into<String>, seq: u64) -> Self {
        Header {
            service: service.into(),
            method: method.into(),
            seq,
            err: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_empty()
    }
}

/// The codecs a connection may negotiate. `Settings.codec_type` is the
/// string form of one of these, looked up in the process-wide
/// [`crate::codec::CodecRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Json,
    Bin,
}

impl CodecKind {
    pub const JSON: &'static str = "json";
    pub const BIN: &'static str = "bin";

    pub fn name(self) -> &'static str {
        match self {
            CodecKind::Json => Self::JSON,
            CodecKind::Bin => Self::BIN,
        }
    }
}

/// First message on every connection, always JSON-encoded regardless of the
/// codec it negotiates (see module docs on why this is fixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub magic: i32,
    pub codec_type: String,
}

impl Settings {
    pub fn new(codec_type: CodecKind) -> Self {
        Settings {
            magic: MAGIC_NUMBER,
            codec_type: codec_type.name().to_owned(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(CodecKind::Json)
    }
}
