use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::bin_codec::{BinReader, BinWriter};
use crate::error::CodecError;
use crate::header::{CodecKind, Header, Settings};
use crate::json_codec::{JsonReader, JsonWriter};
use crate::stream::{BoxedReadHalf, BoxedStream, BoxedWriteHalf, split_boxed};

/// Read half of whichever codec the connection negotiated.
pub enum NegotiatedReader {
    Json(JsonReader<BoxedReadHalf>),
    Bin(BinReader<BoxedReadHalf>),
}

impl NegotiatedReader {
    pub async fn read_header(&mut self) -> Result<Header, CodecError> {
        match self {
            NegotiatedReader::Json(r) => r.read_header().await,
            NegotiatedReader::Bin(r) => r.read_header().await,
        }
    }

    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        match self {
            NegotiatedReader::Json(r) => r.read_body().await,
            NegotiatedReader::Bin(r) => r.read_body().await,
        }
    }
}

/// Write half of whichever codec the connection negotiated. `write` must be
/// called with header and body in the same call so the send-side mutex
/// (owned by callers, not this type) covers both halves of one message.
pub enum NegotiatedWriter {
    Json(JsonWriter<BoxedWriteHalf>),
    Bin(BinWriter<BoxedWriteHalf>),
}

impl NegotiatedWriter {
    pub async fn write<T: Serialize>(
        &mut self,
        header: &Header,
        body: &T,
    ) -> Result<(), CodecError> {
        let result = match self {
            NegotiatedWriter::Json(w) => w.write(header, body).await,
            NegotiatedWriter::Bin(w) => w.write(header, body).await,
        };
        if result.is_err() {
            let _ = self.close().await;
        }
        result
    }

    pub async fn close(&mut self) -> Result<(), CodecError> {
        match self {
            NegotiatedWriter::Json(w) => w.close().await,
            NegotiatedWriter::Bin(w) => w.close().await,
        }
    }
}

type CodecConstructor =
    fn(leftover: Vec<u8>, read: BoxedReadHalf, write: BoxedWriteHalf) -> (NegotiatedReader, NegotiatedWriter);

fn make_json(leftover: Vec<u8>, read: BoxedReadHalf, write: BoxedWriteHalf) -> (NegotiatedReader, NegotiatedWriter) {
    (
        NegotiatedReader::Json(JsonReader::with_leftover(read, leftover)),
        NegotiatedWriter::Json(JsonWriter::new(write)),
    )
}

fn make_bin(leftover: Vec<u8>, read: BoxedReadHalf, write: BoxedWriteHalf) -> (NegotiatedReader, NegotiatedWriter) {
    (
        NegotiatedReader::Bin(BinReader::with_leftover(read, leftover)),
        NegotiatedWriter::Bin(BinWriter::new(write)),
    )
}

/// Process-wide name -> constructor map, mirroring `codec.Register`/
/// `codec.Get` in the source. Unknown names at handshake time cause the
/// server to reject the connection.
pub struct CodecRegistry {
    makers: HashMap<String, CodecConstructor>,
}

impl CodecRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = CodecRegistry {
            makers: HashMap::new(),
        };
        registry
            .register(CodecKind::Json.name(), make_json)
            .expect("default codecs register once");
        registry
            .register(CodecKind::Bin.name(), make_bin)
            .expect("default codecs register once");
        registry
    }

    pub fn register(&mut self, name: &str, maker: CodecConstructor) -> Result<(), CodecError> {
        if self.makers.contains_key(name) {
            return Err(CodecError::DuplicateCodec(name.to_owned()));
        }
        self.makers.insert(name.to_owned(), maker);
        Ok(())
    }

    pub fn build(
        &self,
        codec_type: &str,
        leftover: Vec<u8>,
        stream: BoxedStream,
    ) -> Result<(NegotiatedReader, NegotiatedWriter), CodecError> {
        let maker = self
            .makers
            .get(codec_type)
            .ok_or_else(|| CodecError::UnknownCodec(codec_type.to_owned()))?;
        let (read, write) = split_boxed(stream);
        Ok(maker(leftover, read, write))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.makers.contains_key(name)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Read the `Settings` handshake off `stream`, always decoded with the
/// default textual (JSON) codec regardless of what gets negotiated
/// afterwards. Returns any trailing bytes already read past the Settings
/// value so the negotiated codec doesn't lose them.
pub async fn read_settings<S: AsyncRead + Unpin>(
    stream: &mut S,
) -> Result<(Settings, Vec<u8>), CodecError> {
    let mut buf = Vec::new();
    loop {
        if !buf.is_empty() {
            let mut de = serde_json::Deserializer::from_slice(&buf);
            match Settings::deserialize(&mut de) {
                Ok(settings) => {
                    let consumed = de.byte_offset();
                    let leftover = buf.split_off(consumed);
                    return Ok((settings, leftover));
                }
                Err(e) if e.is_eof() => {}
                Err(e) => return Err(CodecError::Json(e)),
            }
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(CodecError::Closed);
        }
    }
}

/// Write the `Settings` handshake, always JSON-encoded.
pub async fn write_settings<S: AsyncWrite + Unpin>(
    stream: &mut S,
    settings: &Settings,
) -> Result<(), CodecError> {
    let bytes = serde_json::to_vec(settings)?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}
