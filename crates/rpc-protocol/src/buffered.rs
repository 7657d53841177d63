use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CodecError;

/// A read-side byte buffer shared by both codecs. Bytes are pulled from the
/// underlying stream only when the buffered prefix can't yet be decoded into
/// a full value/frame, so a single `read()` that happens to return several
/// messages at once is never wasted.
pub struct Buffered<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> Buffered<R> {
    pub fn new(reader: R) -> Self {
        Buffered {
            reader,
            buf: Vec::new(),
        }
    }

    /// Construct with bytes already read off the wire (e.g. the tail left
    /// over after decoding `Settings`) seeded into the buffer.
    pub fn with_leftover(reader: R, leftover: Vec<u8>) -> Self {
        Buffered {
            reader,
            buf: leftover,
        }
    }

    async fn fill_more(&mut self) -> Result<usize, CodecError> {
        let n = self.reader.read_buf(&mut self.buf).await?;
        Ok(n)
    }

    /// Decode the next self-delimiting JSON value off the stream, matching
    /// `encoding/json`'s `Decoder.Decode`: values are back-to-back with no
    /// explicit length prefix.
    pub async fn read_json<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        loop {
            if !self.buf.is_empty() {
                let mut de = serde_json::Deserializer::from_slice(&self.buf);
                match T::deserialize(&mut de) {
                    Ok(value) => {
                        let consumed = de.byte_offset();
                        self.buf.drain(..consumed);
                        return Ok(value);
                    }
                    Err(e) if e.is_eof() => { /* need more bytes, fall through */ }
                    Err(e) => return Err(CodecError::Json(e)),
                }
            }
            if self.fill_more().await? == 0 {
                return Err(CodecError::Closed);
            }
        }
    }

    /// Read one length-prefixed binary frame (4-byte big-endian length
    /// followed by that many payload bytes).
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, CodecError> {
        while self.buf.len() < 4 {
            if self.fill_more().await? == 0 {
                return Err(CodecError::Closed);
            }
        }
        let len = u32::from_be_bytes(self.buf[..4].try_into().expect("checked above")) as usize;
        while self.buf.len() < 4 + len {
            if self.fill_more().await? == 0 {
                return Err(CodecError::Closed);
            }
        }
        let frame = self.buf[4..4 + len].to_vec();
        self.buf.drain(..4 + len);
        Ok(frame)
    }

    /// Consume self, returning the inner reader and any bytes buffered but
    /// not yet decoded (used when handing off from the settings reader to
    /// the negotiated codec).
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.reader, self.buf)
    }
}
