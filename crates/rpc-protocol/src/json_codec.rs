use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::buffered::Buffered;
use crate::error::CodecError;
use crate::header::Header;

/// Default textual codec. Self-delimiting JSON values back to back on the
/// wire, matching `toyrpc`'s `JSONEncDec`.
pub struct JsonReader<R> {
    inner: Buffered<R>,
}

impl<R: AsyncRead + Unpin> JsonReader<R> {
    pub fn new(reader: R) -> Self {
        JsonReader {
            inner: Buffered::new(reader),
        }
    }

    pub fn with_leftover(reader: R, leftover: Vec<u8>) -> Self {
        JsonReader {
            inner: Buffered::with_leftover(reader, leftover),
        }
    }

    pub async fn read_header(&mut self) -> Result<Header, CodecError> {
        self.inner.read_json().await
    }

    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        self.inner.read_json().await
    }
}

pub struct JsonWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonWriter { writer }
    }

    /// Encode `header` then `body` and flush. On any failure the caller must
    /// treat the transport as unrecoverable — the wire may now be mid-value.
    pub async fn write<T: Serialize>(
        &mut self,
        header: &Header,
        body: &T,
    ) -> Result<(), CodecError> {
        self.write_value(header).await?;
        self.write_value(body).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn write_value<T: Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        let bytes = serde_json::to_vec(value)?;
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
