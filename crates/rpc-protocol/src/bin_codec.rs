use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::buffered::Buffered;
use crate::error::CodecError;
use crate::header::Header;

/// Compact binary codec: each value is a 4-byte big-endian length prefix
/// followed by its `bincode` encoding.
pub struct BinReader<R> {
    inner: Buffered<R>,
}

impl<R: AsyncRead + Unpin> BinReader<R> {
    pub fn new(reader: R) -> Self {
        BinReader {
            inner: Buffered::new(reader),
        }
    }

    pub fn with_leftover(reader: R, leftover: Vec<u8>) -> Self {
        BinReader {
            inner: Buffered::with_leftover(reader, leftover),
        }
    }

    pub async fn read_header(&mut self) -> Result<Header, CodecError> {
        let frame = self.inner.read_frame().await?;
        Ok(bincode::deserialize(&frame)?)
    }

    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let frame = self.inner.read_frame().await?;
        Ok(bincode::deserialize(&frame)?)
    }
}

pub struct BinWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> BinWriter<W> {
    pub fn new(writer: W) -> Self {
        BinWriter { writer }
    }

    pub async fn write<T: Serialize>(
        &mut self,
        header: &Header,
        body: &T,
    ) -> Result<(), CodecError> {
        self.write_frame(header).await?;
        self.write_frame(body).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn write_frame<T: Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        let bytes = bincode::serialize(value)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| CodecError::Io(std::io::Error::other("frame too large")))?;
        self.writer.write_all(&len.to_be_bytes()).await?;
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
