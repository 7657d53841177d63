use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Any duplex byte stream a codec can run over. Blanket-implemented for every
/// `AsyncRead + AsyncWrite` type, so a `TcpStream` and an in-memory
/// `tokio::io::DuplexStream` (used by tests) are interchangeable once boxed.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Type-erased transport, analogous to the source's `io.ReadWriteCloser`
/// parameter threaded through every codec constructor.
pub type BoxedStream = Box<dyn AsyncStream>;

pub type BoxedReadHalf = tokio::io::ReadHalf<BoxedStream>;
pub type BoxedWriteHalf = tokio::io::WriteHalf<BoxedStream>;

impl AsyncRead for BoxedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut **self.get_mut()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_shutdown(cx)
    }
}

/// Split a boxed stream into independently owned read/write halves so the
/// read loop and the send-side mutex never contend with each other for the
/// same lock.
pub fn split_boxed(stream: BoxedStream) -> (BoxedReadHalf, BoxedWriteHalf) {
    tokio::io::split(stream)
}
