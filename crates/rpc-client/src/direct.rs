use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rpc_protocol::{BoxedStream, CodecKind, Header, NegotiatedReader, NegotiatedWriter, Settings};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::error::ClientError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type ErasedReply = Box<dyn Any + Send>;
type CallOutcome = Result<ErasedReply, ClientError>;

struct PendingCall {
    decode: Box<dyn FnOnce(&mut NegotiatedReader) -> BoxFuture<'_, Result<ErasedReply, ClientError>> + Send>,
    tx: oneshot::Sender<CallOutcome>,
    invalid: Arc<AtomicBool>,
}

struct ClientState {
    pending: HashMap<u64, PendingCall>,
    closed: bool,
}

/// A connection to a single RPC server, handshaken and ready to issue calls.
///
/// Mirrors `toyrpc.Client`, but the receive loop runs as its own task
/// instead of being driven synchronously by `call`: `sending` guards the
/// write half (shared by `call` and `terminate`), `state` guards the pending
/// map. Per spec.md §5, the only place both locks are held together is
/// `terminate`, and always in the order `sending` then `state`.
pub struct DirectClient {
    sending: Arc<Mutex<NegotiatedWriter>>,
    state: Arc<Mutex<ClientState>>,
    next_seq: AtomicU64,
}

impl DirectClient {
    pub async fn connect(addr: &str, codec: CodecKind) -> Result<Arc<Self>, ClientError> {
        let mut stream = TcpStream::connect(addr).await?;
        rpc_protocol::write_settings(&mut stream, &Settings::new(codec)).await?;

        let boxed: BoxedStream = Box::new(stream);
        let registry = rpc_protocol::CodecRegistry::with_defaults();
        let (reader, writer) = registry.build(codec.name(), Vec::new(), boxed)?;

        let client = Arc::new(DirectClient {
            sending: Arc::new(Mutex::new(writer)),
            state: Arc::new(Mutex::new(ClientState {
                pending: HashMap::new(),
                closed: false,
            })),
            next_seq: AtomicU64::new(1),
        });

        let receiver = client.clone();
        tokio::spawn(async move { receiver.receive_loop(reader).await });

        Ok(client)
    }

    /// Issues a call with no deadline; waits until the reply arrives or the
    /// connection is torn down.
    pub async fn call<A, R>(&self, service: &str, method: &str, args: &A, reply: &mut R) -> Result<(), ClientError>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned + Send + 'static,
    {
        let (rx, _invalid) = self.dispatch::<A, R>(service, method, args).await?;
        let outcome = rx.await.map_err(|_| ClientError::ShuttingDown)?;
        Self::apply_outcome(outcome, reply)
    }

    /// Issues a call bounded by `timeout`. On expiry the pending entry is
    /// left in place (not removed) so the receive loop can still drain the
    /// matching body off the wire once it arrives, per spec.md §4.4 step 5.
    pub async fn call_with_timeout<A, R>(
        &self,
        service: &str,
        method: &str,
        args: &A,
        reply: &mut R,
        timeout: Duration,
    ) -> Result<(), ClientError>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned + Send + 'static,
    {
        let (rx, invalid) = self.dispatch::<A, R>(service, method, args).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Self::apply_outcome(outcome, reply),
            Ok(Err(_)) => Err(ClientError::ShuttingDown),
            Err(_) => {
                invalid.store(true, Ordering::Relaxed);
                Err(ClientError::Cancelled)
            }
        }
    }

    async fn dispatch<A, R>(
        &self,
        service: &str,
        method: &str,
        args: &A,
    ) -> Result<(oneshot::Receiver<CallOutcome>, Arc<AtomicBool>), ClientError>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned + Send + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let invalid = Arc::new(AtomicBool::new(false));

        let decode: Box<dyn FnOnce(&mut NegotiatedReader) -> BoxFuture<'_, Result<ErasedReply, ClientError>> + Send> =
            Box::new(|reader: &mut NegotiatedReader| {
                Box::pin(async move {
                    let reply: R = reader.read_body().await?;
                    Ok(Box::new(reply) as ErasedReply)
                })
            });

        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ClientError::ShuttingDown);
            }
            state.pending.insert(
                seq,
                PendingCall {
                    decode,
                    tx,
                    invalid: invalid.clone(),
                },
            );
        }

        let header = Header::request(service, method, seq);
        let write_result = {
            let mut writer = self.sending.lock().await;
            writer.write(&header, args).await
        };

        if let Err(e) = write_result {
            let mut state = self.state.lock().await;
            state.pending.remove(&seq);
            return Err(e.into());
        }

        Ok((rx, invalid))
    }

    fn apply_outcome<R: 'static>(outcome: CallOutcome, reply: &mut R) -> Result<(), ClientError> {
        let erased = outcome?;
        let decoded = erased.downcast::<R>().map_err(|_| ClientError::ReplyTypeMismatch)?;
        *reply = *decoded;
        Ok(())
    }

    async fn receive_loop(self: Arc<Self>, mut reader: NegotiatedReader) {
        loop {
            let header = match reader.read_header().await {
                Ok(header) => header,
                Err(e) => {
                    debug!(error = %e, "direct client connection closed");
                    self.terminate().await;
                    return;
                }
            };

            let pending = {
                let mut state = self.state.lock().await;
                state.pending.remove(&header.seq)
            };

            let Some(pending) = pending else {
                debug!(seq = header.seq, "reply for unknown or already-completed call, discarding");
                continue;
            };

            let decoded = (pending.decode)(&mut reader).await;

            if pending.invalid.load(Ordering::Relaxed) {
                debug!(seq = header.seq, "drained late reply for a cancelled call");
                continue;
            }

            let outcome = match decoded {
                Ok(value) if header.is_ok() => Ok(value),
                Ok(_) => Err(ClientError::Remote(header.err)),
                Err(e) => Err(e),
            };
            let _ = pending.tx.send(outcome);
        }
    }

    /// Marks the connection closed and fails every pending call with
    /// [`ClientError::ShuttingDown`], holding `sending` then `state` as
    /// required when both locks are taken together.
    async fn terminate(&self) {
        let _sending = self.sending.lock().await;
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        for (_, pending) in state.pending.drain() {
            let _ = pending.tx.send(Err(ClientError::ShuttingDown));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn make_client() -> Arc<DirectClient> {
        let (a, _b) = tokio::io::duplex(1 << 20);
        let boxed: BoxedStream = Box::new(a);
        let registry = rpc_protocol::CodecRegistry::with_defaults();
        let (_reader, writer) = registry
            .build(CodecKind::Json.name(), Vec::new(), boxed)
            .expect("json codec is always registered");
        Arc::new(DirectClient {
            sending: Arc::new(Mutex::new(writer)),
            state: Arc::new(Mutex::new(ClientState {
                pending: HashMap::new(),
                closed: false,
            })),
            next_seq: AtomicU64::new(1),
        })
    }

    #[tokio::test]
    async fn concurrent_seq_allocation_is_unique_and_covers_the_expected_range() {
        let client = make_client();
        let mut handles = Vec::new();
        for _ in 0..64 {
            let client = client.clone();
            handles.push(tokio::spawn(async move { client.next_seq.fetch_add(1, Ordering::Relaxed) }));
        }

        let mut seqs = HashSet::new();
        for handle in handles {
            let seq = handle.await.expect("task should not panic");
            assert!(seqs.insert(seq), "seq {seq} was allocated more than once");
        }
        assert_eq!(seqs, (1..=64).collect::<HashSet<_>>());
    }
}
