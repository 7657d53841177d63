use std::collections::HashMap;
use std::sync::Arc;

use rpc_protocol::{Header, NegotiatedReader, NegotiatedWriter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::service::{MethodDescriptor, Service};

/// One accepted, already-handshaken connection. Runs the read loop described
/// in spec.md §4.3: `READ_HEADER -> LOOKUP -> READ_BODY -> DISPATCH`, with a
/// final `CLOSING` step draining in-flight workers before the transport is
/// shut down.
///
/// The read loop owns `reader` outright (single reader, never shared).
/// `writer` is wrapped in a mutex because both the read loop (for
/// handshake-failure replies) and every spawned per-call worker write
/// through it; spec.md §5 requires this to be the connection's only lock.
pub struct Connection {
    reader: NegotiatedReader,
    sending: Arc<Mutex<NegotiatedWriter>>,
    services: Arc<Mutex<HashMap<String, Arc<Service>>>>,
}

impl Connection {
    pub fn new(
        reader: NegotiatedReader,
        writer: NegotiatedWriter,
        services: Arc<Mutex<HashMap<String, Arc<Service>>>>,
    ) -> Self {
        Connection {
            reader,
            sending: Arc::new(Mutex::new(writer)),
            services,
        }
    }

    pub async fn run(mut self) {
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            let header = match self.reader.read_header().await {
                Ok(header) => header,
                Err(e) if e.is_peer_gone() => {
                    debug!("connection closed by peer");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read request header");
                    let mut error_header = Header::request(String::new(), String::new(), 0);
                    error_header.err = e.to_string();
                    let mut writer = self.sending.lock().await;
                    let _ = writer.write(&error_header, &()).await;
                    break;
                }
            };

            let method = match self.lookup(&header).await {
                Some(method) => method,
                None => {
                    warn!(
                        service = %header.service,
                        method = %header.method,
                        seq = header.seq,
                        "unknown service or method, tearing down connection"
                    );
                    break;
                }
            };

            let args = match method.decode_args(&mut self.reader).await {
                Ok(args) => args,
                Err(e) => {
                    error!(
                        service = %header.service,
                        method = %header.method,
                        seq = header.seq,
                        error = %e,
                        "failed to decode request body"
                    );
                    let mut writer = self.sending.lock().await;
                    let _ = method.encode_reply(Err(e.to_string()), &mut writer, header).await;
                    break;
                }
            };

            let sending = self.sending.clone();
            workers.spawn(async move {
                let outcome = method.invoke(args).await;
                let mut writer = sending.lock().await;
                if let Err(e) = method.encode_reply(outcome, &mut writer, header.clone()).await {
                    error!(
                        service = %header.service,
                        method = %header.method,
                        seq = header.seq,
                        error = %e,
                        "failed to write reply"
                    );
                }
            });
        }

        while workers.join_next().await.is_some() {}

        let mut writer = self.sending.lock().await;
        let _ = writer.close().await;
    }

    async fn lookup(&self, header: &Header) -> Option<Arc<MethodDescriptor>> {
        let services = self.services.lock().await;
        services.get(&header.service)?.method_named(&header.method)
    }
}
