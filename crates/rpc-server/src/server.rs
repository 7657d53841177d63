use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rpc_protocol::{BoxedStream, CodecRegistry};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::connection::Connection;
use crate::error::ServerError;
use crate::service::Service;

/// Knobs `Server::bind` needs beyond the listen address: where to register
/// with (if anywhere) and how often to re-heartbeat.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub registry_url: Option<String>,
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "127.0.0.1:0".to_owned(),
            registry_url: None,
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

struct ServerInner {
    listener: TcpListener,
    local_addr: SocketAddr,
    services: Arc<Mutex<HashMap<String, Arc<Service>>>>,
    codecs: CodecRegistry,
    http: reqwest::Client,
    registry_url: Option<String>,
    heartbeat_interval: Duration,
}

/// A listening RPC endpoint. Cheap to clone — every accepted connection and
/// every heartbeat task holds its own clone of the `Arc`-backed handle.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Binds immediately; a failure to bind is treated as fatal, matching the
    /// source's `log.Panic` on listener setup.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr)
            .await
            .map_err(|e| ServerError::Bind(config.addr.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(config.addr.clone(), e))?;

        Ok(Server {
            inner: Arc::new(ServerInner {
                listener,
                local_addr,
                services: Arc::new(Mutex::new(HashMap::new())),
                codecs: CodecRegistry::with_defaults(),
                http: reqwest::Client::new(),
                registry_url: config.registry_url,
                heartbeat_interval: config.heartbeat_interval,
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Registers `service`, rejecting a duplicate name. If a registry URL was
    /// configured, sends one heartbeat immediately and spawns a task that
    /// re-sends on `heartbeat_interval` forever.
    pub async fn register_service(&self, service: Service) -> Result<(), ServerError> {
        let name = service.name().to_owned();
        {
            let mut services = self.inner.services.lock().await;
            if services.contains_key(&name) {
                return Err(ServerError::DuplicateService(name));
            }
            services.insert(name.clone(), Arc::new(service));
        }

        if let Some(registry_url) = self.inner.registry_url.clone() {
            self.heartbeat_once(&registry_url, &name).await?;
            let server = self.clone();
            tokio::spawn(async move {
                server.heartbeat_loop(registry_url, name).await;
            });
        }

        Ok(())
    }

    async fn heartbeat_once(&self, registry_url: &str, service: &str) -> Result<(), ServerError> {
        let service_addr = format!(":{}", self.inner.local_addr.port());
        self.inner
            .http
            .post(format!("{registry_url}/default_registry"))
            .json(&serde_json::json!({
                "serviceName": service,
                "serviceAddr": service_addr,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn heartbeat_loop(&self, registry_url: String, service: String) {
        let mut ticker = tokio::time::interval(self.inner.heartbeat_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.heartbeat_once(&registry_url, &service).await {
                warn!(service = %service, error = %e, "registry heartbeat failed");
            }
        }
    }

    /// Runs the accept loop forever. A handshake failure on one connection is
    /// logged and the loop continues; it never brings the listener down.
    pub async fn serve(&self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = match self.inner.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer).await {
                    warn!(peer = %peer, error = %e, "connection handshake failed");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
        let mut stream = stream;
        let (settings, leftover) = rpc_protocol::read_settings(&mut stream).await?;

        if settings.magic != rpc_protocol::MAGIC_NUMBER {
            return Err(ServerError::Codec(rpc_protocol::CodecError::BadMagic));
        }
        if !self.inner.codecs.contains(&settings.codec_type) {
            return Err(ServerError::Codec(rpc_protocol::CodecError::UnknownCodec(
                settings.codec_type,
            )));
        }

        let boxed: BoxedStream = Box::new(stream);
        let (reader, writer) = self.inner.codecs.build(&settings.codec_type, leftover, boxed)?;

        info!(peer = %peer, codec = %settings.codec_type, "connection established");

        let connection = Connection::new(reader, writer, self.inner.services.clone());
        connection.run().await;
        Ok(())
    }
}
