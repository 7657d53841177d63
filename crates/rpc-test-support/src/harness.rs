use std::net::SocketAddr;

use rpc_client::DirectClient;
use rpc_protocol::CodecKind;
use rpc_server::{Server, ServerConfig, Service};
use std::sync::Arc;

/// Binds a server on an ephemeral loopback port, registers `services`, and
/// runs its accept loop on a background task for the lifetime of the test
/// process. Returns the bound address.
pub async fn spawn_server(services: Vec<Service>) -> SocketAddr {
    let server = Server::bind(ServerConfig {
        addr: "127.0.0.1:0".to_owned(),
        registry_url: None,
        heartbeat_interval: std::time::Duration::from_secs(60),
    })
    .await
    .expect("bind should succeed on an ephemeral port");

    for service in services {
        server
            .register_service(service)
            .await
            .expect("test fixtures register under distinct names");
    }

    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });
    addr
}

/// Connects a [`DirectClient`] to `addr` using the default JSON codec.
pub async fn connect(addr: SocketAddr) -> Arc<DirectClient> {
    DirectClient::connect(&addr.to_string(), CodecKind::Json)
        .await
        .expect("connect should succeed against a freshly spawned test server")
}
