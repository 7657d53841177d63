use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rpc_protocol::CodecKind;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::direct::DirectClient;
use crate::error::DiscoveryError;

/// Mirrors `xclient.SelectMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Random,
    RoundRobin,
}

struct DiscoveryEntry {
    addr: String,
    client: Arc<DirectClient>,
    last_refreshed: Instant,
}

#[derive(Default)]
struct ServiceEntries {
    list: Vec<DiscoveryEntry>,
    cursor: usize,
}

/// A client that resolves a service name to one of possibly many servers via
/// the registry, refreshing its view on an interval. Mirrors `xclient`'s
/// `discovery`, with the addition of a background refresh task (the source
/// only updates lazily, from `get`).
pub struct DiscoveryClient {
    registry_url: String,
    http: reqwest::Client,
    select_mode: SelectMode,
    refresh_interval: Duration,
    codec: CodecKind,
    services: RwLock<HashMap<String, ServiceEntries>>,
}

impl DiscoveryClient {
    pub fn new(registry_url: impl Into<String>, select_mode: SelectMode, refresh_interval: Duration) -> Arc<Self> {
        let client = Arc::new(DiscoveryClient {
            registry_url: registry_url.into(),
            http: reqwest::Client::new(),
            select_mode,
            refresh_interval,
            codec: CodecKind::Json,
            services: RwLock::new(HashMap::new()),
        });

        let refresher = client.clone();
        tokio::spawn(async move { refresher.refresh_loop().await });

        client
    }

    async fn refresh_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        loop {
            ticker.tick().await;
            let names: Vec<String> = self.services.read().await.keys().cloned().collect();
            for name in names {
                if let Err(e) = self.update(&name).await {
                    warn!(service = %name, error = %e, "failed to refresh service list from registry");
                }
            }
        }
    }

    /// Fetches the registry's current address list for `service` and merges
    /// it into the known entries. Mirrors `discovery.update`: addresses are
    /// only added or refreshed here, never removed — staleness is handled
    /// lazily by `call`/`get`, matching the source.
    pub async fn update(&self, service: &str) -> Result<(), DiscoveryError> {
        let addrs: Vec<String> = self
            .http
            .get(format!("{}/default_registry", self.registry_url))
            .query(&[("serviceName", service)])
            .send()
            .await?
            .json()
            .await?;

        let mut services = self.services.write().await;
        let entry = services.entry(service.to_owned()).or_default();
        let now = Instant::now();

        for addr in addrs {
            if let Some(existing) = entry.list.iter_mut().find(|e| e.addr == addr) {
                existing.last_refreshed = now;
                continue;
            }
            match DirectClient::connect(&addr, self.codec).await {
                Ok(client) => entry.list.push(DiscoveryEntry {
                    addr,
                    client,
                    last_refreshed: now,
                }),
                Err(e) => warn!(addr = %addr, error = %e, "failed to dial discovered server, skipping"),
            }
        }

        Ok(())
    }

    /// Picks one server for `service` by the configured selection mode,
    /// dropping entries whose `last_refreshed` is older than the refresh
    /// interval (checked only here, never eagerly in `update`).
    async fn select(&self, service: &str) -> Result<Arc<DirectClient>, DiscoveryError> {
        let mut services = self.services.write().await;
        let entry = services
            .get_mut(service)
            .ok_or_else(|| DiscoveryError::NoAvailableServers(service.to_owned()))?;

        let deadline = Instant::now() - self.refresh_interval;
        entry.list.retain(|e| e.last_refreshed >= deadline);

        if entry.list.is_empty() {
            return Err(DiscoveryError::NoAvailableServers(service.to_owned()));
        }

        let idx = pick_index(self.select_mode, entry.list.len(), &mut entry.cursor);
        let chosen = &entry.list[idx];
        debug!(service = %service, addr = %chosen.addr, "selected server");
        Ok(chosen.client.clone())
    }

    /// Resolves `service` to a server and issues the call against it,
    /// fetching the address list on first use.
    pub async fn call<A, R>(&self, service: &str, method: &str, args: &A, reply: &mut R) -> Result<(), DiscoveryError>
    where
        A: serde::Serialize + Send + Sync,
        R: serde::de::DeserializeOwned + Send + 'static,
    {
        if !self.services.read().await.contains_key(service) {
            self.update(service).await?;
        }
        let client = self.select(service).await?;
        client.call(service, method, args, reply).await.map_err(DiscoveryError::from)
    }
}

/// Picks an index into a `len`-long list per `mode`, mirroring
/// `xclient.discovery.get`'s `switch` on select mode. Factored out of
/// [`DiscoveryClient::select`] so the round-robin arithmetic is unit
/// testable without a live registry or dialed servers. `len` must be
/// nonzero.
fn pick_index(mode: SelectMode, len: usize, cursor: &mut usize) -> usize {
    match mode {
        SelectMode::Random => rand::thread_rng().gen_range(0..len),
        SelectMode::RoundRobin => {
            let idx = *cursor % len;
            *cursor = (*cursor + 1) % len;
            idx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_visits_every_index_exactly_once_per_cycle() {
        let mut cursor = 0;
        let len = 4;
        let mut seen = vec![0u32; len];
        for _ in 0..len {
            let idx = pick_index(SelectMode::RoundRobin, len, &mut cursor);
            seen[idx] += 1;
        }
        assert_eq!(seen, vec![1, 1, 1, 1]);

        // Cycles repeat identically afterward.
        let mut seen_again = vec![0u32; len];
        for _ in 0..len {
            let idx = pick_index(SelectMode::RoundRobin, len, &mut cursor);
            seen_again[idx] += 1;
        }
        assert_eq!(seen_again, vec![1, 1, 1, 1]);
    }

    #[test]
    fn round_robin_cursor_mods_down_when_list_shrinks() {
        let mut cursor = 3;
        // A list shrunk to length 2 must still produce an in-bounds index.
        let idx = pick_index(SelectMode::RoundRobin, 2, &mut cursor);
        assert!(idx < 2);
    }
}
