use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Default eviction window for a registered address, matching spec.md §6's
/// `2 min` default. A server is expected to heartbeat at `timeout - 1 min`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

struct ServiceItem {
    addresses: HashMap<String, Instant>,
    timeout: Duration,
}

/// Registry state: `serviceName -> {endpoint -> last_seen}`, serialized
/// behind a single lock for both upserts and eviction-on-read, per
/// spec.md §5.
#[derive(Clone)]
pub struct RegistryState {
    services: Arc<Mutex<HashMap<String, ServiceItem>>>,
    timeout: Duration,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Used by tests that need eviction to happen on a much shorter clock
    /// than the real 2-minute default.
    pub fn with_timeout(timeout: Duration) -> Self {
        RegistryState {
            services: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub async fn upsert(&self, service_name: &str, endpoint: String) {
        let mut services = self.services.lock().await;
        let item = services.entry(service_name.to_owned()).or_insert_with(|| ServiceItem {
            addresses: HashMap::new(),
            timeout: self.timeout,
        });
        item.addresses.insert(endpoint, Instant::now());
    }

    /// Returns the currently-alive endpoints for `service_name`, evicting
    /// any entry older than its timeout as a side effect of the lookup.
    pub async fn alive_endpoints(&self, service_name: &str) -> Vec<String> {
        let mut services = self.services.lock().await;
        let Some(item) = services.get_mut(service_name) else {
            return Vec::new();
        };
        let now = Instant::now();
        item.addresses.retain(|_, last_seen| now.duration_since(*last_seen) <= item.timeout);
        let mut endpoints: Vec<String> = item.addresses.keys().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}
