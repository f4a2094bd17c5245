use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::handler::RoomKeyValidator;
use crate::hub::StreamRegistry;
use crate::server::config::ServerConfig;

/// Per-listener state shared by every accepted connection: the TCP-accept
/// settings, the hub registry connections publish into and play from, the
/// room-key policy, and the per-IP connection bookkeeping the accept loop
/// enforces.
pub struct ServerContext {
    config: Arc<ServerConfig>,
    registry: Arc<StreamRegistry>,
    validator: Arc<dyn RoomKeyValidator>,
    fanout_config: Arc<Config>,
    connection_counter: AtomicU64,
    ip_counts: Arc<RwLock<HashMap<IpAddr, usize>>>,
}

impl ServerContext {
    pub fn new(
        config: Arc<ServerConfig>,
        registry: Arc<StreamRegistry>,
        validator: Arc<dyn RoomKeyValidator>,
        fanout_config: Arc<Config>,
    ) -> Self {
        ServerContext {
            config,
            registry,
            validator,
            fanout_config,
            connection_counter: AtomicU64::new(0),
            ip_counts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<StreamRegistry> {
        self.registry.clone()
    }

    pub fn validator(&self) -> Arc<dyn RoomKeyValidator> {
        self.validator.clone()
    }

    pub fn fanout_config(&self) -> Arc<Config> {
        self.fanout_config.clone()
    }

    /// Generate unique connection ID
    pub fn generate_connection_id(&self) -> String {
        let id = self.connection_counter.fetch_add(1, Ordering::SeqCst);
        format!("conn-{}", id)
    }

    /// Check if can accept from IP
    pub async fn can_accept_from_ip(&self, ip: IpAddr) -> bool {
        let counts = self.ip_counts.read().await;
        let count = counts.get(&ip).copied().unwrap_or(0);
        count < self.config.max_connections_per_ip
    }

    /// Increment IP connection count
    pub async fn increment_ip_count(&self, ip: IpAddr) {
        let mut counts = self.ip_counts.write().await;
        *counts.entry(ip).or_insert(0) += 1;
    }

    /// Decrement IP connection count
    pub async fn decrement_ip_count(&self, ip: IpAddr) {
        let mut counts = self.ip_counts.write().await;
        if let Some(count) = counts.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&ip);
            }
        }
    }
}
