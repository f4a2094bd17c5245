use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connection::Session;
use crate::handler::RoomKeyValidator;
use crate::hub::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::context::ServerContext;
use crate::{Error, Result};

/// Accepts RTMP connections and spawns a [`Session`] per connection against
/// a shared [`StreamRegistry`]. The TCP-accept concerns (connection and
/// per-IP limits, listen address) live in [`ServerConfig`]; the fan-out
/// concerns a `Session` hands packets into live in [`Config`].
pub struct RtmpServer {
    config: Arc<ServerConfig>,
    context: Arc<ServerContext>,
    connections: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    shutdown: Arc<RwLock<bool>>,
}

impl RtmpServer {
    pub fn new(
        config: ServerConfig,
        registry: Arc<StreamRegistry>,
        validator: Arc<dyn RoomKeyValidator>,
        fanout_config: Arc<Config>,
    ) -> Self {
        let config = Arc::new(config);
        let context = Arc::new(ServerContext::new(config.clone(), registry, validator, fanout_config));

        RtmpServer {
            config,
            context,
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn context(&self) -> Arc<ServerContext> {
        self.context.clone()
    }

    /// Listen and accept connections
    pub async fn listen(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await
            .map_err(|e| Error::connection(format!("Failed to bind {}: {}", addr, e)))?;

        log::info!("RTMP server listening on {}", addr);

        loop {
            if *self.shutdown.read().await {
                break;
            }

            let (stream, peer_addr) = match listener.accept().await {
                Ok((s, a)) => (s, a),
                Err(e) => {
                    log::warn!("accept error: {}", e);
                    continue;
                }
            };

            log::info!("new connection from {}", peer_addr);

            if self.connections.read().await.len() >= self.config.max_connections {
                log::warn!("connection limit reached, rejecting {}", peer_addr);
                drop(stream);
                continue;
            }

            let ip = peer_addr.ip();
            if !self.context.can_accept_from_ip(ip).await {
                log::warn!("IP limit reached for {}, rejecting", ip);
                drop(stream);
                continue;
            }

            self.handle_connection(stream, ip).await;
        }

        log::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, ip: std::net::IpAddr) {
        let conn_id = self.context.generate_connection_id();
        self.context.increment_ip_count(ip).await;

        let session = Session::new(
            conn_id.clone(),
            self.context.registry(),
            self.context.validator(),
            self.context.fanout_config(),
        );

        let connections = self.connections.clone();
        let context = self.context.clone();
        let conn_id_clone = conn_id.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = session.run(stream).await {
                log::warn!("connection {} error: {}", conn_id_clone, e);
            }
            connections.write().await.remove(&conn_id_clone);
            context.decrement_ip_count(ip).await;
            log::info!("connection {} closed", conn_id_clone);
        });

        self.connections.write().await.insert(conn_id, handle);
    }

    /// Shutdown server
    pub async fn shutdown(&self) {
        log::info!("shutting down server");
        *self.shutdown.write().await = true;

        let connections = self.connections.read().await;
        for (id, handle) in connections.iter() {
            log::info!("stopping connection {}", id);
            handle.abort();
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
