mod server;
mod config;
mod context;

pub use server::RtmpServer;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use context::ServerContext;