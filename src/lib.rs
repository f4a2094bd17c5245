mod utils;
mod byteio;
mod amf;
mod protocol;
mod handshake;
mod chunk;
mod connection;
mod server;
mod processing;
mod flv;
mod media;
mod cache;
mod subscriber;
mod hub;
mod handler;
mod config;

// Re-export commonly used types at crate root
pub use utils::*;
pub use byteio::*;
pub use amf::*;
pub use protocol::*;
pub use connection::*;
pub use chunk::*;
pub use handshake::*;

// Server exports
pub use server::{RtmpServer, ServerConfig, ServerConfigBuilder, ServerContext};

// Processing exports
pub use processing::*;

// Media, cache and fan-out exports
pub use flv::*;
pub use media::*;
pub use cache::*;
pub use subscriber::*;
pub use hub::*;
pub use handler::*;
pub use config::{Config, ConfigBuilder};
