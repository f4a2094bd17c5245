//! The seams a transport plugs into the hub through. RTMP and HTTP-FLV are
//! the two transports this crate implements, but nothing in [`crate::hub`]
//! or [`crate::cache`] depends on either directly; they only see these
//! traits.

use async_trait::async_trait;

use crate::media::{Info, Packet};
use crate::{Error, Result};

/// A source of media packets: a publishing RTMP connection reading frames
/// off the wire. Implemented once per transport that can *originate* a
/// stream; this crate only has RTMP publish, but the seam exists so a
/// future transport (e.g. SRT, WHIP) doesn't require touching the hub.
#[async_trait]
pub trait ReadCloser: Send + Sync {
    async fn read(&mut self) -> Result<Packet>;
    fn info(&self) -> Info;
    fn alive(&self) -> bool;
    /// Tear the connection down, recording why: a handover-displaced
    /// publisher closes with `Error::protocol("stop old")`, a faulted read
    /// closes with the read error itself.
    async fn close(&mut self, reason: Error);
}

/// A sink for media packets: an RTMP or HTTP-FLV subscriber's write path.
#[async_trait]
pub trait WriteCloser: Send + Sync {
    async fn write(&mut self, packet: Packet) -> Result<()>;
    fn info(&self) -> Info;
    fn alive(&self) -> bool;
    /// Tear the subscriber down, recording why: a write failure closes
    /// with the write error itself, an `is_interval` teardown at publisher
    /// end closes with a reason describing that.
    async fn close(&mut self, reason: Error);
    /// Invoked once right after a publisher handover so this writer's
    /// timestamp base tracker rebases before the next packet arrives.
    fn calc_base_timestamp(&mut self);
}

/// Glue between a connection and the hub: given a freshly accepted
/// connection that turned out to be a publisher or a player, hand it to the
/// hub as a [`ReadCloser`] or [`WriteCloser`] respectively.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_reader(&self, reader: Box<dyn ReadCloser>);
    async fn handle_writer(&self, writer: Box<dyn WriteCloser>);
}

/// Injectable room-key authorization check, consulted before a publish is
/// allowed to create or take over a [`crate::hub::Stream`]. Kept as a trait
/// object rather than a global table so tests and embedders can supply
/// their own policy without touching the hub.
#[async_trait]
pub trait RoomKeyValidator: Send + Sync {
    async fn validate(&self, stream_key: &str) -> bool;
}

/// A validator that allows every stream key; the default when no
/// authorization table is configured.
pub struct AllowAll;

#[async_trait]
impl RoomKeyValidator for AllowAll {
    async fn validate(&self, _stream_key: &str) -> bool {
        true
    }
}
