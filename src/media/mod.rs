//! The normalized packet type that flows from a Stream's read loop through
//! the cache and out to every subscriber's write path. RTMP chunk assembly
//! and FLV tag framing both convert into and out of this shape so the hub
//! never has to know which transport a given packet came from or is going
//! to.

mod packet;

pub use packet::{Packet, PacketKind, Info};
