use bytes::Bytes;

use crate::processing::{FrameType, VideoCodec, AudioCodec};

/// What kind of payload a [`Packet`] carries, plus the classification
/// details a subscriber's drop policy and the cache need without re-parsing
/// the tag header.
#[derive(Debug, Clone)]
pub enum PacketKind {
    Video {
        codec: VideoCodec,
        frame_type: FrameType,
        is_sequence_header: bool,
    },
    Audio {
        codec: AudioCodec,
        is_sequence_header: bool,
    },
    Metadata,
}

impl PacketKind {
    pub fn is_video(&self) -> bool {
        matches!(self, PacketKind::Video { .. })
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, PacketKind::Audio { .. })
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self, PacketKind::Metadata)
    }

    pub fn is_sequence_header(&self) -> bool {
        match self {
            PacketKind::Video { is_sequence_header, .. } => *is_sequence_header,
            PacketKind::Audio { is_sequence_header, .. } => *is_sequence_header,
            PacketKind::Metadata => false,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        match self {
            PacketKind::Video { frame_type, .. } => frame_type.is_keyframe(),
            _ => false,
        }
    }
}

/// A timestamped media unit, already classified, with a reference-counted
/// payload so fan-out to N subscribers never re-copies the bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub timestamp: u32,
    pub stream_id: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(kind: PacketKind, timestamp: u32, stream_id: u32, payload: Bytes) -> Self {
        Packet { kind, timestamp, stream_id, payload }
    }
}

/// Identifying information about a stream that a [`crate::handler::Handler`]
/// or [`crate::handler::RoomKeyValidator`] needs but that has nothing to do
/// with the media itself.
#[derive(Debug, Clone)]
pub struct Info {
    /// The publish/play key (app + stream name), unique per [`crate::hub::Stream`].
    pub key: String,
    /// Full request URL, if the transport exposes one (HTTP-FLV does, RTMP
    /// reconstructs it from `connect`/`play` arguments).
    pub url: String,
    /// Unique id for this particular reader or writer, used by a Stream to
    /// index its subscriber set and by the writer to identify itself in
    /// logs.
    pub uid: u64,
    /// True for subscribers that may be interrupted without the publisher
    /// restarting (used by relay-style consumers; plain viewers are always
    /// `false`).
    pub is_interval: bool,
}
