use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

use crate::chunk::ChunkWriter;
use crate::flv::muxer;
use crate::handler::WriteCloser;
use crate::media::{Info, Packet, PacketKind};
use crate::protocol::{RtmpHeader, RtmpPacket, CHUNK_STREAM_AUDIO, CHUNK_STREAM_DATA, CHUNK_STREAM_VIDEO,
    MSG_TYPE_AUDIO, MSG_TYPE_DATA_AMF0, MSG_TYPE_VIDEO};
use crate::subscriber::timestamp::TimestampBase;
use crate::{Error, Result};

/// RTMP subscriber write path: reassembles a normalized [`Packet`] back
/// into chunks and flushes after every one. A write error tears the
/// subscriber down rather than retrying; the hub removes it from the
/// stream's subscriber set on the next send.
pub struct RtmpSubscriber<W> {
    writer: Mutex<W>,
    chunk_writer: ChunkWriter,
    info: Info,
    base: TimestampBase,
    alive: bool,
}

impl<W: AsyncWrite + Unpin + Send> RtmpSubscriber<W> {
    pub fn new(writer: W, info: Info) -> Self {
        RtmpSubscriber {
            writer: Mutex::new(writer),
            chunk_writer: ChunkWriter::new(),
            info,
            base: TimestampBase::new(),
            alive: true,
        }
    }

    fn to_rtmp_packet(&mut self, packet: &Packet) -> Result<RtmpPacket> {
        let is_video = packet.kind.is_video();
        let rebased_ts = self.base.rec_timestamp(packet.timestamp, is_video);

        let (message_type, chunk_stream_id) = match &packet.kind {
            PacketKind::Video { .. } => (MSG_TYPE_VIDEO, CHUNK_STREAM_VIDEO),
            PacketKind::Audio { .. } => (MSG_TYPE_AUDIO, CHUNK_STREAM_AUDIO),
            PacketKind::Metadata => (MSG_TYPE_DATA_AMF0, CHUNK_STREAM_DATA),
        };

        // RTMP metadata messages don't carry the `@setDataFrame` envelope on
        // the wire to players; strip it the same way the HTTP-FLV path does.
        let payload = if matches!(packet.kind, PacketKind::Metadata) {
            muxer::strip_set_data_frame(&packet.payload)?.to_vec()
        } else {
            packet.payload.to_vec()
        };

        let header = RtmpHeader::new(
            rebased_ts,
            payload.len() as u32,
            message_type,
            packet.stream_id,
            chunk_stream_id,
        );
        Ok(RtmpPacket::new(header, payload))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + Sync> WriteCloser for RtmpSubscriber<W> {
    async fn write(&mut self, packet: Packet) -> Result<()> {
        if !self.alive {
            return Err(Error::transport_closed("subscriber already closed"));
        }
        let rtmp_packet = self.to_rtmp_packet(&packet)?;
        let mut writer = self.writer.lock().await;
        let result = self.chunk_writer.write_packet(&rtmp_packet, &mut *writer).await;
        if result.is_err() {
            self.alive = false;
        }
        result
    }

    fn info(&self) -> Info {
        self.info.clone()
    }

    fn alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self, reason: Error) {
        log::debug!("closing RTMP subscriber '{}': {}", self.info.key, reason);
        self.alive = false;
    }

    fn calc_base_timestamp(&mut self) {
        self.base.calc_base_timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{FrameType, VideoCodec};
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    fn video_packet(ts: u32) -> Packet {
        Packet::new(
            PacketKind::Video { codec: VideoCodec::H264, frame_type: FrameType::Keyframe, is_sequence_header: false },
            ts,
            1,
            Bytes::from_static(&[0x17, 0x01, 0, 0, 0]),
        )
    }

    #[tokio::test]
    async fn write_flushes_a_chunk_onto_the_wire() {
        let (client, mut server) = tokio::io::duplex(4096);
        let info = Info { key: "live/test".into(), url: String::new(), uid: 1, is_interval: false };
        let mut subscriber = RtmpSubscriber::new(client, info);

        subscriber.write(video_packet(0)).await.unwrap();

        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).await.unwrap();
        // Basic header byte: fmt 0, chunk stream id 6 (video).
        assert_eq!(buf[0] & 0x3F, 6);
    }

    #[tokio::test]
    async fn metadata_strips_set_data_frame_before_fanout() {
        use crate::amf::{Amf0Encoder, Amf0Value};

        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String("@setDataFrame".to_string())).unwrap();
        encoder.encode(&Amf0Value::String("onMetaData".to_string())).unwrap();
        let payload = encoder.get_bytes();

        let (client, _server) = tokio::io::duplex(4096);
        let info = Info { key: "live/test".into(), url: String::new(), uid: 1, is_interval: false };
        let mut subscriber = RtmpSubscriber::new(client, info);

        let packet = Packet::new(PacketKind::Metadata, 0, 1, Bytes::from(payload));
        let rtmp_packet = subscriber.to_rtmp_packet(&packet).unwrap();
        let stripped = crate::flv::muxer::strip_set_data_frame(&rtmp_packet.payload).unwrap();
        // Already stripped, so re-stripping is a no-op.
        assert_eq!(&stripped[..], &rtmp_packet.payload[..]);
    }

    #[tokio::test]
    async fn write_after_peer_drop_marks_subscriber_dead() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);
        let info = Info { key: "live/test".into(), url: String::new(), uid: 1, is_interval: false };
        let mut subscriber = RtmpSubscriber::new(client, info);

        let _ = subscriber.write(video_packet(0)).await;
        assert!(!subscriber.alive());
    }
}
