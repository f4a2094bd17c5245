use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::flv::{muxer, FILE_HEADER};
use crate::handler::WriteCloser;
use crate::media::{Info, Packet, PacketKind};
use crate::subscriber::timestamp::TimestampBase;
use crate::{Error, Result};

/// HTTP-FLV subscriber write path: an FLV file header followed by a stream
/// of tags, each with its trailing previous-tag-size. `@setDataFrame` is
/// stripped from metadata before it goes out, matching what a saved FLV
/// file or any other FLV player expects.
pub struct HttpFlvSubscriber<W> {
    writer: Mutex<W>,
    info: Info,
    base: TimestampBase,
    sent_header: bool,
    alive: bool,
}

impl<W: AsyncWrite + Unpin + Send> HttpFlvSubscriber<W> {
    pub fn new(writer: W, info: Info) -> Self {
        HttpFlvSubscriber {
            writer: Mutex::new(writer),
            info,
            base: TimestampBase::new(),
            sent_header: false,
            alive: true,
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + Sync> WriteCloser for HttpFlvSubscriber<W> {
    async fn write(&mut self, packet: Packet) -> Result<()> {
        if !self.alive {
            return Err(Error::transport_closed("subscriber already closed"));
        }

        let is_video = packet.kind.is_video();
        let rebased_ts = self.base.rec_timestamp(packet.timestamp, is_video);

        let mut out = BytesMut::new();
        if !self.sent_header {
            out.extend_from_slice(&FILE_HEADER);
            self.sent_header = true;
        }

        match &packet.kind {
            PacketKind::Video { .. } => muxer::write_video_tag(&mut out, rebased_ts, &packet.payload),
            PacketKind::Audio { .. } => muxer::write_audio_tag(&mut out, rebased_ts, &packet.payload),
            PacketKind::Metadata => {
                let stripped = muxer::strip_set_data_frame(&packet.payload)?;
                muxer::write_script_tag(&mut out, rebased_ts, &stripped);
            }
        }

        let mut writer = self.writer.lock().await;
        if writer.write_all(&out).await.is_err() || writer.flush().await.is_err() {
            self.alive = false;
            return Err(Error::transport_closed("HTTP-FLV write failed"));
        }
        Ok(())
    }

    fn info(&self) -> Info {
        self.info.clone()
    }

    fn alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self, reason: Error) {
        log::debug!("closing HTTP-FLV subscriber '{}': {}", self.info.key, reason);
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
    async fn first_write_is_prefixed_with_the_flv_file_header() {
        let (client, mut server) = tokio::io::duplex(4096);
        let info = Info { key: "live/test".into(), url: String::new(), uid: 1, is_interval: false };
        let mut subscriber = HttpFlvSubscriber::new(client, info);

        subscriber.write(video_packet(0)).await.unwrap();

        let mut header = [0u8; 13];
        server.read_exact(&mut header).await.unwrap();
        assert_eq!(header, FILE_HEADER);
    }

    #[tokio::test]
    async fn second_write_has_no_file_header() {
        let (client, mut server) = tokio::io::duplex(8192);
        let info = Info { key: "live/test".into(), url: String::new(), uid: 1, is_interval: false };
        let mut subscriber = HttpFlvSubscriber::new(client, info);

        subscriber.write(video_packet(0)).await.unwrap();
        subscriber.write(video_packet(33)).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = server.read(&mut buf).await.unwrap();
        buf.truncate(n);
        // Exactly one FLV signature should appear, at the very start.
        assert_eq!(buf[0..3], FILE_HEADER[0..3]);
        let remaining = &buf[13..];
        assert!(
            remaining.windows(3).all(|w| w != &FILE_HEADER[0..3]) || remaining.len() < 3,
            "file header must only be sent once"
        );
    }
}
