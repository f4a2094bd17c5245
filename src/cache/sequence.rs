use crate::media::Packet;

/// Latches the three packets a fresh subscriber needs replayed before
/// anything else: the video sequence header, the audio sequence header, and
/// the most recent metadata packet. Each slot holds at most one packet and
/// is simply overwritten when a newer one of the same kind arrives.
#[derive(Default)]
pub struct SequenceCache {
    video: Option<Packet>,
    audio: Option<Packet>,
    metadata: Option<Packet>,
}

impl SequenceCache {
    pub fn new() -> Self {
        SequenceCache::default()
    }

    /// Feed a packet through the cache. Only sequence headers and metadata
    /// update a latch; regular audio/video frames pass through untouched.
    pub fn observe(&mut self, packet: &Packet) {
        use crate::media::PacketKind;
        match &packet.kind {
            PacketKind::Video { is_sequence_header: true, .. } => {
                self.video = Some(packet.clone());
            }
            PacketKind::Audio { is_sequence_header: true, .. } => {
                self.audio = Some(packet.clone());
            }
            PacketKind::Metadata => {
                self.metadata = Some(packet.clone());
            }
            _ => {}
        }
    }

    pub fn video_sequence_header(&self) -> Option<&Packet> {
        self.video.as_ref()
    }

    pub fn audio_sequence_header(&self) -> Option<&Packet> {
        self.audio.as_ref()
    }

    pub fn metadata(&self) -> Option<&Packet> {
        self.metadata.as_ref()
    }

    /// Packets to replay to a new subscriber, in send order: video sequence
    /// header, then audio sequence header, then latest metadata.
    pub fn replay_packets(&self) -> Vec<Packet> {
        let mut out = Vec::with_capacity(3);
        if let Some(p) = &self.video {
            out.push(p.clone());
        }
        if let Some(p) = &self.audio {
            out.push(p.clone());
        }
        if let Some(p) = &self.metadata {
            out.push(p.clone());
        }
        out
    }

    pub fn clear(&mut self) {
        self.video = None;
        self.audio = None;
        self.metadata = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PacketKind;
    use crate::processing::{VideoCodec, FrameType};
    use bytes::Bytes;

    fn video_seq_header() -> Packet {
        Packet::new(
            PacketKind::Video { codec: VideoCodec::H264, frame_type: FrameType::Keyframe, is_sequence_header: true },
            0,
            1,
            Bytes::from_static(&[0x17, 0x00]),
        )
    }

    #[test]
    fn latches_latest_sequence_header() {
        let mut cache = SequenceCache::new();
        cache.observe(&video_seq_header());
        let mut second = video_seq_header();
        second.timestamp = 5;
        cache.observe(&second);
        assert_eq!(cache.video_sequence_header().unwrap().timestamp, 5);
    }

    #[test]
    fn non_sequence_frame_does_not_latch() {
        let mut cache = SequenceCache::new();
        let frame = Packet::new(
            PacketKind::Video { codec: VideoCodec::H264, frame_type: FrameType::InterFrame, is_sequence_header: false },
            10,
            1,
            Bytes::from_static(&[0x27, 0x01]),
        );
        cache.observe(&frame);
        assert!(cache.video_sequence_header().is_none());
    }
}
