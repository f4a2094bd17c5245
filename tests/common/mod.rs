// Shared test doubles for the hub/fan-out integration tests: a scripted
// publisher ReadCloser that replays a fixed packet sequence, and a
// recording subscriber WriteCloser that captures everything written to it
// so tests can assert on delivery order.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use rtmp_core::{Error, Info, Packet, ReadCloser, Result, WriteCloser};

/// A publisher whose `read()` replays a scripted list of packets, then
/// parks forever (as a live publisher waiting for more input would) unless
/// `then_error` is set, in which case it returns that error next.
pub struct ScriptedReader {
    info: Info,
    packets: VecDeque<Packet>,
    then_error: Option<rtmp_core::Error>,
    alive: bool,
}

impl ScriptedReader {
    pub fn new(key: &str, packets: Vec<Packet>) -> Self {
        ScriptedReader {
            info: Info { key: key.to_string(), url: String::new(), uid: 1, is_interval: false },
            packets: packets.into(),
            then_error: None,
            alive: true,
        }
    }

    pub fn then_error(mut self, error: rtmp_core::Error) -> Self {
        self.then_error = Some(error);
        self
    }
}

#[async_trait]
impl ReadCloser for ScriptedReader {
    async fn read(&mut self) -> Result<Packet> {
        if let Some(packet) = self.packets.pop_front() {
            return Ok(packet);
        }
        if let Some(error) = self.then_error.take() {
            return Err(error);
        }
        std::future::pending().await
    }

    fn info(&self) -> Info {
        self.info.clone()
    }

    fn alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self, _reason: Error) {
        self.alive = false;
    }
}

/// A subscriber write path that just records every packet (and every
/// `calc_base_timestamp` call) it receives, for assertions.
pub struct RecordingWriter {
    info: Info,
    pub received: Arc<Mutex<Vec<Packet>>>,
    pub rebase_count: Arc<std::sync::atomic::AtomicUsize>,
    alive: bool,
}

impl RecordingWriter {
    pub fn new(key: &str, uid: u64) -> (Self, Arc<Mutex<Vec<Packet>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let info = Info { key: key.to_string(), url: String::new(), uid, is_interval: false };
        (
            RecordingWriter {
                info,
                received: received.clone(),
                rebase_count: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
                alive: true,
            },
            received,
        )
    }
}

#[async_trait]
impl WriteCloser for RecordingWriter {
    async fn write(&mut self, packet: Packet) -> Result<()> {
        if !self.alive {
            return Err(rtmp_core::Error::transport_closed("closed"));
        }
        self.received.lock().await.push(packet);
        Ok(())
    }

    fn info(&self) -> Info {
        self.info.clone()
    }

    fn alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self, _reason: Error) {
        self.alive = false;
    }

    fn calc_base_timestamp(&mut self) {
        self.rebase_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

pub fn video_packet(ts: u32, frame_type: rtmp_core::FrameType, is_seq_hdr: bool) -> Packet {
    use bytes::Bytes;
    Packet::new(
        rtmp_core::PacketKind::Video { codec: rtmp_core::VideoCodec::H264, frame_type, is_sequence_header: is_seq_hdr },
        ts,
        1,
        Bytes::from_static(&[0x17, 0x00]),
    )
}

pub fn audio_packet(ts: u32, is_seq_hdr: bool) -> Packet {
    use bytes::Bytes;
    Packet::new(
        rtmp_core::PacketKind::Audio { codec: rtmp_core::AudioCodec::AAC, is_sequence_header: is_seq_hdr },
        ts,
        1,
        Bytes::from_static(&[0xAF, 0x00]),
    )
}
