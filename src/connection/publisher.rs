//! The publish-side [`ReadCloser`]: turns RTMP chunk-stream bytes into the
//! classified [`Packet`]s the hub fans out, built on
//! [`crate::chunk::ChunkReader`] reassembly and [`crate::flv::header`] tag
//! classification.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::chunk::ChunkReader;
use crate::flv::{classify_audio, classify_video, muxer};
use crate::handler::ReadCloser;
use crate::media::{Info, Packet, PacketKind};
use crate::protocol::constants::{MSG_TYPE_AUDIO, MSG_TYPE_DATA_AMF0, MSG_TYPE_DATA_AMF3, MSG_TYPE_SET_CHUNK_SIZE, MSG_TYPE_VIDEO};
use crate::{Error, Result};

pub struct RtmpPublisherReader<R> {
    reader: R,
    chunk_reader: ChunkReader,
    info: Info,
    alive: bool,
}

impl<R: AsyncRead + Unpin + Send> RtmpPublisherReader<R> {
    pub fn new(reader: R, chunk_reader: ChunkReader, info: Info) -> Self {
        RtmpPublisherReader { reader, chunk_reader, info, alive: true }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + Sync> ReadCloser for RtmpPublisherReader<R> {
    async fn read(&mut self) -> Result<Packet> {
        loop {
            let rtmp_packet = match self.chunk_reader.read_chunk(&mut self.reader).await? {
                Some(p) => p,
                None => continue,
            };

            match rtmp_packet.message_type() {
                MSG_TYPE_SET_CHUNK_SIZE => {
                    if rtmp_packet.payload.len() >= 4 {
                        let size = u32::from_be_bytes([
                            rtmp_packet.payload[0],
                            rtmp_packet.payload[1],
                            rtmp_packet.payload[2],
                            rtmp_packet.payload[3],
                        ]);
                        self.chunk_reader.set_chunk_size(size as usize);
                    }
                }
                MSG_TYPE_AUDIO => {
                    let header = classify_audio(&rtmp_packet.payload)?;
                    return Ok(Packet::new(
                        PacketKind::Audio { codec: header.codec, is_sequence_header: header.is_sequence_header() },
                        rtmp_packet.timestamp(),
                        rtmp_packet.message_stream_id(),
                        Bytes::from(rtmp_packet.payload),
                    ));
                }
                MSG_TYPE_VIDEO => {
                    // classify_video surfaces FlvError::AvcEndOfSequence as
                    // Error::AvcEndOfSequence, which the Stream read loop
                    // treats as a clean stop rather than a fault.
                    let header = classify_video(&rtmp_packet.payload)?;
                    return Ok(Packet::new(
                        PacketKind::Video {
                            codec: header.codec,
                            frame_type: header.frame_type,
                            is_sequence_header: header.is_sequence_header(),
                        },
                        rtmp_packet.timestamp(),
                        rtmp_packet.message_stream_id(),
                        Bytes::from(rtmp_packet.payload),
                    ));
                }
                MSG_TYPE_DATA_AMF0 | MSG_TYPE_DATA_AMF3 => {
                    let payload = muxer::ensure_set_data_frame(&rtmp_packet.payload)?;
                    return Ok(Packet::new(
                        PacketKind::Metadata,
                        rtmp_packet.timestamp(),
                        rtmp_packet.message_stream_id(),
                        payload,
                    ));
                }
                _ => {}
            }
        }
    }

    fn info(&self) -> Info {
        self.info.clone()
    }

    fn alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self, reason: Error) {
        log::debug!("closing publisher reader for '{}': {}", self.info.key, reason);
        self.alive = false;
    }
}
