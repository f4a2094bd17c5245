//! One accepted TCP connection: handshake, then the connect / createStream /
//! publish / play exchange, then handoff into the hub. There are only five
//! commands this server ever acts on, so a straight-line loop reads more
//! plainly than a registry of one handler per command.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::amf::Amf0Value;
use crate::chunk::{ChunkReader, ChunkWriter};
use crate::config::Config;
use crate::connection::publisher::RtmpPublisherReader;
use crate::handler::RoomKeyValidator;
use crate::handshake::{generate_s0s1s2, validate_c0c1, validate_c2};
use crate::hub::{StreamRegistry, StreamState};
use crate::media::Info;
use crate::protocol::constants::*;
use crate::protocol::{RtmpCommand, RtmpHeader, RtmpPacket};
use crate::subscriber::{RtmpSubscriber, Transport};
use crate::{Error, Result};

static NEXT_STREAM_ID: AtomicU32 = AtomicU32::new(1);

/// Drives one connection from handshake through to whichever of publish or
/// play it turns out to be.
pub struct Session {
    conn_id: String,
    registry: Arc<StreamRegistry>,
    validator: Arc<dyn RoomKeyValidator>,
    config: Arc<Config>,
    app: String,
}

impl Session {
    pub fn new(
        conn_id: String,
        registry: Arc<StreamRegistry>,
        validator: Arc<dyn RoomKeyValidator>,
        config: Arc<Config>,
    ) -> Self {
        Session { conn_id, registry, validator, config, app: String::new() }
    }

    pub async fn run(mut self, stream: TcpStream) -> Result<()> {
        let _ = stream.set_nodelay(true);
        let (mut read_half, mut write_half) = tokio::io::split(stream);

        run_handshake(&mut read_half, &mut write_half).await?;

        let mut chunk_reader = ChunkReader::new();
        let mut chunk_writer = ChunkWriter::new();

        loop {
            let command = next_command(&mut chunk_reader, &mut read_half).await?;

            match command.name.as_str() {
                "connect" => {
                    self.app = connect_app(&command)?;
                    self.reply_connect(&command, &mut chunk_writer, &mut write_half).await?;
                }
                "createStream" => {
                    self.reply_create_stream(&command, &mut chunk_writer, &mut write_half).await?;
                }
                "publish" => {
                    self.handle_publish(&command, chunk_reader, read_half, &mut chunk_writer, &mut write_half).await?;
                    return Ok(());
                }
                "play" => {
                    self.handle_play(&command, chunk_reader, read_half, chunk_writer, write_half).await?;
                    return Ok(());
                }
                "deleteStream" | "closeStream" | "FCUnpublish" => return Ok(()),
                _ => {}
            }
        }
    }

    async fn reply_connect<W: AsyncWrite + Unpin>(
        &self,
        command: &RtmpCommand,
        chunk_writer: &mut ChunkWriter,
        out: &mut W,
    ) -> Result<()> {
        write_control(chunk_writer, out, window_ack_packet(DEFAULT_WINDOW_SIZE)).await?;
        write_control(chunk_writer, out, peer_bandwidth_packet(DEFAULT_WINDOW_SIZE, 2)).await?;
        write_control(chunk_writer, out, set_chunk_size_packet(4096)).await?;
        chunk_writer.set_chunk_size(4096);

        let mut props = HashMap::new();
        props.insert("fmsVer".to_string(), Amf0Value::String("FMS/3,5,5,2004".to_string()));
        props.insert("capabilities".to_string(), Amf0Value::Number(31.0));
        props.insert("mode".to_string(), Amf0Value::Number(1.0));

        let mut info = HashMap::new();
        info.insert("level".to_string(), Amf0Value::String("status".to_string()));
        info.insert("code".to_string(), Amf0Value::String("NetConnection.Connect.Success".to_string()));
        info.insert("description".to_string(), Amf0Value::String("Connection succeeded".to_string()));
        info.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));

        let mut result = RtmpCommand::result(command.transaction_id, Amf0Value::Object(props));
        result.arguments.push(Amf0Value::Object(info));
        send_command(chunk_writer, out, &result, 0).await
    }

    async fn reply_create_stream<W: AsyncWrite + Unpin>(
        &self,
        command: &RtmpCommand,
        chunk_writer: &mut ChunkWriter,
        out: &mut W,
    ) -> Result<()> {
        let stream_id = NEXT_STREAM_ID.fetch_add(1, Ordering::SeqCst);
        let result = RtmpCommand::result(command.transaction_id, Amf0Value::Number(stream_id as f64));
        send_command(chunk_writer, out, &result, 0).await
    }

    async fn handle_publish<W: AsyncWrite + Unpin>(
        &self,
        command: &RtmpCommand,
        chunk_reader: ChunkReader,
        read_half: ReadHalf<TcpStream>,
        chunk_writer: &mut ChunkWriter,
        out: &mut W,
    ) -> Result<()> {
        let stream_name = command.arguments.get(0)
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::protocol("publish: missing stream name"))?
            .to_string();
        let key = format!("{}/{}", self.app, stream_name);

        if !self.validator.validate(&stream_name).await {
            let status = RtmpCommand::on_status(
                "error",
                "NetStream.Publish.BadName",
                &format!("publish to '{}' rejected", key),
            );
            send_command(chunk_writer, out, &status, 1).await?;
            return Err(Error::auth_rejected(key));
        }

        write_control(chunk_writer, out, stream_begin_packet(1)).await?;
        let status = RtmpCommand::on_status(
            "status",
            "NetStream.Publish.Start",
            &format!("{} is now published", key),
        );
        send_command(chunk_writer, out, &status, 1).await?;

        let info = Info { key: key.clone(), url: format!("rtmp://{}/{}", self.conn_id, key), uid: 0, is_interval: false };
        let reader = Box::new(RtmpPublisherReader::new(read_half, chunk_reader, info));

        let stream = self.registry.get_or_insert(&key);
        if stream.state() == StreamState::Publishing {
            stream.handover(reader).await
        } else {
            stream.run_publisher(reader).await
        }
    }

    async fn handle_play(
        &self,
        command: &RtmpCommand,
        mut chunk_reader: ChunkReader,
        mut read_half: ReadHalf<TcpStream>,
        mut chunk_writer: ChunkWriter,
        mut write_half: WriteHalf<TcpStream>,
    ) -> Result<()> {
        let stream_name = command.arguments.get(0)
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::protocol("play: missing stream name"))?
            .to_string();
        let key = format!("{}/{}", self.app, stream_name);

        write_control(&mut chunk_writer, &mut write_half, stream_begin_packet(1)).await?;
        let reset = RtmpCommand::on_status("status", "NetStream.Play.Reset", &format!("resetting {}", key));
        send_command(&mut chunk_writer, &mut write_half, &reset, 1).await?;
        let start = RtmpCommand::on_status("status", "NetStream.Play.Start", &format!("playing {}", key));
        send_command(&mut chunk_writer, &mut write_half, &start, 1).await?;

        let info = Info { key: key.clone(), url: format!("rtmp://{}/{}", self.conn_id, key), uid: 0, is_interval: false };
        let writer = Box::new(RtmpSubscriber::new(write_half, info));

        let stream = self.registry.get_or_insert(&key);
        let uid = stream.add_subscriber(writer, self.config.subscriber_queue_capacity, Transport::Rtmp).await;

        // Nothing more to do with the read half for a player connection
        // beyond noticing it went away; acks/pings are not acted on.
        loop {
            match chunk_reader.read_chunk(&mut read_half).await {
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        stream.remove_subscriber(uid);
        Ok(())
    }
}

async fn run_handshake<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(reader: &mut R, writer: &mut W) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut c0c1 = [0u8; 1537];
    reader.read_exact(&mut c0c1).await.map_err(|e| Error::handshake(e.to_string()))?;
    let parsed = validate_c0c1(&c0c1)?;

    let s0s1s2 = generate_s0s1s2(&parsed)?;
    writer.write_all(&s0s1s2).await.map_err(|e| Error::handshake(e.to_string()))?;
    writer.flush().await.map_err(|e| Error::handshake(e.to_string()))?;

    let mut c2 = [0u8; 1536];
    reader.read_exact(&mut c2).await.map_err(|e| Error::handshake(e.to_string()))?;
    let s0s1s2_parsed = crate::handshake::S0S1S2::parse(&s0s1s2)?;
    validate_c2(&c2, &s0s1s2_parsed)
}

async fn next_command<R: AsyncRead + Unpin>(chunk_reader: &mut ChunkReader, reader: &mut R) -> Result<RtmpCommand> {
    loop {
        let packet = match chunk_reader.read_chunk(reader).await? {
            Some(p) => p,
            None => continue,
        };

        if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE {
            if packet.payload.len() >= 4 {
                let size = u32::from_be_bytes([packet.payload[0], packet.payload[1], packet.payload[2], packet.payload[3]]);
                chunk_reader.set_chunk_size(size as usize);
            }
            continue;
        }
        if packet.is_command() {
            return RtmpCommand::decode(&packet.payload);
        }
        // audio/video/data arriving before the session settles on a role
        // (shouldn't happen with a well-behaved client) are dropped.
    }
}

fn connect_app(command: &RtmpCommand) -> Result<String> {
    command.command_object.as_ref()
        .and_then(|v| v.as_object())
        .and_then(|obj| obj.get("app"))
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::protocol("connect: missing app parameter"))
}

async fn send_command<W: AsyncWrite + Unpin>(
    chunk_writer: &mut ChunkWriter,
    out: &mut W,
    command: &RtmpCommand,
    stream_id: u32,
) -> Result<()> {
    let bytes = command.encode()?;
    let header = RtmpHeader::command(0, bytes.len() as u32, stream_id);
    chunk_writer.write_packet(&RtmpPacket::new(header, bytes), out).await
}

async fn write_control<W: AsyncWrite + Unpin>(chunk_writer: &mut ChunkWriter, out: &mut W, packet: RtmpPacket) -> Result<()> {
    chunk_writer.write_packet(&packet, out).await
}

fn window_ack_packet(size: u32) -> RtmpPacket {
    let header = RtmpHeader::new(0, 4, MSG_TYPE_WINDOW_ACK, 0, CHUNK_STREAM_PROTOCOL);
    RtmpPacket::new(header, size.to_be_bytes().to_vec())
}

fn peer_bandwidth_packet(size: u32, limit_type: u8) -> RtmpPacket {
    let mut payload = size.to_be_bytes().to_vec();
    payload.push(limit_type);
    let header = RtmpHeader::new(0, payload.len() as u32, MSG_TYPE_SET_PEER_BW, 0, CHUNK_STREAM_PROTOCOL);
    RtmpPacket::new(header, payload)
}

fn set_chunk_size_packet(size: u32) -> RtmpPacket {
    let header = RtmpHeader::new(0, 4, MSG_TYPE_SET_CHUNK_SIZE, 0, CHUNK_STREAM_PROTOCOL);
    RtmpPacket::new(header, size.to_be_bytes().to_vec())
}

fn stream_begin_packet(stream_id: u32) -> RtmpPacket {
    let mut payload = vec![0x00, 0x00];
    payload.extend_from_slice(&stream_id.to_be_bytes());
    let header = RtmpHeader::new(0, payload.len() as u32, MSG_TYPE_USER_CONTROL, 0, CHUNK_STREAM_PROTOCOL);
    RtmpPacket::new(header, payload)
}
