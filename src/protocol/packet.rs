use crate::protocol::constants::*;

#[derive(Debug, Clone)]
pub struct RtmpPacket {
    pub header: RtmpHeader,
    pub payload: Vec<u8>,
}

impl RtmpPacket {
    /// Create new packet
    pub fn new(header: RtmpHeader, payload: Vec<u8>) -> Self {
        RtmpPacket { header, payload }
    }

    /// Get message type
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Get message stream ID
    pub fn message_stream_id(&self) -> u32 {
        self.header.message_stream_id
    }

    /// Get timestamp
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    /// Check if this is an audio packet
    pub fn is_audio(&self) -> bool {
        self.header.message_type == MSG_TYPE_AUDIO
    }

    /// Check if this is a video packet
    pub fn is_video(&self) -> bool {
        self.header.message_type == MSG_TYPE_VIDEO
    }

    /// Check if this is a command message
    pub fn is_command(&self) -> bool {
        self.header.message_type == MSG_TYPE_COMMAND_AMF0 ||
            self.header.message_type == MSG_TYPE_COMMAND_AMF3
    }

    /// Check if this is a data message
    pub fn is_data(&self) -> bool {
        self.header.message_type == MSG_TYPE_DATA_AMF0 ||
            self.header.message_type == MSG_TYPE_DATA_AMF3
    }

    /// Check if this is a control message
    pub fn is_control(&self) -> bool {
        matches!(self.header.message_type,
            MSG_TYPE_SET_CHUNK_SIZE |
            MSG_TYPE_ABORT |
            MSG_TYPE_ACK |
            MSG_TYPE_WINDOW_ACK |
            MSG_TYPE_SET_PEER_BW)
    }

}

#[derive(Debug, Clone, Copy)]
pub struct RtmpHeader {
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
    pub chunk_stream_id: u32,
}

impl RtmpHeader {
    /// Create new header
    pub fn new(
        timestamp: u32,
        message_length: u32,
        message_type: u8,
        message_stream_id: u32,
        chunk_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            chunk_stream_id,
        }
    }

    /// Create header for command message
    pub fn command(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_COMMAND_AMF0, stream_id, CHUNK_STREAM_COMMAND)
    }

    /// Check if timestamp is extended (>= 0xFFFFFF)
    pub fn has_extended_timestamp(&self) -> bool {
        self.timestamp >= 0xFFFFFF
    }

    /// Get timestamp for wire format
    pub fn wire_timestamp(&self) -> u32 {
        if self.has_extended_timestamp() {
            0xFFFFFF
        } else {
            self.timestamp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_creation() {
        let header = RtmpHeader {
            timestamp: 1000,
            message_length: 100,
            message_type: MSG_TYPE_AUDIO,
            message_stream_id: 1,
            chunk_stream_id: 4,
        };

        let payload = vec![0x01, 0x02, 0x03];
        let packet = RtmpPacket::new(header, payload);

        assert!(packet.is_audio());
        assert!(!packet.is_video());
        assert_eq!(packet.timestamp(), 1000);
        assert_eq!(packet.message_stream_id(), 1);
    }
}