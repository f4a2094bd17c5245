use crate::byteio::unpack_i24_be;
use crate::flv::errors::FlvError;
use crate::processing::{AudioCodec, VideoCodec, FrameType};

/// First byte of an audio tag's payload, decoded.
#[derive(Debug, Clone, Copy)]
pub struct AudioTagHeader {
    pub codec: AudioCodec,
    /// AAC packet type: 0 = sequence header, 1 = raw frame. `None` for
    /// codecs that don't carry this second byte.
    pub aac_packet_type: Option<u8>,
}

impl AudioTagHeader {
    pub fn is_sequence_header(&self) -> bool {
        matches!(self.aac_packet_type, Some(0))
    }
}

/// First one to five bytes of a video tag's payload, decoded.
#[derive(Debug, Clone, Copy)]
pub struct VideoTagHeader {
    pub codec: VideoCodec,
    pub frame_type: FrameType,
    /// AVC/HEVC packet type: 0 = sequence header, 1 = NALU, 2 = end of
    /// sequence. `None` for codecs without this byte.
    pub avc_packet_type: Option<u8>,
    /// 24-bit signed composition time offset in milliseconds, present only
    /// alongside an `avc_packet_type`.
    pub composition_time: i32,
}

impl VideoTagHeader {
    pub fn is_sequence_header(&self) -> bool {
        matches!(self.avc_packet_type, Some(0))
    }

    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self.avc_packet_type, Some(2))
    }
}

/// Classify an audio tag's payload. `data[0]` is the sound format byte;
/// AAC additionally carries a packet-type byte at `data[1]`.
pub fn classify_audio(data: &[u8]) -> Result<AudioTagHeader, FlvError> {
    if data.is_empty() {
        return Err(FlvError::TagTooShort(data.len()));
    }
    let sound_format = (data[0] >> 4) & 0x0F;
    let codec = AudioCodec::from_sound_format(sound_format);
    let aac_packet_type = if codec == AudioCodec::AAC && data.len() > 1 {
        Some(data[1])
    } else {
        None
    };
    Ok(AudioTagHeader { codec, aac_packet_type })
}

/// Classify a video tag's payload and surface [`FlvError::AvcEndOfSequence`]
/// when the bitstream signals end-of-sequence, so a Stream's read loop can
/// treat it as a clean stop rather than a protocol fault.
pub fn classify_video(data: &[u8]) -> Result<VideoTagHeader, FlvError> {
    if data.is_empty() {
        return Err(FlvError::TagTooShort(data.len()));
    }
    let frame_type = FrameType::from_bits((data[0] >> 4) & 0x0F);
    let codec = VideoCodec::from_codec_id(data[0] & 0x0F);

    let is_avc_like = matches!(codec, VideoCodec::H264 | VideoCodec::H265);
    let (avc_packet_type, composition_time) = if is_avc_like && data.len() >= 5 {
        let packet_type = data[1];
        let ct = unpack_i24_be(&data[2..5]).unwrap_or(0);
        (Some(packet_type), ct)
    } else {
        (None, 0)
    };

    if avc_packet_type == Some(2) {
        return Err(FlvError::AvcEndOfSequence);
    }

    Ok(VideoTagHeader { codec, frame_type, avc_packet_type, composition_time })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_h264_keyframe_sequence_header() {
        let data = [0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x64];
        let header = classify_video(&data).unwrap();
        assert_eq!(header.codec, VideoCodec::H264);
        assert!(header.frame_type.is_keyframe());
        assert!(header.is_sequence_header());
    }

    #[test]
    fn end_of_sequence_surfaces_as_error() {
        let data = [0x17, 0x02, 0x00, 0x00, 0x00];
        assert!(matches!(classify_video(&data), Err(FlvError::AvcEndOfSequence)));
    }

    #[test]
    fn aac_sequence_header_detected() {
        let data = [0xAF, 0x00, 0x12, 0x10];
        let header = classify_audio(&data).unwrap();
        assert_eq!(header.codec, AudioCodec::AAC);
        assert!(header.is_sequence_header());
    }
}
