#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// Sorenson H.263
    H263,
    /// Screen video
    ScreenVideo,
    /// On2 VP6
    VP6,
    /// On2 VP6 with alpha
    VP6Alpha,
    /// Screen video v2
    ScreenVideo2,
    /// H.264 AVC
    H264,
    /// H.265 HEVC
    H265,
    /// AV1
    AV1,
    /// Unknown
    Unknown(u8),
}

impl VideoCodec {
    /// Parse from codec ID
    pub fn from_codec_id(id: u8) -> Self {
        match id {
            2 => VideoCodec::H263,
            3 => VideoCodec::ScreenVideo,
            4 => VideoCodec::VP6,
            5 => VideoCodec::VP6Alpha,
            6 => VideoCodec::ScreenVideo2,
            7 => VideoCodec::H264,
            12 => VideoCodec::H265,
            13 => VideoCodec::AV1,
            _ => VideoCodec::Unknown(id),
        }
    }

    /// Get codec name
    pub fn name(&self) -> &str {
        match self {
            VideoCodec::H263 => "H.263",
            VideoCodec::ScreenVideo => "Screen",
            VideoCodec::VP6 => "VP6",
            VideoCodec::VP6Alpha => "VP6-Alpha",
            VideoCodec::ScreenVideo2 => "Screen-v2",
            VideoCodec::H264 => "H.264",
            VideoCodec::H265 => "H.265",
            VideoCodec::AV1 => "AV1",
            VideoCodec::Unknown(_) => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Keyframe (I-frame)
    Keyframe,
    /// Inter-frame (P-frame)
    InterFrame,
    /// Disposable inter-frame
    DisposableInterFrame,
    /// Generated keyframe
    GeneratedKeyframe,
    /// Video info/command frame
    VideoInfo,
}

impl FrameType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => FrameType::Keyframe,
            2 => FrameType::InterFrame,
            3 => FrameType::DisposableInterFrame,
            4 => FrameType::GeneratedKeyframe,
            5 => FrameType::VideoInfo,
            _ => FrameType::InterFrame,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, FrameType::Keyframe | FrameType::GeneratedKeyframe)
    }
}
