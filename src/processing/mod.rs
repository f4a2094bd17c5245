//! Codec and frame-type enums shared by FLV tag classification
//! ([`crate::flv::header`]) and the GOP cache's keyframe detection.

mod audio;
mod video;

pub use audio::AudioCodec;
pub use video::{VideoCodec, FrameType};