//! Everything a newly-joined subscriber needs replayed before live packets
//! start flowing: the latched sequence headers and metadata, and the GOP
//! ring for fast start on playback.

mod sequence;
mod gop;

pub use sequence::SequenceCache;
pub use gop::GopCache;
