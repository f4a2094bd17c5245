//! The consumer side of fan-out: a bounded queue with a priority-aware drop
//! policy feeding one of two write paths (RTMP chunks or HTTP-FLV tags).

mod queue;
mod timestamp;
mod rtmp;
mod httpflv;

pub use queue::{SubscriberQueue, Transport};
pub use timestamp::TimestampBase;
pub use rtmp::RtmpSubscriber;
pub use httpflv::HttpFlvSubscriber;
