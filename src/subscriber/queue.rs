use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::media::Packet;

/// Drain this many packets off the head of an over-full queue looking for
/// ones safe to discard, once the trigger threshold is crossed.
fn drain_batch(capacity: usize) -> usize {
    capacity.saturating_sub(84)
}

/// Once the queue holds at least this many packets, the next push runs the
/// drop policy instead of just enqueueing.
fn trigger_threshold(capacity: usize) -> usize {
    capacity.saturating_sub(24)
}

/// The transport a [`SubscriberQueue`] feeds decides how conservative the
/// audio-survival recheck is: RTMP clients stall harder on audio gaps than
/// HTTP-FLV players buffering client-side, so RTMP gets a tighter margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Rtmp,
    HttpFlv,
}

impl Transport {
    fn audio_recheck(&self, capacity: usize) -> usize {
        match self {
            Transport::Rtmp => capacity.saturating_sub(2),
            Transport::HttpFlv => capacity.saturating_sub(10),
        }
    }

    fn video_recheck(&self, capacity: usize) -> usize {
        capacity.saturating_sub(10)
    }
}

/// Bounded per-subscriber FIFO with a priority-aware drop policy. A slow
/// subscriber never blocks the hub's fan-out loop: pushing is synchronous
/// and, when the queue is nearly full, sheds load by preferring to keep
/// audio and structurally-required video (sequence headers, keyframes)
/// over disposable inter-frames.
pub struct SubscriberQueue {
    inner: Arc<Mutex<VecDeque<Packet>>>,
    notify: Arc<Notify>,
    capacity: usize,
    transport: Transport,
    closed: AtomicBool,
}

impl SubscriberQueue {
    pub fn new(capacity: usize, transport: Transport) -> Self {
        SubscriberQueue {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(4096)))),
            notify: Arc::new(Notify::new()),
            capacity: capacity.max(1),
            transport,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a packet, running the drop policy first if the queue is
    /// already near capacity. Never blocks on the consumer.
    pub async fn push(&self, packet: Packet) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut queue = self.inner.lock().await;

        if queue.len() >= trigger_threshold(self.capacity) {
            self.shed(&mut queue);
        }

        queue.push_back(packet);
        drop(queue);
        self.notify.notify_one();
    }

    /// Mark the queue closed: no further packets will be accepted, and any
    /// pending or future [`Self::pop`] drains whatever remains before
    /// returning `None`. Used when a publisher ends so subscriber write
    /// loops finish replaying their backlog and then exit on their own
    /// instead of blocking forever.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Drop packets from the front of the queue per the priority policy:
    /// audio and structurally-required video (sequence headers, key
    /// frames) are unconditionally kept; every other video frame is
    /// unconditionally discarded. The keep/discard decision never depends
    /// on how close to capacity the queue happens to be -- that would
    /// leave the batch shedding next to nothing whenever the queue is well
    /// under the transports' near-full margins, which is exactly where it
    /// sits every time this runs (`trigger_threshold` fires well before
    /// `audio_recheck`/`video_recheck` would).
    fn shed(&self, queue: &mut VecDeque<Packet>) {
        let batch = drain_batch(self.capacity).min(queue.len());
        let mut kept = VecDeque::with_capacity(batch);

        for _ in 0..batch {
            let Some(packet) = queue.pop_front() else { break };

            if packet.kind.is_audio() {
                kept.push_back(packet);
            } else if packet.kind.is_video() {
                if packet.kind.is_sequence_header() || packet.kind.is_keyframe() {
                    kept.push_back(packet);
                }
                // Every other video frame is discarded.
            } else {
                // Metadata and control-ish packets are cheap; always kept.
                kept.push_back(packet);
            }
        }

        // Re-splice the surviving packets back in front of whatever wasn't
        // examined, preserving arrival order.
        for packet in kept.into_iter().rev() {
            queue.push_front(packet);
        }

        // A batch made entirely of always-kept packets (a run of
        // keyframes, or pure audio) frees nothing; if the queue is still
        // sitting within the transport's near-full margin after the batch
        // above, keep discarding one disposable video frame at a time,
        // past the batch bound, until real headroom is recovered or
        // there's nothing left worth dropping.
        while queue.len() > self.transport.audio_recheck(self.capacity)
            || queue.len() > self.transport.video_recheck(self.capacity)
        {
            if !self.discard_one_extra(queue) {
                break;
            }
        }
    }

    /// Scan from the front for the first disposable (non-essential) video
    /// packet and drop it, preserving the order of everything ahead of it.
    /// Returns whether a packet was found and dropped.
    fn discard_one_extra(&self, queue: &mut VecDeque<Packet>) -> bool {
        let mut ahead = VecDeque::with_capacity(queue.len());
        let mut dropped = false;

        while let Some(packet) = queue.pop_front() {
            if !dropped
                && packet.kind.is_video()
                && !packet.kind.is_sequence_header()
                && !packet.kind.is_keyframe()
            {
                dropped = true;
                continue;
            }
            ahead.push_back(packet);
        }

        for packet in ahead.into_iter().rev() {
            queue.push_front(packet);
        }
        dropped
    }

    /// Pop the next packet, waiting if the queue is currently empty.
    /// Returns `None` once the queue has been [`Self::close`]d and fully
    /// drained.
    pub async fn pop(&self) -> Option<Packet> {
        loop {
            {
                let mut queue = self.inner.lock().await;
                if let Some(packet) = queue.pop_front() {
                    return Some(packet);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PacketKind;
    use crate::processing::{AudioCodec, VideoCodec, FrameType};
    use bytes::Bytes;

    fn audio(ts: u32) -> Packet {
        Packet::new(
            PacketKind::Audio { codec: AudioCodec::AAC, is_sequence_header: false },
            ts,
            1,
            Bytes::from_static(&[0]),
        )
    }

    fn video(frame_type: FrameType, ts: u32) -> Packet {
        Packet::new(
            PacketKind::Video { codec: VideoCodec::H264, frame_type, is_sequence_header: false },
            ts,
            1,
            Bytes::from_static(&[0]),
        )
    }

    #[tokio::test]
    async fn under_capacity_everything_survives() {
        let queue = SubscriberQueue::new(1024, Transport::Rtmp);
        for i in 0..100 {
            queue.push(video(FrameType::InterFrame, i)).await;
        }
        assert_eq!(queue.len().await, 100);
    }

    #[tokio::test]
    async fn overload_sheds_inter_frames_before_audio() {
        let capacity = 100;
        let queue = SubscriberQueue::new(capacity, Transport::Rtmp);

        // Fill past the trigger threshold with a mix, ending in an
        // overload burst of disposable inter-frames.
        queue.push(video(FrameType::Keyframe, 0)).await;
        queue.push(audio(1)).await;
        for i in 2..200u32 {
            queue.push(video(FrameType::InterFrame, i)).await;
        }

        let len = queue.len().await;
        assert!(len <= capacity, "queue grew past capacity: {}", len);

        // Drain everything and confirm the keyframe survived the shedding.
        let mut saw_keyframe = false;
        while queue.len().await > 0 {
            let p = queue.pop().await.unwrap();
            if p.kind.is_keyframe() {
                saw_keyframe = true;
            }
        }
        assert!(saw_keyframe, "keyframe must survive drop-policy shedding");
    }

    #[tokio::test]
    async fn closed_queue_drains_then_returns_none() {
        let queue = SubscriberQueue::new(16, Transport::Rtmp);
        queue.push(audio(0)).await;
        queue.push(audio(1)).await;
        queue.close();

        // A push after close is silently dropped.
        queue.push(audio(2)).await;

        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }
}
