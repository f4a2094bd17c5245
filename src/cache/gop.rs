use std::collections::VecDeque;

use crate::media::Packet;

/// Cap on how many packets an in-progress (not yet closed by the next
/// keyframe) group may hold before new frames are silently discarded. Guards
/// against a keyframe-less stream growing the open group without bound.
const OPEN_GROUP_CAP: usize = 1024;

/// Bounded ring of complete GOPs (keyframe through the frame before the next
/// keyframe), plus the group currently being built. Frames that arrive
/// before the first keyframe is seen are dropped; a subscriber joining
/// mid-stream only ever needs to be handed whole groups. `capacity == 0`
/// disables the cache entirely: nothing is ever retained.
pub struct GopCache {
    capacity: usize,
    groups: VecDeque<Vec<Packet>>,
    open: Vec<Packet>,
    seen_keyframe: bool,
}

impl GopCache {
    pub fn new(capacity: usize) -> Self {
        GopCache {
            capacity,
            groups: VecDeque::new(),
            open: Vec::new(),
            seen_keyframe: false,
        }
    }

    fn disabled(&self) -> bool {
        self.capacity == 0
    }

    /// Feed a video packet into the cache. Sequence headers are not part of
    /// any group; they live in [`crate::cache::SequenceCache`] instead.
    pub fn push_video(&mut self, packet: Packet) {
        if self.disabled() || packet.kind.is_sequence_header() {
            return;
        }

        if packet.kind.is_keyframe() {
            self.close_open_group();
            self.seen_keyframe = true;
            self.open.push(packet);
            return;
        }

        if !self.seen_keyframe {
            return;
        }

        if self.open.len() < OPEN_GROUP_CAP {
            self.open.push(packet);
        }
    }

    /// Feed an audio packet into the currently-open group. Audio sequence
    /// headers live in [`crate::cache::SequenceCache`] instead; regular audio
    /// frames before the first keyframe are dropped along with video.
    pub fn push_audio(&mut self, packet: Packet) {
        if self.disabled() || packet.kind.is_sequence_header() {
            return;
        }
        if !self.seen_keyframe {
            return;
        }
        if self.open.len() < OPEN_GROUP_CAP {
            self.open.push(packet);
        }
    }

    fn close_open_group(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let group = std::mem::take(&mut self.open);
        self.groups.push_back(group);
        // `capacity` counts the in-progress group too: once this closed
        // group is joined by the next one (about to start in `open`), only
        // `capacity - 1` completed groups may remain alongside it.
        let completed_budget = self.capacity.saturating_sub(1);
        while self.groups.len() > completed_budget {
            self.groups.pop_front();
        }
    }

    /// All cached video packets in playback order: every closed group
    /// followed by whatever has accumulated in the open group.
    pub fn replay_packets(&self) -> Vec<Packet> {
        let total: usize = self.groups.iter().map(|g| g.len()).sum::<usize>() + self.open.len();
        let mut out = Vec::with_capacity(total);
        for group in &self.groups {
            out.extend(group.iter().cloned());
        }
        out.extend(self.open.iter().cloned());
        out
    }

    pub fn group_count(&self) -> usize {
        self.groups.len() + if self.open.is_empty() { 0 } else { 1 }
    }

    pub fn packet_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum::<usize>() + self.open.len()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.open.clear();
        self.seen_keyframe = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PacketKind;
    use crate::processing::{VideoCodec, FrameType};
    use bytes::Bytes;

    fn packet(frame_type: FrameType, ts: u32) -> Packet {
        Packet::new(
            PacketKind::Video { codec: VideoCodec::H264, frame_type, is_sequence_header: false },
            ts,
            1,
            Bytes::from_static(&[0]),
        )
    }

    #[test]
    fn zero_capacity_disables_the_cache() {
        let mut cache = GopCache::new(0);
        cache.push_video(packet(FrameType::Keyframe, 0));
        cache.push_video(packet(FrameType::InterFrame, 33));
        assert_eq!(cache.packet_count(), 0);
        assert!(cache.replay_packets().is_empty());
    }

    #[test]
    fn frames_before_first_keyframe_are_dropped() {
        let mut cache = GopCache::new(2);
        cache.push_video(packet(FrameType::InterFrame, 0));
        assert_eq!(cache.packet_count(), 0);
    }

    #[test]
    fn eviction_drops_whole_groups_at_capacity() {
        let mut cache = GopCache::new(1);
        cache.push_video(packet(FrameType::Keyframe, 0));
        cache.push_video(packet(FrameType::InterFrame, 33));
        cache.push_video(packet(FrameType::Keyframe, 1000));
        cache.push_video(packet(FrameType::InterFrame, 1033));

        // Only the second group (closed groups capacity 1) plus the open
        // group remain; the first group was evicted whole.
        let packets = cache.replay_packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].timestamp, 1000);
    }

    #[test]
    fn open_group_beyond_cap_discards_extra_frames() {
        let mut cache = GopCache::new(4);
        cache.push_video(packet(FrameType::Keyframe, 0));
        for i in 0..(OPEN_GROUP_CAP + 10) {
            cache.push_video(packet(FrameType::InterFrame, i as u32 + 1));
        }
        assert_eq!(cache.packet_count(), OPEN_GROUP_CAP);
    }
}
