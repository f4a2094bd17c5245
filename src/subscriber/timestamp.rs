/// Tracks the rebased timestamp a subscriber's write path has last emitted
/// for each media type, plus the base offset applied after a publisher
/// handover so the subscriber's timestamps stay monotonic across the
/// discontinuity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampBase {
    last_video_ts: u32,
    last_audio_ts: u32,
    base_ts: u32,
}

impl TimestampBase {
    pub fn new() -> Self {
        TimestampBase::default()
    }

    /// Record an incoming timestamp and return the rebased value to send to
    /// the subscriber.
    pub fn rec_timestamp(&mut self, raw: u32, is_video: bool) -> u32 {
        let rebased = raw.saturating_add(self.base_ts);
        if is_video {
            self.last_video_ts = rebased;
        } else {
            self.last_audio_ts = rebased;
        }
        rebased
    }

    /// Called once, right after a publisher handover, before any packets
    /// from the new publisher have been rebased: the new base is whichever
    /// of the two last-emitted timestamps is larger, so the first packet
    /// from the new publisher (raw timestamp ~0) continues forward instead
    /// of jumping backward.
    pub fn calc_base_timestamp(&mut self) {
        self.base_ts = self.last_video_ts.max(self.last_audio_ts);
    }

    pub fn last_video_timestamp(&self) -> u32 {
        self.last_video_ts
    }

    pub fn last_audio_timestamp(&self) -> u32 {
        self.last_audio_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_keeps_timestamps_monotonic_across_handover() {
        let mut base = TimestampBase::new();
        assert_eq!(base.rec_timestamp(0, true), 0);
        assert_eq!(base.rec_timestamp(1000, true), 1000);
        assert_eq!(base.rec_timestamp(900, false), 900);

        // Handover: new publisher starts its own timestamps from 0 again.
        base.calc_base_timestamp();
        assert_eq!(base.rec_timestamp(0, true), 1000);
        assert_eq!(base.rec_timestamp(33, true), 1033);
    }
}
