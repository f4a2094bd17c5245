use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::cache::{GopCache, SequenceCache};
use crate::handler::{ReadCloser, WriteCloser};
use crate::media::{Packet, PacketKind};
use crate::subscriber::SubscriberQueue;
use crate::{Error, Result};

const READ_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Idle = 0,
    Publishing = 1,
    Draining = 2,
    Dead = 3,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StreamState::Publishing,
            2 => StreamState::Draining,
            3 => StreamState::Dead,
            _ => StreamState::Idle,
        }
    }
}

struct Subscriber {
    queue: Arc<SubscriberQueue>,
    writer: Mutex<Box<dyn WriteCloser>>,
}

/// One published stream key's fan-out unit: caches the sequence headers and
/// GOP ring, and holds the live set of subscriber queues that the read loop
/// pushes every packet into.
pub struct Stream {
    key: String,
    state: AtomicU8,
    sequence_cache: Mutex<SequenceCache>,
    gop_cache: Mutex<GopCache>,
    subscribers: DashMap<u64, Arc<Subscriber>>,
    next_uid: AtomicU64,
    last_activity: Mutex<Instant>,
    /// Bumped by [`Self::handover`] so the read loop it is replacing notices
    /// and stops on its own, instead of racing the new one into `distribute`.
    generation: watch::Sender<u64>,
}

impl Stream {
    pub fn new(key: impl Into<String>, gop_capacity: usize) -> Arc<Self> {
        let (generation, _rx) = watch::channel(0u64);
        Arc::new(Stream {
            key: key.into(),
            state: AtomicU8::new(StreamState::Idle as u8),
            sequence_cache: Mutex::new(SequenceCache::new()),
            gop_cache: Mutex::new(GopCache::new(gop_capacity)),
            subscribers: DashMap::new(),
            next_uid: AtomicU64::new(1),
            last_activity: Mutex::new(Instant::now()),
            generation,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub async fn touch(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_activity.lock().await.elapsed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Register a new subscriber, replaying the latched sequence headers
    /// plus whatever GOP history is cached before returning. The first send
    /// is flushed synchronously so a join lands the viewer mid-keyframe
    /// immediately instead of waiting for the next live packet.
    pub async fn add_subscriber(
        self: &Arc<Self>,
        mut writer: Box<dyn WriteCloser>,
        queue_capacity: usize,
        transport: crate::subscriber::Transport,
    ) -> u64 {
        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::new(SubscriberQueue::new(queue_capacity, transport));

        {
            let seq = self.sequence_cache.lock().await;
            let gop = self.gop_cache.lock().await;
            let mut replay = seq.replay_packets();
            replay.extend(gop.replay_packets());
            for packet in replay {
                let _ = writer.write(packet).await;
            }
        }

        let subscriber = Arc::new(Subscriber { queue: queue.clone(), writer: Mutex::new(writer) });
        self.subscribers.insert(uid, subscriber.clone());

        let stream = self.clone();
        tokio::spawn(async move {
            loop {
                let Some(packet) = queue.pop().await else { break };
                let mut writer = subscriber.writer.lock().await;
                if !writer.alive() {
                    break;
                }
                if let Err(e) = writer.write(packet).await {
                    writer.close(e).await;
                    break;
                }
            }
            stream.subscribers.remove(&uid);
        });

        uid
    }

    pub fn remove_subscriber(&self, uid: u64) {
        self.subscribers.remove(&uid);
    }

    /// Feed one packet from the publisher into the cache and every
    /// subscriber's queue. Cache writes happen before fan-out so a
    /// subscriber that joins mid-push still sees a consistent cache.
    async fn distribute(&self, packet: Packet) {
        match &packet.kind {
            PacketKind::Video { .. } => {
                self.sequence_cache.lock().await.observe(&packet);
                self.gop_cache.lock().await.push_video(packet.clone());
            }
            PacketKind::Audio { .. } => {
                self.sequence_cache.lock().await.observe(&packet);
                self.gop_cache.lock().await.push_audio(packet.clone());
            }
            PacketKind::Metadata => {
                self.sequence_cache.lock().await.observe(&packet);
            }
        }

        for entry in self.subscribers.iter() {
            entry.value().queue.push(packet.clone()).await;
        }
    }

    /// Drive the read loop for a freshly accepted publisher. Returns when
    /// the publisher disconnects, is replaced by a handover, or a read
    /// times out. A handover-driven stop is not an error: the old loop's
    /// `Ok(())` return means "superseded", and the caller (the new
    /// publisher's own `run_publisher`/`handover` call) is the one that
    /// actually owns the Stream going forward.
    pub async fn run_publisher(self: &Arc<Self>, mut reader: Box<dyn ReadCloser>) -> Result<()> {
        self.set_state(StreamState::Publishing);
        self.touch().await;

        let mut gen_rx = self.generation.subscribe();
        let mut stopped_by_handover = false;

        let result = 'read_loop: loop {
            tokio::select! {
                biased;
                changed = gen_rx.changed() => {
                    if changed.is_ok() {
                        stopped_by_handover = true;
                    }
                    break 'read_loop Ok(());
                }
                read = tokio::time::timeout(READ_DEADLINE, reader.read()) => {
                    match read {
                        Ok(Ok(packet)) => {
                            self.touch().await;
                            self.distribute(packet).await;
                        }
                        Ok(Err(e)) if e.is_avc_end_of_sequence() => break 'read_loop Ok(()),
                        Ok(Err(e)) => break 'read_loop Err(e),
                        Err(_) => break 'read_loop Err(Error::timeout("publisher read deadline exceeded")),
                    }
                }
            }
        };

        let close_reason = if stopped_by_handover {
            Error::protocol("stop old")
        } else {
            match &result {
                Ok(()) => Error::AvcEndOfSequence,
                Err(e) => Error::protocol(e.to_string()),
            }
        };
        reader.close(close_reason).await;

        if stopped_by_handover {
            // The new publisher's own run_publisher call owns state and
            // subscriber lifecycle from here; nothing left to clean up.
            return result;
        }

        self.end_publishing().await;
        result
    }

    /// Handle a new publisher claiming a key that is already being
    /// published on: the existing reader is asked to stop, the new one
    /// takes over the same Stream (and its subscriber set, cache, and
    /// state) without tearing any subscriber down. Every subscriber's
    /// timestamp base is rebased so the discontinuity doesn't appear as a
    /// backward jump.
    pub async fn handover(self: &Arc<Self>, new_reader: Box<dyn ReadCloser>) -> Result<()> {
        self.set_state(StreamState::Draining);

        // Bump the generation so the old read loop's select! notices and
        // stops instead of racing this one into distribute().
        let next = self.generation.borrow().wrapping_add(1);
        let _ = self.generation.send(next);

        for entry in self.subscribers.iter() {
            let mut writer = entry.value().writer.lock().await;
            writer.calc_base_timestamp();
        }

        self.run_publisher(new_reader).await
    }

    /// Publisher has ended for good (not superseded by a handover):
    /// transition out of Publishing, close every subscriber flagged
    /// `is_interval` immediately, and let the rest drain their queues to
    /// empty and close on their own.
    async fn end_publishing(&self) {
        if self.state() == StreamState::Publishing || self.state() == StreamState::Draining {
            self.set_state(StreamState::Idle);
        }

        for entry in self.subscribers.iter() {
            entry.value().queue.close();
        }

        let mut interval_uids = Vec::new();
        for entry in self.subscribers.iter() {
            let is_interval = entry.value().writer.lock().await.info().is_interval;
            if is_interval {
                interval_uids.push(*entry.key());
            }
        }
        for uid in interval_uids {
            if let Some((_, subscriber)) = self.subscribers.remove(&uid) {
                subscriber.writer.lock().await.close(Error::protocol("publisher ended, is_interval subscriber torn down")).await;
            }
        }
    }

    pub fn mark_dead(&self) {
        self.set_state(StreamState::Dead);
    }
}
