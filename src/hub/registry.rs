use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::hub::stream::{Stream, StreamState};

/// Concurrent `key -> Stream` table. A background sweeper periodically
/// removes streams that have had no publisher activity and no subscribers
/// for a full sweep interval, so a publisher that vanished without a clean
/// disconnect doesn't pin memory forever.
pub struct StreamRegistry {
    streams: DashMap<String, Arc<Stream>>,
    gop_capacity: usize,
}

impl StreamRegistry {
    pub fn new(gop_capacity: usize) -> Arc<Self> {
        Arc::new(StreamRegistry { streams: DashMap::new(), gop_capacity })
    }

    /// Fetch the Stream for `key`, creating an idle one if none exists yet.
    pub fn get_or_insert(&self, key: &str) -> Arc<Stream> {
        self.streams
            .entry(key.to_string())
            .or_insert_with(|| Stream::new(key.to_string(), self.gop_capacity))
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Stream>> {
        self.streams.get(key).map(|e| e.clone())
    }

    pub fn remove(&self, key: &str) {
        self.streams.remove(key);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Snapshot of all currently registered keys, for diagnostics.
    pub fn keys(&self) -> Vec<String> {
        self.streams.iter().map(|e| e.key().clone()).collect()
    }

    /// Spawn the periodic sweeper. Returns the join handle so callers can
    /// abort it on shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, stale_after: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_with_idle_check(stale_after).await;
            }
        })
    }

    async fn sweep_with_idle_check(&self, stale_after: Duration) {
        let mut stale = Vec::new();
        for entry in self.streams.iter() {
            let stream = entry.value();
            let idle_enough = matches!(stream.state(), StreamState::Idle | StreamState::Dead)
                && stream.subscriber_count() == 0
                && stream.idle_for().await >= stale_after;
            if idle_enough {
                stale.push(entry.key().clone());
            }
        }
        for key in stale {
            if let Some(stream) = self.streams.get(&key) {
                if stream.subscriber_count() != 0 {
                    continue;
                }
            } else {
                continue;
            }
            self.streams.remove(&key);
        }
    }
}
