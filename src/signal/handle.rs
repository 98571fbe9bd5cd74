use std::sync::{Arc, PoisonError, RwLock};

use tokio::time::{Duration, Instant};

use crate::config::SegmentConfig;

use super::{ChannelDataOptions, SegmentedSignalStore};

/// Shared, cloneable access to a [`SegmentedSignalStore`].
///
/// Transport tasks and views hold clones. The lock is taken per call and is
/// never held across an await.
#[derive(Debug, Clone)]
pub struct SignalHandle {
    store: Arc<RwLock<SegmentedSignalStore>>,
    poll_interval: Duration,
}

impl SignalHandle {
    /// Wrap a store.
    pub fn new(store: SegmentedSignalStore) -> Self {
        Self::with_config(store, &SegmentConfig::default())
    }

    /// Wrap a store with explicit settings.
    pub fn with_config(store: SegmentedSignalStore, config: &SegmentConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            poll_interval: config.wait_poll_interval(),
        }
    }

    /// Read the store state.
    ///
    /// The store is locked for the duration of the callback.
    pub fn read<R>(&self, f: impl FnOnce(&SegmentedSignalStore) -> R) -> R {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }

    /// Mutate the store state.
    ///
    /// The store is locked for the duration of the callback. Handlers
    /// registered on the store run inside it and must not use this handle.
    pub fn write<R>(&self, f: impl FnOnce(&mut SegmentedSignalStore) -> R) -> R {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    /// Wait until the first requested bucket is resolved.
    ///
    /// Re-reads every poll interval. Returns `None` once `opts.timeout`
    /// elapses; without a timeout it waits indefinitely. An empty read
    /// (invalid arguments) returns immediately.
    pub async fn wait_for_channel_data(
        &self,
        channel: usize,
        t1: usize,
        t2: usize,
        ds: usize,
        opts: ChannelDataOptions,
    ) -> Option<Vec<f32>> {
        let started = Instant::now();
        let read_opts = ChannelDataOptions {
            request_only: false,
            cached_only: false,
            ..opts
        };
        loop {
            let data = self.write(|store| store.get_channel_data(channel, t1, t2, ds, read_opts));
            if data.first().is_none_or(|v| !v.is_nan()) {
                return Some(data);
            }
            if let Some(timeout) = opts.timeout
                && started.elapsed() >= timeout
            {
                tracing::debug!(channel, t1, t2, ds, "gave up waiting for channel data");
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
