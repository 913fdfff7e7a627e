//! Ordered application of content fragments
//!
//! Fragments may be enqueued in bursts by the stream reader while the render
//! side is still busy with an earlier one (for example waiting out the
//! minimum display time of a loading phrase). The sequencer keeps them in
//! arrival order and makes sure only one is applied at a time.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Receives fragments in order
#[async_trait]
pub trait FragmentSink: Send {
    async fn apply(&mut self, fragment: String);
}

/// FIFO of pending fragments with a serialized drain
#[derive(Default)]
pub struct ChunkSequencer {
    queue: Mutex<VecDeque<String>>,
    wake: Notify,
    closed: AtomicBool,
    drain_lock: tokio::sync::Mutex<()>,
}

impl ChunkSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fragment. Safe while a drain is running.
    pub fn enqueue(&self, fragment: impl Into<String>) {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("fragment enqueued after the sequencer was closed, dropping it");
            return;
        }
        self.queue.lock().push_back(fragment.into());
        self.wake.notify_one();
    }

    /// No more fragments will arrive; `run` returns once the queue is empty
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Apply everything queued so far, in order. Returns how many fragments
    /// this call applied.
    pub async fn drain<S: FragmentSink + ?Sized>(&self, sink: &mut S) -> usize {
        let _drain = self.drain_lock.lock().await;
        let mut applied = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(fragment) = next else {
                break;
            };
            sink.apply(fragment).await;
            applied += 1;
        }
        applied
    }

    /// Drain until the sequencer is closed and empty
    pub async fn run<S: FragmentSink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut total = 0;
        loop {
            total += self.drain(sink).await;
            if self.is_closed() && self.is_empty() {
                break;
            }
            self.wake.notified().await;
        }
        tracing::trace!(total, "sequencer drained");
        total
    }
}
