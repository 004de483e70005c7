//! The process-wide, thread-safe capture queue.
//!
//! Pure and connection-local components (the classifier, engine and
//! assembler) need no synchronization; this is the one place the core
//! touches shared state. A `std::sync::Mutex` is sufficient because the
//! critical sections here are plain data-structure operations, never held
//! across an `.await` point.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::smtp::message::Message;

/// A FIFO of completed [`Message`]s, shared between every connection's
/// write side and the host program's read side.
pub struct CaptureQueue {
    inner: Mutex<VecDeque<Message>>,
    next_id: AtomicU64,
}

impl Default for CaptureQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureQueue {
    pub fn new() -> Self {
        CaptureQueue {
            inner: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Enqueues every message from one connection's transaction list under
    /// a single critical section, so an external observer never sees a
    /// partial set from a single transaction (spec §5).
    pub fn offer_all(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        let mut guard = self.inner.lock().expect("capture queue mutex poisoned");
        for mut message in messages {
            message.set_id(self.next_id.fetch_add(1, Ordering::SeqCst));
            guard.push_back(message);
        }
    }

    /// Destructively removes and returns the oldest message, if any.
    pub fn poll(&self) -> Option<Message> {
        self.inner.lock().expect("capture queue mutex poisoned").pop_front()
    }

    /// A non-destructive copy of every message currently queued.
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner
            .lock()
            .expect("capture queue mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Empties the queue. Idempotent.
    pub fn clear(&self) {
        self.inner.lock().expect("capture queue mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("capture queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
