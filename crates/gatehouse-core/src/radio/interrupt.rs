use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::Sender;

use super::RadioRequest;

/// Entry point for the transceiver's interrupt line.
///
/// `fire` is what an interrupt handler calls. It disarms the line and posts
/// [`RadioRequest::Interrupt`] with a non-blocking send into the bounded
/// radio queue, whose slots are allocated up front; nothing on this path
/// allocates, locks or waits. The radio task re-arms the line once it has
/// serviced the interrupt.
#[derive(Clone)]
pub struct InterruptLine {
    armed: Arc<AtomicBool>,
    queue: Sender<RadioRequest>,
}

impl InterruptLine {
    pub(crate) fn new(queue: Sender<RadioRequest>) -> Self {
        Self { armed: Arc::new(AtomicBool::new(true)), queue }
    }

    /// Signal an interrupt. Returns whether a request was posted.
    ///
    /// A disarmed line ignores the call. If the queue is full the line stays
    /// armed so the next edge can try again.
    pub fn fire(&self) -> bool {
        if !self.armed.swap(false, Ordering::AcqRel) {
            return false;
        }
        if self.queue.try_send(RadioRequest::Interrupt).is_ok() {
            return true;
        }
        self.armed.store(true, Ordering::Release);
        false
    }

    /// Re-enable the line.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Whether the next `fire` will post.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}
