//! Fan-out of upload events to scoped subscribers.

use derivative::Derivative;
use std::collections::HashMap;
use std::sync::mpsc::{self as std_mpsc, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::upload::types::UploadEvent;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: HashMap<u64, Sender<UploadEvent>>,
}

/// Clonable publisher side. Events published while nobody listens are dropped.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = std_mpsc::channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, sender);
        tracing::debug!(subscriber = id, "upload event subscriber registered");

        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: UploadEvent) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Receiving side of an [`EventBus`]. Dropping it unsubscribes.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Subscription {
    id: u64,
    #[derivative(Debug = "ignore")]
    receiver: Receiver<UploadEvent>,
    #[derivative(Debug = "ignore")]
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<UploadEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything delivered since the last call, in publish order.
    pub fn drain(&self) -> Vec<UploadEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<UploadEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            let mut inner = bus.lock().unwrap_or_else(|e| e.into_inner());
            inner.subscribers.remove(&self.id);
            tracing::debug!(subscriber = self.id, "upload event subscriber removed");
        }
    }
}
