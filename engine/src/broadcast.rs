use std::{
    pin::Pin,
    sync::{Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::dtos::PipelineStatus;

/// Receiving end of one observer registration.
///
/// The first item is always the snapshot taken at registration time.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<PipelineStatus>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<PipelineStatus> {
        self.receiver.recv().await
    }

    /// Next already-delivered snapshot, without waiting.
    pub fn try_recv(&mut self) -> Option<PipelineStatus> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = PipelineStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Registry of outbound observer channels.
///
/// Channels are unbounded so publishing never waits on an observer; a channel
/// whose receiver is gone is dropped from the registry on the next publish.
#[derive(Debug, Default)]
pub struct Broadcaster {
    observers: Mutex<Vec<mpsc::UnboundedSender<PipelineStatus>>>,
}

impl Broadcaster {
    pub fn register(&self, initial: PipelineStatus) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();

        // The receiver is alive, so this cannot fail.
        let _ = sender.send(initial);

        let mut observers = self.observers();
        observers.push(sender);
        debug!("Observer registered, {} connected", observers.len());

        Subscription { receiver }
    }

    /// Pushes `status` to every observer and returns how many received it.
    pub fn publish(&self, status: &PipelineStatus) -> usize {
        let mut observers = self.observers();
        let before = observers.len();

        observers.retain(|observer| observer.send(status.clone()).is_ok());

        if observers.len() < before {
            debug!("Pruned {} disconnected observers", before - observers.len());
        }

        observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    fn observers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<PipelineStatus>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
