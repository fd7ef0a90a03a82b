use async_channel::{bounded, Receiver, Sender, TrySendError};
use echomint_types::Height;
use log::debug;
use parking_lot::RwLock;

/// Fan-out of height-committed signals to external consumers (cache
/// invalidation, indexers). Delivery is fire-and-forget best-effort and not
/// part of the consistency contract: a full subscriber misses the signal, a
/// closed subscriber is dropped.
#[derive(Default)]
pub struct CommitNotifier {
    subscribers: RwLock<Vec<Sender<Height>>>,
}

impl CommitNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber with a bounded mailbox
    pub fn register(&self, capacity: usize) -> Receiver<Height> {
        let (sender, receiver) = bounded(capacity);
        self.subscribers.write().push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn notify(&self, height: Height) {
        self.subscribers.write().retain(|sender| match sender.try_send(height) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("commit notification at height {height} dropped for a slow subscriber");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_and_best_effort() {
        let notifier = CommitNotifier::new();
        let fast = notifier.register(4);
        let slow = notifier.register(1);

        notifier.notify(1);
        notifier.notify(2);

        // the slow subscriber's mailbox overflowed; the signal was dropped
        assert_eq!(fast.try_recv().unwrap(), 1);
        assert_eq!(fast.try_recv().unwrap(), 2);
        assert_eq!(slow.try_recv().unwrap(), 1);
        assert!(slow.try_recv().is_err());

        // closed subscribers are pruned
        drop(slow);
        notifier.notify(3);
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(fast.try_recv().unwrap(), 3);
    }
}
