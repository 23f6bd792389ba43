//! Snapshot update fan-out
//!
//! Each subscriber gets a bounded queue. Publishing never blocks: a full queue
//! drops that update for that subscriber only, and a subscriber whose receiver
//! has been dropped is removed.

use crate::types::CounterSnapshot;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// Identifies one subscription for later removal
pub type SubscriptionId = u64;

#[derive(Debug, Default)]
pub struct UpdatePublisher {
    subscribers: Vec<(SubscriptionId, SyncSender<CounterSnapshot>)>,
    next_id: SubscriptionId,
}

impl UpdatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer with a queue of `capacity` snapshots
    pub fn subscribe(&mut self, capacity: usize) -> (SubscriptionId, Receiver<CounterSnapshot>) {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let id = self.next_id;
        self.next_id += 1;
        self.add(id, tx);
        (id, rx)
    }

    /// Register an observer whose channel and id were created elsewhere
    pub fn add(&mut self, id: SubscriptionId, sender: SyncSender<CounterSnapshot>) {
        self.next_id = self.next_id.max(id + 1);
        self.subscribers.push((id, sender));
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Offer the snapshot to every subscriber without blocking
    pub fn publish(&mut self, snapshot: &CounterSnapshot) {
        self.subscribers.retain(|(id, sender)| match sender.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("Subscriber {} is behind, dropping update", id);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Subscriber {} went away", id);
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(steps: u32) -> CounterSnapshot {
        CounterSnapshot {
            session_steps: steps,
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let mut publisher = UpdatePublisher::new();
        let (_, rx1) = publisher.subscribe(4);
        let (_, rx2) = publisher.subscribe(4);

        publisher.publish(&snapshot(3));

        assert_eq!(rx1.try_recv().unwrap().session_steps, 3);
        assert_eq!(rx2.try_recv().unwrap().session_steps, 3);
    }

    #[test]
    fn test_publish_with_no_subscribers() {
        let mut publisher = UpdatePublisher::new();
        publisher.publish(&snapshot(1));
        assert_eq!(publisher.subscribers.len(), 0);
    }

    #[test]
    fn test_slow_subscriber_drops_updates_without_blocking() {
        let mut publisher = UpdatePublisher::new();
        let (_, slow) = publisher.subscribe(1);
        let (_, fast) = publisher.subscribe(8);

        for steps in 1..=5 {
            publisher.publish(&snapshot(steps));
        }

        let slow_seen: Vec<u32> = slow.try_iter().map(|s| s.session_steps).collect();
        let fast_seen: Vec<u32> = fast.try_iter().map(|s| s.session_steps).collect();
        assert_eq!(slow_seen, vec![1]);
        assert_eq!(fast_seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(publisher.subscribers.len(), 2);
    }

    #[test]
    fn test_dropped_receiver_is_removed() {
        let mut publisher = UpdatePublisher::new();
        let (_, rx) = publisher.subscribe(2);
        drop(rx);

        publisher.publish(&snapshot(1));
        assert_eq!(publisher.subscribers.len(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let mut publisher = UpdatePublisher::new();
        let (id, rx) = publisher.subscribe(2);

        assert!(publisher.unsubscribe(id));
        assert!(!publisher.unsubscribe(id));

        publisher.publish(&snapshot(1));
        assert!(rx.try_recv().is_err());
    }
}
