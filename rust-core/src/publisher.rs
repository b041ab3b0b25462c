//! Property fan-out to subscribers.
//!
//! The publisher caches the last value of every property and forwards only
//! real changes. Each subscriber owns an unbounded channel; a subscriber
//! whose receiver was dropped is removed the next time a change is
//! delivered to it. Nothing a subscriber does can fail a publish.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::mpsc;

use crate::types::{ContextProperty, PropertyChange, PropertyValue};

/// Identifies a subscription for [`PropertyPublisher::unsubscribe`].
pub type SubscriberId = u64;

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<PropertyChange>,
}

impl Subscription {
    /// Wait for the next change. `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<PropertyChange> {
        self.receiver.recv().await
    }

    /// Next change if one is already queued.
    pub fn try_recv(&mut self) -> Option<PropertyChange> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<PropertyChange> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    properties: BTreeSet<ContextProperty>,
    sender: mpsc::UnboundedSender<PropertyChange>,
}

impl Subscriber {
    fn wants(&self, property: ContextProperty) -> bool {
        self.properties.contains(&property)
    }
}

/// Publish-on-change cache with subscriber fan-out.
#[derive(Debug, Default)]
pub struct PropertyPublisher {
    current: BTreeMap<ContextProperty, PropertyChange>,
    subscribers: Vec<Subscriber>,
    next_id: SubscriberId,
    published_count: u64,
}

impl PropertyPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `properties` (all of them when empty).
    ///
    /// Already known values are queued on the new subscription right away,
    /// in publication order.
    pub fn subscribe(&mut self, properties: &[ContextProperty]) -> Subscription {
        let properties: BTreeSet<ContextProperty> = if properties.is_empty() {
            ContextProperty::ALL.into_iter().collect()
        } else {
            properties.iter().copied().collect()
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        for property in &properties {
            if let Some(change) = self.current.get(property) {
                // Receiver is still local, send cannot fail
                let _ = sender.send(*change);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(subscriber = id, count = properties.len(), "subscriber added");

        self.subscribers.push(Subscriber {
            id,
            properties,
            sender,
        });
        Subscription { id, receiver }
    }

    /// Publish a change. Returns `false` when the value was already current.
    pub fn publish(&mut self, change: PropertyChange) -> bool {
        if self.current(change.property) == Some(change.value) {
            return false;
        }
        self.current.insert(change.property, change);
        self.published_count += 1;

        tracing::info!(property = %change.property, value = %change.value, "property changed");

        self.subscribers.retain(|subscriber| {
            if !subscriber.wants(change.property) {
                return true;
            }
            match subscriber.sender.send(change) {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(subscriber = subscriber.id, "subscriber disconnected");
                    false
                }
            }
        });

        true
    }

    /// Remove a subscriber. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Last published value of a property.
    pub fn current(&self, property: ContextProperty) -> Option<PropertyValue> {
        self.current.get(&property).map(|change| change.value)
    }

    /// Number of changes actually forwarded.
    pub fn published_count(&self) -> u64 {
        self.published_count
    }
}
