use std::sync::Arc;

use crate::macros::{log_debug, log_warn};
use crate::{Descriptor, Message, RawPayload};

use super::SubscriptionId;

/// Decode-and-invoke closure stored per subscription.
pub(crate) type Invoker = Arc<dyn Fn(&RawPayload) + Send + Sync>;

struct Entry {
    // ---
    id: SubscriptionId,
    tag: &'static str,
    invoke: Invoker,
}

/// Ordered collection of active subscriptions.
///
/// Not synchronized on its own; the connector keeps it behind a mutex.
/// Insertion order is delivery order for subscriptions sharing a tag.
pub(crate) struct SubscriptionRegistry {
    // ---
    entries: Vec<Entry>,
}

impl SubscriptionRegistry {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a typed callback under the descriptor's tag.
    ///
    /// Payloads that fail to decode are logged and never reach `callback`.
    pub fn add<T, F>(&mut self, descriptor: Descriptor<T>, callback: F) -> SubscriptionId
    where
        T: Message,
        F: Fn(T) + Send + Sync + 'static,
    {
        // ---
        let id = SubscriptionId::generate();
        let tag = descriptor.tag();

        let invoke: Invoker = Arc::new(move |payload: &RawPayload| {
            match descriptor.convert(payload) {
                Ok(message) => callback(message),
                Err(err) => log_warn!("{id}: dropping `{tag}` payload: {err}"),
            }
        });

        self.entries.push(Entry { id, tag, invoke });
        log_debug!("{id}: subscribed to `{tag}`");
        id
    }

    /// Detach a subscription, returning its invoker if it was present.
    ///
    /// The caller should drop the returned value after releasing any lock
    /// around the registry: the invoker may own the subscription's handle,
    /// whose `Drop` re-enters the registry.
    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Invoker> {
        // ---
        let index = self.entries.iter().position(|entry| entry.id == *id)?;
        let entry = self.entries.remove(index);
        log_debug!("{id}: unsubscribed from `{}`", entry.tag);
        Some(entry.invoke)
    }

    /// Snapshot of the invokers currently registered for `tag`.
    pub fn matching(&self, tag: &str) -> Vec<Invoker> {
        // ---
        self.entries
            .iter()
            .filter(|entry| entry.tag == tag)
            .map(|entry| entry.invoke.clone())
            .collect()
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.entries.iter().any(|entry| entry.id == *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
