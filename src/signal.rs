//! Notification Signals
//!
//! A [`Signal`] is a list of subscribers notified synchronously whenever the
//! owner calls [`Signal::happen`]. Used for UI notifications such as the
//! canvas path changing (breadcrumbs) or a module context press.

/// Identifies one subscription so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous multi-subscriber notification
pub struct Signal<T> {
    subscribers: Vec<(SubscriptionId, Box<dyn FnMut(&T)>)>,
    next_id: u64,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a subscriber
    pub fn subscribe(&mut self, f: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Notify every subscriber in subscription order
    pub fn happen(&mut self, value: &T) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
