use std::sync::{Arc, Mutex, PoisonError, Weak};

/// In-process broadcast events for independently mounted UI surfaces.
///
/// Events carry no payload on purpose: subscribers re-read the store they
/// care about instead of trusting a snapshot that may already be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Section completion state changed; subscribers should re-`load`.
    ProgressUpdated,
    /// A surface asked for the survey/quiz panel to be opened.
    OpenSurvey,
}

type Handler = Arc<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// Fire-and-forget broadcast channel with an explicit observer list.
///
/// Handlers registered at broadcast time are invoked synchronously; late
/// subscribers miss prior events and nothing is queued or retried. Each app
/// context owns its own bus, so tests can instantiate isolated instances.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Arc<Mutex<Observers>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. The handler stays subscribed until the returned
    /// [`Subscription`] is dropped or explicitly unsubscribed.
    #[must_use]
    pub fn subscribe(&self, handler: impl Fn(&AppEvent) + Send + Sync + 'static) -> Subscription {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = observers.next_id;
        observers.next_id += 1;
        observers.handlers.push((id, Arc::new(handler)));

        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Invoke every currently registered handler with the event.
    ///
    /// The handler list is cloned out of the lock first, so a handler may
    /// itself publish or subscribe without deadlocking.
    pub fn publish(&self, event: &AppEvent) {
        let handlers: Vec<Handler> = {
            let observers = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            observers
                .handlers
                .iter()
                .map(|(_, h)| Arc::clone(h))
                .collect()
        };

        for handler in handlers {
            handler(event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }
}

/// Handle tying a subscription to its owner's lifetime.
///
/// Dropping the handle unregisters the handler, so a surface that subscribes
/// on mount cannot leak its observer past unmount.
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<Observers>>,
}

impl Subscription {
    /// Unregister explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            let mut observers = observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn publish_reaches_all_current_subscribers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let _s1 = bus.subscribe(move |event| {
            assert_eq!(*event, AppEvent::ProgressUpdated);
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let h2 = Arc::clone(&hits);
        let _s2 = bus.subscribe(move |_| {
            h2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&AppEvent::ProgressUpdated);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn late_subscribers_miss_prior_events() {
        let bus = EventBus::new();
        bus.publish(&AppEvent::OpenSurvey);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.publish(&AppEvent::OpenSurvey);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_subscription_unregisters() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let sub = bus.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(&AppEvent::ProgressUpdated);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let nested: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let slot = Arc::clone(&nested);
        let _sub = bus.subscribe(move |_| {
            let sub = inner_bus.subscribe(|_| {});
            slot.lock().unwrap().push(sub);
        });

        bus.publish(&AppEvent::ProgressUpdated);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
