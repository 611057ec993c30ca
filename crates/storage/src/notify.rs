use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

type Listener = Box<dyn Fn() + Send>;

#[derive(Default)]
struct NotifierInner {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Payload-free change fan-out: fires every subscriber whenever any
/// writer's edit is persisted. Subscribers react by reloading; the
/// notification carries no data of its own.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Mutex<NotifierInner>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Dropping the returned subscription
    /// unsubscribes it.
    pub fn subscribe(&self, listener: impl Fn() + Send + 'static) -> Subscription {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, Box::new(listener));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every live subscriber once.
    pub fn notify(&self) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for listener in inner.listeners.values() {
            listener();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .len()
    }
}

pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<NotifierInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_reaches_all_subscribers() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_a = hits.clone();
        let _sub_a = notifier.subscribe(move || {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let hits_b = hits.clone();
        let _sub_b = notifier.subscribe(move || {
            hits_b.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_subscription_stops_firing() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_inner = hits.clone();
        let sub = notifier.subscribe(move || {
            hits_inner.fetch_add(1, Ordering::SeqCst);
        });
        notifier.notify();
        drop(sub);
        notifier.notify();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
