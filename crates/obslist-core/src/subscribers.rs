use std::cell::RefCell;
use std::rc::Rc;

/// Handle identifying one registered callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct SubscriberTable<E> {
    next_id: u64,
    entries: Vec<(CallbackId, Rc<dyn Fn(&E)>)>,
}

impl<E> SubscriberTable<E> {
    fn allocate(&mut self, callback: Rc<dyn Fn(&E)>) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    fn remove(&mut self, id: CallbackId) {
        self.entries.retain(|(entry, _)| *entry != id);
    }
}

/// Instance-scoped registry of event callbacks.
///
/// Each observable object owns its own `Subscribers`; there is no global
/// registry. Dispatch is synchronous and snapshots the callback list first,
/// so a callback may subscribe or cancel re-entrantly without invalidating
/// the iteration.
pub struct Subscribers<E> {
    table: Rc<RefCell<SubscriberTable<E>>>,
}

impl<E: 'static> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(SubscriberTable {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `callback` and returns the guard that keeps it registered.
    pub fn subscribe(&self, callback: Rc<dyn Fn(&E)>) -> Subscription {
        let id = self.table.borrow_mut().allocate(callback);
        let table = Rc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                table.borrow_mut().remove(id);
            }
        })
    }

    /// Delivers `event` to every currently registered callback.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Rc<dyn Fn(&E)>> = self
            .table
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one live registration.
///
/// Cancelling is idempotent: it happens at most once, either through
/// [`Subscription::cancel`] or when the guard is dropped. Outliving the
/// registry it came from is fine; cancelling then is a no-op.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_every_subscriber() {
        let subscribers = Subscribers::<u32>::new();
        let seen = Rc::new(Cell::new(0u32));

        let first = Rc::clone(&seen);
        let _a = subscribers.subscribe(Rc::new(move |event| first.set(first.get() + event)));
        let second = Rc::clone(&seen);
        let _b = subscribers.subscribe(Rc::new(move |event| second.set(second.get() + event)));

        subscribers.emit(&3);
        assert_eq!(seen.get(), 6);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let subscribers = Subscribers::<()>::new();
        let calls = Rc::new(Cell::new(0usize));

        let counter = Rc::clone(&calls);
        let guard = subscribers.subscribe(Rc::new(move |_| counter.set(counter.get() + 1)));
        subscribers.emit(&());
        drop(guard);
        subscribers.emit(&());

        assert_eq!(calls.get(), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn events_may_own_their_payload() {
        let subscribers = Subscribers::<String>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let guard = subscribers
            .subscribe(Rc::new(move |event: &String| sink.borrow_mut().push(event.clone())));

        subscribers.emit(&"hello".to_string());
        guard.cancel();
        subscribers.emit(&"dropped".to_string());

        assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
    }

    #[test]
    fn cancel_after_registry_is_gone_is_a_no_op() {
        let subscribers = Subscribers::<()>::new();
        let guard = subscribers.subscribe(Rc::new(|_| {}));
        drop(subscribers);
        guard.cancel();
    }

    #[test]
    fn subscribing_during_dispatch_does_not_disturb_the_snapshot() {
        let subscribers = Rc::new(Subscribers::<()>::new());
        let calls = Rc::new(Cell::new(0usize));
        let late_guard = Rc::new(RefCell::new(None));

        let registry = Rc::clone(&subscribers);
        let counter = Rc::clone(&calls);
        let slot = Rc::clone(&late_guard);
        let _guard = subscribers.subscribe(Rc::new(move |_| {
            counter.set(counter.get() + 1);
            if slot.borrow().is_none() {
                let inner = registry.subscribe(Rc::new(|_| {}));
                *slot.borrow_mut() = Some(inner);
            }
        }));

        subscribers.emit(&());
        assert_eq!(calls.get(), 1);
        assert_eq!(subscribers.len(), 2);
    }
}
