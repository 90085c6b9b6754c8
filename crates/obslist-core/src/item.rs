use std::cell::RefCell;
use std::rc::Rc;

use crate::subscribers::{Subscribers, Subscription};

/// Stable identity of an element that can report in-place changes.
///
/// For `Rc`-backed elements the identity is the allocation address, which is
/// stable for as long as any handle is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(usize);

impl ItemId {
    pub fn from_rc<T: ?Sized>(handle: &Rc<T>) -> Self {
        Self(Rc::as_ptr(handle) as *const () as usize)
    }
}

/// An element that can notify subscribers when its value changes in place,
/// without the containing list being touched.
pub trait ObservableItem {
    fn item_id(&self) -> ItemId;

    /// Registers `callback` for subsequent value changes.
    fn on_item_changed(&self, callback: Rc<dyn Fn()>) -> Subscription;
}

/// Decides, per element type and at the call site, whether elements expose
/// per-element change notifications. Filtered views are generic over this
/// instead of inspecting element types at runtime.
///
/// `watch` wires `sink` to the element's notifications; the returned guard is
/// owned by the view's visibility map and released exactly once, when the
/// element leaves the source or the view is disposed.
pub trait ItemObserver<T> {
    /// Identity of `item`, or `None` when it has nothing to observe.
    fn item_id(&self, item: &T) -> Option<ItemId>;

    /// Subscribes `sink` to `item`'s change notifications.
    fn watch(&self, item: &T, sink: Rc<dyn Fn(ItemId)>) -> Option<Subscription>;
}

/// Elements are plain data; there is nothing to observe.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainItems;

impl<T> ItemObserver<T> for PlainItems {
    fn item_id(&self, _item: &T) -> Option<ItemId> {
        None
    }

    fn watch(&self, _item: &T, _sink: Rc<dyn Fn(ItemId)>) -> Option<Subscription> {
        None
    }
}

/// Every element implements [`ObservableItem`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ObservedItems;

impl<T: ObservableItem> ItemObserver<T> for ObservedItems {
    fn item_id(&self, item: &T) -> Option<ItemId> {
        Some(item.item_id())
    }

    fn watch(&self, item: &T, sink: Rc<dyn Fn(ItemId)>) -> Option<Subscription> {
        let id = item.item_id();
        Some(item.on_item_changed(Rc::new(move || sink(id))))
    }
}

struct CellInner<V> {
    value: RefCell<V>,
    subscribers: Subscribers<()>,
}

/// Reference observable element: one value plus change subscribers.
///
/// Cloning produces another handle to the same value; all handles share one
/// identity and one subscriber registry. The cell holds no reference back to
/// whoever observes it, so a cell inside a filtered view never forms a
/// reference cycle with the view.
pub struct ObservableCell<V> {
    inner: Rc<CellInner<V>>,
}

impl<V> ObservableCell<V> {
    pub fn new(value: V) -> Self {
        Self {
            inner: Rc::new(CellInner {
                value: RefCell::new(value),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Run `f` against the current value.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Stores `value` and notifies subscribers unconditionally.
    pub fn replace(&self, value: V) {
        *self.inner.value.borrow_mut() = value;
        self.inner.subscribers.emit(&());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<V: Clone> ObservableCell<V> {
    pub fn get(&self) -> V {
        self.inner.value.borrow().clone()
    }
}

impl<V: PartialEq> ObservableCell<V> {
    /// Stores `value`, notifying subscribers only when it actually differs
    /// from the current value.
    pub fn set(&self, value: V) {
        if *self.inner.value.borrow() == value {
            return;
        }
        self.replace(value);
    }
}

impl<V> Clone for ObservableCell<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> ObservableItem for ObservableCell<V> {
    fn item_id(&self) -> ItemId {
        ItemId::from_rc(&self.inner)
    }

    fn on_item_changed(&self, callback: Rc<dyn Fn()>) -> Subscription {
        self.inner
            .subscribers
            .subscribe(Rc::new(move |_: &()| callback()))
    }
}

impl<V: PartialEq> PartialEq for ObservableCell<V> {
    fn eq(&self, other: &Self) -> bool {
        *self.inner.value.borrow() == *other.inner.value.borrow()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for ObservableCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableCell")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}
