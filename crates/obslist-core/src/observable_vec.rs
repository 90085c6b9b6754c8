use std::cell::RefCell;
use std::rc::Rc;

use crate::change::ListChange;
use crate::subscribers::{Subscribers, Subscription};

/// What a filtered view needs from its source collaborator: ordered, indexed
/// access to the current elements plus change notifications.
///
/// The view holds the source behind an `Rc` and never mutates it.
pub trait ObservableList<T: Clone> {
    fn len(&self) -> usize;

    /// The element at `index`, or `None` past the end.
    fn get(&self, index: usize) -> Option<T>;

    /// Registers `callback` for subsequent changes.
    fn subscribe(&self, callback: Rc<dyn Fn(&ListChange)>) -> Subscription;
}

/// An ordered, mutable collection that publishes a [`ListChange`] for every
/// mutation. This is the reference source implementation; filtered views
/// accept anything implementing [`ObservableList`].
///
/// Every mutator emits exactly one event, after the stored contents already
/// reflect the mutation. Out-of-range indices are caller bugs and panic with
/// the usual `Vec` semantics.
pub struct ObservableVec<T> {
    items: RefCell<Vec<T>>,
    subscribers: Subscribers<ListChange>,
}

impl<T> ObservableVec<T> {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Run `f` against the current contents.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.borrow())
    }

    /// Appends `value` at the end.
    pub fn push(&self, value: T) {
        let start = {
            let mut items = self.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        self.subscribers.emit(&ListChange::Inserted { start, count: 1 });
    }

    /// Inserts `value` so that it occupies `index`.
    pub fn insert(&self, index: usize, value: T) {
        self.items.borrow_mut().insert(index, value);
        self.subscribers.emit(&ListChange::Inserted {
            start: index,
            count: 1,
        });
    }

    /// Appends every element of `values`.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) {
        let (start, count) = {
            let mut items = self.items.borrow_mut();
            let start = items.len();
            items.extend(values);
            (start, items.len() - start)
        };
        if count > 0 {
            self.subscribers.emit(&ListChange::Inserted { start, count });
        }
    }

    /// Inserts every element of `values`, the first landing at `index`.
    pub fn insert_all(&self, index: usize, values: impl IntoIterator<Item = T>) {
        let count = {
            let mut items = self.items.borrow_mut();
            let before = items.len();
            items.splice(index..index, values);
            items.len() - before
        };
        if count > 0 {
            self.subscribers.emit(&ListChange::Inserted {
                start: index,
                count,
            });
        }
    }

    /// Overwrites the element at `index`, returning the previous value.
    pub fn set(&self, index: usize, value: T) -> T {
        let previous = {
            let mut items = self.items.borrow_mut();
            std::mem::replace(&mut items[index], value)
        };
        self.subscribers.emit(&ListChange::Changed {
            start: index,
            count: 1,
        });
        previous
    }

    /// Overwrites elements in place starting at `start`, one per element of
    /// `values`. The length of the list is unchanged.
    pub fn set_all(&self, start: usize, values: impl IntoIterator<Item = T>) {
        let count = {
            let mut items = self.items.borrow_mut();
            let mut index = start;
            for value in values {
                items[index] = value;
                index += 1;
            }
            index - start
        };
        if count > 0 {
            self.subscribers.emit(&ListChange::Changed { start, count });
        }
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&self, index: usize) -> T {
        let removed = self.items.borrow_mut().remove(index);
        self.subscribers.emit(&ListChange::Removed {
            start: index,
            count: 1,
        });
        removed
    }

    /// Removes the elements in `start..start + count`.
    pub fn remove_range(&self, start: usize, count: usize) {
        {
            let mut items = self.items.borrow_mut();
            items.drain(start..start + count);
        }
        if count > 0 {
            self.subscribers.emit(&ListChange::Removed { start, count });
        }
    }

    /// Removes everything.
    pub fn clear(&self) {
        let count = {
            let mut items = self.items.borrow_mut();
            let count = items.len();
            items.clear();
            count
        };
        if count > 0 {
            self.subscribers.emit(&ListChange::Removed { start: 0, count });
        }
    }

    /// Relocates the `count` elements at `from` so that, read in the
    /// pre-move coordinates, they end up at `to`. A destination inside the
    /// moved window (`from <= to <= from + count`) leaves the contents
    /// untouched; the `Moved` event is published either way, and consumers
    /// decide it is a no-op.
    pub fn move_range(&self, from: usize, to: usize, count: usize) {
        {
            let mut items = self.items.borrow_mut();
            assert!(from + count <= items.len(), "moved range out of bounds");
            assert!(to <= items.len(), "move destination out of bounds");
            if !(from <= to && to <= from + count) {
                let moved: Vec<T> = items.drain(from..from + count).collect();
                let destination = if to < from { to } else { to - count };
                items.splice(destination..destination, moved);
            }
        }
        self.subscribers.emit(&ListChange::Moved { from, to, count });
    }

    /// Publishes a [`ListChange::Reset`] without touching the contents.
    /// Useful when the elements were mutated through some side channel the
    /// subscribers cannot have seen.
    pub fn notify_reset(&self) {
        self.subscribers.emit(&ListChange::Reset);
    }

    /// Registers `callback` for subsequent changes.
    pub fn subscribe(&self, callback: impl Fn(&ListChange) + 'static) -> Subscription {
        self.subscribers.subscribe(Rc::new(callback))
    }
}

impl<T: Clone> ObservableVec<T> {
    /// A clone of the element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}

impl<T: PartialEq> ObservableVec<T> {
    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.items.borrow().iter().position(|item| item == value)
    }
}

impl<T> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for ObservableVec<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: RefCell::new(items),
            subscribers: Subscribers::new(),
        }
    }
}

impl<T> FromIterator<T> for ObservableVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<T>>())
    }
}

impl<T: Clone> ObservableList<T> for ObservableVec<T> {
    fn len(&self) -> usize {
        ObservableVec::len(self)
    }

    fn get(&self, index: usize) -> Option<T> {
        ObservableVec::get(self, index)
    }

    fn subscribe(&self, callback: Rc<dyn Fn(&ListChange)>) -> Subscription {
        self.subscribers.subscribe(callback)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableVec")
            .field("items", &*self.items.borrow())
            .finish()
    }
}
