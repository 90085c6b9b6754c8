//! Shared fixtures for the obslist test suites.

use std::cell::RefCell;
use std::rc::Rc;

/// Collects every event a subscription delivers, for later assertions.
///
/// ```
/// use std::rc::Rc;
/// use obslist_core::{ListChange, ObservableVec};
/// use obslist_testing::ChangeRecorder;
///
/// let list = ObservableVec::from(vec![1]);
/// let recorder = ChangeRecorder::new();
/// let _watch = list.subscribe(recorder.callback());
///
/// list.push(2);
/// assert_eq!(recorder.take(), vec![ListChange::Inserted { start: 1, count: 1 }]);
/// ```
pub struct ChangeRecorder<E> {
    events: Rc<RefCell<Vec<E>>>,
}

impl<E: Clone + 'static> ChangeRecorder<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The callback to hand to `subscribe`.
    pub fn callback(&self) -> impl Fn(&E) + 'static {
        let events = Rc::clone(&self.events);
        move |change| events.borrow_mut().push(change.clone())
    }

    /// Everything recorded so far, clearing the recorder.
    pub fn take(&self) -> Vec<E> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<E> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl<E> Clone for ChangeRecorder<E> {
    fn clone(&self) -> Self {
        Self {
            events: Rc::clone(&self.events),
        }
    }
}

impl<E> Default for ChangeRecorder<E> {
    fn default() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

/// Numbered fixture rows: `["element1", ..., "elementN"]`.
pub fn element_strings(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("element{i}")).collect()
}
