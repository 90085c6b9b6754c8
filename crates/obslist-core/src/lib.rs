//! Incrementally filtered, read-only views over observable lists.
//!
//! An [`ObservableVec`] (or anything implementing [`ObservableList`]) owns
//! the data and publishes a [`ListChange`] per mutation. A
//! [`FilteredListView`] projects the elements passing a predicate, in source
//! order, and keeps itself up to date incrementally, without rebuilding per
//! mutation, while republishing minimal change batches in its own index
//! space. Elements implementing [`ObservableItem`] can additionally report
//! in-place value changes, which the view re-evaluates against the predicate
//! (see [`FilteredListView::observing`]).
//!
//! Everything here is single-threaded and synchronous: a mutation is fully
//! processed, including subscriber callbacks, before control returns to the
//! caller. Internal desynchronization between a view and its source is a
//! programming defect and panics rather than corrupting the projection.
//!
//! ```
//! use std::rc::Rc;
//! use obslist_core::{FilteredListView, ObservableVec};
//!
//! let source = Rc::new(ObservableVec::from(vec![1, 2, 3, 4, 5]));
//! let odds = FilteredListView::with_predicate(Rc::clone(&source), |n: &i32| n % 2 == 1);
//! assert_eq!(odds.to_vec(), vec![1, 3, 5]);
//!
//! source.push(7);
//! source.remove(0);
//! assert_eq!(odds.to_vec(), vec![3, 5, 7]);
//! ```

pub mod change;
pub mod error;
pub mod filtered;
pub mod item;
pub mod observable_vec;
pub mod subscribers;

pub use change::ListChange;
pub use error::ReadOnlyError;
pub use filtered::{FilteredListView, Predicate};
pub use item::{ItemId, ItemObserver, ObservableCell, ObservableItem, ObservedItems, PlainItems};
pub use observable_vec::{ObservableList, ObservableVec};
pub use subscribers::{CallbackId, Subscribers, Subscription};

#[cfg(test)]
mod tests;
