use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{trace, warn};
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

use crate::change::ListChange;
use crate::error::ReadOnlyError;
use crate::item::{ItemId, ItemObserver, ObservableItem, ObservedItems, PlainItems};
use crate::observable_vec::{ObservableList, ObservableVec};
use crate::subscribers::{Subscribers, Subscription};

/// Membership test applied to every source element.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool>;

/// Per-mutation batch of outbound events. A single source event produces at
/// most a handful (one per transition run), never one per element.
type Batches = SmallVec<[ListChange; 4]>;

/// How a source position's visibility changes under re-evaluation. Positions
/// whose visibility is unaffected have no transition at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    Appear,
    Disappear,
    Update,
}

/// A maximal contiguous group of same-kind transitions, collapsed into one
/// outbound event.
struct Run {
    kind: Transition,
    positions: SmallVec<[usize; 8]>,
}

/// One entry per source position.
struct Slot {
    /// Position in the projection, or `None` while filtered out.
    index: Option<usize>,
    /// Live registration on the element's change notifications, if it has
    /// any. Owned exclusively by this slot.
    watch: Option<Subscription>,
    /// Identity of the element occupying this position, if observable.
    id: Option<ItemId>,
}

struct ViewState<T> {
    /// The visibility map: `slots.len()` equals the source length after
    /// every handled event.
    slots: Vec<Slot>,
    /// The projection: exactly the visible elements, in source order.
    visible: Vec<T>,
    predicate: Predicate<T>,
    /// Element identity -> source position, so a value-change notification
    /// resolves its position without scanning the source.
    by_id: FxHashMap<ItemId, usize>,
}

impl<T: Clone> ViewState<T> {
    /// Projection index of the closest visible source position before `pos`.
    fn nearest_visible_before(&self, pos: usize) -> Option<usize> {
        self.slots[..pos].iter().rev().find_map(|slot| slot.index)
    }

    /// Makes the hidden position `pos` visible as `item`, keeping source
    /// order. Returns the projection index it landed on.
    fn appear(&mut self, pos: usize, item: T) -> usize {
        let at = self.nearest_visible_before(pos).map_or(0, |index| index + 1);
        self.slots[pos].index = Some(at);
        self.visible.insert(at, item);
        for slot in &mut self.slots[pos + 1..] {
            if let Some(index) = &mut slot.index {
                *index += 1;
            }
        }
        at
    }

    /// Hides the position `pos`. Returns the projection index it vacated, or
    /// `None` when it was already hidden.
    fn disappear(&mut self, pos: usize) -> Option<usize> {
        let at = self.slots[pos].index.take()?;
        self.visible.remove(at);
        for slot in &mut self.slots[pos + 1..] {
            if let Some(index) = &mut slot.index {
                *index -= 1;
            }
        }
        Some(at)
    }

    /// Re-keys the reverse index for every position at or after `start`.
    /// Called after any mutation that shifted source positions.
    fn reindex_from(&mut self, start: usize) {
        for pos in start..self.slots.len() {
            if let Some(id) = self.slots[pos].id {
                self.by_id.insert(id, pos);
            }
        }
    }
}

struct ViewInner<T, S, O> {
    source: Rc<S>,
    observer: O,
    state: RefCell<ViewState<T>>,
    subscribers: Subscribers<ListChange>,
    source_watch: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
}

impl<T, S, O> ViewInner<T, S, O>
where
    T: Clone + 'static,
    S: ObservableList<T> + 'static,
    O: ItemObserver<T> + 'static,
{
    fn source_item(&self, pos: usize) -> T {
        self.source.get(pos).unwrap_or_else(|| {
            panic!("source position {pos} has no element; the visibility map is desynchronized")
        })
    }

    /// Identity and change registration for `item`, with the notification
    /// path wired back to this view. The sink holds the view weakly: the
    /// element never keeps the view alive.
    fn watch_item(self: &Rc<Self>, item: &T) -> (Option<ItemId>, Option<Subscription>) {
        let id = self.observer.item_id(item);
        let weak = Rc::downgrade(self);
        let watch = self.observer.watch(
            item,
            Rc::new(move |id| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_item_change(id);
                }
            }),
        );
        (id, watch)
    }

    /// One pass over the full source: used at construction and on a source
    /// reset, where the contents may have been swapped wholesale and every
    /// element watch has to be re-established.
    fn rebuild(self: &Rc<Self>, state: &mut ViewState<T>) {
        for slot in &mut state.slots {
            if let Some(watch) = slot.watch.take() {
                watch.cancel();
            }
        }
        state.slots.clear();
        state.visible.clear();
        state.by_id.clear();

        for pos in 0..self.source.len() {
            let item = self.source_item(pos);
            let (id, watch) = self.watch_item(&item);
            let index = if (state.predicate)(&item) {
                let at = state.visible.len();
                state.visible.push(item);
                Some(at)
            } else {
                None
            };
            state.slots.push(Slot { index, watch, id });
            if let Some(id) = id {
                state.by_id.insert(id, pos);
            }
        }
    }

    fn on_source_change(self: &Rc<Self>, change: &ListChange) {
        if self.disposed.get() {
            return;
        }
        let batches: Batches = {
            let mut state = self.state.borrow_mut();
            match *change {
                ListChange::Reset => {
                    self.rebuild(&mut state);
                    smallvec![ListChange::Reset]
                }
                ListChange::Changed { start, count } => self.apply_changed(&mut state, start, count),
                ListChange::Inserted { start, count } => {
                    self.apply_inserted(&mut state, start, count)
                }
                ListChange::Removed { start, count } => self.apply_removed(&mut state, start, count),
                ListChange::Moved { from, to, count } => {
                    self.apply_moved(&mut state, from, to, count)
                }
            }
        };
        trace!("source change {change:?} -> {} outbound batches", batches.len());
        for batch in &batches {
            self.subscribers.emit(batch);
        }
    }

    /// Single-position re-evaluation, triggered by an element reporting an
    /// in-place value change.
    fn on_item_change(self: &Rc<Self>, id: ItemId) {
        if self.disposed.get() {
            return;
        }
        let batch = {
            let mut state = self.state.borrow_mut();
            let pos = match state.by_id.get(&id) {
                Some(&pos) => pos,
                None => {
                    // Reachable only when one observable element occupies
                    // several source positions; the reverse index keys one.
                    warn!("change notification from an untracked element, ignoring");
                    return;
                }
            };
            self.reevaluate(&mut state, pos)
        };
        if let Some(batch) = batch {
            trace!("element change -> {batch:?}");
            self.subscribers.emit(&batch);
        }
    }

    fn reevaluate(&self, state: &mut ViewState<T>, pos: usize) -> Option<ListChange> {
        let item = self.source_item(pos);
        let passes = (state.predicate)(&item);
        match (state.slots[pos].index, passes) {
            (None, true) => {
                let start = state.appear(pos, item);
                Some(ListChange::Inserted { start, count: 1 })
            }
            (Some(_), false) => {
                let start = state
                    .disappear(pos)
                    .expect("slot marked visible but held no projection entry");
                Some(ListChange::Removed { start, count: 1 })
            }
            (Some(at), true) => {
                state.visible[at] = item;
                Some(ListChange::Changed { start: at, count: 1 })
            }
            (None, false) => None,
        }
    }

    /// Range replace: positions `start..start + count` were overwritten in
    /// place. Classifies every position, groups maximal same-kind runs, and
    /// emits one event per run.
    fn apply_changed(self: &Rc<Self>, state: &mut ViewState<T>, start: usize, count: usize) -> Batches {
        assert!(
            start + count <= state.slots.len(),
            "changed range {start}..{} exceeds tracked source length {}",
            start + count,
            state.slots.len()
        );

        // A replace may swap which element occupies a position. Rewire the
        // per-element watch first, so the displaced element can no longer
        // reach this view and the new one can.
        for pos in start..start + count {
            let item = self.source_item(pos);
            let id = self.observer.item_id(&item);
            if id != state.slots[pos].id {
                if let Some(old) = state.slots[pos].id.take() {
                    state.by_id.remove(&old);
                }
                if let Some(watch) = state.slots[pos].watch.take() {
                    watch.cancel();
                }
                let (id, watch) = self.watch_item(&item);
                state.slots[pos].id = id;
                state.slots[pos].watch = watch;
                if let Some(id) = id {
                    state.by_id.insert(id, pos);
                }
            }
        }

        // Partition into maximal same-kind runs. A position with no
        // transition is absorbed into whichever run is open: it neither
        // starts nor closes one.
        let mut runs: SmallVec<[Run; 4]> = SmallVec::new();
        let mut open: Option<Transition> = None;
        for pos in start..start + count {
            let item = self.source_item(pos);
            let passes = (state.predicate)(&item);
            let kind = match (state.slots[pos].index, passes) {
                (None, true) => Transition::Appear,
                (Some(_), false) => Transition::Disappear,
                (Some(_), true) => Transition::Update,
                (None, false) => continue,
            };
            if open == Some(kind) {
                runs.last_mut()
                    .expect("a run is open, so one exists")
                    .positions
                    .push(pos);
            } else {
                let mut positions = SmallVec::new();
                positions.push(pos);
                runs.push(Run { kind, positions });
                open = Some(kind);
            }
        }

        let mut batches = Batches::new();
        for run in &runs {
            if let Some(batch) = self.apply_run(state, run) {
                batches.push(batch);
            }
        }
        batches
    }

    /// Applies one transition run and collapses it into its single event.
    /// Members are processed in ascending source order, so the projection
    /// indices they touch are contiguous.
    fn apply_run(&self, state: &mut ViewState<T>, run: &Run) -> Option<ListChange> {
        match run.kind {
            Transition::Appear => {
                let mut first = None;
                let mut count = 0;
                for &pos in &run.positions {
                    let item = self.source_item(pos);
                    let at = state.appear(pos, item);
                    first.get_or_insert(at);
                    count += 1;
                }
                first.map(|start| ListChange::Inserted { start, count })
            }
            Transition::Disappear => {
                // Each removal shifts later entries down, so the last
                // vacated index is the smallest: that is the batch start.
                let mut last = None;
                let mut count = 0;
                for &pos in &run.positions {
                    match state.disappear(pos) {
                        Some(at) => {
                            last = Some(at);
                            count += 1;
                        }
                        None => warn!("position {pos} already hidden inside a disappear run"),
                    }
                }
                last.map(|start| ListChange::Removed { start, count })
            }
            Transition::Update => {
                let mut first = None;
                let mut count = 0;
                for &pos in &run.positions {
                    let item = self.source_item(pos);
                    let at = state.slots[pos]
                        .index
                        .unwrap_or_else(|| panic!("update run member {pos} lost its projection index"));
                    state.visible[at] = item;
                    first.get_or_insert(at);
                    count += 1;
                }
                first.map(|start| ListChange::Changed { start, count })
            }
        }
    }

    /// Range insert: `count` new source positions starting at `start`.
    /// Processed in ascending order, so every element that becomes visible
    /// lands immediately after its nearest visible predecessor and the
    /// resulting projection indices are contiguous.
    fn apply_inserted(self: &Rc<Self>, state: &mut ViewState<T>, start: usize, count: usize) -> Batches {
        assert!(
            start <= state.slots.len(),
            "insert position {start} exceeds tracked source length {}",
            state.slots.len()
        );

        let mut first = None;
        let mut visible_count = 0;
        for pos in start..start + count {
            let item = self.source_item(pos);
            let (id, watch) = self.watch_item(&item);
            state.slots.insert(
                pos,
                Slot {
                    index: None,
                    watch,
                    id,
                },
            );
            if (state.predicate)(&item) {
                let at = state.appear(pos, item);
                first.get_or_insert(at);
                visible_count += 1;
            }
        }
        state.reindex_from(start);

        match first {
            Some(start) => smallvec![ListChange::Inserted {
                start,
                count: visible_count,
            }],
            None => Batches::new(),
        }
    }

    /// Range remove, processed in descending order so that the positions
    /// still to visit keep their meaning while the map shrinks.
    fn apply_removed(&self, state: &mut ViewState<T>, start: usize, count: usize) -> Batches {
        assert!(
            start + count <= state.slots.len(),
            "removed range {start}..{} exceeds tracked source length {}",
            start + count,
            state.slots.len()
        );

        let mut last = None;
        let mut removed = 0;
        for pos in (start..start + count).rev() {
            if let Some(id) = state.slots[pos].id.take() {
                state.by_id.remove(&id);
            }
            if let Some(watch) = state.slots[pos].watch.take() {
                watch.cancel();
            }
            if let Some(at) = state.disappear(pos) {
                last = Some(at);
                removed += 1;
            }
            state.slots.remove(pos);
        }
        state.reindex_from(start);

        match last {
            Some(start) => smallvec![ListChange::Removed {
                start,
                count: removed,
            }],
            None => Batches::new(),
        }
    }

    /// Range move, decomposed into the remove and insert handlers. A
    /// destination inside the moved window changes nothing and emits
    /// nothing.
    fn apply_moved(
        self: &Rc<Self>,
        state: &mut ViewState<T>,
        from: usize,
        to: usize,
        count: usize,
    ) -> Batches {
        if from <= to && to <= from + count {
            return Batches::new();
        }
        let mut batches = self.apply_removed(state, from, count);
        let destination = if to < from { to } else { to - count };
        batches.extend(self.apply_inserted(state, destination, count));
        batches
    }
}

/// A read-only, order-preserving filtered projection of an observable list.
///
/// The view tracks its source incrementally: every source mutation is
/// translated into the minimal set of [`ListChange`] batches in the view's
/// own index space and republished to the view's subscribers. With an
/// [`ItemObserver`] other than [`PlainItems`], in-place element changes are
/// picked up too and re-evaluated against the predicate.
///
/// Cloning produces another handle to the same projection. The view is
/// single-threaded and cooperative: handlers run to completion before
/// control returns to whoever mutated the source, and subscriber callbacks
/// must not mutate the source re-entrantly.
///
/// A panicking predicate propagates to the mutating caller and leaves the
/// view in an unspecified state; such a view must not be used afterwards.
pub struct FilteredListView<T, S = ObservableVec<T>, O = PlainItems> {
    inner: Rc<ViewInner<T, S, O>>,
}

impl<T, S> FilteredListView<T, S, PlainItems>
where
    T: Clone + 'static,
    S: ObservableList<T> + 'static,
{
    /// A view that lets every element through until a predicate is set.
    pub fn new(source: Rc<S>) -> Self {
        Self::with_predicate(source, |_| true)
    }

    pub fn with_predicate(source: Rc<S>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self::with_observer(source, predicate, PlainItems)
    }
}

impl<T, S> FilteredListView<T, S, ObservedItems>
where
    T: Clone + ObservableItem + 'static,
    S: ObservableList<T> + 'static,
{
    /// Like [`FilteredListView::with_predicate`], additionally re-evaluating
    /// an element whenever it reports an in-place value change.
    pub fn observing(source: Rc<S>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self::with_observer(source, predicate, ObservedItems)
    }
}

impl<T, S, O> FilteredListView<T, S, O>
where
    T: Clone + 'static,
    S: ObservableList<T> + 'static,
    O: ItemObserver<T> + 'static,
{
    pub fn with_observer(
        source: Rc<S>,
        predicate: impl Fn(&T) -> bool + 'static,
        observer: O,
    ) -> Self {
        let inner = Rc::new(ViewInner {
            source: Rc::clone(&source),
            observer,
            state: RefCell::new(ViewState {
                slots: Vec::new(),
                visible: Vec::new(),
                predicate: Box::new(predicate),
                by_id: FxHashMap::default(),
            }),
            subscribers: Subscribers::new(),
            source_watch: RefCell::new(None),
            disposed: Cell::new(false),
        });

        inner.rebuild(&mut inner.state.borrow_mut());

        let weak = Rc::downgrade(&inner);
        let watch = source.subscribe(Rc::new(move |change: &ListChange| {
            if let Some(inner) = weak.upgrade() {
                inner.on_source_change(change);
            }
        }));
        *inner.source_watch.borrow_mut() = Some(watch);

        Self { inner }
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A clone of the visible element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.state.borrow().visible.get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.state.borrow().visible.clone()
    }

    /// Run `f` against the visible elements.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.state.borrow().visible)
    }

    pub fn source(&self) -> &Rc<S> {
        &self.inner.source
    }

    /// Registers `callback` for subsequent projection changes.
    pub fn subscribe(&self, callback: impl Fn(&ListChange) + 'static) -> Subscription {
        self.inner.subscribers.subscribe(Rc::new(callback))
    }

    /// Replaces the predicate and re-evaluates every source position against
    /// it, rebuilding the projection in one pass. Subscribers receive a
    /// single [`ListChange::Reset`]. Ignored on a disposed view, whose
    /// contents are frozen.
    pub fn set_predicate(&self, predicate: impl Fn(&T) -> bool + 'static) {
        if self.inner.disposed.get() {
            return;
        }
        {
            let mut state = self.inner.state.borrow_mut();
            state.predicate = Box::new(predicate);
            let ViewState {
                slots,
                visible,
                predicate,
                ..
            } = &mut *state;
            visible.clear();
            for (pos, slot) in slots.iter_mut().enumerate() {
                let item = self.inner.source_item(pos);
                if predicate(&item) {
                    slot.index = Some(visible.len());
                    visible.push(item);
                } else {
                    slot.index = None;
                }
            }
        }
        self.inner.subscribers.emit(&ListChange::Reset);
    }

    /// Releases every element watch and detaches from the source. Idempotent;
    /// also happens when the last handle is dropped. The last projected
    /// contents stay readable, frozen.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        if let Some(watch) = self.inner.source_watch.borrow_mut().take() {
            watch.cancel();
        }
        let mut state = self.inner.state.borrow_mut();
        for slot in &mut state.slots {
            if let Some(watch) = slot.watch.take() {
                watch.cancel();
            }
        }
        state.by_id.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    // The projection is derived state, not independently writable; the
    // mutating half of the list vocabulary is rejected wholesale.

    pub fn push(&self, _value: T) -> Result<(), ReadOnlyError> {
        Err(ReadOnlyError { operation: "push" })
    }

    pub fn insert(&self, _index: usize, _value: T) -> Result<(), ReadOnlyError> {
        Err(ReadOnlyError {
            operation: "insert",
        })
    }

    pub fn set(&self, _index: usize, _value: T) -> Result<(), ReadOnlyError> {
        Err(ReadOnlyError { operation: "set" })
    }

    pub fn remove(&self, _index: usize) -> Result<T, ReadOnlyError> {
        Err(ReadOnlyError {
            operation: "remove",
        })
    }

    pub fn clear(&self) -> Result<(), ReadOnlyError> {
        Err(ReadOnlyError { operation: "clear" })
    }

    #[cfg(test)]
    pub(crate) fn watch_count(&self) -> usize {
        self.inner
            .state
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.watch.is_some())
            .count()
    }
}

#[cfg(test)]
impl<T, S, O> FilteredListView<T, S, O>
where
    T: Clone + PartialEq + std::fmt::Debug + 'static,
    S: ObservableList<T> + 'static,
    O: ItemObserver<T> + 'static,
{
    /// Checks every structural invariant the view maintains: the map covers
    /// the source, visible indices are contiguous in source order, the
    /// projection equals the source filtered in order, and the reverse index
    /// agrees with the map.
    pub(crate) fn assert_consistent(&self) {
        let state = self.inner.state.borrow();
        assert_eq!(
            state.slots.len(),
            self.inner.source.len(),
            "visibility map length must match the source"
        );

        let mut expected = 0;
        for (pos, slot) in state.slots.iter().enumerate() {
            if let Some(index) = slot.index {
                assert_eq!(
                    index, expected,
                    "projection indices must be contiguous (source position {pos})"
                );
                expected += 1;
            }
        }
        assert_eq!(expected, state.visible.len());

        let mut filtered = Vec::new();
        for pos in 0..self.inner.source.len() {
            let item = self.inner.source_item(pos);
            if (state.predicate)(&item) {
                filtered.push(item);
            }
        }
        assert_eq!(state.visible, filtered, "projection must equal the filtered source");

        for (pos, slot) in state.slots.iter().enumerate() {
            if let Some(id) = slot.id {
                assert_eq!(
                    state.by_id.get(&id),
                    Some(&pos),
                    "reverse index must point at the slot's position"
                );
            }
        }
    }
}

impl<T, S, O> Clone for FilteredListView<T, S, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// A filtered view is itself an observable list, so views can be stacked.
impl<T, S, O> ObservableList<T> for FilteredListView<T, S, O>
where
    T: Clone + 'static,
    S: ObservableList<T> + 'static,
    O: ItemObserver<T> + 'static,
{
    fn len(&self) -> usize {
        FilteredListView::len(self)
    }

    fn get(&self, index: usize) -> Option<T> {
        FilteredListView::get(self, index)
    }

    fn subscribe(&self, callback: Rc<dyn Fn(&ListChange)>) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }
}

impl<T: std::fmt::Debug + Clone, S, O> std::fmt::Debug for FilteredListView<T, S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredListView")
            .field("visible", &self.inner.state.borrow().visible)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
