/// A structural change to an observable list, expressed in that list's own
/// index space.
///
/// Sources publish these as they mutate. A [`FilteredListView`] consumes them,
/// translates them into its projection's index space, and republishes the
/// result, with one exception: a view never re-emits [`ListChange::Moved`],
/// it always decomposes a move into a `Removed` followed by an `Inserted`.
///
/// [`FilteredListView`]: crate::FilteredListView
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListChange {
    /// The contents changed wholesale; every cached index is invalid.
    Reset,
    /// `count` elements starting at `start` were overwritten in place.
    /// The length of the list is unchanged.
    Changed { start: usize, count: usize },
    /// `count` new elements now occupy `start..start + count`.
    Inserted { start: usize, count: usize },
    /// The `count` elements that occupied `start..start + count` are gone.
    Removed { start: usize, count: usize },
    /// The `count` elements at `from` were relocated to start at `to`.
    Moved { from: usize, to: usize, count: usize },
}
