use thiserror::Error;

/// Returned by every mutating method on a filtered view.
///
/// A filtered view is derived state: its contents are a function of the
/// source list and the predicate, so the only way to change it is to mutate
/// the source (or swap the predicate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("filtered list views are read-only; apply `{operation}` to the source list instead")]
pub struct ReadOnlyError {
    /// Name of the rejected operation.
    pub operation: &'static str,
}
