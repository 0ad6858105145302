use std::fmt::{self, Debug, Display};
use std::hash::Hash;

/// Per-key outcomes of one batch fetch, positionally aligned with the keys:
/// `Ok(Some(v))` for a record, `Ok(None)` for a key with no record, `Err`
/// for a key whose lookup failed on its own.
pub type BatchResults<V, E> = Vec<Result<Option<V>, E>>;

/// Trait for batch fetching.
///
/// The result must be positionally aligned with `keys`: same length, same
/// order. Each slot resolves independently, so one key's failure does not
/// decide its batchmates' fate; returning `Err` at the top level fails the
/// whole batch instead. A record that does not exist is a successful
/// resolution (`Ok(None)`), not an error.
#[async_trait::async_trait]
pub trait Loader<K: Send + Sync + Hash + Eq + Clone + 'static>: Send + Sync + 'static {
    /// Type of value.
    type Value: Send + Sync + Clone + 'static;

    /// Type of error.
    type Error: Send + Sync + Clone + 'static;

    /// Fetch the outcomes for `keys`, one slot per key, in key order.
    async fn load(
        &self,
        keys: &[K],
    ) -> Result<BatchResults<Self::Value, Self::Error>, Self::Error>;
}

/// Error observed by callers awaiting a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError<E> {
    /// The fetch failed for this caller's key, either on its own slot or
    /// because the whole batch fetch failed.
    Fetch(E),

    /// The fetch returned a result of the wrong length. This is a bug in the
    /// `Loader` implementation, not a data-level failure, and fails the
    /// whole batch.
    MismatchedBatchLength { expected: usize, actual: usize },
}

impl<E: Display> Display for LoadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch(err) => write!(f, "batch fetch failed: {}", err),
            LoadError::MismatchedBatchLength { expected, actual } => write!(
                f,
                "loader returned {} results for {} keys",
                actual, expected
            ),
        }
    }
}

impl<E: Display + Debug> std::error::Error for LoadError<E> {}
