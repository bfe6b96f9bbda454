//! Errors reported by the content hasher and surfaced by every keyed map
//! operation.

use thiserror::Error;

/// Result type alias for keyed map operations.
pub type Result<T> = std::result::Result<T, KeyError>;

/// A key that cannot be digested safely, or a value that cannot become
/// a key without changing its meaning.
///
/// Reported before the map is touched, so a failed `set` or `delete`
/// leaves the map exactly as it was.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// The key nests arrays/objects deeper than the configured limit.
    #[error("key nesting exceeds the maximum depth of {limit}")]
    TooDeep { limit: usize },

    /// An integer outside the range an `f64` key number holds exactly.
    #[error("integer {0} cannot be represented exactly as a key number")]
    InexactInteger(i128),
}
