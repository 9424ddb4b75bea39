//! Error taxonomy for registry construction and lookups.
//!
//! Duplicate definitions across sources are deliberately *not* an error —
//! they are recorded as conflict flags on the tree and reported through
//! [`InsertOutcome`] so callers can decide whether to warn or reject.

use crate::source::SourceKind;

/// Result of applying one tag definition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    /// The tag was not explicitly declared before; node inserted or promoted.
    InsertedNew,
    /// The same source re-declared the tag; metadata merged, no conflict.
    MergedExisting,
    /// A different source already declared the tag explicitly; the node is
    /// now flagged with a hard conflict.
    DuplicateConflict,
}

/// Structural problems with a single dotted tag name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTag {
    #[error("invalid character {character:?} at position {position} in tag '{name}'")]
    InvalidCharacter {
        name: String,
        character: char,
        position: usize,
    },
    #[error("empty segment at position {position} in tag '{name}'")]
    EmptySegment { name: String, position: usize },
}

/// Errors surfaced by the registry core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error(transparent)]
    Malformed(#[from] MalformedTag),

    /// A non-restricted tag was declared under a restricted parent that does
    /// not allow non-restricted children.
    #[error("tag '{child}' is not restricted but its parent '{parent}' only allows restricted children")]
    RestrictedTagViolation { parent: String, child: String },

    /// A source name was re-registered with a different kind.
    #[error("source '{source_name}' already registered as {existing:?}, cannot re-register as {requested:?}")]
    SourceKindMismatch {
        source_name: String,
        existing: SourceKind,
        requested: SourceKind,
    },

    /// A construction pass produced more tags than the net index can
    /// address.
    #[error("{count} tags exceed the net index range (max {max})", max = u16::MAX)]
    TooManyTags { count: usize },

    /// Redirect chain did not terminate within the hop bound.
    #[error("redirect chain starting at '{name}' did not terminate after {hops} hops (cycle?)")]
    RedirectCycle { name: String, hops: usize },

    /// Lookup failed and the caller asked for an error instead of an empty
    /// result.
    #[error("tag '{name}' is not registered")]
    UnknownTag { name: String },
}
