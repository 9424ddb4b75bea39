//! Interned tag names — case-preserving display, case-folded comparison.
//!
//! Two names that fold to the same string are the same tag regardless of the
//! casing a particular source happened to use, matching the case-insensitive
//! name semantics the surrounding tooling expects.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Case-fold a raw name into its comparison key.
///
/// Returns a borrowed `Cow` when the input is already folded so that the
/// common all-lowercase case allocates nothing.
pub(crate) fn fold_key(raw: &str) -> Cow<'_, str> {
    if raw.chars().any(|c| c.is_uppercase()) {
        Cow::Owned(raw.to_lowercase())
    } else {
        Cow::Borrowed(raw)
    }
}

/// A dotted hierarchical tag name, e.g. `"combat.melee.sword"`.
///
/// The original spelling is preserved for display; equality, ordering and
/// hashing all use the case-folded key. The empty name is the "none" tag.
#[derive(Clone)]
pub struct TagName {
    display: Arc<str>,
    key: Arc<str>,
}

impl TagName {
    /// The empty "none" tag.
    pub fn none() -> Self {
        Self::new("")
    }

    pub fn new(raw: &str) -> Self {
        let display: Arc<str> = Arc::from(raw);
        let key = match fold_key(raw) {
            Cow::Borrowed(_) => Arc::clone(&display),
            Cow::Owned(folded) => Arc::from(folded.as_str()),
        };
        Self { display, key }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.display.is_empty()
    }

    /// Original spelling, as first seen.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-folded comparison key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub(crate) fn key_arc(&self) -> Arc<str> {
        Arc::clone(&self.key)
    }

    /// Dotted components in root-to-leaf order. The none tag has no segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.display.split('.').filter(|s| !s.is_empty())
    }

    /// The last dotted component, or `""` for the none tag.
    pub fn segment(&self) -> &str {
        self.display.rsplit('.').next().unwrap_or("")
    }

    /// The name with the last segment dropped, or the none tag when there is
    /// no dot to drop.
    pub fn direct_parent(&self) -> TagName {
        match self.display.rfind('.') {
            Some(pos) => TagName::new(&self.display[..pos]),
            None => TagName::none(),
        }
    }
}

impl PartialEq for TagName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TagName {}

impl PartialOrd for TagName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::hash::Hash for TagName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagName({:?})", &*self.display)
    }
}

impl From<&str> for TagName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for TagName {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl Default for TagName {
    fn default() -> Self {
        Self::none()
    }
}

impl Serialize for TagName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for TagName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TagName::new(&raw))
    }
}
