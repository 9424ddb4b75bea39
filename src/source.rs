//! Tag sources — provenance records and the raw definition input format.
//!
//! The external loader hands the registry flat [`TagDef`] records; where
//! those records came from (a code module, an ini-style list, a table) is
//! tracked here so duplicate claims and the restricted-tag approval
//! workflow can name their origin.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::TagError;
use crate::name::TagName;

/// Where a tag definition came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Added from code.
    Native,
    /// The default tag list.
    DefaultTagList,
    /// An additional tag list.
    TagList,
    /// A restricted tag list.
    RestrictedTagList,
    /// Rows imported from a table.
    DataTable,
    /// Not a real source.
    Invalid,
}

/// Reserved source name for tags added from code.
pub const NATIVE_SOURCE_NAME: &str = "Native";

/// One named parameter attached to a tag definition (message signature).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TagParameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A flat tag definition as produced by the external loader.
///
/// Batch loads are ordered sequences of these; order affects only
/// first-writer-wins tie-breaking for secondary metadata, never tree shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDef {
    pub full_path: String,
    pub source_name: String,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub dev_comment: String,
    #[serde(default)]
    pub parameters: Vec<TagParameter>,
    #[serde(default)]
    pub response_types: Vec<TagParameter>,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default = "default_true")]
    pub allows_non_restricted_children: bool,
}

impl TagDef {
    pub fn new(
        full_path: impl Into<String>,
        source_name: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            source_name: source_name.into(),
            source_kind,
            dev_comment: String::new(),
            parameters: Vec::new(),
            response_types: Vec::new(),
            is_restricted: false,
            allows_non_restricted_children: true,
        }
    }

    pub fn restricted(mut self, allows_non_restricted_children: bool) -> Self {
        self.is_restricted = true;
        self.allows_non_restricted_children = allows_non_restricted_children;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.dev_comment = comment.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.parameters.push(TagParameter::new(name, ty));
        self
    }
}

/// A rename mapping fed to the redirect resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectDef {
    pub old_name: String,
    pub new_name: String,
}

/// A registered tag source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSource {
    pub name: String,
    pub kind: SourceKind,
    /// Opaque owner identifiers for the restricted-tag approval workflow.
    /// The core stores the mapping; it never interprets ownership.
    pub owners: Vec<String>,
    /// Opaque handle to the backing list supplied by the loader, if any.
    pub backing_file: Option<String>,
}

/// Records which sources exist and which tags each one contributed.
#[derive(Debug, Default, Clone)]
pub struct SourceTracker {
    sources: IndexMap<String, TagSource>,
    contributions: IndexMap<String, IndexSet<TagName>>,
}

impl SourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that registering `name` with `kind` would not clash with an
    /// existing registration. Does not mutate.
    pub fn check_kind(&self, name: &str, kind: SourceKind) -> Result<(), TagError> {
        match self.sources.get(name) {
            Some(existing) if existing.kind != kind => Err(TagError::SourceKindMismatch {
                source_name: name.to_string(),
                existing: existing.kind,
                requested: kind,
            }),
            _ => Ok(()),
        }
    }

    /// Register a source. Idempotent for the same `(name, kind)` pair.
    pub fn register_source(&mut self, name: &str, kind: SourceKind) -> Result<(), TagError> {
        self.check_kind(name, kind)?;
        self.sources.entry(name.to_string()).or_insert_with(|| TagSource {
            name: name.to_string(),
            kind,
            owners: Vec::new(),
            backing_file: None,
        });
        Ok(())
    }

    pub fn record_contribution(&mut self, source: &str, tag: TagName) {
        self.contributions
            .entry(source.to_string())
            .or_default()
            .insert(tag);
    }

    pub fn source(&self, name: &str) -> Option<&TagSource> {
        self.sources.get(name)
    }

    pub fn source_mut(&mut self, name: &str) -> Option<&mut TagSource> {
        self.sources.get_mut(name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &TagSource> {
        self.sources.values()
    }

    pub fn find_sources_with_kind(&self, kind: SourceKind) -> Vec<&TagSource> {
        self.sources.values().filter(|s| s.kind == kind).collect()
    }

    /// Owners recorded for a source (empty when unknown).
    pub fn owners_of(&self, source: &str) -> &[String] {
        self.sources.get(source).map(|s| s.owners.as_slice()).unwrap_or(&[])
    }

    pub fn set_owners(&mut self, source: &str, owners: Vec<String>) {
        if let Some(s) = self.sources.get_mut(source) {
            s.owners = owners;
        }
    }

    /// Tags this source contributed, in first-recorded order.
    pub fn contributions(&self, source: &str) -> impl Iterator<Item = &TagName> {
        self.contributions.get(source).into_iter().flatten()
    }

    /// All sources claiming `tag`, in registration order.
    pub fn claimants(&self, tag: &TagName) -> Vec<&str> {
        self.contributions
            .iter()
            .filter(|(_, tags)| tags.contains(tag))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn remove_source(&mut self, name: &str) -> bool {
        let had = self.sources.shift_remove(name).is_some();
        self.contributions.shift_remove(name);
        had
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_for_same_kind() {
        let mut tracker = SourceTracker::new();
        tracker.register_source("game.ini", SourceKind::TagList).unwrap();
        tracker.register_source("game.ini", SourceKind::TagList).unwrap();
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn register_rejects_kind_mismatch() {
        let mut tracker = SourceTracker::new();
        tracker.register_source("game.ini", SourceKind::TagList).unwrap();
        let err = tracker
            .register_source("game.ini", SourceKind::DataTable)
            .unwrap_err();
        assert!(matches!(err, TagError::SourceKindMismatch { .. }));
    }

    #[test]
    fn find_sources_with_kind_filters() {
        let mut tracker = SourceTracker::new();
        tracker.register_source("a", SourceKind::TagList).unwrap();
        tracker.register_source("b", SourceKind::DataTable).unwrap();
        tracker.register_source("c", SourceKind::TagList).unwrap();

        let lists = tracker.find_sources_with_kind(SourceKind::TagList);
        let names: Vec<_> = lists.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn claimants_lists_all_sources_of_a_tag() {
        let mut tracker = SourceTracker::new();
        tracker.register_source("a", SourceKind::TagList).unwrap();
        tracker.register_source("b", SourceKind::TagList).unwrap();
        tracker.record_contribution("a", TagName::new("x.y"));
        tracker.record_contribution("b", TagName::new("X.Y"));

        assert_eq!(tracker.claimants(&TagName::new("x.y")), vec!["a", "b"]);
        assert!(tracker.claimants(&TagName::new("other")).is_empty());
    }

    #[test]
    fn remove_source_drops_contributions() {
        let mut tracker = SourceTracker::new();
        tracker.register_source("a", SourceKind::TagList).unwrap();
        tracker.record_contribution("a", TagName::new("x"));
        assert!(tracker.remove_source("a"));
        assert!(tracker.claimants(&TagName::new("x")).is_empty());
        assert!(!tracker.remove_source("a"));
    }

    #[test]
    fn tag_def_deserializes_with_defaults() {
        let json = r#"{
            "full_path": "combat.melee",
            "source_name": "game.ini",
            "source_kind": "TagList"
        }"#;
        let def: TagDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.full_path, "combat.melee");
        assert!(!def.is_restricted);
        assert!(def.allows_non_restricted_children);
        assert!(def.parameters.is_empty());
    }
}
