//! The tag registry — owns the definition set, the built tree, source
//! records, redirects and the net-index state.
//!
//! Mutations are pass-level: each one recomposes the accepted definition
//! list, rebuilds the tree from scratch and eagerly reconstructs the net
//! index before returning. A failed pass leaves the previously valid state
//! untouched, so readers never observe a partially applied mutation and
//! reads never have to recompute anything.

use std::sync::Arc;

use log::debug;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{InsertOutcome, TagError};
use crate::event::{EventDispatcher, TagEvent};
use crate::index::{NetIndexState, TagNetIndex};
use crate::name::TagName;
use crate::redirect::RedirectResolver;
use crate::source::{NATIVE_SOURCE_NAME, RedirectDef, SourceKind, SourceTracker, TagDef};
use crate::tree::{TagNode, TagTree};

/// Build-time configuration for a registry instance.
#[derive(Clone, Debug)]
pub struct RegistrySettings {
    /// Characters that may not appear anywhere in a tag name.
    pub invalid_chars: String,
    /// Configured length of the first segment of the two-segment net
    /// encoding; clamped to the true bit width at assignment time.
    pub net_index_first_bit_segment: u8,
    /// Tags guaranteed the lowest indices so they fit the short segment,
    /// in priority order.
    pub commonly_replicated: Vec<TagName>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            invalid_chars: "\\, \r\n\t".to_string(),
            net_index_first_bit_segment: 16,
            commonly_replicated: Vec::new(),
        }
    }
}

/// An explicitly constructed tag registry.
///
/// There is no process-wide instance; consumers receive a reference (or a
/// [`SharedTagRegistry`] handle) from whoever built it.
#[derive(Debug)]
pub struct TagRegistry {
    settings: RegistrySettings,
    defs: Vec<TagDef>,
    sources: SourceTracker,
    redirects: RedirectResolver,
    tree: TagTree,
    net: NetIndexState,
    events: EventDispatcher,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl TagRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        let tree = TagTree::default();
        let net = NetIndexState::empty(&settings);
        Self {
            settings,
            defs: Vec::new(),
            sources: SourceTracker::new(),
            redirects: RedirectResolver::new(),
            tree,
            net,
            events: EventDispatcher::default(),
        }
    }

    /// Build a registry from an initial batch of definitions.
    pub fn from_defs(
        defs: Vec<TagDef>,
        settings: RegistrySettings,
    ) -> Result<Self, TagError> {
        let mut registry = Self::new(settings);
        registry.add_tag_defs(defs)?;
        Ok(registry)
    }

    // --- mutation passes ---

    /// Apply one definition. Equivalent to a one-element
    /// [`add_tag_defs`](Self::add_tag_defs) pass.
    pub fn insert(&mut self, def: TagDef) -> Result<InsertOutcome, TagError> {
        let outcomes = self.add_tag_defs(vec![def])?;
        Ok(outcomes.into_iter().next().unwrap_or(InsertOutcome::MergedExisting))
    }

    /// Apply an ordered batch of definitions as one pass.
    ///
    /// All-or-nothing: any structural error (malformed name, restricted
    /// violation, source kind mismatch) rejects the whole batch and leaves
    /// the registry exactly as it was. Duplicate definitions are accepted
    /// and reported per definition in the returned outcomes.
    pub fn add_tag_defs(&mut self, batch: Vec<TagDef>) -> Result<Vec<InsertOutcome>, TagError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        // stage source bookkeeping on a copy so a failed pass commits none
        // of it; registration also validates kinds within the batch itself
        let mut sources = self.sources.clone();
        for def in &batch {
            sources.register_source(&def.source_name, def.source_kind)?;
            sources.record_contribution(&def.source_name, TagName::new(&def.full_path));
        }

        // recompose the candidate list, skipping defs already on file so
        // repeated idempotent inserts do not grow the replay set
        let mut candidate = self.defs.clone();
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(batch.len());
        for def in &batch {
            if candidate.contains(def) {
                slots.push(None);
            } else {
                candidate.push(def.clone());
                slots.push(Some(candidate.len() - 1));
            }
        }

        let (tree, outcomes) = TagTree::build(&candidate, &self.settings)?;
        let net = NetIndexState::construct(&tree, &self.settings)?;
        let new_outcomes: Vec<InsertOutcome> = slots
            .iter()
            .map(|slot| slot.map_or(InsertOutcome::MergedExisting, |i| outcomes[i]))
            .collect();

        self.defs = candidate;
        self.sources = sources;
        self.tree = tree;
        self.net = net;
        self.log_pass();

        for (def, outcome) in batch.iter().zip(&new_outcomes) {
            if *outcome == InsertOutcome::InsertedNew {
                self.events.emit(&TagEvent::TagAdded(TagName::new(&def.full_path)));
            }
        }
        self.events.emit(&TagEvent::TreeRebuilt);
        Ok(new_outcomes)
    }

    /// Add a tag from code, under the reserved native source.
    pub fn add_native_tag(
        &mut self,
        full_path: &str,
        dev_comment: &str,
    ) -> Result<InsertOutcome, TagError> {
        self.insert(
            TagDef::new(full_path, NATIVE_SOURCE_NAME, SourceKind::Native)
                .with_comment(dev_comment),
        )
    }

    /// Remove a source and every definition it contributed, re-deriving the
    /// whole tree from the remaining definitions. Returns whether the
    /// source had contributed anything.
    pub fn remove_source(&mut self, source_name: &str) -> Result<bool, TagError> {
        let remaining: Vec<TagDef> = self
            .defs
            .iter()
            .filter(|d| d.source_name != source_name)
            .cloned()
            .collect();
        let had_defs = remaining.len() != self.defs.len();
        let had_source = self.sources.source(source_name).is_some();
        if !had_defs && !had_source {
            return Ok(false);
        }

        let (tree, _) = TagTree::build(&remaining, &self.settings)?;
        let net = NetIndexState::construct(&tree, &self.settings)?;
        self.defs = remaining;
        self.tree = tree;
        self.net = net;
        self.sources.remove_source(source_name);
        self.log_pass();

        self.events
            .emit(&TagEvent::SourceRemoved(source_name.to_string()));
        self.events.emit(&TagEvent::TreeRebuilt);
        Ok(true)
    }

    /// Feed `{ oldName, newName }` pairs from the redirect-table loader.
    pub fn add_redirects(&mut self, pairs: impl IntoIterator<Item = RedirectDef>) {
        self.redirects.load(pairs);
    }

    /// Recompute the net-index assignment. Mutating passes already do this
    /// eagerly over a tree that fits the index range, so recomputing over
    /// the committed tree is harmless and yields identical state.
    pub fn assign_indices(&mut self) -> Result<(), TagError> {
        self.net = NetIndexState::construct(&self.tree, &self.settings)?;
        self.log_pass();
        Ok(())
    }

    fn log_pass(&self) {
        debug!(
            "registry pass complete: {} tags, hash {:#018x}",
            self.tree.len(),
            self.net.hash()
        );
    }

    // --- reads ---

    /// Resolve redirects for `name`; identity when no redirect applies.
    pub fn resolve(&self, name: &str) -> Result<TagName, TagError> {
        self.redirects.resolve(name)
    }

    /// Redirect-aware node lookup.
    ///
    /// Callers choose per call whether absence is an error (authoritative
    /// lookups) or a benign `None` (speculative lookups).
    pub fn find_node(
        &self,
        name: &str,
        error_if_not_found: bool,
    ) -> Result<Option<&TagNode>, TagError> {
        let resolved = self.redirects.resolve(name)?;
        match self.tree.find(resolved.key()) {
            Some(id) => Ok(Some(self.tree.node(id))),
            None if error_if_not_found => Err(TagError::UnknownTag {
                name: name.to_string(),
            }),
            None => Ok(None),
        }
    }

    pub fn tree(&self) -> &TagTree {
        &self.tree
    }

    pub fn sources(&self) -> &SourceTracker {
        &self.sources
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn num_tags(&self) -> usize {
        self.tree.len()
    }

    // query surface, delegated to the tree

    pub fn parents(&self, tag: &str) -> Vec<TagName> {
        self.tree.parents(tag)
    }

    pub fn children(&self, tag: &str, recursive: bool, dictionary_only: bool) -> Vec<TagName> {
        self.tree.children(tag, recursive, dictionary_only)
    }

    pub fn direct_parent(&self, tag: &str) -> TagName {
        self.tree.direct_parent(tag)
    }

    pub fn match_depth(&self, a: &str, b: &str) -> usize {
        self.tree.match_depth(a, b)
    }

    pub fn partial_match(&self, partial: &str) -> TagName {
        self.tree.partial_match(partial)
    }

    // net index surface

    pub fn bit_width(&self) -> u32 {
        self.net.bit_num()
    }

    pub fn first_segment_bit_width(&self) -> u32 {
        self.net.first_segment_bits()
    }

    pub fn invalid_index(&self) -> TagNetIndex {
        self.net.invalid_index()
    }

    pub fn content_hash(&self) -> u64 {
        self.net.hash()
    }

    pub fn tag_to_index(&self, tag: &str) -> TagNetIndex {
        self.net.tag_to_index(tag)
    }

    pub fn index_to_tag(&self, index: TagNetIndex) -> TagName {
        self.net.index_to_tag(index)
    }

    pub fn net_index_state(&self) -> &NetIndexState {
        &self.net
    }

    /// Subscribe to change events published after successful passes.
    pub fn subscribe(&mut self, observer: impl Fn(&TagEvent) + Send + Sync + 'static) {
        self.events.subscribe(observer);
    }
}

/// Thread-safe handle around a registry.
///
/// The registry is built on one logical thread; concurrent readers take the
/// shared lock for queries and index lookups, mutations take the exclusive
/// lock. Because passes rebuild eagerly, reads never upgrade.
#[derive(Clone)]
pub struct SharedTagRegistry {
    inner: Arc<RwLock<TagRegistry>>,
}

impl SharedTagRegistry {
    pub fn new(registry: TagRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TagRegistry> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, TagRegistry> {
        self.inner.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn def(path: &str, source: &str) -> TagDef {
        TagDef::new(path, source, SourceKind::TagList)
    }

    #[test]
    fn insert_reports_outcomes() {
        let mut reg = TagRegistry::default();
        assert_eq!(reg.insert(def("a.b", "s1")).unwrap(), InsertOutcome::InsertedNew);
        assert_eq!(reg.insert(def("a.b", "s1")).unwrap(), InsertOutcome::MergedExisting);
        assert_eq!(
            reg.insert(def("a.b", "s2")).unwrap(),
            InsertOutcome::DuplicateConflict
        );
    }

    #[test]
    fn failed_pass_leaves_previous_state_visible() {
        let mut reg = TagRegistry::default();
        reg.insert(def("a.b", "s1")).unwrap();
        let hash = reg.content_hash();
        let count = reg.num_tags();

        assert!(reg.insert(def("bad name", "s1")).is_err());
        assert!(
            reg.add_tag_defs(vec![def("ok.tag", "s1"), def("also..bad", "s1")])
                .is_err()
        );

        assert_eq!(reg.content_hash(), hash);
        assert_eq!(reg.num_tags(), count);
        assert!(!reg.tree().contains("ok.tag"));
    }

    #[test]
    fn failed_pass_registers_no_sources() {
        let mut reg = TagRegistry::default();
        let err = reg
            .add_tag_defs(vec![
                TagDef::new("a", "s", SourceKind::TagList),
                TagDef::new("b", "s", SourceKind::DataTable),
            ])
            .unwrap_err();
        assert!(matches!(err, TagError::SourceKindMismatch { .. }));

        assert_eq!(reg.num_tags(), 0);
        assert!(reg.sources().source("s").is_none());
        assert!(reg.sources().claimants(&TagName::new("a")).is_empty());

        // the name was never locked to the failed batch's first kind
        reg.insert(TagDef::new("b", "s", SourceKind::DataTable)).unwrap();
        assert_eq!(
            reg.sources().source("s").map(|s| s.kind),
            Some(SourceKind::DataTable)
        );
    }

    #[test]
    fn identical_reinserts_do_not_grow_the_def_list() {
        let mut reg = TagRegistry::default();
        for _ in 0..4 {
            assert!(reg.insert(def("a.b", "s1")).is_ok());
        }
        assert_eq!(reg.defs.len(), 1);

        // a differing duplicate is still kept for conflict bookkeeping
        reg.insert(def("a.b", "s1").with_comment("note")).unwrap();
        assert_eq!(reg.defs.len(), 2);
    }

    #[test]
    fn source_kind_mismatch_rejects_the_pass() {
        let mut reg = TagRegistry::default();
        reg.insert(def("a", "s1")).unwrap();
        let err = reg
            .insert(TagDef::new("b", "s1", SourceKind::DataTable))
            .unwrap_err();
        assert!(matches!(err, TagError::SourceKindMismatch { .. }));
        assert!(!reg.tree().contains("b"));
    }

    #[test]
    fn mutation_updates_hash_eagerly() {
        let mut reg = TagRegistry::default();
        let empty_hash = reg.content_hash();
        reg.insert(def("a.b", "s1")).unwrap();
        let one_hash = reg.content_hash();
        assert_ne!(empty_hash, one_hash);

        reg.remove_source("s1").unwrap();
        assert_eq!(reg.content_hash(), empty_hash);
        assert_eq!(reg.num_tags(), 0);
    }

    #[test]
    fn remove_source_rederives_shared_parents() {
        let mut reg = TagRegistry::default();
        reg.insert(def("shared.one", "s1")).unwrap();
        reg.insert(def("shared.two", "s2")).unwrap();

        assert!(reg.remove_source("s1").unwrap());
        assert!(!reg.tree().contains("shared.one"));
        // the implied parent survives because s2 still needs it
        assert!(reg.tree().contains("shared"));
        assert!(reg.tree().contains("shared.two"));
        assert!(!reg.remove_source("s1").unwrap());
    }

    #[test]
    fn find_node_applies_redirects_but_insert_does_not() {
        let mut reg = TagRegistry::default();
        reg.insert(def("new.home", "s1")).unwrap();
        reg.add_redirects([RedirectDef {
            old_name: "old.home".into(),
            new_name: "new.home".into(),
        }]);

        let node = reg.find_node("old.home", false).unwrap().unwrap();
        assert_eq!(node.full().as_str(), "new.home");

        // definitions are taken at face value
        reg.insert(def("old.home", "s1")).unwrap();
        assert!(reg.tree().contains("old.home"));
    }

    #[test]
    fn find_node_error_mode_is_per_call() {
        let reg = TagRegistry::default();
        assert!(reg.find_node("missing", false).unwrap().is_none());
        let err = reg.find_node("missing", true).unwrap_err();
        assert!(matches!(err, TagError::UnknownTag { .. }));
    }

    #[test]
    fn events_fire_after_successful_passes_only() {
        let mut reg = TagRegistry::default();
        static ADDED: AtomicUsize = AtomicUsize::new(0);
        static REBUILT: AtomicUsize = AtomicUsize::new(0);
        reg.subscribe(|event| match event {
            TagEvent::TagAdded(_) => {
                ADDED.fetch_add(1, Ordering::Relaxed);
            }
            TagEvent::TreeRebuilt => {
                REBUILT.fetch_add(1, Ordering::Relaxed);
            }
            TagEvent::SourceRemoved(_) => {}
        });

        reg.insert(def("a.b", "s1")).unwrap();
        assert_eq!(ADDED.load(Ordering::Relaxed), 1);
        assert_eq!(REBUILT.load(Ordering::Relaxed), 1);

        let _ = reg.insert(def("bad name", "s1"));
        assert_eq!(REBUILT.load(Ordering::Relaxed), 1);

        // merge without a new explicit tag still rebuilds
        reg.insert(def("a.b", "s1")).unwrap();
        assert_eq!(ADDED.load(Ordering::Relaxed), 1);
        assert_eq!(REBUILT.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn native_tags_use_the_reserved_source() {
        let mut reg = TagRegistry::default();
        reg.add_native_tag("engine.ready", "posted once on boot").unwrap();
        let node = reg.find_node("engine.ready", true).unwrap().unwrap();
        assert_eq!(node.sources().collect::<Vec<_>>(), vec![NATIVE_SOURCE_NAME]);
        assert_eq!(node.dev_comment(), Some("posted once on boot"));
        assert_eq!(
            reg.sources().source(NATIVE_SOURCE_NAME).map(|s| s.kind),
            Some(SourceKind::Native)
        );
    }

    #[test]
    fn shared_registry_allows_concurrent_reads() {
        let mut reg = TagRegistry::default();
        reg.insert(def("a.b", "s1")).unwrap();
        let shared = SharedTagRegistry::new(reg);

        let r1 = shared.read();
        let r2 = shared.read();
        assert_eq!(r1.num_tags(), r2.num_tags());
        drop((r1, r2));

        shared.write().insert(def("c.d", "s1")).unwrap();
        assert_eq!(shared.read().num_tags(), 4);
    }
}
