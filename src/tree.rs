//! The tag tree — arena-stored nodes, implicit-parent creation, conflict
//! bookkeeping.
//!
//! Nodes are owned by a flat arena and addressed by [`NodeId`]; the parent
//! link is an id, never a reference, so rebuilding a tree can never leave a
//! dangling upward pointer. A tree is built in one pass from the full
//! definition set and is read-only afterwards: implicit-parent creation,
//! first-seen child order and conflict flags all depend on global knowledge
//! of the input, so mutation means rebuilding (see `TagRegistry`).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::warn;

use crate::error::{InsertOutcome, MalformedTag, TagError};
use crate::name::{TagName, fold_key};
use crate::registry::RegistrySettings;
use crate::source::{TagDef, TagParameter};

/// Stable handle to a node within one tree build.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Conflict severity. `Soft` marks metadata disagreement (e.g. the same
/// parameter declared with two types), `Hard` marks duplicate explicit
/// definitions across sources.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Conflict {
    #[default]
    None,
    Soft,
    Hard,
}

impl Conflict {
    #[inline]
    pub fn is_conflicted(self) -> bool {
        self != Conflict::None
    }

    fn escalate(&mut self, other: Conflict) {
        if other > *self {
            *self = other;
        }
    }
}

/// Optional per-node extension block: dev comments and message signature
/// metadata. Only allocated for nodes that actually carry any of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMeta {
    /// First-writer-wins developer comment.
    pub dev_comment: Option<String>,
    /// Parameter name → type, unioned across sources.
    pub parameters: IndexMap<String, String>,
    /// Response name → type, unioned across sources.
    pub response_types: IndexMap<String, String>,
}

impl NodeMeta {
    fn is_empty(&self) -> bool {
        self.dev_comment.is_none() && self.parameters.is_empty() && self.response_types.is_empty()
    }
}

/// One node in the tag tree.
#[derive(Clone, Debug)]
pub struct TagNode {
    segment: String,
    full: TagName,
    parent: Option<NodeId>,
    /// First-seen order, not alphabetic.
    children: Vec<NodeId>,
    explicit_sources: IndexSet<String>,
    implied_sources: IndexSet<String>,
    is_explicit: bool,
    is_restricted: bool,
    allows_non_restricted_children: bool,
    node_has_conflict: Conflict,
    ancestor_has_conflict: Conflict,
    descendant_has_conflict: Conflict,
    meta: Option<Box<NodeMeta>>,
}

impl TagNode {
    fn new(segment: &str, full: TagName, parent: Option<NodeId>, def: &TagDef) -> Self {
        Self {
            segment: segment.to_string(),
            full,
            parent,
            children: Vec::new(),
            explicit_sources: IndexSet::new(),
            implied_sources: IndexSet::new(),
            is_explicit: false,
            is_restricted: def.is_restricted,
            allows_non_restricted_children: def.allows_non_restricted_children,
            node_has_conflict: Conflict::None,
            ancestor_has_conflict: Conflict::None,
            descendant_has_conflict: Conflict::None,
            meta: None,
        }
    }

    /// The last dotted component of this node's path.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Complete dotted name.
    pub fn full(&self) -> &TagName {
        &self.full
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in first-seen order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Sources that declared this exact path.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.explicit_sources.iter().map(|s| s.as_str())
    }

    /// Sources that only implied this node through a deeper child.
    pub fn implied_sources(&self) -> impl Iterator<Item = &str> {
        self.implied_sources.iter().map(|s| s.as_str())
    }

    /// True if some source declared this exact path; false if the node only
    /// exists because a deeper path implies it.
    pub fn is_explicit(&self) -> bool {
        self.is_explicit
    }

    pub fn is_restricted(&self) -> bool {
        self.is_restricted
    }

    pub fn allows_non_restricted_children(&self) -> bool {
        self.allows_non_restricted_children
    }

    /// This exact node was declared by more than one source (or carries
    /// mismatched metadata).
    pub fn node_has_conflict(&self) -> Conflict {
        self.node_has_conflict
    }

    /// Some ancestor of this node is conflicted; settings here are advisory
    /// until it is resolved.
    pub fn ancestor_has_conflict(&self) -> Conflict {
        self.ancestor_has_conflict
    }

    /// Something below this node is unresolved.
    pub fn descendant_has_conflict(&self) -> Conflict {
        self.descendant_has_conflict
    }

    pub fn meta(&self) -> Option<&NodeMeta> {
        self.meta.as_deref()
    }

    pub fn dev_comment(&self) -> Option<&str> {
        self.meta.as_ref()?.dev_comment.as_deref()
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        self.meta.get_or_insert_with(Default::default)
    }
}

/// The tag tree for one construction pass.
#[derive(Clone, Debug, Default)]
pub struct TagTree {
    nodes: Vec<TagNode>,
    roots: Vec<NodeId>,
    by_path: HashMap<Arc<str>, NodeId>,
}

impl TagTree {
    /// Build a tree from an ordered definition set.
    ///
    /// Returns the tree plus one [`InsertOutcome`] per definition, in input
    /// order. Structural errors abort the whole build; duplicate
    /// definitions do not — they become conflict flags and
    /// [`InsertOutcome::DuplicateConflict`].
    pub fn build(
        defs: &[TagDef],
        settings: &RegistrySettings,
    ) -> Result<(TagTree, Vec<InsertOutcome>), TagError> {
        let mut tree = TagTree::default();
        let mut outcomes = Vec::with_capacity(defs.len());
        for def in defs {
            outcomes.push(tree.apply(def, settings)?);
        }
        tree.propagate_conflicts();
        Ok((tree, outcomes))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root ids in first-seen order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &TagNode {
        &self.nodes[id.idx()]
    }

    /// Look a node up by its full dotted name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_path.get(fold_key(name).as_ref()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All nodes in creation (first-inserted) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TagNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Ids of `id`'s subtree in first-seen DFS order, excluding `id` itself.
    pub fn descendant_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next).children.iter().rev());
        }
        out
    }

    /// Ancestor ids from `id`'s parent up to its root.
    pub fn ancestor_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.node(p).parent;
        }
        out
    }

    fn child_by_segment(&self, parent: Option<NodeId>, segment: &str) -> Option<NodeId> {
        let candidates = match parent {
            Some(p) => &self.node(p).children,
            None => &self.roots,
        };
        let wanted = fold_key(segment);
        candidates
            .iter()
            .copied()
            .find(|&id| fold_key(&self.nodes[id.idx()].segment) == wanted)
    }

    fn check_restricted(&self, parent: Option<NodeId>, def: &TagDef) -> Result<(), TagError> {
        if def.is_restricted {
            return Ok(());
        }
        if let Some(pid) = parent {
            let p = self.node(pid);
            if p.is_restricted && !p.allows_non_restricted_children {
                return Err(TagError::RestrictedTagViolation {
                    parent: p.full.as_str().to_string(),
                    child: def.full_path.clone(),
                });
            }
        }
        Ok(())
    }

    fn create_node(
        &mut self,
        parent: Option<NodeId>,
        segment: &str,
        full_path: &str,
        def: &TagDef,
    ) -> NodeId {
        let full = TagName::new(full_path);
        let id = NodeId(self.nodes.len() as u32);
        let node = TagNode::new(segment, full, parent, def);
        self.by_path.insert(node.full.key_arc(), id);
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.idx()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Apply one definition: walk/create nodes segment by segment, then mark
    /// the final node explicit and merge its metadata.
    fn apply(&mut self, def: &TagDef, settings: &RegistrySettings) -> Result<InsertOutcome, TagError> {
        validate_path(&def.full_path, &settings.invalid_chars)?;

        let last = def.full_path.split('.').count() - 1;
        let mut parent: Option<NodeId> = None;
        let mut consumed = 0usize;
        let mut outcome = InsertOutcome::InsertedNew;

        for (i, segment) in def.full_path.split('.').enumerate() {
            let end = consumed + segment.len();
            let prefix = &def.full_path[..end];

            let id = match self.child_by_segment(parent, segment) {
                Some(id) => id,
                None => {
                    self.check_restricted(parent, def)?;
                    self.create_node(parent, segment, prefix, def)
                }
            };

            if i == last {
                outcome = self.mark_explicit(id, def)?;
            } else {
                self.nodes[id.idx()]
                    .implied_sources
                    .insert(def.source_name.clone());
            }
            parent = Some(id);
            consumed = end + 1;
        }
        Ok(outcome)
    }

    fn mark_explicit(&mut self, id: NodeId, def: &TagDef) -> Result<InsertOutcome, TagError> {
        // promotion of an implicit node has to honor the restricted rule too
        let parent = self.node(id).parent;
        self.check_restricted(parent, def)?;

        let node = &mut self.nodes[id.idx()];
        let outcome = if node.is_explicit {
            if node.explicit_sources.contains(&def.source_name) {
                InsertOutcome::MergedExisting
            } else {
                node.node_has_conflict.escalate(Conflict::Hard);
                warn!(
                    "tag '{}' declared by both '{}' and '{}'",
                    node.full,
                    node.explicit_sources
                        .first()
                        .map(|s| s.as_str())
                        .unwrap_or(""),
                    def.source_name
                );
                InsertOutcome::DuplicateConflict
            }
        } else {
            InsertOutcome::InsertedNew
        };

        node.is_explicit = true;
        node.explicit_sources.insert(def.source_name.clone());
        if def.is_restricted {
            node.is_restricted = true;
            node.allows_non_restricted_children = def.allows_non_restricted_children;
        }
        Self::merge_meta(node, def);
        Ok(outcome)
    }

    fn merge_meta(node: &mut TagNode, def: &TagDef) {
        if !def.dev_comment.is_empty() && node.dev_comment().is_none() {
            node.meta_mut().dev_comment = Some(def.dev_comment.clone());
        }
        if !def.parameters.is_empty() || !def.response_types.is_empty() {
            let full = node.full.clone();
            let meta = node.meta_mut();
            let mut soft = union_typed(&full, &mut meta.parameters, &def.parameters);
            soft |= union_typed(&full, &mut meta.response_types, &def.response_types);
            if soft {
                node.node_has_conflict.escalate(Conflict::Soft);
            }
        }
        // drop the block again if nothing stuck
        if node.meta.as_ref().is_some_and(|m| m.is_empty()) {
            node.meta = None;
        }
    }

    /// Spread each conflicted node's state: everything below it learns that
    /// an ancestor is unresolved, everything above it that a descendant is.
    fn propagate_conflicts(&mut self) {
        let conflicted: Vec<(NodeId, Conflict)> = self
            .iter()
            .filter(|(_, n)| n.node_has_conflict.is_conflicted())
            .map(|(id, n)| (id, n.node_has_conflict))
            .collect();

        for (id, level) in conflicted {
            for d in self.descendant_ids(id) {
                self.nodes[d.idx()].ancestor_has_conflict.escalate(level);
            }
            for a in self.ancestor_ids(id) {
                self.nodes[a.idx()].descendant_has_conflict.escalate(level);
            }
        }
    }
}

/// Union `incoming` name/type pairs into `map`; first writer keeps the slot,
/// a later different type is reported and flagged soft.
fn union_typed(
    full: &TagName,
    map: &mut IndexMap<String, String>,
    incoming: &[TagParameter],
) -> bool {
    let mut soft = false;
    for p in incoming {
        match map.get(&p.name).cloned() {
            Some(existing) if existing != p.ty => {
                warn!(
                    "tag '{}': parameter '{}' declared as both '{}' and '{}'",
                    full, p.name, existing, p.ty
                );
                soft = true;
            }
            Some(_) => {}
            None => {
                map.insert(p.name.clone(), p.ty.clone());
            }
        }
    }
    soft
}

/// Validate one full dotted path against the configured invalid-character
/// set: every segment non-empty, no forbidden characters anywhere.
fn validate_path(path: &str, invalid_chars: &str) -> Result<(), MalformedTag> {
    if path.is_empty() {
        return Err(MalformedTag::EmptySegment {
            name: path.to_string(),
            position: 0,
        });
    }
    for (position, character) in path.char_indices() {
        if invalid_chars.contains(character) {
            return Err(MalformedTag::InvalidCharacter {
                name: path.to_string(),
                character,
                position,
            });
        }
    }
    let mut offset = 0;
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(MalformedTag::EmptySegment {
                name: path.to_string(),
                position: offset,
            });
        }
        offset += segment.len() + 1;
    }
    Ok(())
}
