//! Read-only query surface over a built tree: ancestor containers, child
//! containers, depth comparison and slow partial-name search.

use crate::name::{TagName, fold_key};
use crate::tree::{NodeId, TagTree};

impl TagTree {
    /// All ancestors from the tag itself up to its root, most specific
    /// first: `parents("a.b.c") == ["a.b.c", "a.b", "a"]`.
    ///
    /// Synthesized from the name's segments, so it holds even for purely
    /// implicit intermediates and for tags absent from the tree.
    pub fn parents(&self, tag: &str) -> Vec<TagName> {
        let mut out = Vec::new();
        let mut current = TagName::new(tag);
        while !current.is_none() {
            let parent = current.direct_parent();
            out.push(current);
            current = parent;
        }
        out
    }

    /// Children of `tag`, in first-seen DFS order, excluding the tag itself.
    ///
    /// `recursive` walks the whole subtree instead of one level;
    /// `dictionary_only` keeps explicitly declared nodes, skipping purely
    /// implicit intermediates (traversal still descends through them).
    /// Unknown tags yield an empty result.
    pub fn children(&self, tag: &str, recursive: bool, dictionary_only: bool) -> Vec<TagName> {
        let Some(id) = self.find(tag) else {
            return Vec::new();
        };
        let ids: Vec<NodeId> = if recursive {
            self.descendant_ids(id)
        } else {
            self.node(id).children().to_vec()
        };
        ids.into_iter()
            .map(|cid| self.node(cid))
            .filter(|n| !dictionary_only || n.is_explicit())
            .map(|n| n.full().clone())
            .collect()
    }

    /// The immediate parent by dropping the last dotted segment; the none
    /// tag when `tag` has no dot.
    pub fn direct_parent(&self, tag: &str) -> TagName {
        TagName::new(tag).direct_parent()
    }

    /// Number of leading segments the two tags share, compared pairwise
    /// from the root. Unrelated roots score 0; identical tags score their
    /// full segment count.
    pub fn match_depth(&self, a: &str, b: &str) -> usize {
        let a = TagName::new(a);
        let b = TagName::new(b);
        a.segments()
            .zip(b.segments())
            .take_while(|(x, y)| fold_key(x) == fold_key(y))
            .count()
    }

    /// Best-effort linear search for interactive tooling, not hot paths.
    ///
    /// Preference order: an exact full-name match, then the shortest tag
    /// whose dotted prefix matches `partial` at a `.` boundary ("a.b"
    /// prefers "a.b.x" over "a.bc"), then the first tag containing
    /// `partial` as a substring. All ties break by first-inserted order, so
    /// repeated calls on the same tree return the same result. The none tag
    /// when nothing matches.
    pub fn partial_match(&self, partial: &str) -> TagName {
        if partial.is_empty() {
            return TagName::none();
        }
        let wanted = fold_key(partial).into_owned();

        if let Some(id) = self.find(&wanted) {
            return self.node(id).full().clone();
        }

        let boundary = format!("{wanted}.");
        let mut best: Option<&TagName> = None;
        for (_, node) in self.iter() {
            if node.full().key().starts_with(&boundary)
                && best.is_none_or(|b| node.full().key().len() < b.key().len())
            {
                best = Some(node.full());
            }
        }
        if let Some(found) = best {
            return found.clone();
        }

        for (_, node) in self.iter() {
            if node.full().key().contains(&wanted) {
                return node.full().clone();
            }
        }
        TagName::none()
    }
}
