//! Net index assignment — dense per-tag indices, bit-width computation and
//! the two-segment encoding used to serialize tag identity compactly.
//!
//! Index values are meaningless unless both ends of a wire protocol agree,
//! so assignment is fully deterministic: commonly replicated tags first (in
//! their configured order, guaranteeing they fit the short segment), then
//! every remaining node in case-folded path order. The content hash over
//! the finalized sequence lets two independently built registries verify
//! they agree on every index.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::TagError;
use crate::hash::sequence_hash;
use crate::name::{TagName, fold_key};
use crate::registry::RegistrySettings;
use crate::tree::TagTree;

/// Dense integer identifying a tag on the wire, valid within one
/// content-hash epoch. The value `count` is the "no tag" sentinel.
pub type TagNetIndex = u16;

/// Smallest bit width that can represent `count` indices plus the invalid
/// sentinel. Never less than 1.
pub const fn true_bit_num(count: usize) -> u32 {
    let mut b = 1;
    while (1u64 << b) <= count as u64 {
        b += 1;
    }
    b
}

/// Pack an index into the two-segment scheme.
///
/// Returns `(bits, bit_count)`. Indices below `2^S` cost `S + 1` bits (the
/// low `S` bits plus a "more" bit of 0); larger indices cost `B + 1` bits
/// (low `S` bits, "more" bit of 1, then the remaining high bits).
pub const fn encode_net_index(
    index: TagNetIndex,
    bit_num: u32,
    first_segment_bits: u32,
) -> (u32, u32) {
    let s = first_segment_bits;
    let idx = index as u32;
    if idx < (1u32 << s) {
        (idx, s + 1)
    } else {
        let low = idx & ((1u32 << s) - 1);
        let high = idx >> s;
        (low | (1u32 << s) | (high << (s + 1)), bit_num + 1)
    }
}

/// Inverse of [`encode_net_index`].
pub const fn decode_net_index(bits: u32, first_segment_bits: u32) -> TagNetIndex {
    let s = first_segment_bits;
    let low = bits & ((1u32 << s) - 1);
    if (bits >> s) & 1 == 0 {
        low as TagNetIndex
    } else {
        (low | ((bits >> (s + 1)) << s)) as TagNetIndex
    }
}

/// The finalized index assignment for one tree build.
#[derive(Clone, Debug)]
pub struct NetIndexState {
    order: Vec<TagName>,
    index_of: HashMap<Arc<str>, TagNetIndex>,
    bit_num: u32,
    first_segment_bits: u32,
    hash: u64,
}

impl NetIndexState {
    /// Walk the completed tree and assign every node (explicit and implicit)
    /// a dense index per the deterministic total order.
    ///
    /// Fails with [`TagError::TooManyTags`] when the population (plus the
    /// sentinel) no longer fits [`TagNetIndex`]; callers treat that as an
    /// aborted pass, never a truncated assignment.
    pub fn construct(tree: &TagTree, settings: &RegistrySettings) -> Result<Self, TagError> {
        let mut order: Vec<TagName> = Vec::with_capacity(tree.len());
        let mut index_of: HashMap<Arc<str>, TagNetIndex> = HashMap::with_capacity(tree.len());

        // allow-listed tags claim the low indices, in the list's own order
        for tag in &settings.commonly_replicated {
            if index_of.contains_key(tag.key()) {
                continue;
            }
            if let Some(id) = tree.find(tag.key()) {
                let canonical = tree.node(id).full().clone();
                index_of.insert(canonical.key_arc(), order.len() as TagNetIndex);
                order.push(canonical);
            }
        }

        let mut rest: Vec<&TagName> = tree
            .iter()
            .map(|(_, node)| node.full())
            .filter(|name| !index_of.contains_key(name.key()))
            .collect();
        rest.sort();
        for name in rest {
            index_of.insert(name.key_arc(), order.len() as TagNetIndex);
            order.push(name.clone());
        }

        let count = order.len();
        if count > TagNetIndex::MAX as usize {
            return Err(TagError::TooManyTags { count });
        }
        Ok(Self::assemble(order, index_of, settings))
    }

    /// The assignment for a tree with no tags.
    pub fn empty(settings: &RegistrySettings) -> Self {
        Self::assemble(Vec::new(), HashMap::new(), settings)
    }

    fn assemble(
        order: Vec<TagName>,
        index_of: HashMap<Arc<str>, TagNetIndex>,
        settings: &RegistrySettings,
    ) -> Self {
        let count = order.len();
        let bit_num = true_bit_num(count);
        let first_segment_bits = (settings.net_index_first_bit_segment as u32).min(bit_num);
        let hash = sequence_hash(order.iter().map(|n| n.key()));

        debug!(
            "net index constructed: {count} tags, {bit_num} bits ({first_segment_bits} first segment), hash {hash:#018x}"
        );

        Self {
            order,
            index_of,
            bit_num,
            first_segment_bits,
            hash,
        }
    }

    /// Number of indexed tags.
    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// The "no tag" sentinel, one past the last valid index.
    pub fn invalid_index(&self) -> TagNetIndex {
        self.order.len() as TagNetIndex
    }

    /// Minimum bits needed to represent every index plus the sentinel.
    pub fn bit_num(&self) -> u32 {
        self.bit_num
    }

    /// Length of the first segment in the two-segment scheme.
    pub fn first_segment_bits(&self) -> u32 {
        self.first_segment_bits
    }

    /// Order-sensitive hash over the finalized sequence; two registries with
    /// the same hash agree on every index.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The full assignment order.
    pub fn order(&self) -> &[TagName] {
        &self.order
    }

    /// Index for `tag`, or the invalid sentinel when the tag is absent —
    /// absence is an expected case (e.g. tag removed since the peer built),
    /// not an error.
    pub fn tag_to_index(&self, tag: &str) -> TagNetIndex {
        self.index_of
            .get(fold_key(tag).as_ref())
            .copied()
            .unwrap_or_else(|| self.invalid_index())
    }

    /// Tag for `index`, or the none tag when out of range.
    pub fn index_to_tag(&self, index: TagNetIndex) -> TagName {
        self.order
            .get(index as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Encode `tag`'s index with this assignment's widths.
    pub fn encode_tag(&self, tag: &str) -> (u32, u32) {
        encode_net_index(self.tag_to_index(tag), self.bit_num, self.first_segment_bits)
    }
}
