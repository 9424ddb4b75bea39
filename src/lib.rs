//! # Hierarchical Message Tag Registry (message-tags)
//!
//! Ingests flat dotted tag definitions ("a.b.c") from multiple independent
//! sources, builds one consistent tree with implied-parent relationships,
//! resolves renames through redirectors, detects cross-source conflicts and
//! assigns every tag a dense, deterministic net index so tags travel over a
//! size-constrained wire format instead of as full strings.
//!
//! ## Net index encoding
//!
//! Given `count` tags, the minimum bit width is `B = ceil(log2(count + 1))`
//! (one value reserved for "no tag"), split at a configured point `S <= B`:
//!
//! ```text
//! index < 2^S   ┌─────────────┬──────┐
//!               │  S low bits │ more │   S + 1 bits, more = 0
//!               └─────────────┴──────┘
//! index >= 2^S  ┌─────────────┬──────┬──────────────┐
//!               │  S low bits │ more │ B-S high bits│   B + 1 bits, more = 1
//!               └─────────────┴──────┴──────────────┘
//! ```
//!
//! Small, commonly replicated tags stay cheap while the full space still
//! reaches `2^B - 1` distinct tags. This crate emits the parameters (`B`,
//! `S`, index, content hash); a separate wire layer packs the actual bits.
//! Compatibility hinges on both ends building over tag sets that produce an
//! identical [`TagRegistry::content_hash`].
//!
//! ## Usage
//!
//! ```
//! use message_tags::{SourceKind, TagDef, TagRegistry};
//!
//! let mut registry = TagRegistry::default();
//! registry
//!     .add_tag_defs(vec![
//!         TagDef::new("combat.melee.sword", "game.ini", SourceKind::TagList),
//!         TagDef::new("combat.ranged.bow", "game.ini", SourceKind::TagList),
//!     ])
//!     .unwrap();
//!
//! let idx = registry.tag_to_index("combat.melee.sword");
//! assert!(idx < registry.invalid_index());
//! assert_eq!(registry.index_to_tag(idx).as_str(), "combat.melee.sword");
//! assert_eq!(registry.match_depth("combat.melee.sword", "combat.ranged.bow"), 1);
//! ```

pub mod error;
pub mod event;
pub mod hash;
pub mod index;
pub mod name;
pub mod query;
pub mod redirect;
pub mod registry;
pub mod source;
pub mod tree;

pub use error::{InsertOutcome, MalformedTag, TagError};
pub use event::{EventDispatcher, TagEvent};
pub use hash::{fnv1a_64, sequence_hash};
pub use index::{NetIndexState, TagNetIndex, decode_net_index, encode_net_index, true_bit_num};
pub use name::TagName;
pub use redirect::RedirectResolver;
pub use registry::{RegistrySettings, SharedTagRegistry, TagRegistry};
pub use source::{
    NATIVE_SOURCE_NAME, RedirectDef, SourceKind, SourceTracker, TagDef, TagParameter, TagSource,
};
pub use tree::{Conflict, NodeId, NodeMeta, TagNode, TagTree};
