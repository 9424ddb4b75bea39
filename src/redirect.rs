//! Redirect resolution — renamed/obsolete tag names mapped to their current
//! tag.
//!
//! Redirection applies to *lookups* (and deserialization entry points), never
//! to insertion: definitions are taken at face value.

use indexmap::IndexMap;

use crate::error::TagError;
use crate::name::{TagName, fold_key};
use crate::source::RedirectDef;

/// Maps obsolete names to their replacements, resolved transitively.
#[derive(Clone, Debug, Default)]
pub struct RedirectResolver {
    /// Folded old name → replacement, in registration order.
    entries: IndexMap<String, TagName>,
}

impl RedirectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `old -> new`. A later registration for the same old name
    /// replaces the earlier one.
    pub fn add(&mut self, old_name: &str, new_name: TagName) {
        self.entries.insert(fold_key(old_name).into_owned(), new_name);
    }

    /// Feed `{ oldName, newName }` pairs from the redirect-table loader.
    pub fn load(&mut self, defs: impl IntoIterator<Item = RedirectDef>) {
        for def in defs {
            self.add(&def.old_name, TagName::new(&def.new_name));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Follow the redirect chain for `name` to its final target.
    ///
    /// A name with no redirect entry resolves to itself, whether or not it
    /// exists in the tree — existence is the caller's concern. The chain is
    /// bounded by the entry count plus one; exceeding the bound means a
    /// cycle and is a hard failure, never a silent truncation.
    pub fn resolve(&self, name: &str) -> Result<TagName, TagError> {
        let mut current = match self.entries.get(fold_key(name).as_ref()) {
            None => return Ok(TagName::new(name)),
            Some(target) => target,
        };

        let bound = self.entries.len() + 1;
        let mut hops = 1;
        while let Some(next) = self.entries.get(current.key()) {
            hops += 1;
            if hops > bound {
                return Err(TagError::RedirectCycle {
                    name: name.to_string(),
                    hops,
                });
            }
            current = next;
        }
        Ok(current.clone())
    }
}
