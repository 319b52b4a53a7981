//! Gameplay tags and the entity tag set.
//!
//! Tags are dotted names (`Status.Debuff.Stun`). Set operations are exact;
//! [`Tag::matches`] and [`TagSet::has_tag`] add hierarchical matching for
//! callers that ask for it explicitly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::name::name_type;

name_type! {
    /// A single gameplay tag.
    Tag
}

impl Tag {
    /// Returns true if `self` equals `parent` or lives below it in the
    /// dotted hierarchy (`A.B.C` matches `A.B`, `A.BC` does not).
    pub fn matches(&self, parent: &Tag) -> bool {
        let (child, parent) = (self.as_str(), parent.as_str());
        match child.strip_prefix(parent) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

/// Ordered set of tags with exact-match semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> + '_ {
        self.0.iter()
    }

    /// Exact membership.
    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    /// Hierarchical membership: some tag in the set matches `tag`.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.0.iter().any(|own| own.matches(tag))
    }

    /// True when every tag of `other` is present. Empty `other` is always satisfied.
    pub fn contains_all(&self, other: &TagSet) -> bool {
        other.0.is_subset(&self.0)
    }

    /// True when at least one tag of `other` is present.
    pub fn contains_any(&self, other: &TagSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Adds one tag, returning true if the set changed.
    pub fn insert(&mut self, tag: Tag) -> bool {
        self.0.insert(tag)
    }

    /// Removes one tag, returning true if the set changed.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.0.remove(tag)
    }

    /// Adds every tag of `other`, returning true if the set changed.
    pub fn extend_from(&mut self, other: &TagSet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        self.0.len() != before
    }

    /// Removes every tag of `other`, returning true if the set changed.
    pub fn remove_all(&mut self, other: &TagSet) -> bool {
        let before = self.0.len();
        self.0.retain(|tag| !other.0.contains(tag));
        self.0.len() != before
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[&'static str; N]> for TagSet {
    fn from(tags: [&'static str; N]) -> Self {
        tags.into_iter().map(Tag::new).collect()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Tags added and removed together on a state edge or buff event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagDelta {
    pub add: TagSet,
    pub remove: TagSet,
}

impl TagDelta {
    pub fn adding(add: impl Into<TagSet>) -> Self {
        Self {
            add: add.into(),
            remove: TagSet::new(),
        }
    }

    pub fn removing(remove: impl Into<TagSet>) -> Self {
        Self {
            add: TagSet::new(),
            remove: remove.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}
