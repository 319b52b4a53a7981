use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::name::name_type;
use crate::tags::{Tag, TagDelta, TagSet};
use crate::time::GameTime;

name_type! {
    /// Identity of a buff definition. Two definitions with the same id are the same buff.
    BuffId
}

name_type! {
    /// Uniqueness group of buffs.
    BuffClass
}

/// Tag changes queued by custom buff effects.
#[derive(Debug)]
pub struct EffectContext<'a> {
    buff: &'a BuffDef,
    tags: &'a TagSet,
    now: GameTime,
    delta: TagDelta,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(buff: &'a BuffDef, tags: &'a TagSet, now: GameTime) -> Self {
        Self {
            buff,
            tags,
            now,
            delta: TagDelta::default(),
        }
    }

    pub(crate) fn into_delta(self) -> TagDelta {
        self.delta
    }

    pub fn buff(&self) -> &'a BuffDef {
        self.buff
    }

    pub fn tags(&self) -> &'a TagSet {
        self.tags
    }

    pub fn now(&self) -> GameTime {
        self.now
    }

    pub fn add_tag(&mut self, tag: Tag) {
        self.delta.remove.remove(&tag);
        self.delta.add.insert(tag);
    }

    pub fn remove_tag(&mut self, tag: Tag) {
        self.delta.add.remove(&tag);
        self.delta.remove.insert(tag);
    }
}

/// Custom apply/revert callbacks of a buff. Only the authority runs them.
pub trait BuffEffects: Send + Sync {
    fn apply(&self, _ctx: &mut EffectContext<'_>, _count: u32) {}

    fn revert(&self, _ctx: &mut EffectContext<'_>, _count: u32) {}
}

/// Static definition of a buff.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffDef {
    pub id: BuffId,
    pub class: BuffClass,
    pub display_name: String,

    /// Applications add to the count instead of being ignored.
    pub stackable: bool,
    /// At most one buff of this class may be active.
    pub unique: bool,
    /// A new unique buff evicts the active one instead of being refused.
    pub replaces_previous_unique: bool,

    /// Timed expiry; ignored for stackable buffs.
    pub lifetime: Option<Duration>,

    /// Identifying tags, matched by `remove_buffs_by_tag`. Never applied.
    pub tags: TagSet,
    /// Added on apply, removed on revert.
    pub tags_to_apply: TagSet,
    pub on_apply: TagDelta,
    pub on_revert: TagDelta,

    #[serde(skip)]
    pub effects: Option<Arc<dyn BuffEffects>>,
}

impl BuffDef {
    pub fn new(id: impl Into<BuffId>, class: impl Into<BuffClass>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            class: class.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    #[must_use]
    pub fn unique(mut self, replaces_previous: bool) -> Self {
        self.unique = true;
        self.replaces_previous_unique = replaces_previous;
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<TagSet>) -> Self {
        self.tags = tags.into();
        self
    }

    #[must_use]
    pub fn applying_tags(mut self, tags: impl Into<TagSet>) -> Self {
        self.tags_to_apply = tags.into();
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl BuffEffects + 'static) -> Self {
        self.effects = Some(Arc::new(effects));
        self
    }

    /// Timer length for this buff, zero when it never expires on its own.
    pub fn lifetime_duration(&self) -> Duration {
        match self.lifetime {
            Some(lifetime) if !self.stackable => lifetime,
            _ => Duration::ZERO,
        }
    }

    pub fn into_ref(self) -> BuffRef {
        Arc::new(self)
    }
}

impl core::fmt::Debug for BuffDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuffDef")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("stackable", &self.stackable)
            .field("unique", &self.unique)
            .field("replaces_previous_unique", &self.replaces_previous_unique)
            .field("lifetime", &self.lifetime)
            .field("effects", &self.effects.is_some())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a buff definition.
pub type BuffRef = Arc<BuffDef>;

/// A buff and how many applications it carries. Identity is the buff id.
#[derive(Clone, Debug)]
pub struct BuffCount {
    pub buff: BuffRef,
    pub count: u32,
}

impl BuffCount {
    pub fn new(buff: BuffRef, count: u32) -> Self {
        Self { buff, count }
    }

    pub fn single(buff: BuffRef) -> Self {
        Self::new(buff, 1)
    }

    pub fn id(&self) -> &BuffId {
        &self.buff.id
    }

    pub fn to_wire(&self) -> BuffCountWire {
        BuffCountWire {
            id: self.buff.id.clone(),
            count: self.count,
        }
    }
}

impl From<BuffRef> for BuffCount {
    fn from(buff: BuffRef) -> Self {
        Self::single(buff)
    }
}

impl PartialEq for BuffCount {
    fn eq(&self, other: &Self) -> bool {
        self.buff.id == other.buff.id
    }
}

impl Eq for BuffCount {}

impl core::hash::Hash for BuffCount {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.buff.id.hash(state);
    }
}

/// Wire form of a [`BuffCount`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuffCountWire {
    pub id: BuffId,
    pub count: u32,
}
