use std::collections::HashMap;

use super::{BuffCount, BuffCountWire, BuffDef, BuffId, BuffRef};
use crate::error::ProtocolError;

/// Buff definitions known to a peer, used to resolve replicated buff ids.
#[derive(Clone, Debug, Default)]
pub struct BuffCatalog {
    buffs: HashMap<BuffId, BuffRef>,
}

impl BuffCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, replacing any previous one with the same id.
    pub fn insert(&mut self, def: BuffDef) -> BuffRef {
        let buff = def.into_ref();
        self.buffs.insert(buff.id.clone(), BuffRef::clone(&buff));
        buff
    }

    pub fn get(&self, id: &BuffId) -> Option<&BuffRef> {
        self.buffs.get(id)
    }

    pub fn len(&self) -> usize {
        self.buffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuffRef> + '_ {
        self.buffs.values()
    }

    /// Resolves wire entries, reporting the first unknown id.
    pub fn resolve(&self, entries: &[BuffCountWire]) -> Result<Vec<BuffCount>, ProtocolError> {
        entries
            .iter()
            .map(|entry| {
                self.get(&entry.id)
                    .map(|buff| BuffCount::new(BuffRef::clone(buff), entry.count))
                    .ok_or_else(|| ProtocolError::UnknownBuff(entry.id.clone()))
            })
            .collect()
    }
}

impl FromIterator<BuffDef> for BuffCatalog {
    fn from_iter<I: IntoIterator<Item = BuffDef>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for def in iter {
            catalog.insert(def);
        }
        catalog
    }
}
