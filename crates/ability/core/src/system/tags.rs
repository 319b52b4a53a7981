//! Entity tag mutation, change notification and interruption.

use tracing::{debug, trace};

use super::AbilitySystem;
use crate::ability::{AbilityKind, AbilityState};
use crate::events::SystemEvent;
use crate::tags::{Tag, TagSet};

impl AbilitySystem {
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Hierarchical membership: `Status.Stun` satisfies `Status`.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.has_tag(tag)
    }

    pub fn has_all_tags(&self, tags: &TagSet) -> bool {
        self.tags.contains_all(tags)
    }

    pub fn has_any_tags(&self, tags: &TagSet) -> bool {
        self.tags.contains_any(tags)
    }

    pub fn add_tag(&mut self, tag: Tag) -> bool {
        self.add_tags(&TagSet::from_iter([tag]))
    }

    pub fn remove_tag(&mut self, tag: &Tag) -> bool {
        self.remove_tags(&TagSet::from_iter([tag.clone()]))
    }

    /// Adds `tags`, notifying only if the set actually changed.
    pub fn add_tags(&mut self, tags: &TagSet) -> bool {
        let changed = self.tags.extend_from(tags);
        if changed {
            self.notify_tags_changed();
        }
        changed
    }

    /// Removes `tags`, notifying only if the set actually changed.
    pub fn remove_tags(&mut self, tags: &TagSet) -> bool {
        let changed = self.tags.remove_all(tags);
        if changed {
            self.notify_tags_changed();
        }
        changed
    }

    /// Replaces the whole tag set with an authoritative snapshot.
    pub(super) fn replace_tags(&mut self, tags: TagSet) {
        if self.tags == tags {
            return;
        }
        self.tags = tags;
        self.notify_tags_changed();
    }

    fn notify_tags_changed(&mut self) {
        trace!(target: "ability::tags", peer = %self.peer, tags = self.tags.len(), "tags changed");
        self.events.push_back(SystemEvent::TagsChanged(self.tags.clone()));
        if self.role.authority {
            self.outbox.push_tags(self.tags.clone());
        }
        if self.tearing_down {
            return;
        }

        let kinds: Vec<AbilityKind> = self.abilities.keys().cloned().collect();
        for kind in kinds {
            self.with_behavior(&kind, |behavior, ctx| behavior.on_tags_changed(ctx));
            self.interrupt_if_needed(&kind);
        }
    }

    /// Cancels `kind` with cooldown when an interrupt tag is present and its
    /// current phase is interruptible.
    fn interrupt_if_needed(&mut self, kind: &AbilityKind) {
        let Some(slot) = self.abilities.get(kind) else {
            return;
        };
        let interrupt = &slot.config.interrupt;
        if interrupt.tags.is_empty() || !self.tags.contains_any(&interrupt.tags) {
            return;
        }
        let state = slot.machine.state();
        let interruptible = (interrupt.cancels_casting && state == AbilityState::Cast)
            || (interrupt.cancels_activation && state == AbilityState::Activation);
        if !interruptible {
            return;
        }
        debug!(target: "ability::tags", ability = %kind, %state, "interrupted by tags");
        self.cancel_ability(kind, true);
    }
}
