//! Extension hooks for ability types.
//!
//! Hooks never touch the container directly. They read through an
//! [`AbilityView`] and queue [`AbilityCommand`]s on the [`AbilityContext`];
//! the container executes the queue as soon as the hook returns, before it
//! decides whether the surrounding transition still holds.

use std::ops::Deref;
use std::time::Duration;

use crate::ability::{AbilityConfig, AbilityKind, AbilityState, StateTransition};
use crate::buff::BuffCount;
use crate::cooldown::CooldownReadyReason;
use crate::input::InputSlot;
use crate::net::NetRole;
use crate::payload::PayloadBag;
use crate::tags::{Tag, TagSet};
use crate::time::GameTime;

/// Read-only snapshot of an ability and its entity during a hook.
#[derive(Clone, Copy, Debug)]
pub struct AbilityView<'a> {
    pub(crate) kind: &'a AbilityKind,
    pub(crate) config: &'a AbilityConfig,
    pub(crate) state: AbilityState,
    pub(crate) tags: &'a TagSet,
    pub(crate) role: NetRole,
    pub(crate) now: GameTime,
    pub(crate) cooling_down: bool,
    pub(crate) pressed: Option<&'a InputSlot>,
    pub(crate) payload: &'a PayloadBag,
}

impl<'a> AbilityView<'a> {
    pub fn kind(&self) -> &'a AbilityKind {
        self.kind
    }

    pub fn config(&self) -> &'a AbilityConfig {
        self.config
    }

    pub fn state(&self) -> AbilityState {
        self.state
    }

    pub fn has_cast(&self) -> bool {
        self.config.has_cast
    }

    pub fn is_casting(&self) -> bool {
        self.state == AbilityState::Cast
    }

    pub fn is_activated(&self) -> bool {
        self.state == AbilityState::Activation
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooling_down
    }

    /// Entity tags at the time of the hook.
    pub fn tags(&self) -> &'a TagSet {
        self.tags
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_authority(&self) -> bool {
        self.role.authority
    }

    pub fn is_locally_controlled(&self) -> bool {
        self.role.locally_controlled
    }

    pub fn now(&self) -> GameTime {
        self.now
    }

    pub fn pressed_input(&self) -> Option<&'a InputSlot> {
        self.pressed
    }

    /// Payload of the transition currently being processed.
    pub fn payload(&self) -> &'a PayloadBag {
        self.payload
    }
}

/// Deferred request queued by a hook.
#[derive(Clone, Debug, PartialEq)]
pub enum AbilityCommand {
    StartCast(PayloadBag),
    Activate(PayloadBag),
    ActivateOrCancel(PayloadBag),
    Deactivate,
    Cancel { apply_cooldown: bool },
    StartCooldown,
    ResetCooldown,
    AddTags(TagSet),
    RemoveTags(TagSet),
    ApplyBuffs(Vec<BuffCount>),
    RemoveBuffs(Vec<BuffCount>),
}

/// Mutable hook context: a view plus the command queue.
#[derive(Debug)]
pub struct AbilityContext<'a> {
    view: AbilityView<'a>,
    commands: Vec<AbilityCommand>,
}

impl<'a> AbilityContext<'a> {
    pub(crate) fn new(view: AbilityView<'a>) -> Self {
        Self {
            view,
            commands: Vec::new(),
        }
    }

    pub(crate) fn into_commands(self) -> Vec<AbilityCommand> {
        self.commands
    }

    pub fn view(&self) -> &AbilityView<'a> {
        &self.view
    }

    pub fn push(&mut self, command: AbilityCommand) {
        self.commands.push(command);
    }

    pub fn start_cast(&mut self, payload: PayloadBag) {
        self.push(AbilityCommand::StartCast(payload));
    }

    pub fn activate(&mut self, payload: PayloadBag) {
        self.push(AbilityCommand::Activate(payload));
    }

    pub fn activate_or_cancel(&mut self, payload: PayloadBag) {
        self.push(AbilityCommand::ActivateOrCancel(payload));
    }

    pub fn deactivate(&mut self) {
        self.push(AbilityCommand::Deactivate);
    }

    pub fn cancel(&mut self, apply_cooldown: bool) {
        self.push(AbilityCommand::Cancel { apply_cooldown });
    }

    pub fn start_cooldown(&mut self) {
        self.push(AbilityCommand::StartCooldown);
    }

    pub fn reset_cooldown(&mut self) {
        self.push(AbilityCommand::ResetCooldown);
    }

    pub fn add_tags(&mut self, tags: TagSet) {
        self.push(AbilityCommand::AddTags(tags));
    }

    pub fn remove_tags(&mut self, tags: TagSet) {
        self.push(AbilityCommand::RemoveTags(tags));
    }

    pub fn apply_buffs(&mut self, buffs: Vec<BuffCount>) {
        self.push(AbilityCommand::ApplyBuffs(buffs));
    }

    pub fn remove_buffs(&mut self, buffs: Vec<BuffCount>) {
        self.push(AbilityCommand::RemoveBuffs(buffs));
    }
}

impl<'a> Deref for AbilityContext<'a> {
    type Target = AbilityView<'a>;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

/// Behaviour of an ability type.
///
/// Every hook has a default. Predicates default to "allow" (`can_activate`
/// additionally requires a running cast when the ability has one) and
/// callbacks default to no-ops.
pub trait AbilityBehavior: Send + 'static {
    /// The ability was attached to its container.
    fn begin_play(&mut self, _ctx: &mut AbilityContext<'_>) {}

    /// The ability is about to be detached.
    fn end_play(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn tick(&mut self, _ctx: &mut AbilityContext<'_>, _dt: Duration) {}

    /// Runs before a local transition is checked; may rewrite the payload.
    fn pre_state_change(
        &mut self,
        _ctx: &mut AbilityContext<'_>,
        _transition: StateTransition,
        _payload: &mut PayloadBag,
    ) {
    }

    fn can_cast(&self, _view: &AbilityView<'_>, _payload: &PayloadBag) -> bool {
        true
    }

    fn can_activate(&self, view: &AbilityView<'_>, _payload: &PayloadBag) -> bool {
        !view.has_cast() || view.is_casting()
    }

    fn on_cast(&mut self, _ctx: &mut AbilityContext<'_>, _payload: &PayloadBag) {}

    fn on_cast_finish(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn on_activate(&mut self, _ctx: &mut AbilityContext<'_>, _payload: &PayloadBag) {}

    fn on_deactivate(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn on_cooldown_started(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn on_cooldown_ready(&mut self, _ctx: &mut AbilityContext<'_>, _reason: CooldownReadyReason) {}

    fn on_tags_changed(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn on_input_pressed(&mut self, _ctx: &mut AbilityContext<'_>) {}

    fn on_input_released(&mut self, _ctx: &mut AbilityContext<'_>) {}

    /// Returns true if the ability cancelled itself in response.
    fn on_cancel_input(&mut self, _ctx: &mut AbilityContext<'_>) -> bool {
        false
    }
}

/// Behaviour with every hook left at its default.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBehavior;

impl AbilityBehavior for DefaultBehavior {}
