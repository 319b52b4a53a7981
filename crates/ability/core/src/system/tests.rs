use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::*;
use crate::ability::{
    CooldownMode, CooldownPolicy, InterruptConfig, StateTransition, TickPolicy, TransitionFlags,
};
use crate::buff::{BuffCatalog, BuffDef, BuffEffects, BuffRef, EffectContext};
use crate::error::{CoreError, ProtocolError};
use crate::input::{CancelInputResult, InputProfile};
use crate::net::{NetMessage, Route};
use crate::payload::Payload;
use crate::tags::Tag;

type Log = Arc<Mutex<Vec<String>>>;

fn dash() -> AbilityKind {
    AbilityKind::new("dash")
}

fn fireball() -> AbilityKind {
    AbilityKind::new("fireball")
}

/// `dash` activates directly; `fireball` has a cast phase.
fn registry() -> AbilityRegistry {
    let mut registry = AbilityRegistry::new();
    registry.register_config(dash(), AbilityConfig::named("Dash"));
    registry.register_config(
        fireball(),
        AbilityConfig {
            has_cast: true,
            ..AbilityConfig::named("Fireball")
        },
    );
    registry
}

fn standalone(registry: AbilityRegistry, catalog: BuffCatalog) -> AbilitySystem {
    let mut system = AbilitySystem::builder(PeerId(0), NetRole::STANDALONE)
        .registry(Arc::new(registry))
        .catalog(Arc::new(catalog))
        .build();
    system.initialize();
    system
}

fn state_broadcasts(system: &AbilitySystem) -> Vec<(AbilityState, u32)> {
    system
        .pending_outbox()
        .filter_map(|envelope| match &envelope.message {
            NetMessage::StateBroadcast {
                transition,
                state_id,
                ..
            } => Some((transition.destination, *state_id)),
            _ => None,
        })
        .collect()
}

struct Recorder {
    log: Log,
}

impl BuffEffects for Recorder {
    fn apply(&self, _ctx: &mut EffectContext<'_>, count: u32) {
        self.log.lock().unwrap().push(format!("apply {count}"));
    }

    fn revert(&self, _ctx: &mut EffectContext<'_>, count: u32) {
        self.log.lock().unwrap().push(format!("revert {count}"));
    }
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn no_cast_ability_activates_on_default_press() {
    let mut system = standalone(registry(), BuffCatalog::new());
    assert!(system.equip_ability(&dash()));

    assert!(system.press_default_input(&dash()));
    assert!(system.is_activated(&dash()));
    assert!(system.is_running(&dash()));
    assert!(system.is_input_pressed(&InputSlot::new(CoreConfig::DEFAULT_INPUT)));
}

#[test]
fn activation_requires_a_running_cast() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&fireball());

    assert!(!system.activate(&fireball(), PayloadBag::new()));
    assert_eq!(system.ability_state(&fireball()), Some(AbilityState::JustEquipped));

    assert!(system.cast_ability(&fireball()));
    assert!(system.is_casting(&fireball()));
    assert!(system.activate(&fireball(), PayloadBag::new()));
    assert!(system.is_activated(&fireball()));
}

#[test]
fn activation_cannot_return_to_cast() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&fireball());
    system.cast_ability(&fireball());
    system.activate(&fireball(), PayloadBag::new());

    let err = system
        .try_set_state(
            &fireball(),
            AbilityState::Cast,
            PayloadBag::new(),
            TransitionFlags::empty(),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), "TRANSITION_GUARD_REJECTED");
    assert!(system.is_activated(&fireball()));
}

#[test]
fn cancelling_into_the_current_state_is_a_noop() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&dash());
    system.cast_ability(&dash());

    assert!(system.cancel(&dash()));
    let events = system.drain_events().len();
    assert!(!system.cancel(&dash()));
    assert!(system.drain_events().is_empty());
    assert!(events > 0);
}

#[test]
fn lifecycle_states_are_never_destinations() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&dash());

    for state in [AbilityState::BeforeBeginPlay, AbilityState::AfterEndPlay] {
        let refused = system.try_set_state(&dash(), state, PayloadBag::new(), TransitionFlags::empty());
        assert!(refused.is_err());
    }
    // dash has no cast phase
    assert!(
        system
            .try_set_state(&dash(), AbilityState::Cast, PayloadBag::new(), TransitionFlags::empty())
            .is_err()
    );
}

#[test]
fn authority_broadcasts_with_increasing_ids() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&dash());
    system.cast_ability(&dash());
    system.cancel(&dash());

    assert_eq!(
        state_broadcasts(&system),
        vec![(AbilityState::Activation, 1), (AbilityState::Cancelled, 2)]
    );
}

struct DeactivateOnActivate;

impl AbilityBehavior for DeactivateOnActivate {
    fn on_activate(&mut self, ctx: &mut AbilityContext<'_>, _payload: &PayloadBag) {
        ctx.deactivate();
    }
}

#[test]
fn deactivating_inside_on_activate_skips_the_activation_broadcast() {
    let mut registry = AbilityRegistry::new();
    registry.register(
        dash(),
        AbilityConfig {
            tick: TickPolicy::WhileActivated,
            ..AbilityConfig::named("Dash")
        },
        || DeactivateOnActivate,
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());

    assert!(system.cast_ability(&dash()));
    assert!(system.is_cancelled(&dash()));
    assert!(!system.is_ticking(&dash()));
    assert_eq!(state_broadcasts(&system), vec![(AbilityState::Cancelled, 2)]);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Target {
    entity: u32,
}

impl Payload for Target {
    const KIND: &'static str = "target";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Charged;

impl Payload for Charged {
    const KIND: &'static str = "charged";
}

/// Records the target it sees before each change and marks the payload.
struct ChargesOnTarget {
    log: Log,
}

impl AbilityBehavior for ChargesOnTarget {
    fn pre_state_change(
        &mut self,
        ctx: &mut AbilityContext<'_>,
        _transition: StateTransition,
        payload: &mut PayloadBag,
    ) {
        let seen = ctx.view().payload().get::<Target>().map(|t| t.entity);
        self.log.lock().unwrap().push(format!("target {seen:?}"));
        if seen.is_some() {
            payload.add(&Charged);
        }
    }

    fn can_activate(&self, _view: &AbilityView<'_>, payload: &PayloadBag) -> bool {
        payload.has::<Charged>()
    }
}

#[test]
fn pre_state_change_sees_and_rewrites_the_payload() {
    let log = Log::default();
    let hook_log = Arc::clone(&log);
    let mut registry = AbilityRegistry::new();
    registry.register(dash(), AbilityConfig::named("Dash"), move || ChargesOnTarget {
        log: Arc::clone(&hook_log),
    });
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());

    assert!(!system.activate(&dash(), PayloadBag::new()));
    assert!(system.activate(&dash(), PayloadBag::with(&Target { entity: 9 })));
    assert_eq!(*log.lock().unwrap(), vec!["target None", "target Some(9)"]);

    let broadcast = system.pending_outbox().find_map(|envelope| match &envelope.message {
        NetMessage::StateBroadcast { payload, .. } => Some(payload.clone()),
        _ => None,
    });
    let payload = broadcast.unwrap();
    assert!(payload.has::<Charged>());
    assert_eq!(payload.get::<Target>(), Some(Target { entity: 9 }));
}

#[test]
fn tick_policy_follows_activation() {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        dash(),
        AbilityConfig {
            tick: TickPolicy::WhileActivated,
            ..AbilityConfig::named("Dash")
        },
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());
    assert!(!system.is_ticking(&dash()));

    system.cast_ability(&dash());
    assert!(system.is_ticking(&dash()));
    system.cancel(&dash());
    assert!(!system.is_ticking(&dash()));
}

#[test]
fn cast_and_activation_ticking_starts_with_the_cast() {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        fireball(),
        AbilityConfig {
            has_cast: true,
            tick: TickPolicy::WhileCastingOrActivated,
            ..AbilityConfig::named("Fireball")
        },
    );
    registry.register_config(
        dash(),
        AbilityConfig {
            tick: TickPolicy::WhileCastingOrActivated,
            ..AbilityConfig::named("Dash")
        },
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_abilities([fireball(), dash()]);

    assert!(system.cast_ability(&fireball()));
    assert!(system.is_ticking(&fireball()));
    assert!(system.activate(&fireball(), PayloadBag::new()));
    assert!(system.is_ticking(&fireball()));
    system.cancel(&fireball());
    assert!(!system.is_ticking(&fireball()));

    // Without a cast there is nothing to carry over.
    assert!(system.cast_ability(&dash()));
    assert!(system.is_activated(&dash()));
    assert!(!system.is_ticking(&dash()));
}

#[test]
fn tag_requirements_gate_activation() {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        dash(),
        AbilityConfig {
            required_tags: TagSet::from(["State.Grounded"]),
            blocked_tags: TagSet::from(["Status.Rooted"]),
            ..AbilityConfig::named("Dash")
        },
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());

    assert!(!system.cast_ability(&dash()));
    system.add_tag(Tag::new("State.Grounded"));
    system.add_tag(Tag::new("Status.Rooted"));
    assert!(!system.cast_ability(&dash()));
    system.remove_tag(&Tag::new("Status.Rooted"));
    assert!(system.cast_ability(&dash()));
}

#[test]
fn interrupt_tags_cancel_with_cooldown() {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        dash(),
        AbilityConfig {
            interrupt: InterruptConfig {
                tags: TagSet::from(["Status.Stun"]),
                ..Default::default()
            },
            cooldown: Some(CooldownPolicy {
                duration: Duration::from_secs(2),
                mode: CooldownMode::OnDeactivation,
                input_waits_for_cooldown: false,
            }),
            ..AbilityConfig::named("Dash")
        },
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());
    system.cast_ability(&dash());

    system.add_tag(Tag::new("Status.Stun"));
    assert!(system.is_cancelled(&dash()));
    assert!(system.is_cooling_down(&dash()));
}

// ============================================================================
// Cooldowns
// ============================================================================

fn cooldown_registry(profile: InputProfile) -> AbilityRegistry {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        dash(),
        AbilityConfig {
            input: profile,
            cooldown: Some(CooldownPolicy {
                duration: Duration::from_secs(1),
                mode: CooldownMode::OnActivation,
                input_waits_for_cooldown: true,
            }),
            ..AbilityConfig::named("Dash")
        },
    );
    registry
}

#[test]
fn cooldown_blocks_until_the_timer_fires() {
    let mut system = standalone(cooldown_registry(InputProfile::None), BuffCatalog::new());
    system.equip_ability(&dash());
    system.cast_ability(&dash());
    system.cancel(&dash());
    assert!(system.is_cooling_down(&dash()));
    assert!(!system.cast_ability(&dash()));

    system.tick(Duration::from_millis(400));
    assert_eq!(system.remaining_cooldown(&dash()), Duration::from_millis(600));
    system.tick(Duration::from_millis(600));
    assert!(!system.is_cooling_down(&dash()));
    assert!(system.cast_ability(&dash()));
}

#[test]
fn held_input_repeats_once_cooldown_finishes() {
    let mut system = standalone(
        cooldown_registry(InputProfile::CastWhileHolding),
        BuffCatalog::new(),
    );
    system.equip_ability(&dash());
    system.press_default_input(&dash());
    assert!(system.is_activated(&dash()));
    system.cancel(&dash());

    system.tick(Duration::from_secs(1));
    assert!(system.is_activated(&dash()));
}

#[test]
fn reset_cooldown_does_not_repeat_held_input() {
    let mut system = standalone(
        cooldown_registry(InputProfile::CastWhileHolding),
        BuffCatalog::new(),
    );
    system.equip_ability(&dash());
    system.press_default_input(&dash());
    system.cancel(&dash());

    assert!(system.reset_cooldown(&dash()));
    assert!(system.is_cancelled(&dash()));
    assert!(!system.reset_cooldown(&dash()));
}

// ============================================================================
// Input
// ============================================================================

#[test]
fn pressing_a_bound_slot_steals_it() {
    let mut registry = AbilityRegistry::new();
    for kind in [dash(), fireball()] {
        registry.register_config(
            kind,
            AbilityConfig {
                input: InputProfile::ActivateWhileHolding,
                ..AbilityConfig::default()
            },
        );
    }
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_abilities([dash(), fireball()]);
    let slot = InputSlot::new("Primary");

    assert!(system.press_input(&dash(), &slot));
    assert!(system.is_activated(&dash()));
    assert!(!system.press_input(&dash(), &slot));

    assert!(system.press_input(&fireball(), &slot));
    assert!(system.is_cancelled(&dash()));
    assert!(system.is_activated(&fireball()));
    assert_eq!(system.pressed_ability(&slot), Some(&fireball()));

    assert!(system.release_input(&slot));
    assert!(system.is_cancelled(&fireball()));
    assert!(!system.is_any_input_pressed());
}

#[test]
fn moving_an_ability_to_another_slot_frees_the_old_one() {
    let mut system = standalone(registry(), BuffCatalog::new());
    system.equip_ability(&fireball());
    let (primary, secondary) = (InputSlot::new("Primary"), InputSlot::new("Secondary"));

    system.press_input(&fireball(), &primary);
    assert!(system.is_casting(&fireball()));
    assert!(system.press_input(&fireball(), &secondary));
    assert!(!system.is_input_pressed(&primary));
    assert!(system.is_casting(&fireball()));

    // release finishes the held cast
    assert!(system.release_input(&secondary));
    assert!(system.is_activated(&fireball()));
}

#[test]
fn toggle_profile_alternates() {
    let mut registry = AbilityRegistry::new();
    registry.register_config(
        dash(),
        AbilityConfig {
            input: InputProfile::ToggleActivationOnPress,
            ..AbilityConfig::default()
        },
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&dash());
    let slot = InputSlot::new("Toggle");

    system.press_input(&dash(), &slot);
    system.release_input(&slot);
    assert!(system.is_activated(&dash()));
    system.press_input(&dash(), &slot);
    assert!(system.is_cancelled(&dash()));
}

struct CancelsOnInputCancel;

impl AbilityBehavior for CancelsOnInputCancel {
    fn on_cancel_input(&mut self, ctx: &mut AbilityContext<'_>) -> bool {
        ctx.cancel(false);
        true
    }
}

#[test]
fn cancel_input_asks_the_ability() {
    let mut registry = AbilityRegistry::new();
    registry.register(
        fireball(),
        AbilityConfig {
            has_cast: true,
            ..AbilityConfig::default()
        },
        || CancelsOnInputCancel,
    );
    let mut system = standalone(registry, BuffCatalog::new());
    system.equip_ability(&fireball());
    let slot = InputSlot::new("Primary");
    system.press_input(&fireball(), &slot);

    let result = system.cancel_input(&slot);
    assert!(result.input_cancelled && result.ability_cancelled);
    assert!(system.is_cancelled(&fireball()));
    assert_eq!(system.cancel_input(&slot), CancelInputResult::default());
}

// ============================================================================
// Buffs
// ============================================================================

#[test]
fn stacking_reverts_and_reapplies_per_change() {
    let log = Log::default();
    let bleed = BuffDef::new("bleed", "Dot")
        .stackable()
        .applying_tags(["Status.Bleeding"])
        .with_effects(Recorder {
            log: Arc::clone(&log),
        })
        .into_ref();
    let mut system = standalone(registry(), BuffCatalog::new());

    assert_eq!(system.buff_count(&bleed.id), 0);
    system.apply_buff(BuffRef::clone(&bleed), 1);
    assert_eq!(system.buff_count(&bleed.id), 1);
    system.apply_buff(BuffRef::clone(&bleed), 1);
    assert_eq!(system.buff_count(&bleed.id), 2);
    system.remove_buff(BuffRef::clone(&bleed), 1);
    assert_eq!(system.buff_count(&bleed.id), 1);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["apply 1", "revert 1", "apply 2", "revert 2", "apply 1"]
    );

    // The last application evicts the entry.
    system.drain_events();
    assert!(system.remove_buff(BuffRef::clone(&bleed), 1));
    assert_eq!(system.buff_count(&bleed.id), 0);
    assert!(!system.has_buff(&bleed.id));
    assert!(!system.has_buff_of_class(&bleed.class));
    assert!(!system.has_tag(&Tag::new("Status.Bleeding")));
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("revert 1"));
    assert!(system.drain_events().iter().any(|event| matches!(
        event,
        SystemEvent::BuffsRemoved(removed) if removed.len() == 1 && removed[0].count == 1
    )));
    assert!(system.check_ledger().is_ok());
}

#[test]
fn unique_class_refuses_or_replaces() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let fire = BuffDef::new("fire_stance", "Stance").unique(false).into_ref();
    let ice = BuffDef::new("ice_stance", "Stance").unique(false).into_ref();
    assert!(system.apply_buff(BuffRef::clone(&fire), 1));
    assert!(!system.apply_buff(BuffRef::clone(&ice), 1));

    let storm = BuffDef::new("storm_stance", "Stance").unique(true).into_ref();
    assert!(system.apply_buff(BuffRef::clone(&storm), 1));
    assert!(!system.has_buff(&fire.id));
    assert!(system.has_buff(&storm.id));
    assert_eq!(system.buffs_of_class(&storm.class).len(), 1);
    assert!(system.check_ledger().is_ok());
}

#[test]
fn replacing_uniques_leave_only_the_latest() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let fire = BuffDef::new("fire_stance", "Stance").unique(true).into_ref();
    let ice = BuffDef::new("ice_stance", "Stance").unique(true).into_ref();

    assert!(system.apply_buff(BuffRef::clone(&fire), 1));
    assert!(system.apply_buff(BuffRef::clone(&ice), 1));
    assert!(!system.has_buff(&fire.id));
    assert!(system.has_buff(&ice.id));
    assert_eq!(system.buffs_of_class(&ice.class).len(), 1);
    assert_eq!(system.num_buffs(), 1);
}

#[test]
fn active_unique_refuses_a_second_application() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let rage = BuffDef::new("rage", "Rage").stackable().unique(false).into_ref();

    assert!(system.apply_buff(BuffRef::clone(&rage), 1));
    assert!(!system.apply_buff(BuffRef::clone(&rage), 1));
    assert_eq!(system.buff_count(&rage.id), 1);
}

#[test]
fn replacing_unique_restarts_at_the_new_count() {
    let log = Log::default();
    let rage = BuffDef::new("rage", "Rage")
        .stackable()
        .unique(true)
        .with_effects(Recorder {
            log: Arc::clone(&log),
        })
        .into_ref();
    let mut system = standalone(registry(), BuffCatalog::new());

    assert!(system.apply_buff(BuffRef::clone(&rage), 2));
    system.drain_events();
    assert!(system.apply_buff(BuffRef::clone(&rage), 3));

    assert_eq!(system.buff_count(&rage.id), 3);
    assert_eq!(system.buffs_of_class(&rage.class).len(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["apply 2", "revert 2", "apply 3"]);
    let events = system.drain_events();
    assert!(matches!(events.first(), Some(SystemEvent::BuffsRemoved(_))));
    assert!(matches!(events.last(), Some(SystemEvent::BuffsApplied(_))));
    assert!(system.check_ledger().is_ok());
}

#[test]
fn removal_is_idempotent() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let haste = BuffDef::new("haste", "Speed")
        .applying_tags(["Status.Hasted"])
        .into_ref();

    assert!(!system.remove_buff(BuffRef::clone(&haste), 1));
    system.apply_buff(BuffRef::clone(&haste), 1);
    assert!(system.has_tag(&Tag::new("Status.Hasted")));
    assert!(system.remove_buff(BuffRef::clone(&haste), 1));
    assert!(!system.remove_buff(BuffRef::clone(&haste), 1));
    assert!(!system.has_tag(&Tag::new("Status.Hasted")));
    assert_eq!(system.num_buffs(), 0);
}

#[test]
fn lifetime_expiry_removes_through_the_normal_path() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let shield = BuffDef::new("shield", "Shield")
        .with_lifetime(Duration::from_secs(2))
        .applying_tags(["Status.Shielded"])
        .into_ref();
    system.apply_buff(BuffRef::clone(&shield), 1);
    system.drain_events();

    system.tick(Duration::from_secs(1));
    assert_eq!(system.buff_remaining_lifetime(&shield.id), Some(Duration::from_secs(1)));
    system.tick(Duration::from_secs(1));
    assert!(!system.has_buff(&shield.id));
    assert!(!system.has_tag(&Tag::new("Status.Shielded")));
    assert!(
        system
            .drain_events()
            .iter()
            .any(|event| matches!(event, SystemEvent::BuffsRemoved(removed) if removed.len() == 1))
    );
}

#[test]
fn remove_by_tag_matches_hierarchically_unless_exact() {
    let mut system = standalone(registry(), BuffCatalog::new());
    let stun = BuffDef::new("stun", "Control")
        .with_tags(["Status.Debuff.Stun"])
        .into_ref();
    system.apply_buff(BuffRef::clone(&stun), 1);

    assert!(system.remove_buffs_by_tag(&Tag::new("Status.Debuff"), true).is_empty());
    assert_eq!(system.remove_buffs_by_tag(&Tag::new("Status.Debuff"), false).len(), 1);
    assert!(!system.has_buff(&stun.id));
}

#[test]
fn teardown_reverts_buffs_and_unequips() {
    let haste = BuffDef::new("haste", "Speed")
        .applying_tags(["Status.Hasted"])
        .into_ref();
    let mut system = AbilitySystem::builder(PeerId(0), NetRole::STANDALONE)
        .registry(Arc::new(registry()))
        .initial_abilities([dash()])
        .initial_buffs([BuffCount::single(BuffRef::clone(&haste))])
        .build();
    system.initialize();
    assert!(system.is_equipped(&dash()));
    assert!(system.has_tag(&Tag::new("Status.Hasted")));

    system.teardown();
    assert!(system.equipped_abilities().is_empty());
    assert_eq!(system.num_buffs(), 0);
    assert!(system.tags().is_empty());
}

struct TagChain {
    next: u32,
}

impl AbilityBehavior for TagChain {
    fn on_tags_changed(&mut self, ctx: &mut AbilityContext<'_>) {
        self.next += 1;
        ctx.add_tags(TagSet::from_iter([Tag::owned(format!("Chain.{}", self.next))]));
    }
}

#[test]
fn hook_chains_are_bounded() {
    let mut registry = AbilityRegistry::new();
    registry.register(dash(), AbilityConfig::default(), || TagChain { next: 0 });
    let mut system = AbilitySystem::builder(PeerId(0), NetRole::STANDALONE)
        .registry(Arc::new(registry))
        .config(CoreConfig {
            max_hook_depth: 4,
            ..CoreConfig::default()
        })
        .build();
    system.initialize();
    system.equip_ability(&dash());

    system.add_tag(Tag::new("Start"));
    assert_eq!(system.tags().len(), 5);
}

// ============================================================================
// Replication
// ============================================================================

const CLIENT: PeerId = PeerId(1);

fn authority_and_client(
    registry: AbilityRegistry,
    catalog: BuffCatalog,
) -> (AbilitySystem, AbilitySystem) {
    let registry = Arc::new(registry);
    let catalog = Arc::new(catalog);
    let mut authority = AbilitySystem::builder(PeerId(0), NetRole::AUTHORITY)
        .owner(CLIENT)
        .registry(Arc::clone(&registry))
        .catalog(Arc::clone(&catalog))
        .initial_abilities([dash(), fireball()])
        .build();
    let mut client = AbilitySystem::builder(CLIENT, NetRole::OWNING_CLIENT)
        .registry(registry)
        .catalog(catalog)
        .build();
    authority.initialize();
    client.initialize();
    pump(&mut authority, &mut client);
    (authority, client)
}

/// Delivers queued traffic both ways until both outboxes are empty.
fn pump(authority: &mut AbilitySystem, client: &mut AbilitySystem) {
    loop {
        let down = authority.drain_outbox();
        let up = client.drain_outbox();
        if down.is_empty() && up.is_empty() {
            break;
        }
        for envelope in down {
            if matches!(envelope.route, Route::AllPeers) || envelope.route == Route::Peer(CLIENT) {
                client.receive(authority.peer(), envelope.message);
            }
        }
        for envelope in up {
            if envelope.route == Route::Authority {
                authority.receive(CLIENT, envelope.message);
            }
        }
    }
}

#[test]
fn mirrors_follow_equips() {
    let (_, client) = authority_and_client(registry(), BuffCatalog::new());
    assert!(client.is_equipped(&dash()));
    assert_eq!(client.ability_state(&fireball()), Some(AbilityState::JustEquipped));
}

#[test]
fn confirmed_prediction_adopts_the_request_id() {
    let (mut authority, mut client) = authority_and_client(registry(), BuffCatalog::new());

    assert!(client.cast_ability(&dash()));
    assert!(client.is_activated(&dash()));
    assert!(!authority.is_activated(&dash()));
    pump(&mut authority, &mut client);

    assert!(authority.is_activated(&dash()));
    let (a, c) = (
        authority.ability_info(&dash()).unwrap(),
        client.ability_info(&dash()).unwrap(),
    );
    assert_eq!(a.current_state_id, 1);
    assert_eq!(c.current_state_id, 1);
    assert_eq!(c.last_requested_id, 1);

    client.cancel(&dash());
    assert_eq!(client.ability_info(&dash()).unwrap().last_requested_id, 2);
}

#[test]
fn stale_request_is_discarded_without_reply() {
    let (mut authority, _) = authority_and_client(registry(), BuffCatalog::new());
    authority.cast_ability(&dash());
    authority.cancel(&dash());
    authority.cast_ability(&dash());
    assert_eq!(authority.ability_info(&dash()).unwrap().current_state_id, 3);
    authority.drain_outbox();

    authority.receive(
        CLIENT,
        NetMessage::StateRequest {
            ability: dash(),
            transition: StateTransition::new(AbilityState::Activation, AbilityState::Cancelled),
            payload: PayloadBag::new(),
            request_id: 2,
        },
    );
    assert!(authority.is_activated(&dash()));
    assert_eq!(authority.pending_outbox().count(), 0);
}

#[test]
fn zero_request_id_fails_validation() {
    let (mut authority, _) = authority_and_client(registry(), BuffCatalog::new());
    let result = authority.try_receive(
        CLIENT,
        NetMessage::StateRequest {
            ability: dash(),
            transition: StateTransition::new(AbilityState::JustEquipped, AbilityState::Activation),
            payload: PayloadBag::new(),
            request_id: 0,
        },
    );
    assert_eq!(result, Err(ProtocolError::InvalidRequestId));
    assert!(!authority.is_activated(&dash()));
}

#[test]
fn stale_rejection_is_ignored() {
    let (_, mut client) = authority_and_client(registry(), BuffCatalog::new());
    client.receive(
        PeerId(0),
        NetMessage::StateBroadcast {
            ability: dash(),
            transition: StateTransition::new(AbilityState::JustEquipped, AbilityState::Activation),
            payload: PayloadBag::new(),
            state_id: 3,
        },
    );
    client.receive(
        PeerId(0),
        NetMessage::StateRejected {
            ability: dash(),
            transition: StateTransition::new(AbilityState::Activation, AbilityState::Cancelled)
                .with_flags(TransitionFlags::PREDICTION_FAILED),
            request_id: 2,
        },
    );
    assert!(client.is_activated(&dash()));
}

#[test]
fn guard_failure_on_the_authority_rolls_the_client_back() {
    let mut registry = registry();
    registry.register_config(
        dash(),
        AbilityConfig {
            blocked_tags: TagSet::from(["Status.Silenced"]),
            ..AbilityConfig::named("Dash")
        },
    );
    let (mut authority, mut client) = authority_and_client(registry, BuffCatalog::new());

    // The client predicts before it learns about the silence.
    authority.add_tag(Tag::new("Status.Silenced"));
    assert!(client.cast_ability(&dash()));
    assert!(client.is_activated(&dash()));
    client.drain_events();

    pump(&mut authority, &mut client);
    assert_eq!(authority.ability_state(&dash()), Some(AbilityState::JustEquipped));
    assert_eq!(client.ability_state(&dash()), Some(AbilityState::JustEquipped));
    assert!(client.drain_events().iter().any(|event| matches!(
        event,
        SystemEvent::StateChanged { transition, .. } if transition.prediction_failed()
    )));
}

/// Activation needs the caster to be focused.
struct NeedsFocus;

impl AbilityBehavior for NeedsFocus {
    fn can_activate(&self, view: &AbilityView<'_>, _payload: &PayloadBag) -> bool {
        view.is_casting() && !view.has_tag(&Tag::new("Status.Distracted"))
    }
}

#[test]
fn failed_activation_resets_the_cooldown_and_resumes_the_cast() {
    let mut registry = registry();
    registry.register(
        fireball(),
        AbilityConfig {
            has_cast: true,
            resume_cast_on_failed_prediction: true,
            cooldown: Some(CooldownPolicy {
                duration: Duration::from_secs(2),
                mode: CooldownMode::OnActivation,
                input_waits_for_cooldown: false,
            }),
            ..AbilityConfig::named("Fireball")
        },
        || NeedsFocus,
    );
    let (mut authority, mut client) = authority_and_client(registry, BuffCatalog::new());

    assert!(client.cast_ability(&fireball()));
    pump(&mut authority, &mut client);
    assert!(authority.is_casting(&fireball()));

    // The client activates before it learns about the distraction.
    authority.add_tag(Tag::new("Status.Distracted"));
    assert!(client.activate(&fireball(), PayloadBag::new()));
    assert!(client.is_activated(&fireball()));
    assert!(client.is_cooling_down(&fireball()));
    client.drain_events();

    pump(&mut authority, &mut client);
    assert_eq!(authority.ability_state(&fireball()), Some(AbilityState::Cast));
    assert_eq!(client.ability_state(&fireball()), Some(AbilityState::Cast));
    assert!(!authority.is_cooling_down(&fireball()));
    assert!(!client.is_cooling_down(&fireball()));
    assert!(client.drain_events().iter().any(|event| matches!(
        event,
        SystemEvent::CooldownReady { reason: CooldownReadyReason::Reset, .. }
    )));
}

#[test]
fn buffs_mirror_without_effects() {
    let log = Log::default();
    let mut catalog = BuffCatalog::new();
    let bleed = catalog.insert(
        BuffDef::new("bleed", "Dot")
            .stackable()
            .applying_tags(["Status.Bleeding"])
            .with_effects(Recorder {
                log: Arc::clone(&log),
            }),
    );
    let (mut authority, mut client) = authority_and_client(registry(), catalog);

    authority.apply_buff(BuffRef::clone(&bleed), 3);
    authority.remove_buff(BuffRef::clone(&bleed), 1);
    pump(&mut authority, &mut client);

    assert_eq!(client.buff_count(&bleed.id), 2);
    assert!(client.has_tag(&Tag::new("Status.Bleeding")));
    assert_eq!(log.lock().unwrap().len(), 3);
    assert!(client.check_ledger().is_ok());
}

#[test]
fn mirrors_cannot_mutate_buffs() {
    let mut catalog = BuffCatalog::new();
    let haste = catalog.insert(BuffDef::new("haste", "Speed"));
    let (_, mut client) = authority_and_client(registry(), catalog);
    assert!(!client.apply_buff(haste, 1));
    assert_eq!(client.num_buffs(), 0);
}
