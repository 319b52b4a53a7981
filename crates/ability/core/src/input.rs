//! Input routing types.

use serde::{Deserialize, Serialize};

use crate::name::name_type;

name_type! {
    /// Named input slot (`"Primary"`, `"Dash"`, ...). Each slot drives at most one ability.
    InputSlot
}

/// What pressing and releasing an ability's input does.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum InputProfile {
    /// Press starts the cast; release finishes it into activation (or cancels).
    #[default]
    CastWhileHolding,
    /// Press activates.
    ActivateOnPress,
    /// Press activates; release deactivates.
    ActivateWhileHolding,
    /// Press activates when idle and deactivates when active.
    ToggleActivationOnPress,
    /// Input is only forwarded to the ability's hooks.
    None,
}

/// Outcome of `AbilitySystem::cancel_input`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CancelInputResult {
    /// The slot was bound and has been cleared.
    pub input_cancelled: bool,
    /// The bound ability reported that it cancelled itself.
    pub ability_cancelled: bool,
}
