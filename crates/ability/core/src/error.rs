//! Common error infrastructure for ability-core.
//!
//! The gameplay API keeps a boolean/no-op contract: refused requests return
//! `false` and leave no side effects behind. The typed errors in this module
//! describe *why* something was refused; they surface through the `try_*`
//! variants on [`AbilitySystem`](crate::AbilitySystem) and through the
//! diagnostic logs.
//!
//! # Design Principles
//!
//! - **Type Safety**: Each concern has its own error type with specific variants
//! - **Severity Classification**: Errors are categorized for logging priority
//! - **Nothing is fatal**: Consistency violations are logged and asserted in
//!   debug builds, never raised as panics in release builds

use crate::ability::{AbilityKind, AbilityState};
use crate::buff::{BuffClass, BuffId};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: Temporary conditions that may succeed later (cooldown, tags)
/// - **Validation**: Invalid input that should be rejected without retry
/// - **Internal**: Unexpected state inconsistencies that require investigation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// Can succeed on retry once the world changes.
    Recoverable,

    /// Invalid input, should not retry without changes.
    Validation,

    /// Unexpected state inconsistency. These indicate bugs.
    Internal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Common trait for all ability-core errors.
///
/// - All error enums implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait CoreError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Default implementation uses the error type name.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

// ============================================================================
// Transition errors
// ============================================================================

/// Reason a state change was refused by an ability.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("ability {0} is not equipped")]
    NotEquipped(AbilityKind),

    #[error("peer is neither the authority nor locally controlling the entity")]
    NotAuthorized,

    #[error("ability {0} has not begun play")]
    NotBegunPlay(AbilityKind),

    #[error("ability {ability} is already in state {state}")]
    SameState {
        ability: AbilityKind,
        state: AbilityState,
    },

    #[error("state {state} is forbidden for ability {ability}")]
    Forbidden {
        ability: AbilityKind,
        state: AbilityState,
    },

    #[error("ability {ability} refused {origin} -> {destination}")]
    GuardRejected {
        ability: AbilityKind,
        origin: AbilityState,
        destination: AbilityState,
        reason: GuardFailure,
    },
}

/// Which guard check failed inside `check_transition`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum GuardFailure {
    /// `Activation -> Cast` is never allowed.
    ActivationToCast,
    CoolingDown,
    MissingRequiredTags,
    BlockedByTags,
    CanCast,
    CanActivate,
}

impl CoreError for TransitionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotEquipped(_) | Self::NotAuthorized => ErrorSeverity::Validation,
            Self::NotBegunPlay(_) | Self::SameState { .. } | Self::Forbidden { .. } => {
                ErrorSeverity::Validation
            }
            Self::GuardRejected { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotEquipped(_) => "TRANSITION_NOT_EQUIPPED",
            Self::NotAuthorized => "TRANSITION_NOT_AUTHORIZED",
            Self::NotBegunPlay(_) => "TRANSITION_NOT_BEGUN_PLAY",
            Self::SameState { .. } => "TRANSITION_SAME_STATE",
            Self::Forbidden { .. } => "TRANSITION_FORBIDDEN",
            Self::GuardRejected { .. } => "TRANSITION_GUARD_REJECTED",
        }
    }
}

// ============================================================================
// Payload errors
// ============================================================================

/// Failure to encode or decode a payload entry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to encode payload `{kind}`: {message}")]
    Encode { kind: String, message: String },

    #[error("failed to decode payload `{kind}`: {message}")]
    Decode { kind: String, message: String },

    #[error("payload `{kind}` appears more than once")]
    Duplicate { kind: String },
}

impl CoreError for PayloadError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "PAYLOAD_ENCODE",
            Self::Decode { .. } => "PAYLOAD_DECODE",
            Self::Duplicate { .. } => "PAYLOAD_DUPLICATE",
        }
    }
}

// ============================================================================
// Protocol errors
// ============================================================================

/// Inbound message that could not be applied on this peer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message references unknown ability {0}")]
    UnknownAbility(AbilityKind),

    #[error("ability {0} is not registered")]
    UnregisteredAbility(AbilityKind),

    #[error("message references unknown buff {0}")]
    UnknownBuff(BuffId),

    #[error("state request carries invalid id 0")]
    InvalidRequestId,

    #[error("message codec failure: {0}")]
    Codec(String),
}

impl CoreError for ProtocolError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownAbility(_) | Self::UnknownBuff(_) => ErrorSeverity::Recoverable,
            Self::UnregisteredAbility(_) | Self::InvalidRequestId | Self::Codec(_) => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAbility(_) => "PROTOCOL_UNKNOWN_ABILITY",
            Self::UnregisteredAbility(_) => "PROTOCOL_UNREGISTERED_ABILITY",
            Self::UnknownBuff(_) => "PROTOCOL_UNKNOWN_BUFF",
            Self::InvalidRequestId => "PROTOCOL_INVALID_REQUEST_ID",
            Self::Codec(_) => "PROTOCOL_CODEC",
        }
    }
}

// ============================================================================
// Ledger errors
// ============================================================================

/// Divergence between the buff ledger and its class index.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("buff {buff} is active but missing from class {class}")]
    MissingFromClass { buff: BuffId, class: BuffClass },

    #[error("class {class} indexes buff {buff} which is not active")]
    DanglingClassEntry { buff: BuffId, class: BuffClass },

    #[error("buff {0} is active with a zero count")]
    ZeroCount(BuffId),
}

impl CoreError for LedgerError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFromClass { .. } => "LEDGER_MISSING_FROM_CLASS",
            Self::DanglingClassEntry { .. } => "LEDGER_DANGLING_CLASS_ENTRY",
            Self::ZeroCount(_) => "LEDGER_ZERO_COUNT",
        }
    }
}
