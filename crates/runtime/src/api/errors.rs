//! Unified error types surfaced by the runtime API.
//!
//! Wraps configuration, lookup and protocol failures so the CLI can bubble
//! them up with consistent context.
use ability_core::{AbilityKind, BuffId, PeerId, ProtocolError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} is not part of the simulation")]
    UnknownPeer(PeerId),

    #[error("ability {0} is not registered")]
    UnknownAbility(AbilityKind),

    #[error("buff {0} is not in the catalog")]
    UnknownBuff(BuffId),

    #[error("replication message failed to round-trip")]
    Protocol(#[from] ProtocolError),

    #[error("failed to install tracing subscriber: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
