//! Command implementations for xtask
//!
//! Each command is a separate module that implements its own CLI args and execution logic.

mod decode_message;
mod simulate;

pub use decode_message::DecodeMessage;
pub use simulate::Simulate;
