//! qrs-proto: length-prefixed wire protocol + blocking client for the
//! remote multi-agent flight simulator.

pub mod client;
pub mod codec;
pub mod frame;
pub mod protocol;

pub use client::{ClientError, ClientOptions, SimClient, StateReply, TaskInfo};
pub use codec::{decode_message, encode_message, DecodeError};
pub use frame::{read_frame, write_frame, FrameError};
pub use protocol::{Message, MsgKind, StepType};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod client_tests;
