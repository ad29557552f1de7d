//! Protocol module containing the message types, the JSON codec, and command
//! identity generation.

pub mod codec;
pub mod id;
pub mod messages;

pub use codec::{decode, encode, try_decode, DecodeError, Message};
pub use id::{new_command_id, now_millis};
pub use messages::*;
