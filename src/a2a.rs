//! A2A protocol surface: JSON-RPC envelopes, messages and tasks, and the agent card.

pub mod card;
pub mod jsonrpc;
pub mod message;

pub use card::*;
pub use jsonrpc::*;
pub use message::*;
