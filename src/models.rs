//! The objects passed between the caller, the connector, and the plugins.
//!
//! Two related formats meet here: the wire messages/tools sent to the chat
//! completion endpoint, and the tool calls handed to plugins. Wire payloads
//! are always converted to and from these internal structs at the edges
//! (`request` and `response`); the internal models are not an exact match
//! for either format.

pub mod content;
pub mod message;
pub mod role;
pub mod tool;
