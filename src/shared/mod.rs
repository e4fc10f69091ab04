//! Messages shared between the web layer and native plugins
//!
//! The web layer sends a `BridgeCall` naming a plugin and method; the bridge
//! answers with exactly one `BridgeResponse` carrying the same call id.

pub mod messages;

pub use messages::{BridgeCall, BridgeError, BridgeResponse};
