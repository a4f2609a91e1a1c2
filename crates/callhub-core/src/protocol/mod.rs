//! WebSocket wire protocol shared by the signaling server and clients.
//!
//! Every frame is a JSON object tagged by `type`. Inbound frames are
//! [`ClientRequest`]s, outbound frames are [`ServerEvent`]s. The sender of
//! a request is always the user bound to the connection, never a field of
//! the payload.

pub mod event;
pub mod request;
pub mod view;

pub use event::ServerEvent;
pub use request::{ClientRequest, InitiateCallRequest};
pub use view::{CallSummary, CallView, CallerProfile};

/// Serialize an outbound event to a JSON text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Deserialize an inbound request from a JSON text frame.
pub fn decode_request(text: &str) -> Result<ClientRequest, serde_json::Error> {
    serde_json::from_str(text)
}

/// Serialize a request on the client side.
pub fn encode_request(request: &ClientRequest) -> Result<String, serde_json::Error> {
    serde_json::to_string(request)
}

/// Deserialize an event on the client side.
pub fn decode_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}
