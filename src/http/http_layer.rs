// HTTP transport layer - the SSE handshake, the side request channel, and the
// JSON-RPC framing in between. This is the only module that knows the proxy
// speaks MCP over HTTP; the core underneath just sees channels and values.

#[path = "protocol.rs"]
pub mod protocol;

#[path = "sse.rs"]
pub mod sse;

#[path = "messages.rs"]
pub mod messages;

#[path = "routes.rs"]
pub mod routes;
