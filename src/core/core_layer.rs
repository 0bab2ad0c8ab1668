// The core module contains the protocol business logic.
// Notice how nothing in here imports axum or reqwest - the session registry
// and tool dispatcher work against channels and traits so they could sit
// behind any transport.

#[path = "session/session_registry.rs"]
pub mod session;

#[path = "tools/tool_service.rs"]
pub mod tools;
