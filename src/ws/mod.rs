//! WebSocket transport for viewers

pub mod handler;
pub mod protocol;

pub use handler::ws_handler;
