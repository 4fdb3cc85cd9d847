//! WebSocket transport to the remote terminal bridge

mod client;
mod reader;

pub use client::{connect, is_closed, Outbound, WsReceiver, WsSender};
pub use reader::{read_loop, ReaderTask};
