//! Transport layer for ISO/IEEE 11073-20601
//!
//! This crate provides the synchronous plugin interface the protocol engine
//! drives, and an async framed stream abstraction with a TCP implementation.

pub mod memory;
pub mod plugin;
pub mod stream;
pub mod tcp;

pub use memory::{MemoryStream, memory_pair};
pub use plugin::{TimerHandle, TransportPlugin};
pub use stream::ApduStream;
pub use tcp::{TcpSettings, TcpTransport};
