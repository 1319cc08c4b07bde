//! ISO/IEEE 11073-20601 manager host
//!
//! A [`Manager`] accepts agent connections, runs one protocol engine per
//! connection and keeps a registry of the live ones. [`ManagerListener`]
//! feeds it TCP connections.

pub mod listener;
pub mod server;

pub use listener::ManagerListener;
pub use server::{Manager, ManagerConfig};
