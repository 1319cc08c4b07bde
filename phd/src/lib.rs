//! phd - Rust implementation of the ISO/IEEE 11073-20601 protocol
//!
//! Agent and manager sides of the personal health device exchange protocol:
//! association, configuration, measurement reporting and release.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `phd-core`: Error type, protocol constants and nomenclature codes
//! - `phd-asn1`: MDER encoding/decoding of every APDU
//! - `phd-transport`: Transport plugin interface, TCP and in-memory streams
//! - `phd-application`: Protocol engine (state machine, services, configurations)
//! - `phd-manager`: Manager host
//! - `phd-agent`: Agent host
//!
//! # Usage
//!
//! ```no_run
//! use phd::agent::AgentBuilder;
//! use phd::application::PulseOximeter;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut agent = AgentBuilder::new(Arc::new(PulseOximeter::new(0x0190)))
//!     .connect()
//!     .await?;
//! agent.associate().await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use phd_core::{AbortReason, AssociateResult, ConfigResult, PhdError, PhdResult, Role};
pub use phd_core::{nomenclature, protocol};

// Re-export codec
pub mod asn1 {
    pub use phd_asn1::*;
}

// Re-export transports
pub mod transport {
    pub use phd_transport::*;
}

// Re-export protocol engine
pub mod application {
    pub use phd_application::*;
}

// Re-export manager host
pub mod manager {
    pub use phd_manager::*;
}

// Re-export agent host
pub mod agent {
    pub use phd_agent::*;
}
