//! Core types and utilities for ISO/IEEE 11073-20601
//!
//! This crate provides the error type, protocol constants and nomenclature
//! codes used throughout the personal health device implementation.

pub mod error;
pub mod nomenclature;
pub mod protocol;

pub use error::{DecodeErrorKind, PhdError, PhdResult};
pub use protocol::{AbortReason, AssociateResult, ConfigResult, Role};
