//! # Dakoku Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Attendance keyword detection and employee resolution rules
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `dakoku-domain`
//! - No HTTP, filesystem, or clock access
//! - All external dependencies via traits

pub mod attendance;
pub mod ports;

pub use attendance::keywords::detect_action;
pub use attendance::resolver::{resolve_employee, ResolutionContext, ResolvedEmployee};
pub use ports::{CredentialStore, Notifier};
