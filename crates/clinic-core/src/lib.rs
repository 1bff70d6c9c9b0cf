//! # clinic-core
//!
//! Core types shared across the clinic local-first sync crates.
//!
//! - Authenticated user identity and the credential handed to the sync connector
//! - The reactive connection status published by the sync connector
//! - The per-user profile entity provisioned on first login
//! - ID prefix constants

pub mod entities;
pub mod identity;
pub mod ids;
pub mod status;

pub use entities::Profile;
pub use identity::{AuthUser, Credential};
pub use status::ConnectionStatus;
