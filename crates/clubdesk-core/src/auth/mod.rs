//! Authentication state for the logged-in student.
//!
//! This module provides:
//! - `SessionStore`: token + identity pair, persisted as two files
//! - `CredentialStore`: optional remembered password via the OS keyring
//!
//! Tokens are issued by the backend after it checks the HEMIS credentials;
//! this crate only stores and attaches them.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{SessionData, SessionStore};
