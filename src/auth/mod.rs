//! Authentication: credential storage and session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: injectable storage for the bearer token and setup key
//! - `SessionManager`: request authorization, login/2FA/logout flows, and
//!   reactive session-invalidation handling with an auto-logout broadcast
//!
//! Session validity is never tracked client-side; a 401/403 from the server
//! is the only signal that a token has expired.

pub mod session;
pub mod store;

pub use session::{AuthScheme, Credentials, LoginOutcome, SessionManager, TwoFactorPayload};
pub use store::{CredentialStore, FileStore, KeyringStore, MemoryStore, Slot};
