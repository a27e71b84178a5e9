//! Credential lifecycle management
//!
//! The persisted access/refresh token pair for the freee HR integration:
//! storage backends, and the token manager that owns refresh decisions.

mod manager;
mod store;

pub use manager::{
    CredentialError, TokenManager, DEFAULT_SEED_EXPIRES_IN_SECS, PROACTIVE_THRESHOLD_MINUTES,
};
pub use store::{
    FileCredentialStore, MemoryCredentialStore, ACCESS_TOKEN_KEY, LAST_REFRESH_KEY,
    REFRESH_TOKEN_KEY, TOKEN_EXPIRES_AT_KEY,
};
