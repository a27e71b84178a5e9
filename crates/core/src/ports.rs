//! Infrastructure port interfaces
//!
//! These traits abstract external dependencies (keyed credential storage,
//! outbound chat notification) so business flows can be exercised with
//! in-memory doubles.

use async_trait::async_trait;
use dakoku_domain::Result;

/// Keyed string storage holding the credential record.
///
/// The backing service guarantees atomicity per individual key write only;
/// a multi-key update is not transactional across keys. Callers must treat
/// an absent key as a legitimate state.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, overwriting any previous one.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Outbound notification channel for operational messages
/// (scheduled-refresh failures, health probes).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a plain-text message to the configured destination.
    async fn notify(&self, text: &str) -> Result<()>;
}
