//! Credential store implementations
//!
//! The store interface is a narrow keyed get/put (see
//! [`dakoku_core::CredentialStore`]). Key names are fixed by the
//! integration's storage contract.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use dakoku_core::CredentialStore;
use dakoku_domain::{DakokuError, Result};
use tokio::sync::{Mutex, RwLock};

/// Bearer token for downstream API calls.
pub const ACCESS_TOKEN_KEY: &str = "freee_access_token";
/// Token used to mint a new access token.
pub const REFRESH_TOKEN_KEY: &str = "freee_refresh_token";
/// Absolute access-token expiry, string-encoded epoch millis.
pub const TOKEN_EXPIRES_AT_KEY: &str = "freee_token_expires_at";
/// Last refresh time, string-encoded epoch millis.
pub const LAST_REFRESH_KEY: &str = "freee_last_refresh";

/// File-backed credential store.
///
/// The whole key map is persisted as one JSON document per `put`, so a
/// single write is atomic at the file level. A crash between the puts of a
/// multi-key update can still leave a prefix of the update visible; readers
/// must tolerate that (the token manager treats it as staleness and
/// re-refreshes).
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => serde_json::from_str(&data).map_err(|err| {
                DakokuError::Store(format!(
                    "corrupt credential file {}: {err}",
                    self.path.display()
                ))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(DakokuError::Store(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    DakokuError::Store(format!("failed to create {}: {err}", parent.display()))
                })?;
            }
        }

        let data = serde_json::to_string_pretty(map)
            .map_err(|err| DakokuError::Store(format!("failed to encode credentials: {err}")))?;

        tokio::fs::write(&self.path, &data).await.map_err(|err| {
            DakokuError::Store(format!("failed to write {}: {err}", self.path.display()))
        })?;

        // Tokens on disk: owner-only access on unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|err| {
                    DakokuError::Store(format!(
                        "failed to set permissions on {}: {err}",
                        self.path.display()
                    ))
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.remove(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }
}

/// In-memory credential store.
///
/// Used by tests and by ephemeral deployments that accept re-seeding on
/// restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.map.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
