//! Configuration structures
//!
//! Plain data loaded by `dakoku-infra`'s config loader from environment
//! variables or a config file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub freee: FreeeConfig,
    pub slack: SlackConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// freee HR API and identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeeConfig {
    /// OAuth client id of the freee app.
    pub client_id: String,
    /// OAuth client secret of the freee app.
    pub client_secret: String,
    /// HR API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Token endpoint of the identity provider.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Statically configured access token; degraded-mode fallback used only
    /// when the credential store has no record.
    #[serde(default)]
    pub fallback_access_token: Option<String>,
    /// Statically configured refresh token, same fallback semantics.
    #[serde(default)]
    pub fallback_refresh_token: Option<String>,
}

fn default_api_base_url() -> String {
    "https://api.freee.co.jp/hr/api/v1".to_string()
}

fn default_token_url() -> String {
    "https://accounts.secure.freee.co.jp/public_api/token".to_string()
}

/// Slack workspace settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token used for chat.postMessage and users.info.
    pub bot_token: String,
    /// Signing secret for webhook verification. When absent, verification
    /// is skipped with a warning.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Channel the relay listens on and posts notifications to.
    pub target_channel: String,
    /// Slack Web API base URL.
    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,
    /// Manual Slack user id → freee employee id overrides, checked before
    /// email matching.
    #[serde(default)]
    pub user_overrides: HashMap<String, i64>,
}

fn default_slack_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

/// Background job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the proactive-refresh scheduler runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression for the proactive refresh tick.
    #[serde(default = "default_refresh_cron")]
    pub refresh_cron: String,
    /// Interval between health probes, in seconds.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_cron: default_refresh_cron(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_refresh_cron() -> String {
    // every 30 minutes
    "0 */30 * * * *".to_string()
}

fn default_health_interval_secs() -> u64 {
    21_600
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8787".to_string()
}

/// Credential store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path of the JSON credential store file.
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self { store_path: default_store_path() }
    }
}

fn default_store_path() -> String {
    "dakoku_credentials.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_sections() {
        let toml_content = r#"
[freee]
client_id = "cid"
client_secret = "secret"

[slack]
bot_token = "xoxb-test"
target_channel = "C012345"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.freee.api_base_url, "https://api.freee.co.jp/hr/api/v1");
        assert_eq!(config.freee.token_url, "https://accounts.secure.freee.co.jp/public_api/token");
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.refresh_cron, "0 */30 * * * *");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8787");
        assert_eq!(config.credentials.store_path, "dakoku_credentials.json");
        assert!(config.slack.user_overrides.is_empty());
    }

    #[test]
    fn overrides_parse_from_toml_table() {
        let toml_content = r#"
[freee]
client_id = "cid"
client_secret = "secret"

[slack]
bot_token = "xoxb-test"
target_channel = "C012345"

[slack.user_overrides]
U111AAA = 42
U222BBB = 7
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.slack.user_overrides.get("U111AAA"), Some(&42));
        assert_eq!(config.slack.user_overrides.get("U222BBB"), Some(&7));
    }
}
