//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If required variables are missing, falls back to loading from file
//! 3. Probes a few standard paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FREEE_CLIENT_ID` / `FREEE_CLIENT_SECRET`: OAuth client credentials
//! - `FREEE_ACCESS_TOKEN` / `FREEE_REFRESH_TOKEN`: optional fallback tokens
//! - `FREEE_API_BASE_URL` / `FREEE_TOKEN_URL`: endpoint overrides
//! - `SLACK_BOT_TOKEN`: bot token for outbound messages
//! - `SLACK_SIGNING_SECRET`: webhook signature secret (optional)
//! - `TARGET_CHANNEL_ID`: channel the relay listens on
//! - `USER_MAPPING`: JSON object of Slack user id → employee id overrides
//! - `DAKOKU_BIND_ADDR`: HTTP server bind address
//! - `DAKOKU_CREDENTIALS_PATH`: credential store file path
//! - `DAKOKU_REFRESH_CRON`: proactive refresh schedule
//! - `DAKOKU_SCHEDULER_ENABLED`: whether the refresh scheduler runs
//! - `DAKOKU_HEALTH_INTERVAL_SECS`: health probe interval

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dakoku_domain::{
    Config, CredentialsConfig, DakokuError, FreeeConfig, Result, SchedulerConfig, ServerConfig,
    SlackConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `DakokuError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `DakokuError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let client_id = env_var("FREEE_CLIENT_ID")?;
    let client_secret = env_var("FREEE_CLIENT_SECRET")?;
    let bot_token = env_var("SLACK_BOT_TOKEN")?;
    let target_channel = env_var("TARGET_CHANNEL_ID")?;

    let user_overrides = match std::env::var("USER_MAPPING") {
        Ok(raw) if !raw.trim().is_empty() => parse_user_mapping(&raw)?,
        _ => HashMap::new(),
    };

    let defaults = SchedulerConfig::default();
    let health_interval_secs = match std::env::var("DAKOKU_HEALTH_INTERVAL_SECS") {
        Ok(raw) => raw.parse::<u64>().map_err(|e| {
            DakokuError::Config(format!("Invalid health interval: {}", e))
        })?,
        Err(_) => defaults.health_interval_secs,
    };

    Ok(Config {
        freee: FreeeConfig {
            client_id,
            client_secret,
            api_base_url: env_or("FREEE_API_BASE_URL", "https://api.freee.co.jp/hr/api/v1"),
            token_url: env_or(
                "FREEE_TOKEN_URL",
                "https://accounts.secure.freee.co.jp/public_api/token",
            ),
            fallback_access_token: std::env::var("FREEE_ACCESS_TOKEN").ok(),
            fallback_refresh_token: std::env::var("FREEE_REFRESH_TOKEN").ok(),
        },
        slack: SlackConfig {
            bot_token,
            signing_secret: std::env::var("SLACK_SIGNING_SECRET").ok(),
            target_channel,
            api_base_url: env_or("SLACK_API_BASE_URL", "https://slack.com/api"),
            user_overrides,
        },
        scheduler: SchedulerConfig {
            enabled: env_bool("DAKOKU_SCHEDULER_ENABLED", true),
            refresh_cron: env_or("DAKOKU_REFRESH_CRON", &defaults.refresh_cron),
            health_interval_secs,
        },
        server: ServerConfig {
            bind_addr: env_or("DAKOKU_BIND_ADDR", &ServerConfig::default().bind_addr),
        },
        credentials: CredentialsConfig {
            store_path: env_or(
                "DAKOKU_CREDENTIALS_PATH",
                &CredentialsConfig::default().store_path,
            ),
        },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes standard locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DakokuError::Config` if the file is missing or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DakokuError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DakokuError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DakokuError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DakokuError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DakokuError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(DakokuError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe standard paths for configuration files
///
/// Searches the current working directory and the executable's directory
/// for `config.{toml,json}` / `dakoku.{toml,json}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.toml"),
            cwd.join("config.json"),
            cwd.join("dakoku.toml"),
            cwd.join("dakoku.json"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.toml"),
                exe_dir.join("config.json"),
                exe_dir.join("dakoku.toml"),
                exe_dir.join("dakoku.json"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn parse_user_mapping(raw: &str) -> Result<HashMap<String, i64>> {
    serde_json::from_str(raw)
        .map_err(|e| DakokuError::Config(format!("Invalid USER_MAPPING JSON: {}", e)))
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        DakokuError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED_VARS: &[&str] =
        &["FREEE_CLIENT_ID", "FREEE_CLIENT_SECRET", "SLACK_BOT_TOKEN", "TARGET_CHANNEL_ID"];

    fn clear_env() {
        for key in REQUIRED_VARS {
            std::env::remove_var(key);
        }
        for key in [
            "FREEE_ACCESS_TOKEN",
            "FREEE_REFRESH_TOKEN",
            "USER_MAPPING",
            "DAKOKU_SCHEDULER_ENABLED",
            "DAKOKU_HEALTH_INTERVAL_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    fn set_required() {
        std::env::set_var("FREEE_CLIENT_ID", "cid");
        std::env::set_var("FREEE_CLIENT_SECRET", "secret");
        std::env::set_var("SLACK_BOT_TOKEN", "xoxb-test");
        std::env::set_var("TARGET_CHANNEL_ID", "C012345");
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_BOOL_TRUE", "yes");
        std::env::set_var("TEST_BOOL_FALSE", "off");
        assert!(env_bool("TEST_BOOL_TRUE", false));
        assert!(!env_bool("TEST_BOOL_FALSE", true));

        std::env::remove_var("TEST_BOOL_MISSING");
        assert!(env_bool("TEST_BOOL_MISSING", true));
        assert!(!env_bool("TEST_BOOL_MISSING", false));

        std::env::remove_var("TEST_BOOL_TRUE");
        std::env::remove_var("TEST_BOOL_FALSE");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("FREEE_REFRESH_TOKEN", "env-refresh");
        std::env::set_var("USER_MAPPING", r#"{"U111": 42}"#);

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.freee.client_id, "cid");
        assert_eq!(config.freee.fallback_refresh_token, Some("env-refresh".to_string()));
        assert_eq!(config.slack.target_channel, "C012345");
        assert_eq!(config.slack.user_overrides.get("U111"), Some(&42));
        assert!(config.scheduler.enabled);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let result = load_from_env();
        assert!(result.is_err(), "Should fail with missing env var");
        assert!(matches!(result.unwrap_err(), DakokuError::Config(_)));
    }

    #[test]
    fn test_load_from_env_invalid_user_mapping() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("USER_MAPPING", "not json");

        let result = load_from_env();
        assert!(result.is_err(), "Should fail with invalid USER_MAPPING");
        assert!(matches!(result.unwrap_err(), DakokuError::Config(_)));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[freee]
client_id = "cid"
client_secret = "secret"

[slack]
bot_token = "xoxb-test"
target_channel = "C012345"

[server]
bind_addr = "127.0.0.1:9000"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_ok(), "Should load config from TOML file: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.credentials.store_path, "dakoku_credentials.json");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "freee": {"client_id": "cid", "client_secret": "secret"},
            "slack": {"bot_token": "xoxb-test", "target_channel": "C012345"}
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_ok(), "Should load config from JSON file: {:?}", result.err());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(result.is_err(), "Should fail when file not found");
        assert!(matches!(result.unwrap_err(), DakokuError::Config(_)));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
