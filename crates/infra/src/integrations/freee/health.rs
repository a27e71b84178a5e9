//! freee API health monitoring
//!
//! Background liveness probe with explicit lifecycle: each tick exercises
//! `users/me` (a cheap authenticated call, so the whole token path is
//! covered) and reports the outcome through the notifier, which probes the
//! outbound chat channel at the same time.

use std::sync::Arc;
use std::time::Duration;

use dakoku_core::Notifier;
use dakoku_domain::{DakokuError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::FreeeClient;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Health of the freee integration as seen by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// The API answered the probe.
    Healthy,
    /// The probe failed or timed out.
    Unhealthy,
}

/// Background health monitor with explicit start/stop lifecycle.
pub struct HealthMonitor {
    client: Arc<FreeeClient>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    task_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl HealthMonitor {
    /// Create a monitor probing every `interval_secs` seconds.
    pub fn new(client: Arc<FreeeClient>, notifier: Arc<dyn Notifier>, interval_secs: u64) -> Self {
        Self {
            client,
            notifier,
            interval: Duration::from_secs(interval_secs),
            task_handle: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Start background monitoring.
    pub fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(DakokuError::Internal("health monitor already running".to_string()));
        }

        let cancel = self.cancellation.clone();
        let client = Arc::clone(&self.client);
        let notifier = Arc::clone(&self.notifier);
        let interval = self.interval;

        info!(interval_secs = interval.as_secs(), "starting freee health monitor");

        let handle = tokio::spawn(async move {
            health_worker(client, notifier, interval, cancel).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop monitoring and wait for the worker to finish.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .map_err(|_| DakokuError::Internal("health monitor shutdown timeout".to_string()))?
                .map_err(|err| DakokuError::Internal(format!("task join failed: {err}")))?;
        }

        info!("freee health monitor stopped");
        Ok(())
    }

    /// Check if the monitor is currently running.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some() && !self.cancellation.is_cancelled()
    }
}

/// Worker loop, separated from the lifecycle holder for testability.
async fn health_worker(
    client: Arc<FreeeClient>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("health monitor worker shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let status = probe(&client).await;

                let message = match &status {
                    HealthStatus::Healthy => "🔍 定期ヘルスチェック: システム正常".to_string(),
                    HealthStatus::Unhealthy => {
                        "❌ 定期ヘルスチェック: freee APIに接続できません".to_string()
                    }
                };

                info!(?status, "health probe finished");
                if let Err(err) = notifier.notify(&message).await {
                    warn!(error = %err, "health notification failed");
                }
            }
        }
    }
}

async fn probe(client: &FreeeClient) -> HealthStatus {
    match tokio::time::timeout(PROBE_TIMEOUT, client.get_user_info()).await {
        Ok(Ok(_)) => HealthStatus::Healthy,
        Ok(Err(err)) => {
            warn!(error = %err, "health probe failed");
            HealthStatus::Unhealthy
        }
        Err(_) => {
            warn!("health probe timed out");
            HealthStatus::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dakoku_domain::FreeeConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::credentials::{MemoryCredentialStore, TokenManager, ACCESS_TOKEN_KEY};
    use crate::http::HttpClient;
    use dakoku_core::CredentialStore;

    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self { messages: Mutex::new(Vec::new()) })
        }

        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> Result<()> {
            self.messages.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn client_against(api_uri: String) -> Arc<FreeeClient> {
        let store = Arc::new(MemoryCredentialStore::new());
        store.put(ACCESS_TOKEN_KEY, "A1").await.unwrap();
        let config = FreeeConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            api_base_url: api_uri.clone(),
            token_url: "http://unused.invalid".to_string(),
            fallback_access_token: None,
            fallback_refresh_token: None,
        };
        let http = HttpClient::new().expect("http client");
        let tokens = Arc::new(TokenManager::new(store, http.clone(), &config));
        Arc::new(FreeeClient::new(api_uri, http, tokens))
    }

    #[tokio::test]
    async fn worker_reports_healthy_probe() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1, "companies": [{"id": 100}]
            })))
            .mount(&api)
            .await;

        let notifier = RecordingNotifier::new();
        let client = client_against(api.uri()).await;

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let worker_notifier = Arc::clone(&notifier);
        let handle = tokio::spawn(async move {
            health_worker(
                client,
                worker_notifier as Arc<dyn Notifier>,
                Duration::from_millis(50),
                worker_cancel,
            )
            .await;
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        let messages = notifier.messages();
        assert!(!messages.is_empty());
        assert!(messages[0].contains("正常"));
    }

    #[tokio::test]
    async fn worker_reports_unhealthy_probe() {
        let notifier = RecordingNotifier::new();
        // Closed port: the probe fails immediately.
        let client = client_against("http://127.0.0.1:9".to_string()).await;

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let worker_notifier = Arc::clone(&notifier);
        let handle = tokio::spawn(async move {
            health_worker(
                client,
                worker_notifier as Arc<dyn Notifier>,
                Duration::from_millis(50),
                worker_cancel,
            )
            .await;
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        let messages = notifier.messages();
        assert!(!messages.is_empty());
        assert!(messages[0].contains("接続できません"));
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1, "companies": [{"id": 100}]
            })))
            .mount(&api)
            .await;

        let notifier = RecordingNotifier::new();
        let client = client_against(api.uri()).await;
        let mut monitor = HealthMonitor::new(client, notifier, 1);

        assert!(!monitor.is_running());

        monitor.start().unwrap();
        assert!(monitor.is_running());

        // Double start is rejected.
        assert!(monitor.start().is_err());

        monitor.stop().await.unwrap();
        assert!(!monitor.is_running());
    }
}
