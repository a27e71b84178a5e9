//! Proactive token refresh scheduler
//!
//! Cron-driven trigger for the token manager's proactive-refresh entry
//! point. Lifecycle rules: join handles are tracked, cancellation is
//! explicit, and the job body runs under a timeout. The tick itself never
//! fails loudly; a refresh that was due but did not happen is reported
//! through the notifier.

use std::sync::Arc;
use std::time::Duration;

use dakoku_core::Notifier;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credentials::{TokenManager, PROACTIVE_THRESHOLD_MINUTES};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single tick.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */30 * * * *".into(), // every 30 minutes
            job_timeout: Duration::from_secs(60),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Token refresh scheduler with explicit lifecycle management.
pub struct RefreshScheduler {
    scheduler: Option<JobScheduler>,
    config: RefreshSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    tokens: Arc<TokenManager>,
    notifier: Arc<dyn Notifier>,
}

impl RefreshScheduler {
    /// Create a scheduler with the default configuration and the given cron
    /// expression.
    pub fn new(
        cron_expression: String,
        tokens: Arc<TokenManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = RefreshSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, tokens, notifier)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(
        config: RefreshSchedulerConfig,
        tokens: Arc<TokenManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            tokens,
            notifier,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?;

        start_result.map_err(|err| SchedulerError::StartFailed(err.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(scheduler = "token_refresh", "monitor cancelled");
        });

        self.monitor_handle = Some(handle);
        info!(scheduler = "token_refresh", cron = %self.config.cron_expression, "refresh scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?;

        stop_result.map_err(|err| SchedulerError::StopFailed(err.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!(scheduler = "token_refresh", "refresh scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|err| SchedulerError::CreationFailed(err.to_string()))?;

        let cron_expr = self.config.cron_expression.clone();
        let tokens = Arc::clone(&self.tokens);
        let notifier = Arc::clone(&self.notifier);
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let tokens = Arc::clone(&tokens);
            let notifier = Arc::clone(&notifier);

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::run_refresh_tick(tokens, notifier),
                )
                .await
                {
                    Ok(()) => {
                        debug!(scheduler = "token_refresh", "refresh tick finished");
                    }
                    Err(_) => {
                        warn!(
                            scheduler = "token_refresh",
                            timeout_secs = job_timeout.as_secs(),
                            "refresh tick timed out"
                        );
                    }
                }
            })
        })
        .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "registered refresh job");
        Ok(scheduler)
    }

    /// One scheduler tick.
    ///
    /// `proactive_refresh` swallows refresh failures by contract, so a
    /// failure is detected as "a refresh was due but the token is still
    /// within the threshold afterwards" and reported through the notifier.
    /// Successful refreshes stay quiet to avoid channel spam.
    async fn run_refresh_tick(tokens: Arc<TokenManager>, notifier: Arc<dyn Notifier>) {
        let refreshed = tokens.proactive_refresh().await;
        if refreshed {
            info!(scheduler = "token_refresh", "proactive refresh performed");
            return;
        }

        let status = tokens.get_token_status().await;
        let still_due = status
            .minutes_until_expiry
            .is_some_and(|minutes| minutes <= PROACTIVE_THRESHOLD_MINUTES);

        if still_due {
            error!(scheduler = "token_refresh", ?status, "scheduled token refresh failed");
            if let Err(err) = notifier
                .notify("❌ freeeアクセストークンの自動更新に失敗しました。手動での確認が必要です。")
                .await
            {
                warn!(error = %err, "failed to deliver refresh failure notification");
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                scheduler = "token_refresh",
                "scheduler dropped while running; cancelling tasks"
            );
            self.cancellation.cancel();
        }
    }
}
