//! Inbound message handling pipeline
//!
//! detect action → resolve employee → register clock event → threaded
//! reply. Every outcome is reported back to the channel; processing errors
//! never propagate to the webhook response.

use dakoku_core::{detect_action, resolve_employee, ResolutionContext};
use dakoku_domain::ClockType;
use dakoku_infra::ApiError;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// An inner event of an `event_callback` envelope. Only `message` events
/// are acted on; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

const NO_EMPLOYEE_MESSAGE: &str = "❌ 従業員が見つかりません。\n\
• 手動マッピング: 管理者に設定を依頼してください\n\
• 自動マッチング: Slackプロフィールとfreeeのメールアドレスが一致している必要があります";

enum HandlerError {
    NoEmployee,
    Api(ApiError),
}

/// Process one inbound message event end to end.
pub async fn handle_message(state: AppState, event: InboundEvent) {
    if event.kind != "message" {
        return;
    }
    // Bot messages and edits must not trigger clock events.
    if event.bot_id.is_some() || event.subtype.is_some() {
        return;
    }

    let Some(channel) = event.channel.as_deref() else { return };
    if channel != state.config.slack.target_channel {
        debug!(channel, "ignoring message from non-target channel");
        return;
    }

    let Some(text) = event.text.as_deref() else { return };
    let Some(action) = detect_action(text) else {
        debug!("no attendance keyword in message");
        return;
    };
    let Some(user) = event.user.as_deref() else { return };
    let thread_ts = event.ts.as_deref();

    info!(user, action = %action, "processing attendance message");

    let reply = match register_for_user(&state, user, action).await {
        Ok(()) => format!("✅ {}を記録しました！", action.display_name()),
        Err(HandlerError::NoEmployee) => {
            warn!(user, "no matching employee");
            NO_EMPLOYEE_MESSAGE.to_string()
        }
        Err(HandlerError::Api(err)) => {
            warn!(user, error = %err, "time clock registration failed");
            format!("❌ 打刻の記録に失敗しました: {}", err.category().user_message(action))
        }
    };

    if let Err(err) = state
        .slack
        .post_message(&state.config.slack.target_channel, &reply, thread_ts)
        .await
    {
        warn!(error = %err, "failed to post reply");
    }
}

async fn register_for_user(
    state: &AppState,
    user: &str,
    action: ClockType,
) -> Result<(), HandlerError> {
    let employee_id = resolve_employee_id(state, user).await.map_err(HandlerError::Api)?;
    let Some(employee_id) = employee_id else {
        return Err(HandlerError::NoEmployee);
    };

    state
        .freee
        .register_time_clock(employee_id, action)
        .await
        .map_err(HandlerError::Api)?;

    info!(user, employee_id, action = %action, "time clock registered");
    Ok(())
}

/// Resolve a Slack user to an employee id, caching hits per process.
///
/// The override mapping is consulted before any lookup call; the directory
/// and profile email are only fetched when the cheap paths miss.
async fn resolve_employee_id(state: &AppState, user: &str) -> Result<Option<i64>, ApiError> {
    if let Some(id) = state.resolution_cache.read().await.get(user) {
        return Ok(Some(*id));
    }

    let overrides = &state.config.slack.user_overrides;

    // Override-only pass: no lookup calls needed on a hit.
    let empty = ResolutionContext {
        overrides,
        profile_email: None,
        directory: &[],
        own_employee_id: None,
    };
    let resolved = match resolve_employee(user, &empty) {
        Some(hit) => Some(hit),
        None => {
            let profile_email = match state.slack.user_email(user).await {
                Ok(email) => email,
                Err(err) => {
                    warn!(user, error = %err, "profile lookup failed, continuing without email");
                    None
                }
            };
            let directory = state.freee.get_employees().await?;
            let own_employee_id = state.freee.own_employee_id().await?;

            let ctx = ResolutionContext {
                overrides,
                profile_email: profile_email.as_deref(),
                directory: &directory,
                own_employee_id,
            };
            resolve_employee(user, &ctx)
        }
    };

    if let Some(hit) = resolved {
        let id = hit.employee_id();
        state.resolution_cache.write().await.insert(user.to_string(), id);
        Ok(Some(id))
    } else {
        Ok(None)
    }
}
