//! freee API error types and classification
//!
//! Downstream failures carry the raw response body so callers can translate
//! known domain messages into user-facing text. Classification is a data
//! table from (status, body markers) to a typed category, not scattered
//! string comparisons.

use dakoku_domain::{ClockType, DakokuError};
use thiserror::Error;

use crate::credentials::CredentialError;

/// Error type for freee API calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response after the single retry cycle (or on non-401
    /// failure). The raw body is preserved for classification.
    #[error("freee API error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    /// Network-level failure; no response was received. Not retried by the
    /// client.
    #[error("freee API transport error: {0}")]
    Transport(String),

    /// Token acquisition or refresh failed before/while calling the API.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A 2xx response body did not parse.
    #[error("malformed freee response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify this error for user-facing messaging.
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Http { status, body } => classify_response(*status, body),
            Self::Transport(_) => ApiErrorCategory::Network,
            Self::Credential(_) => ApiErrorCategory::Authentication,
            Self::Decode(_) => ApiErrorCategory::Unknown,
        }
    }
}

impl From<ApiError> for DakokuError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::Http { status, .. } => match status {
                401 | 403 => Self::Auth(err.to_string()),
                400..=499 => Self::InvalidInput(err.to_string()),
                _ => Self::Network(err.to_string()),
            },
            ApiError::Transport(_) => Self::Network(err.to_string()),
            ApiError::Credential(_) => Self::Auth(err.to_string()),
            ApiError::Decode(_) => Self::Internal(err.to_string()),
        }
    }
}

/// User-facing category of a freee API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// The requested clock event is invalid for the employee's current
    /// attendance state (already clocked in, not on break, ...).
    InvalidClockState,
    /// Authentication failed (401, 403) even after the retry cycle.
    Authentication,
    /// Rate limit exceeded (429).
    RateLimited,
    /// Invalid request or data (other 4xx).
    Validation,
    /// freee is unavailable (5xx).
    ServerUnavailable,
    /// Network-level failure, no response received.
    Network,
    /// Unclassified failure.
    Unknown,
}

/// Body markers the time-clock endpoint uses for state-conflict rejections.
/// Checked in order; matching any marker on a 4xx classifies the failure as
/// an attendance-state conflict.
const CLOCK_STATE_MARKERS: &[&str] = &["打刻の種類が正しくありません", "ありません"];

fn classify_response(status: u16, body: &str) -> ApiErrorCategory {
    match status {
        401 | 403 => ApiErrorCategory::Authentication,
        429 => ApiErrorCategory::RateLimited,
        400..=499 => {
            if CLOCK_STATE_MARKERS.iter().any(|marker| body.contains(marker)) {
                ApiErrorCategory::InvalidClockState
            } else {
                ApiErrorCategory::Validation
            }
        }
        500..=599 => ApiErrorCategory::ServerUnavailable,
        _ => ApiErrorCategory::Unknown,
    }
}

impl ApiErrorCategory {
    /// User-facing message for a failed clock attempt.
    ///
    /// State conflicts explain what the current attendance state must be,
    /// per attempted action; the remaining categories distinguish
    /// remediation paths (admin action vs. retry vs. automatic recovery).
    #[must_use]
    pub fn user_message(&self, attempted: ClockType) -> &'static str {
        match self {
            Self::InvalidClockState => match attempted {
                ClockType::ClockIn => "既に出勤済みです。",
                ClockType::ClockOut => "まだ出勤していないか、既に退勤済みです。",
                ClockType::BreakBegin => "まだ出勤していないか、既に休憩中です。",
                ClockType::BreakEnd => "休憩を開始していません。",
            },
            Self::Authentication => {
                "freeeの認証に失敗しました。管理者にトークンの再設定を依頼してください。"
            }
            Self::RateLimited => "リクエストが多すぎます。しばらく待ってから再試行してください。",
            Self::Validation => "打刻リクエストが受け付けられませんでした。",
            Self::ServerUnavailable => {
                "freeeが一時的に利用できません。時間をおいて再試行してください。"
            }
            Self::Network => "freeeに接続できませんでした。時間をおいて再試行してください。",
            Self::Unknown => "現在の打刻状況では、この操作はできません。",
        }
    }
}
