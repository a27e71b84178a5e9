//! Core domain types for the attendance relay

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time clock action accepted by the freee HR API.
///
/// The serialized form (`clock_in`, `clock_out`, `break_begin`, `break_end`)
/// is the wire value of the `type` field on the time-clock endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockType {
    ClockIn,
    ClockOut,
    BreakBegin,
    BreakEnd,
}

impl ClockType {
    /// Wire value sent to the time-clock endpoint.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClockIn => "clock_in",
            Self::ClockOut => "clock_out",
            Self::BreakBegin => "break_begin",
            Self::BreakEnd => "break_end",
        }
    }

    /// Japanese display name used in chat replies.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ClockIn => "出勤",
            Self::ClockOut => "退勤",
            Self::BreakBegin => "休憩開始",
            Self::BreakEnd => "休憩終了",
        }
    }
}

impl fmt::Display for ClockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend the token status was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStorage {
    /// Read from the persistent credential store.
    Store,
    /// Store had no record; statically configured fallback tokens apply.
    Fallback,
    /// The store could not be read; status fields are a sentinel.
    Unreachable,
}

/// Read-only diagnostic projection of the credential state.
///
/// Produced by the token manager without ever triggering a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatus {
    pub storage: CredentialStorage,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole minutes until expiry, clamped at zero. `None` when no expiry
    /// metadata is stored.
    pub minutes_until_expiry: Option<i64>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl TokenStatus {
    /// Sentinel status returned when the credential store cannot be read.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            storage: CredentialStorage::Unreachable,
            has_access_token: false,
            has_refresh_token: false,
            expires_at: None,
            minutes_until_expiry: None,
            last_refreshed_at: None,
        }
    }
}

/// An employee record from the freee directory.
///
/// Only the fields the relay needs; unknown fields in API responses are
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_type_serializes_to_wire_values() {
        let json = serde_json::to_string(&ClockType::BreakBegin).unwrap();
        assert_eq!(json, "\"break_begin\"");

        let parsed: ClockType = serde_json::from_str("\"clock_out\"").unwrap();
        assert_eq!(parsed, ClockType::ClockOut);
    }

    #[test]
    fn clock_type_display_names() {
        assert_eq!(ClockType::ClockIn.display_name(), "出勤");
        assert_eq!(ClockType::ClockOut.display_name(), "退勤");
        assert_eq!(ClockType::BreakBegin.display_name(), "休憩開始");
        assert_eq!(ClockType::BreakEnd.display_name(), "休憩終了");
    }

    #[test]
    fn unreachable_status_is_a_sentinel() {
        let status = TokenStatus::unreachable();
        assert_eq!(status.storage, CredentialStorage::Unreachable);
        assert!(!status.has_access_token);
        assert!(!status.has_refresh_token);
        assert_eq!(status.minutes_until_expiry, None);
    }

    #[test]
    fn storage_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&CredentialStorage::Store).unwrap(), "\"store\"");
        assert_eq!(
            serde_json::to_string(&CredentialStorage::Unreachable).unwrap(),
            "\"unreachable\""
        );
    }
}
