//! Employee resolution policy
//!
//! Maps a chat-platform user to a freee employee id. Resolution order:
//!
//! 1. manual override mapping (admin-maintained)
//! 2. email match between the chat profile and the employee directory
//! 3. fallback to the authenticated API user's own employee id, when enabled
//!
//! The function is pure; the caller performs the directory and profile
//! lookups and passes the results in.

use std::collections::HashMap;

use dakoku_domain::Employee;
use tracing::debug;

/// Inputs for a single resolution attempt.
#[derive(Debug)]
pub struct ResolutionContext<'a> {
    /// Manual chat-user-id → employee-id overrides.
    pub overrides: &'a HashMap<String, i64>,
    /// Email from the chat user's profile, if any.
    pub profile_email: Option<&'a str>,
    /// Employee directory of the company.
    pub directory: &'a [Employee],
    /// The authenticated API user's own employee id, used as a last resort.
    pub own_employee_id: Option<i64>,
}

/// How an employee id was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedEmployee {
    /// Matched via the manual override mapping.
    Override(i64),
    /// Matched by email against the directory.
    EmailMatch(i64),
    /// Fell back to the authenticated user's own employee id.
    SelfFallback(i64),
}

impl ResolvedEmployee {
    /// The resolved freee employee id.
    #[must_use]
    pub fn employee_id(&self) -> i64 {
        match self {
            Self::Override(id) | Self::EmailMatch(id) | Self::SelfFallback(id) => *id,
        }
    }
}

/// Resolve a chat user to a freee employee id, or `None` when no rule
/// matches.
#[must_use]
pub fn resolve_employee(user_id: &str, ctx: &ResolutionContext<'_>) -> Option<ResolvedEmployee> {
    if let Some(id) = ctx.overrides.get(user_id) {
        debug!(user_id, employee_id = id, "resolved via manual override");
        return Some(ResolvedEmployee::Override(*id));
    }

    if let Some(email) = ctx.profile_email.filter(|e| !e.is_empty()) {
        let wanted = email.to_lowercase();
        let matched = ctx.directory.iter().find(|emp| {
            emp.email.as_deref().is_some_and(|e| e.to_lowercase() == wanted)
        });
        if let Some(emp) = matched {
            debug!(user_id, employee_id = emp.id, "resolved via email match");
            return Some(ResolvedEmployee::EmailMatch(emp.id));
        }
    }

    if let Some(id) = ctx.own_employee_id {
        debug!(user_id, employee_id = id, "resolved via self fallback");
        return Some(ResolvedEmployee::SelfFallback(id));
    }

    debug!(user_id, "no matching employee");
    None
}
