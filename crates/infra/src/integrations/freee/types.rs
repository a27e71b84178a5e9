//! Wire types for the freee HR API

use dakoku_domain::{ClockType, Employee};
use serde::{Deserialize, Serialize};

/// Response of `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<i64>,
    pub companies: Vec<UserCompany>,
}

/// A company membership entry of the authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCompany {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// The authenticated user's own employee id in this company, when the
    /// user is registered as an employee.
    #[serde(default)]
    pub employee_id: Option<i64>,
}

/// The employees listing is returned either bare or wrapped under an
/// `employees` field depending on the endpoint revision; both shapes must
/// parse.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EmployeesResponse {
    Wrapped { employees: Vec<Employee> },
    Bare(Vec<Employee>),
}

impl EmployeesResponse {
    pub(crate) fn into_employees(self) -> Vec<Employee> {
        match self {
            Self::Wrapped { employees } => employees,
            Self::Bare(employees) => employees,
        }
    }
}

/// Request body of `POST /employees/{id}/time_clocks`.
#[derive(Debug, Serialize)]
pub(crate) struct TimeClockRequest {
    pub company_id: i64,
    #[serde(rename = "type")]
    pub clock_type: ClockType,
    /// Civil date (`YYYY-MM-DD`) in the +09:00 business-day offset.
    pub base_date: String,
}

/// A registered time clock event.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeClock {
    pub id: i64,
    #[serde(rename = "type")]
    pub clock_type: ClockType,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// Registration response wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct TimeClockResponse {
    pub employee_time_clock: TimeClock,
}
