//! freee HR API integration
//!
//! Resilient client wrapper around the time-clock endpoints, error
//! classification for user-facing messaging, and the background health
//! monitor.

mod client;
mod errors;
mod health;
mod types;

pub use client::FreeeClient;
pub use errors::{ApiError, ApiErrorCategory};
pub use health::{HealthMonitor, HealthStatus};
pub use types::{TimeClock, UserCompany, UserInfo};
