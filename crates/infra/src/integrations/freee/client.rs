//! Resilient freee HR API client
//!
//! Wraps outbound calls so that a single expired or invalidated token never
//! surfaces to the caller when a valid refresh is possible: every call
//! obtains the current token from the token manager, and a 401 response
//! triggers exactly one unconditional refresh-and-retry cycle. A second 401
//! is terminal.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use dakoku_domain::{ClockType, Employee};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use super::types::{EmployeesResponse, TimeClock, TimeClockRequest, TimeClockResponse, UserInfo};
use crate::credentials::TokenManager;
use crate::http::HttpClient;

/// Company-scoped call context, resolved once per process.
///
/// A cache miss only costs one extra `users/me` lookup; the values are
/// immutable for the lifetime of the credential.
#[derive(Debug, Clone, Copy)]
struct CompanyContext {
    company_id: i64,
    own_employee_id: Option<i64>,
}

/// freee HR API client with transparent token renewal.
pub struct FreeeClient {
    base_url: String,
    http: HttpClient,
    tokens: Arc<TokenManager>,
    company: tokio::sync::RwLock<Option<CompanyContext>>,
}

impl FreeeClient {
    pub fn new(base_url: impl Into<String>, http: HttpClient, tokens: Arc<TokenManager>) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            tokens,
            company: tokio::sync::RwLock::new(None),
        }
    }

    /// Shared access to the token manager (status endpoints, seeding).
    #[must_use]
    pub fn token_manager(&self) -> Arc<TokenManager> {
        Arc::clone(&self.tokens)
    }

    /// `GET /users/me`
    pub async fn get_user_info(&self) -> Result<UserInfo, ApiError> {
        self.request(Method::GET, "/users/me", None).await
    }

    /// The company id all company-scoped endpoints require.
    pub async fn company_id(&self) -> Result<i64, ApiError> {
        Ok(self.company_context().await?.company_id)
    }

    /// The authenticated user's own employee id, used as a resolution
    /// fallback.
    pub async fn own_employee_id(&self) -> Result<Option<i64>, ApiError> {
        Ok(self.company_context().await?.own_employee_id)
    }

    /// `GET /companies/{id}/employees` — the employee directory.
    pub async fn get_employees(&self) -> Result<Vec<Employee>, ApiError> {
        let company_id = self.company_id().await?;
        let path = format!("/companies/{company_id}/employees");
        let response: EmployeesResponse = self.request(Method::GET, &path, None).await?;
        Ok(response.into_employees())
    }

    /// `POST /employees/{id}/time_clocks` — register a clock event for the
    /// current business day.
    pub async fn register_time_clock(
        &self,
        employee_id: i64,
        clock_type: ClockType,
    ) -> Result<TimeClock, ApiError> {
        let company_id = self.company_id().await?;
        let base_date = base_date(Utc::now()).to_string();
        info!(employee_id, %clock_type, %base_date, "registering time clock");

        let request = TimeClockRequest { company_id, clock_type, base_date };
        let body = serde_json::to_value(&request)
            .map_err(|err| ApiError::Decode(err.to_string()))?;

        let path = format!("/employees/{employee_id}/time_clocks");
        let response: TimeClockResponse = self.request(Method::POST, &path, Some(body)).await?;
        Ok(response.employee_time_clock)
    }

    /// `GET /employees/{id}/time_clocks` — clock event history for a date
    /// range.
    pub async fn get_time_clocks(
        &self,
        employee_id: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<TimeClock>, ApiError> {
        let company_id = self.company_id().await?;
        let path = format!(
            "/employees/{employee_id}/time_clocks?company_id={company_id}&from_date={from_date}&to_date={to_date}"
        );
        self.request(Method::GET, &path, None).await
    }

    async fn company_context(&self) -> Result<CompanyContext, ApiError> {
        if let Some(ctx) = *self.company.read().await {
            return Ok(ctx);
        }

        let user_info = self.get_user_info().await?;
        let company = user_info
            .companies
            .first()
            .ok_or_else(|| ApiError::Decode("users/me returned no companies".to_string()))?;

        let ctx = CompanyContext {
            company_id: company.id,
            own_employee_id: company.employee_id,
        };

        *self.company.write().await = Some(ctx);
        debug!(company_id = ctx.company_id, "cached company context");
        Ok(ctx)
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
    }

    /// One outbound call: token fetch, request, and at most one
    /// refresh-and-retry on 401.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.get_access_token().await?;

        let response = self
            .send(self.build_request(&method, &url, &token, body.as_ref()))
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // The server has authoritatively rejected the token; refresh
            // unconditionally, bypassing the grace-period check.
            warn!(%method, %url, "received 401, refreshing token and retrying once");
            let token = self.tokens.refresh_access_token().await?;

            let retry = self
                .send(self.build_request(&method, &url, &token, body.as_ref()))
                .await?;
            return Self::parse(retry).await;
        }

        Self::parse(response).await
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        self.http.send(builder).await.map_err(|err| ApiError::Transport(err.to_string()))
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status: status.as_u16(), body });
        }
        response.json().await.map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Civil date of `now` in the +09:00 business-day offset.
///
/// The downstream system defines its business day in JST; this must not be
/// replaced with the host's local date.
fn base_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Tokyo).date_naive()
}
