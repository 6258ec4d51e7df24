//! Attendance API gateway.
//!
//! ARCHITECTURE
//! ============
//! [`AttendanceApi`] is the seam the session store depends on; [`HttpGateway`]
//! is the `reqwest` implementation. The gateway never reads persisted state:
//! callers hand it the bearer token for each authenticated call.
//!
//! ERROR HANDLING
//! ==============
//! Non-success responses are normalized by [`RequestError::from_response`]
//! using the per-endpoint fallback message from [`Endpoint`]. Every call is
//! bounded by the configured request timeout and can be aborted in bulk with
//! [`HttpGateway::cancel_pending`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use super::error::RequestError;
use super::types::{
    ActionResult, AttendanceKind, AttendanceListing, AttendanceRecord, AuthResponse, Credentials, LogAttendanceBody,
    QrDescriptor, RegisterPayload, User, YearLevel, YearLevelListing,
};
use crate::config::ClientConfig;

/// Tracing target for request/response bodies. Off unless `log_payloads` is set.
pub const PAYLOAD_TARGET: &str = "attendance_client::payload";

const REDACTED_KEYS: &[&str] = &["password", "password_confirmation", "token"];

// =============================================================================
// TRAIT
// =============================================================================

/// Remote operations consumed by the session store and the CLI.
#[async_trait::async_trait]
pub trait AttendanceApi: Send + Sync {
    /// `POST /auth/login`.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, RequestError>;

    /// `POST /auth/register` with an already sanitized payload.
    async fn register(&self, payload: &RegisterPayload<'_>) -> Result<AuthResponse, RequestError>;

    /// `GET /me`: identity behind `token`.
    async fn profile(&self, token: &str) -> Result<User, RequestError>;

    async fn my_qr(&self, token: &str) -> Result<QrDescriptor, RequestError>;

    async fn attendees(&self, token: &str) -> Result<Vec<User>, RequestError>;

    async fn scan_attendee(&self, token: &str, attendee_id: i64) -> Result<ActionResult, RequestError>;

    async fn attendee_qr(&self, token: &str, attendee_id: i64) -> Result<QrDescriptor, RequestError>;

    async fn log_attendance(&self, token: &str, kind: AttendanceKind) -> Result<ActionResult, RequestError>;

    async fn attendance_records(&self, token: &str) -> Result<Vec<AttendanceRecord>, RequestError>;

    /// Public lookup used by the registration form.
    async fn year_levels(&self) -> Result<Vec<YearLevel>, RequestError>;
}

// =============================================================================
// ENDPOINTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    Profile,
    MyQr,
    Attendees,
    ScanAttendee(i64),
    AttendeeQr(i64),
    LogAttendance,
    AttendanceRecords,
    YearLevels,
}

impl Endpoint {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Login | Self::Register | Self::ScanAttendee(_) | Self::LogAttendance => Method::POST,
            _ => Method::GET,
        }
    }

    #[must_use]
    pub fn path(self) -> String {
        match self {
            Self::Login => "/auth/login".to_owned(),
            Self::Register => "/auth/register".to_owned(),
            Self::Profile => "/me".to_owned(),
            Self::MyQr => "/me/qr".to_owned(),
            Self::Attendees => "/sbo/attendees".to_owned(),
            Self::ScanAttendee(id) => format!("/sbo/scan/{id}"),
            Self::AttendeeQr(id) => format!("/sbo/attendees/{id}/qr"),
            Self::LogAttendance => "/attendance/log".to_owned(),
            Self::AttendanceRecords => "/attendance".to_owned(),
            Self::YearLevels => "/year-levels".to_owned(),
        }
    }

    #[must_use]
    pub fn requires_bearer(self) -> bool {
        !matches!(self, Self::Login | Self::Register | Self::YearLevels)
    }

    /// Message shown when a failed response carries none of its own.
    #[must_use]
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::Login => "Login failed",
            Self::Register => "Registration failed",
            Self::Profile => "Failed to fetch profile",
            Self::MyQr => "Failed to fetch QR code",
            Self::Attendees => "Failed to fetch attendees",
            Self::ScanAttendee(_) => "Failed to scan attendee",
            Self::AttendeeQr(_) => "Failed to fetch attendee QR code",
            Self::LogAttendance => "Failed to log attendance",
            Self::AttendanceRecords => "Failed to fetch attendance records",
            Self::YearLevels => "Failed to fetch year levels",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

// =============================================================================
// HTTP GATEWAY
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("HTTP client build failed: {0}")]
pub struct GatewayBuildError(String);

/// `reqwest`-backed [`AttendanceApi`]. Cheap to clone; clones share the
/// connection pool and the cancellation channel.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    log_payloads: bool,
    cancel: Arc<watch::Sender<u64>>,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| GatewayBuildError(e.to_string()))?;
        let (cancel, _) = watch::channel(0);

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            request_timeout: config.timeouts.request(),
            log_payloads: config.log_payloads,
            cancel: Arc::new(cancel),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Abort every request currently in flight with [`RequestError::Cancelled`].
    /// Requests started afterwards are unaffected.
    pub fn cancel_pending(&self) {
        self.cancel.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, RequestError> {
        let mut cancelled = self.cancel.subscribe();
        let exchange = tokio::time::timeout(self.request_timeout, self.exchange(endpoint, token, body));

        let (status, text) = tokio::select! {
            result = exchange => result.map_err(|_| RequestError::Timeout)??,
            _ = cancelled.changed() => {
                tracing::debug!(%endpoint, "request cancelled");
                return Err(RequestError::Cancelled);
            }
        };

        if !(200..300).contains(&status) {
            let err = RequestError::from_response(status, &text, endpoint.fallback_message());
            tracing::debug!(%endpoint, status, error = %err, "api request failed");
            return Err(err);
        }

        serde_json::from_str(&text).map_err(|e| RequestError::Decode(e.to_string()))
    }

    async fn exchange(
        &self,
        endpoint: Endpoint,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(u16, String), RequestError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let mut request = self.http.request(endpoint.method(), &url);
        if let Some(token) = token.filter(|_| endpoint.requires_bearer()) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &body {
            self.log_payload(endpoint, "request", body);
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| RequestError::transport(&e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| RequestError::transport(&e))?;

        tracing::debug!(%endpoint, status, "api response");
        if self.log_payloads {
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                self.log_payload(endpoint, "response", &value);
            }
        }
        Ok((status, text))
    }

    fn log_payload(&self, endpoint: Endpoint, direction: &'static str, payload: &Value) {
        if !self.log_payloads {
            return;
        }
        tracing::debug!(target: PAYLOAD_TARGET, %endpoint, direction, payload = %redact(payload));
    }
}

fn encode<T: serde::Serialize>(body: &T) -> Result<Value, RequestError> {
    serde_json::to_value(body).map_err(|e| RequestError::Decode(e.to_string()))
}

/// Copy of `value` with credential-bearing keys masked at any depth.
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let masked = if REDACTED_KEYS.contains(&key.as_str()) {
                        Value::String("<redacted>".into())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[async_trait::async_trait]
impl AttendanceApi for HttpGateway {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, RequestError> {
        self.call(Endpoint::Login, None, Some(encode(credentials)?)).await
    }

    async fn register(&self, payload: &RegisterPayload<'_>) -> Result<AuthResponse, RequestError> {
        self.call(Endpoint::Register, None, Some(encode(payload)?)).await
    }

    async fn profile(&self, token: &str) -> Result<User, RequestError> {
        self.call(Endpoint::Profile, Some(token), None).await
    }

    async fn my_qr(&self, token: &str) -> Result<QrDescriptor, RequestError> {
        self.call(Endpoint::MyQr, Some(token), None).await
    }

    async fn attendees(&self, token: &str) -> Result<Vec<User>, RequestError> {
        self.call(Endpoint::Attendees, Some(token), None).await
    }

    async fn scan_attendee(&self, token: &str, attendee_id: i64) -> Result<ActionResult, RequestError> {
        self.call(Endpoint::ScanAttendee(attendee_id), Some(token), None).await
    }

    async fn attendee_qr(&self, token: &str, attendee_id: i64) -> Result<QrDescriptor, RequestError> {
        self.call(Endpoint::AttendeeQr(attendee_id), Some(token), None).await
    }

    async fn log_attendance(&self, token: &str, kind: AttendanceKind) -> Result<ActionResult, RequestError> {
        let body = encode(&LogAttendanceBody { kind })?;
        self.call(Endpoint::LogAttendance, Some(token), Some(body)).await
    }

    async fn attendance_records(&self, token: &str) -> Result<Vec<AttendanceRecord>, RequestError> {
        let listing: AttendanceListing = self.call(Endpoint::AttendanceRecords, Some(token), None).await?;
        Ok(listing.into_records())
    }

    async fn year_levels(&self) -> Result<Vec<YearLevel>, RequestError> {
        let listing: YearLevelListing = self.call(Endpoint::YearLevels, None, None).await?;
        Ok(listing.into_levels())
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
