//! Scripted gateway and fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

use crate::net::api::AttendanceApi;
use crate::net::error::RequestError;
use crate::net::types::{
    ActionResult, AttendanceKind, AttendanceRecord, AuthResponse, Credentials, Gender, QrDescriptor, RegisterPayload,
    Role, User, YearLevel,
};
use crate::state::session::SessionStore;
use crate::state::storage::MemoryTokenStore;

#[must_use]
pub fn user(role: Role) -> User {
    User {
        id: Some(1),
        full_name: Some("Ana Cruz".into()),
        email: Some("ana@example.test".into()),
        course: Some("BSIT".into()),
        gender: Some(Gender::Female),
        year_level_id: Some(2),
        year_level: None,
        role,
        position: (role == Role::Sbo).then(|| "Secretary".to_owned()),
        qr_code_path: None,
        qr_code_url: None,
        has_attended: None,
        created_at: None,
        updated_at: None,
        is_sbo: None,
    }
}

#[must_use]
pub fn auth_ok(token: &str, role: Role) -> AuthResponse {
    AuthResponse {
        message: Some("ok".into()),
        token: Some(token.to_owned()),
        user: Some(user(role)),
        attendee: None,
        qr_generated: Some(true),
    }
}

#[must_use]
pub fn record(id: i64) -> AttendanceRecord {
    AttendanceRecord {
        id,
        attendee_id: 1,
        date: "2026-10-01".into(),
        am_in: Some("08:00:00".into()),
        am_out: None,
        pm_in: None,
        pm_out: None,
        created_at: "2026-10-01T08:00:00Z".into(),
        updated_at: "2026-10-01T08:00:00Z".into(),
        attendee: user(Role::Attendee),
    }
}

pub fn unauthorized() -> RequestError {
    RequestError::Unauthorized { status: 401, message: "Unauthenticated.".into() }
}

/// Gateway double with scripted results and call counters.
pub struct MockApi {
    auth: Mutex<Result<AuthResponse, RequestError>>,
    profile: Mutex<Result<User, RequestError>>,
    records: Mutex<Result<Vec<AttendanceRecord>, RequestError>>,
    profile_gate: Mutex<Option<Arc<Notify>>>,
    profile_calls: AtomicUsize,
    auth_calls: AtomicUsize,
    last_register: Mutex<Option<Value>>,
    last_profile_token: Mutex<Option<String>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            auth: Mutex::new(Ok(auth_ok("tok-1", Role::Attendee))),
            profile: Mutex::new(Ok(user(Role::Attendee))),
            records: Mutex::new(Ok(Vec::new())),
            profile_gate: Mutex::new(None),
            profile_calls: AtomicUsize::new(0),
            auth_calls: AtomicUsize::new(0),
            last_register: Mutex::new(None),
            last_profile_token: Mutex::new(None),
        }
    }
}

impl MockApi {
    #[must_use]
    pub fn with_auth(self, result: Result<AuthResponse, RequestError>) -> Self {
        *self.auth.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn with_profile(self, result: Result<User, RequestError>) -> Self {
        *self.profile.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn with_records(self, result: Result<Vec<AttendanceRecord>, RequestError>) -> Self {
        *self.records.lock().unwrap() = result;
        self
    }

    /// Hold every `profile` call until `gate` is notified.
    #[must_use]
    pub fn gated(self, gate: Arc<Notify>) -> Self {
        *self.profile_gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn set_profile(&self, result: Result<User, RequestError>) {
        *self.profile.lock().unwrap() = result;
    }

    pub fn set_auth(&self, result: Result<AuthResponse, RequestError>) {
        *self.auth.lock().unwrap() = result;
    }

    pub fn set_records(&self, result: Result<Vec<AttendanceRecord>, RequestError>) {
        *self.records.lock().unwrap() = result;
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn last_register(&self) -> Option<Value> {
        self.last_register.lock().unwrap().clone()
    }

    pub fn last_profile_token(&self) -> Option<String> {
        self.last_profile_token.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AttendanceApi for MockApi {
    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, RequestError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        self.auth.lock().unwrap().clone()
    }

    async fn register(&self, payload: &RegisterPayload<'_>) -> Result<AuthResponse, RequestError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_register.lock().unwrap() = Some(serde_json::to_value(payload).unwrap());
        self.auth.lock().unwrap().clone()
    }

    async fn profile(&self, token: &str) -> Result<User, RequestError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_profile_token.lock().unwrap() = Some(token.to_owned());
        let gate = self.profile_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.profile.lock().unwrap().clone()
    }

    async fn my_qr(&self, _token: &str) -> Result<QrDescriptor, RequestError> {
        Err(RequestError::Status { status: 404, message: "Failed to fetch QR code".into() })
    }

    async fn attendees(&self, _token: &str) -> Result<Vec<User>, RequestError> {
        Ok(vec![user(Role::Attendee)])
    }

    async fn scan_attendee(&self, _token: &str, _attendee_id: i64) -> Result<ActionResult, RequestError> {
        Ok(ActionResult::default())
    }

    async fn attendee_qr(&self, _token: &str, _attendee_id: i64) -> Result<QrDescriptor, RequestError> {
        Err(RequestError::Status { status: 404, message: "Failed to fetch attendee QR code".into() })
    }

    async fn log_attendance(&self, _token: &str, _kind: AttendanceKind) -> Result<ActionResult, RequestError> {
        Ok(ActionResult::default())
    }

    async fn attendance_records(&self, _token: &str) -> Result<Vec<AttendanceRecord>, RequestError> {
        self.records.lock().unwrap().clone()
    }

    async fn year_levels(&self) -> Result<Vec<YearLevel>, RequestError> {
        Ok(vec![YearLevel { id: 1, label: "1st Year".into(), created_at: None, updated_at: None }])
    }
}

/// Store wired to `api` and a memory slot seeded with `persisted`.
pub fn store_with(api: &Arc<MockApi>, persisted: Option<&str>) -> (Arc<SessionStore>, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(persisted.map_or_else(MemoryTokenStore::default, MemoryTokenStore::with_token));
    let store = Arc::new(SessionStore::new(api.clone(), tokens.clone()));
    (store, tokens)
}
