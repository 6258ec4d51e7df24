//! End-to-end checks of the gateway, session store and route guard against a
//! local mock of the attendance API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use attendance_client::config::{ClientConfig, Timeouts};
use attendance_client::net::api::{AttendanceApi, HttpGateway};
use attendance_client::net::error::RequestError;
use attendance_client::net::types::{AttendanceKind, Credentials, Gender, RegistrationForm, Role};
use attendance_client::router::{Navigation, RouteGuard};
use attendance_client::state::session::{SessionError, SessionStore};
use attendance_client::state::storage::{FileTokenStore, MemoryTokenStore, TokenStore};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const GOOD_TOKEN: &str = "tok-live";
/// Accepted by `/me`, which answers with an incomplete profile.
const SPARSE_TOKEN: &str = "tok-sparse";

// =============================================================================
// MOCK SERVER
// =============================================================================

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
}

impl Seen {
    fn record(&self, headers: &HeaderMap, body: Option<Value>) {
        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
        self.auth_headers.lock().unwrap().push(auth);
        if let Some(body) = body {
            self.bodies.lock().unwrap().push(body);
        }
    }

    fn last_body(&self) -> Value {
        self.bodies.lock().unwrap().last().cloned().unwrap()
    }

    fn last_auth(&self) -> Option<String> {
        self.auth_headers.lock().unwrap().last().cloned().flatten()
    }
}

fn user_json(role: &str) -> Value {
    json!({
        "id": 7,
        "full_name": "Ana Cruz",
        "email": "ana@example.com",
        "course": "BSIT",
        "gender": "Female",
        "year_level_id": 2,
        "role": role,
        "has_attended": 0,
    })
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(format!("Bearer {GOOD_TOKEN}").as_str())
}

fn unauthenticated() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthenticated." }))).into_response()
}

async fn login(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    seen.record(&headers, Some(body.clone()));
    if body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" }))).into_response();
    }
    let role = if body["email"] == "sbo@example.com" { "SBO" } else { "Attendee" };
    Json(json!({ "message": "Login successful", "token": GOOD_TOKEN, "user": user_json(role) })).into_response()
}

async fn register(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    seen.record(&headers, Some(body));
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": "The given data was invalid.",
            "errors": {
                "email": ["The email has already been taken."],
                "password": ["The password must be at least 8 characters."],
            },
        })),
    )
        .into_response()
}

async fn me(State(seen): State<Seen>, headers: HeaderMap) -> Response {
    seen.record(&headers, None);
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(format!("Bearer {SPARSE_TOKEN}").as_str()) {
        let mut profile = user_json("Attendee");
        profile["course"] = Value::Null;
        profile["gender"] = json!("Prefer not to say");
        return Json(profile).into_response();
    }
    if !bearer_ok(&headers) {
        return unauthenticated();
    }
    Json(user_json("Attendee")).into_response()
}

async fn slow_qr() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({})).into_response()
}

async fn attendance(headers: HeaderMap) -> Response {
    if !bearer_ok(&headers) {
        return unauthenticated();
    }
    let record = |id: i64, am_in: Option<&str>| {
        json!({
            "id": id,
            "attendee_id": 7,
            "date": "2026-10-18",
            "am_in": am_in,
            "am_out": null,
            "pm_in": null,
            "pm_out": null,
            "created_at": "2026-10-18T08:00:00Z",
            "updated_at": "2026-10-18T08:00:00Z",
            "attendee": user_json("Attendee"),
        })
    };
    Json(json!({
        "data": [record(1, Some("08:01")), record(2, None)],
        "links": { "first": "/attendance?page=1", "last": "/attendance?page=1", "prev": null, "next": null },
        "meta": {
            "current_page": 1,
            "from": 1,
            "last_page": 1,
            "links": [{ "url": null, "label": "1", "active": true }],
            "path": "/attendance",
            "per_page": 15,
            "to": 2,
            "total": 2,
        },
    }))
    .into_response()
}

async fn log_attendance(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    seen.record(&headers, Some(body));
    if !bearer_ok(&headers) {
        return unauthenticated();
    }
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "message": "Attendance already logged" }))).into_response()
}

async fn scan(State(seen): State<Seen>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    seen.record(&headers, None);
    if !bearer_ok(&headers) {
        return unauthenticated();
    }
    Json(json!({ "message": format!("Scanned attendee {id}"), "attendee_id": id })).into_response()
}

async fn year_levels(State(seen): State<Seen>, headers: HeaderMap) -> Response {
    seen.record(&headers, None);
    Json(json!({ "data": [{ "id": 1, "label": "1st Year" }, { "id": 2, "label": "2nd Year" }] })).into_response()
}

async fn spawn_api() -> (String, Seen) {
    let seen = Seen::default();
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/me", get(me))
        .route("/me/qr", get(slow_qr))
        .route("/attendance", get(attendance))
        .route("/attendance/log", post(log_attendance))
        .route("/sbo/scan/{id}", post(scan))
        .route("/year-levels", get(year_levels))
        .with_state(seen.clone());
    let router = Router::new().nest("/api", api);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock api");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{address}/api"), seen)
}

fn config(api_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: api_url.to_owned(),
        timeouts: Timeouts { request_secs: 1, connect_secs: 1 },
        log_payloads: true,
        ..ClientConfig::default()
    }
}

async fn session_against(
    persisted: Option<&str>,
) -> (Arc<SessionStore>, Arc<HttpGateway>, Arc<MemoryTokenStore>, Seen) {
    let (url, seen) = spawn_api().await;
    let gateway = Arc::new(HttpGateway::new(&config(&url)).unwrap());
    let tokens = Arc::new(persisted.map_or_else(MemoryTokenStore::default, MemoryTokenStore::with_token));
    let session = Arc::new(SessionStore::new(gateway.clone(), tokens.clone()));
    (session, gateway, tokens, seen)
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials { email: email.to_owned(), password: password.to_owned() }
}

// =============================================================================
// AUTH
// =============================================================================

#[tokio::test]
async fn login_persists_token_and_sends_no_bearer() {
    let (session, _gateway, tokens, seen) = session_against(None).await;

    let response = session.login(&credentials("ana@example.com", "secret")).await.unwrap();

    assert_eq!(response.token.as_deref(), Some(GOOD_TOKEN));
    assert!(session.is_authenticated());
    assert_eq!(session.current_role(), Some(Role::Attendee));
    assert_eq!(tokens.load().unwrap().as_deref(), Some(GOOD_TOKEN));
    assert_eq!(seen.last_body()["email"], "ana@example.com");
    assert_eq!(seen.last_auth(), None);
}

#[tokio::test]
async fn rejected_login_keeps_session_empty() {
    let (session, _gateway, tokens, _seen) = session_against(None).await;

    let err = session.login(&credentials("ana@example.com", "wrong")).await.unwrap_err();

    assert!(matches!(err, SessionError::Request(ref e) if e.is_auth_failure()));
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(!session.is_authenticated());
    assert_eq!(session.error().as_deref(), Some("Invalid credentials"));
    assert_eq!(tokens.load().unwrap(), None);
}

#[tokio::test]
async fn registration_validation_errors_are_flattened() {
    let (session, _gateway, _tokens, seen) = session_against(None).await;
    let form = RegistrationForm {
        full_name: "Ana Cruz".into(),
        email: "ana@example.com".into(),
        password: "short".into(),
        password_confirmation: "short".into(),
        course: "BSIT".into(),
        gender: Gender::Female,
        year_level_id: Some(2),
        role: Role::Attendee,
        position: Some("Treasurer".into()),
    };

    let err = session.register(&form).await.unwrap_err();

    let SessionError::Request(RequestError::Validation { message, fields }) = err else {
        panic!("expected a validation failure");
    };
    assert_eq!(message, "The email has already been taken., The password must be at least 8 characters.");
    assert_eq!(fields.len(), 2);
    assert!(seen.last_body().get("position").is_none());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn token_file_survives_a_new_store() {
    let (url, _seen) = spawn_api().await;
    let path = std::env::temp_dir().join(format!("attendance-e2e-{}", std::process::id()));
    let gateway: Arc<dyn AttendanceApi> = Arc::new(HttpGateway::new(&config(&url)).unwrap());

    let first = SessionStore::new(gateway.clone(), Arc::new(FileTokenStore::new(&path)));
    first.login(&credentials("ana@example.com", "secret")).await.unwrap();

    let second = SessionStore::new(gateway, Arc::new(FileTokenStore::new(&path)));
    assert!(second.persisted_token_present());
    assert!(!second.is_authenticated());
    second.fetch_user().await.unwrap();
    assert!(second.is_authenticated());

    second.logout();
    assert!(!path.exists());
}

// =============================================================================
// HYDRATION + GUARD
// =============================================================================

#[tokio::test]
async fn guard_hydrates_from_persisted_token() {
    let (session, _gateway, _tokens, seen) = session_against(Some(GOOD_TOKEN)).await;
    let guard = RouteGuard::new(session.clone());

    let nav = guard.before_each("/dashboard").await;

    assert!(matches!(nav, Navigation::Allowed(_)), "{nav:?}");
    assert_eq!(seen.last_auth(), Some(format!("Bearer {GOOD_TOKEN}")));
    assert_eq!(session.user().and_then(|u| u.email), Some("ana@example.com".to_owned()));
}

#[tokio::test]
async fn incomplete_profile_still_hydrates() {
    let (session, _gateway, tokens, _seen) = session_against(Some(SPARSE_TOKEN)).await;
    let guard = RouteGuard::new(session.clone());

    let nav = guard.before_each("/dashboard").await;

    assert!(matches!(nav, Navigation::Allowed(_)), "{nav:?}");
    assert!(session.is_authenticated());
    let user = session.user().unwrap();
    assert_eq!(user.course, None);
    assert_eq!(user.gender, Some(Gender::Other));
    assert_eq!(tokens.load().unwrap().as_deref(), Some(SPARSE_TOKEN));
}

#[tokio::test]
async fn expired_token_clears_session_and_redirects_to_login() {
    let (session, _gateway, tokens, _seen) = session_against(Some("tok-expired")).await;
    let guard = RouteGuard::new(session.clone());

    let nav = guard.before_each("/dashboard").await;

    assert_eq!(nav.destination(), Some("/login"));
    assert!(!session.is_authenticated());
    assert_eq!(session.token(), None);
    assert_eq!(tokens.load().unwrap(), None);
    assert!(session.snapshot().is_consistent());
}

#[tokio::test]
async fn attendee_is_kept_out_of_sbo_routes() {
    let (session, _gateway, _tokens, _seen) = session_against(None).await;
    session.login(&credentials("ana@example.com", "secret")).await.unwrap();
    let guard = RouteGuard::new(session);

    let nav = guard.before_each("/attendance/log").await;

    assert_eq!(nav.destination(), Some("/dashboard"));
}

#[tokio::test]
async fn sbo_reaches_sbo_routes() {
    let (session, _gateway, _tokens, _seen) = session_against(None).await;
    session.login(&credentials("sbo@example.com", "secret")).await.unwrap();
    let guard = RouteGuard::new(session);

    let nav = guard.before_each("/attendance/log").await;

    assert!(matches!(nav, Navigation::Allowed(_)), "{nav:?}");
}

// =============================================================================
// DATA ENDPOINTS
// =============================================================================

#[tokio::test]
async fn paginated_attendance_is_unwrapped_and_cached() {
    let (session, _gateway, _tokens, _seen) = session_against(None).await;
    session.login(&credentials("ana@example.com", "secret")).await.unwrap();

    let records = session.fetch_attendance_records().await.unwrap();

    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(records[0].has_any_entry());
    assert!(!records[1].has_any_entry());
    assert_eq!(records[0].attendee.has_attended, Some(false));
    assert_eq!(session.snapshot().attendance_records, records);
}

#[tokio::test]
async fn year_levels_are_public_and_unwrapped() {
    let (_session, gateway, _tokens, seen) = session_against(None).await;

    let levels = gateway.year_levels().await.unwrap();

    assert_eq!(levels.iter().map(|l| l.label.as_str()).collect::<Vec<_>>(), vec!["1st Year", "2nd Year"]);
    assert_eq!(seen.last_auth(), None);
}

#[tokio::test]
async fn scan_sends_bearer_and_returns_message() {
    let (_session, gateway, _tokens, seen) = session_against(None).await;

    let result = gateway.scan_attendee(GOOD_TOKEN, 42).await.unwrap();

    assert_eq!(result.message.as_deref(), Some("Scanned attendee 42"));
    assert_eq!(result.extra["attendee_id"], 42);
    assert_eq!(seen.last_auth(), Some(format!("Bearer {GOOD_TOKEN}")));
}

#[tokio::test]
async fn log_attendance_sends_type_and_surfaces_server_message() {
    let (_session, gateway, _tokens, seen) = session_against(None).await;

    let err = gateway.log_attendance(GOOD_TOKEN, AttendanceKind::PmOut).await.unwrap_err();

    assert_eq!(seen.last_body(), json!({ "type": "pm_out" }));
    assert_eq!(err, RequestError::Status { status: 422, message: "Attendance already logged".into() });
}

// =============================================================================
// TIMEOUT + CANCELLATION
// =============================================================================

#[tokio::test]
async fn slow_response_times_out() {
    let (_session, gateway, _tokens, _seen) = session_against(None).await;

    let err = gateway.my_qr(GOOD_TOKEN).await.unwrap_err();

    assert_eq!(err, RequestError::Timeout);
}

#[tokio::test]
async fn cancel_pending_aborts_in_flight_requests() {
    let (_session, gateway, _tokens, _seen) = session_against(None).await;
    let in_flight = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.my_qr(GOOD_TOKEN).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    gateway.cancel_pending();

    assert_eq!(in_flight.await.unwrap().unwrap_err(), RequestError::Cancelled);
    assert!(gateway.year_levels().await.is_ok());
}
