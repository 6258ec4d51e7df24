//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! One [`SessionStore`] is created per application and handed to the route
//! guard and any command that needs the bearer token. It is the only writer
//! of session state and of the persisted token slot.
//!
//! DESIGN
//! ======
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Every transition (establish, hydrate, clear) happens inside one
//! lock scope, so no caller observes a token without its user or the reverse.
//!
//! Identity refreshes are coalesced: overlapping `fetch_user` calls for the
//! same token share one in-flight `GET /me`. A refresh result is applied only
//! if the held token is unchanged when it lands, so a logout or re-login during
//! the request wins.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::storage::{StorageError, TokenStore};
use crate::net::api::AttendanceApi;
use crate::net::error::RequestError;
use crate::net::types::{AttendanceRecord, AuthResponse, Credentials, RegistrationForm, Role, User};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The gateway rejected or failed the call.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The token slot could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A success response without both `token` and `user`.
    #[error("{0}")]
    IncompleteAuthResponse(String),

    #[error("not logged in")]
    NotAuthenticated,
}

// =============================================================================
// STATE
// =============================================================================

/// Snapshot of the session as seen by views and the guard.
#[derive(Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub token: Option<String>,
    /// Last failure message, for display only.
    pub error: Option<String>,
    pub attendance_records: Vec<AttendanceRecord>,
    pub is_fetching_attendance: bool,
}

impl SessionState {
    /// `is_authenticated` holds exactly when both user and token are present.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.is_authenticated == (self.user.is_some() && self.token.is_some())
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("user", &self.user.as_ref().map(|u| &u.email))
            .field("is_authenticated", &self.is_authenticated)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("error", &self.error)
            .field("attendance_records", &self.attendance_records.len())
            .field("is_fetching_attendance", &self.is_fetching_attendance)
            .finish()
    }
}

// =============================================================================
// STORE
// =============================================================================

type ProfileFuture = Shared<BoxFuture<'static, Result<User, RequestError>>>;

struct InFlightRefresh {
    token: String,
    future: ProfileFuture,
}

pub struct SessionStore {
    api: Arc<dyn AttendanceApi>,
    tokens: Arc<dyn TokenStore>,
    state: Mutex<SessionState>,
    refresh: Mutex<Option<InFlightRefresh>>,
}

impl SessionStore {
    /// Create the store, adopting any persisted token. The session is not
    /// considered authenticated until [`SessionStore::fetch_user`] succeeds.
    pub fn new(api: Arc<dyn AttendanceApi>, tokens: Arc<dyn TokenStore>) -> Self {
        let token = tokens.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read persisted token; starting logged out");
            None
        });
        let state = SessionState { token, ..SessionState::default() };
        Self { api, tokens, state: Mutex::new(state), refresh: Mutex::new(None) }
    }

    /// Gateway shared with the store, for calls that only need the token.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn AttendanceApi> {
        &self.api
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock_state().token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.lock_state().user.clone()
    }

    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.lock_state().user.as_ref().map(|u| u.role)
    }

    /// Authentication flag and role, read under one lock.
    #[must_use]
    pub fn access(&self) -> (bool, Option<Role>) {
        let state = self.lock_state();
        (state.is_authenticated, state.user.as_ref().map(|u| u.role))
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn clear_error(&self) {
        self.lock_state().error = None;
    }

    /// Held token, or [`SessionError::NotAuthenticated`].
    ///
    /// # Errors
    ///
    /// Returns an error when no token is held.
    pub fn require_token(&self) -> Result<String, SessionError> {
        self.token().ok_or(SessionError::NotAuthenticated)
    }

    /// Fresh read of the durable slot. Read failures count as absent.
    #[must_use]
    pub fn persisted_token_present(&self) -> bool {
        match self.tokens.load() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted token");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // login / register
    // -------------------------------------------------------------------------

    /// Authenticate with email and password.
    ///
    /// Returns the raw response so callers can read extras such as
    /// `qr_generated`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error, [`SessionError::IncompleteAuthResponse`]
    /// when the body lacks a token or user, or a storage error if the token
    /// cannot be persisted. Identity, token and the authenticated flag are
    /// unchanged on every error path; only `error` records the message.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, SessionError> {
        let result = self.api.login(credentials).await;
        self.establish("login", result)
    }

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Same contract as [`SessionStore::login`].
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthResponse, SessionError> {
        let payload = form.payload();
        let result = self.api.register(&payload).await;
        self.establish("register", result)
    }

    fn establish(
        &self,
        operation: &'static str,
        result: Result<AuthResponse, RequestError>,
    ) -> Result<AuthResponse, SessionError> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(operation, error = %e, "authentication rejected");
                return Err(self.fail(e.into()));
            }
        };

        let (Some(token), Some(user)) = (response.token.clone(), response.user.clone()) else {
            let message = response
                .message
                .clone()
                .unwrap_or_else(|| format!("{operation} response did not include a session"));
            tracing::warn!(operation, "success response missing token or user");
            return Err(self.fail(SessionError::IncompleteAuthResponse(message)));
        };

        let mut state = self.lock_state();
        if let Err(e) = self.tokens.save(&token) {
            tracing::warn!(operation, error = %e, "could not persist session token");
            state.error = Some(e.to_string());
            return Err(e.into());
        }
        tracing::info!(operation, role = ?user.role, "session established");
        *state = SessionState { user: Some(user), is_authenticated: true, token: Some(token), ..SessionState::default() };
        Ok(response)
    }

    // -------------------------------------------------------------------------
    // hydration
    // -------------------------------------------------------------------------

    /// Refresh identity for the held token.
    ///
    /// No-op without a token. On failure the whole session is cleared, which
    /// is how expired credentials are detected.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after the session has been cleared.
    pub async fn fetch_user(&self) -> Result<(), RequestError> {
        let Some((token, refresh)) = self.join_refresh() else {
            return Ok(());
        };
        let result = refresh.clone().await;
        self.finish_refresh(&token, &refresh, result)
    }

    fn join_refresh(&self) -> Option<(String, ProfileFuture)> {
        let token = self.lock_state().token.clone()?;
        let mut slot = self.lock_refresh();

        if let Some(in_flight) = slot.as_ref().filter(|r| r.token == token) {
            tracing::debug!("joining in-flight identity refresh");
            return Some((token, in_flight.future.clone()));
        }

        let api = Arc::clone(&self.api);
        let request_token = token.clone();
        let future = async move { api.profile(&request_token).await }.boxed().shared();
        *slot = Some(InFlightRefresh { token: token.clone(), future: future.clone() });
        Some((token, future))
    }

    fn finish_refresh(
        &self,
        token: &str,
        refresh: &ProfileFuture,
        result: Result<User, RequestError>,
    ) -> Result<(), RequestError> {
        {
            let mut slot = self.lock_refresh();
            if slot.as_ref().is_some_and(|r| r.future.ptr_eq(refresh)) {
                *slot = None;
            }
        }

        let mut state = self.lock_state();
        if state.token.as_deref() != Some(token) {
            tracing::debug!("session changed during identity refresh; result discarded");
            return result.map(drop);
        }

        match result {
            Ok(user) => {
                if !state.is_authenticated {
                    tracing::info!(role = ?user.role, "session hydrated");
                }
                state.user = Some(user);
                state.is_authenticated = true;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "identity refresh failed; clearing session");
                self.clear_locked(&mut state);
                state.error = Some(e.message());
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // logout
    // -------------------------------------------------------------------------

    /// Drop the session locally. Always succeeds; calling it while logged out
    /// leaves state unchanged.
    pub fn logout(&self) {
        let mut state = self.lock_state();
        let was_authenticated = state.is_authenticated;
        self.clear_locked(&mut state);
        state.error = None;
        if was_authenticated {
            tracing::info!("session cleared by logout");
        }
    }

    // -------------------------------------------------------------------------
    // attendance records
    // -------------------------------------------------------------------------

    /// Fetch attendance records and cache them in session state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] without a token, otherwise
    /// the gateway error. The cached list is kept on failure.
    pub async fn fetch_attendance_records(&self) -> Result<Vec<AttendanceRecord>, SessionError> {
        let token = {
            let mut state = self.lock_state();
            let Some(token) = state.token.clone() else {
                return Err(SessionError::NotAuthenticated);
            };
            state.is_fetching_attendance = true;
            token
        };

        let result = self.api.attendance_records(&token).await;

        let mut state = self.lock_state();
        state.is_fetching_attendance = false;
        match result {
            Ok(records) => {
                if state.token.as_deref() == Some(token.as_str()) {
                    state.attendance_records.clone_from(&records);
                    state.error = None;
                }
                Ok(records)
            }
            Err(e) => {
                state.error = Some(e.message());
                Err(e.into())
            }
        }
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    /// Reset identity, token, cached records and the persisted slot in one
    /// lock scope. `error` is left for the caller to set.
    fn clear_locked(&self, state: &mut SessionState) {
        state.user = None;
        state.is_authenticated = false;
        state.token = None;
        state.attendance_records.clear();
        state.is_fetching_attendance = false;
        if let Err(e) = self.tokens.clear() {
            tracing::warn!(error = %e, "could not remove persisted token");
        }
    }

    fn fail(&self, err: SessionError) -> SessionError {
        self.lock_state().error = Some(err.to_string());
        err
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_refresh(&self) -> MutexGuard<'_, Option<InFlightRefresh>> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
