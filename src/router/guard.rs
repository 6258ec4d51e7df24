//! Navigation guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs before every navigation completes. If a token is persisted but the
//! session is not yet authenticated, navigation waits on one identity refresh;
//! then the route's flags decide between proceeding and a single redirect.
//!
//! The guard never fails open: a failed refresh clears the session, so the
//! auth check that follows denies the route.

use std::sync::Arc;

use super::policy::{DASHBOARD_PATH, LOGIN_PATH, ResolvedRoute, RouteRequirements, resolve};
use crate::net::types::Role;
use crate::state::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(&'static str),
}

/// Hydrate when a token survives in storage but memory is not authenticated.
#[must_use]
pub fn needs_hydration(token_persisted: bool, authenticated: bool) -> bool {
    token_persisted && !authenticated
}

/// First failing check wins: auth, then guest, then privileged role.
#[must_use]
pub fn decide(requirements: RouteRequirements, authenticated: bool, role: Option<Role>) -> GuardDecision {
    if requirements.requires_auth && !authenticated {
        GuardDecision::Redirect(LOGIN_PATH)
    } else if requirements.requires_guest && authenticated {
        GuardDecision::Redirect(DASHBOARD_PATH)
    } else if requirements.requires_sbo && role != Some(Role::Sbo) {
        GuardDecision::Redirect(DASHBOARD_PATH)
    } else {
        GuardDecision::Proceed
    }
}

/// Outcome of one guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allowed(ResolvedRoute),
    Redirected { from: String, to: &'static str },
    NotFound(String),
}

impl Navigation {
    /// Path the caller should end up on, if any.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Allowed(route) => Some(&route.path),
            Self::Redirected { to, .. } => Some(to),
            Self::NotFound(_) => None,
        }
    }
}

pub struct RouteGuard {
    session: Arc<SessionStore>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Guard a navigation to `path`.
    ///
    /// Storage and auth state are read fresh on every call; nothing from a
    /// previous (possibly still suspended) navigation is reused.
    pub async fn before_each(&self, path: &str) -> Navigation {
        let Some(mut route) = resolve(path) else {
            tracing::debug!(path, "no route matches");
            return Navigation::NotFound(path.to_owned());
        };
        if let Some(target) = route.def.redirect {
            match resolve(target) {
                Some(resolved) => route = resolved,
                None => return Navigation::NotFound(target.to_owned()),
            }
        }

        if needs_hydration(self.session.persisted_token_present(), self.session.is_authenticated()) {
            if let Err(e) = self.session.fetch_user().await {
                tracing::debug!(path, error = %e, "hydration failed before navigation");
            }
        }

        let (authenticated, role) = self.session.access();
        match decide(route.def.requirements, authenticated, role) {
            GuardDecision::Proceed => {
                tracing::debug!(route = %route.def.name, "navigation allowed");
                Navigation::Allowed(route)
            }
            GuardDecision::Redirect(to) => {
                tracing::debug!(route = %route.def.name, to, "navigation redirected");
                Navigation::Redirected { from: path.to_owned(), to }
            }
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
