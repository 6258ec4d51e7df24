//! Static route table.

use std::fmt;

/// Access flags carried by a route. Evaluated by [`super::guard::decide`]
/// in the fixed order auth, guest, privileged role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRequirements {
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub requires_sbo: bool,
}

impl RouteRequirements {
    pub const NONE: Self = Self { requires_auth: false, requires_guest: false, requires_sbo: false };
    pub const AUTH: Self = Self { requires_auth: true, ..Self::NONE };
    pub const GUEST: Self = Self { requires_guest: true, ..Self::NONE };
    pub const SBO: Self = Self { requires_auth: true, requires_sbo: true, ..Self::NONE };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Root,
    Login,
    Register,
    Dashboard,
    QrView,
    AttendanceLog,
}

impl RouteName {
    #[must_use]
    pub fn def(self) -> &'static RouteDef {
        ROUTES
            .iter()
            .find(|route| route.name == self)
            .unwrap_or(&ROUTES[0])
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::Login => "login",
            Self::Register => "register",
            Self::Dashboard => "dashboard",
            Self::QrView => "qr-view",
            Self::AttendanceLog => "attendance-log",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub name: RouteName,
    /// Path pattern; `:id` marks a single dynamic segment.
    pub pattern: &'static str,
    pub requirements: RouteRequirements,
    pub title: Option<&'static str>,
    /// Unconditional redirect applied before guarding.
    pub redirect: Option<&'static str>,
}

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

pub static ROUTES: &[RouteDef] = &[
    RouteDef {
        name: RouteName::Root,
        pattern: "/",
        requirements: RouteRequirements::NONE,
        title: None,
        redirect: Some(DASHBOARD_PATH),
    },
    RouteDef {
        name: RouteName::Login,
        pattern: LOGIN_PATH,
        requirements: RouteRequirements::GUEST,
        title: Some("Login"),
        redirect: None,
    },
    RouteDef {
        name: RouteName::Register,
        pattern: "/register",
        requirements: RouteRequirements::GUEST,
        title: Some("Register"),
        redirect: None,
    },
    RouteDef {
        name: RouteName::Dashboard,
        pattern: DASHBOARD_PATH,
        requirements: RouteRequirements::AUTH,
        title: Some("Dashboard"),
        redirect: None,
    },
    RouteDef {
        name: RouteName::QrView,
        pattern: "/qr/:id",
        requirements: RouteRequirements::AUTH,
        title: Some("QR Code"),
        redirect: None,
    },
    RouteDef {
        name: RouteName::AttendanceLog,
        pattern: "/attendance/log",
        requirements: RouteRequirements::SBO,
        title: Some("Attendance Log"),
        redirect: None,
    },
];

/// A path matched against [`ROUTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub def: &'static RouteDef,
    pub path: String,
    /// Value of the `:id` segment, when the pattern has one.
    pub id: Option<String>,
}

/// Match `path` against the route table. Query strings and a trailing slash
/// are ignored.
#[must_use]
pub fn resolve(path: &str) -> Option<ResolvedRoute> {
    let path = normalize(path);
    ROUTES.iter().find_map(|def| {
        match_pattern(def.pattern, &path).map(|id| ResolvedRoute { def, path: path.clone(), id })
    })
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// `Some(capture)` on match; the capture is the `:id` segment if present.
fn match_pattern(pattern: &str, path: &str) -> Option<Option<String>> {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut capture = None;
    for (expected, actual) in pattern_segments.iter().zip(&path_segments) {
        if expected.starts_with(':') {
            if actual.is_empty() {
                return None;
            }
            capture = Some((*actual).to_owned());
        } else if expected != actual {
            return None;
        }
    }
    Some(capture)
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
