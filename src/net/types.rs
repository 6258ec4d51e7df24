//! Wire types shared between the gateway and session state.
//!
//! DESIGN
//! ======
//! Field names follow the remote API's snake_case JSON. Identity fields the
//! session layer never inspects stay optional so partial profiles still decode.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// IDENTITY
// =============================================================================

/// Account role. `SBO` is the privileged role that may scan attendees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Attendee,
    #[serde(rename = "SBO")]
    Sbo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    /// Any value this client does not know about.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearLevel {
    pub id: i64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// The API embeds the year level either as a record or as its bare label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearLevelRef {
    Record(YearLevel),
    Label(String),
}

impl YearLevelRef {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Record(level) => &level.label,
            Self::Label(label) => label,
        }
    }
}

/// Identity record returned by `/me`, login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_level_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_level: Option<YearLevelRef>,
    /// The only identity field the session layer interprets.
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    /// Sent as a boolean or as `0`/`1` depending on the endpoint.
    #[serde(default, deserialize_with = "lenient_flag", skip_serializing_if = "Option::is_none")]
    pub has_attended: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sbo: Option<bool>,
}

impl User {
    /// Role is authoritative; the server's `is_sbo` hint is informational only.
    #[must_use]
    pub fn is_sbo(&self) -> bool {
        self.role == Role::Sbo
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(Option::<Flag>::deserialize(deserializer)?.map(|flag| match flag {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    }))
}

// =============================================================================
// AUTH REQUESTS
// =============================================================================

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the registration screen collects.
#[derive(Clone)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub course: String,
    pub gender: Gender,
    pub year_level_id: Option<i64>,
    pub role: Role,
    pub position: Option<String>,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("course", &self.course)
            .field("gender", &self.gender)
            .field("year_level_id", &self.year_level_id)
            .field("role", &self.role)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl RegistrationForm {
    /// Keep only the fields `/auth/register` accepts. `position` is carried
    /// for SBO registrations only and omitted from the JSON otherwise.
    #[must_use]
    pub fn payload(&self) -> RegisterPayload<'_> {
        RegisterPayload {
            full_name: &self.full_name,
            email: &self.email,
            password: &self.password,
            password_confirmation: &self.password_confirmation,
            course: &self.course,
            gender: self.gender,
            year_level_id: self.year_level_id,
            role: self.role,
            position: match self.role {
                Role::Sbo => self.position.as_deref(),
                Role::Attendee => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterPayload<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
    pub course: &'a str,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_level_id: Option<i64>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<&'a str>,
}

/// Success body of `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_generated: Option<bool>,
}

// =============================================================================
// QR + ATTENDANCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrDescriptor {
    pub qr_code_path: String,
    pub qr_code_url: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attended_today: Option<bool>,
}

/// Which attendance slot a log entry fills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    #[default]
    AmIn,
    AmOut,
    PmIn,
    PmOut,
}

impl AttendanceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AmIn => "am_in",
            Self::AmOut => "am_out",
            Self::PmIn => "pm_in",
            Self::PmOut => "pm_out",
        }
    }
}

impl std::str::FromStr for AttendanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "am_in" => Ok(Self::AmIn),
            "am_out" => Ok(Self::AmOut),
            "pm_in" => Ok(Self::PmIn),
            "pm_out" => Ok(Self::PmOut),
            other => Err(format!("unknown attendance type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LogAttendanceBody {
    #[serde(rename = "type")]
    pub kind: AttendanceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub attendee_id: i64,
    pub date: String,
    pub am_in: Option<String>,
    pub am_out: Option<String>,
    pub pm_in: Option<String>,
    pub pm_out: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub attendee: User,
}

impl AttendanceRecord {
    /// Any slot stamped counts as attended for that day.
    #[must_use]
    pub fn has_any_entry(&self) -> bool {
        [&self.am_in, &self.am_out, &self.pm_in, &self.pm_out]
            .iter()
            .any(|slot| slot.is_some())
    }
}

/// Result of scan and log operations. Only `message` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// PAGINATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub first: Option<String>,
    pub last: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub from: Option<u32>,
    pub last_page: u32,
    #[serde(default)]
    pub links: Vec<MetaLink>,
    pub path: String,
    pub per_page: u32,
    pub to: Option<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedAttendance {
    pub data: Vec<AttendanceRecord>,
    pub links: PageLinks,
    pub meta: PaginationMeta,
}

/// `/attendance` answers with either a bare list or a paginated envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum AttendanceListing {
    Plain(Vec<AttendanceRecord>),
    Paginated(PaginatedAttendance),
}

impl AttendanceListing {
    pub(crate) fn into_records(self) -> Vec<AttendanceRecord> {
        match self {
            Self::Plain(records) => records,
            Self::Paginated(page) => page.data,
        }
    }
}

/// `/year-levels` answers with either a bare list or `{ "data": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum YearLevelListing {
    Wrapped { data: Vec<YearLevel> },
    Plain(Vec<YearLevel>),
}

impl YearLevelListing {
    pub(crate) fn into_levels(self) -> Vec<YearLevel> {
        match self {
            Self::Wrapped { data } | Self::Plain(data) => data,
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
