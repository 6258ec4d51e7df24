//! Client-side filtering over cached attendance records.

use crate::net::types::{AttendanceRecord, Role};

/// Optional criteria; an unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceFilters {
    /// Exact `YYYY-MM-DD` date.
    pub date: Option<String>,
    /// Case-insensitive substring of the attendee's full name.
    pub attendee_name: Option<String>,
    /// Case-insensitive substring of the attendee's course.
    pub course: Option<String>,
    pub role: Option<Role>,
    /// Whether any attendance slot was stamped for the record's day.
    pub has_attended: Option<bool>,
}

impl AttendanceFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        if self.date.as_deref().is_some_and(|date| date != record.date) {
            return false;
        }
        if self
            .attendee_name
            .as_deref()
            .is_some_and(|needle| !field_contains(record.attendee.full_name.as_deref(), needle))
        {
            return false;
        }
        if self
            .course
            .as_deref()
            .is_some_and(|needle| !field_contains(record.attendee.course.as_deref(), needle))
        {
            return false;
        }
        if self.role.is_some_and(|role| role != record.attendee.role) {
            return false;
        }
        if self.has_attended.is_some_and(|wanted| wanted != record.has_any_entry()) {
            return false;
        }
        true
    }
}

/// Records matching `filters`, in their original order.
#[must_use]
pub fn filter_records<'a>(records: &'a [AttendanceRecord], filters: &AttendanceFilters) -> Vec<&'a AttendanceRecord> {
    records.iter().filter(|record| filters.matches(record)).collect()
}

/// A missing field never matches a text filter.
fn field_contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|haystack| haystack.to_lowercase().contains(&needle.trim().to_lowercase()))
}

#[cfg(test)]
#[path = "attendance_test.rs"]
mod tests;
