//! Derived statistics over cached records.
//!
//! Every function here is pure: the same records (and the same `now`)
//! always give the same result. Views recompute on each new snapshot.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Application, ApplicationStatus, AttendanceRecord, Club, ExternalCourse};

// ============================================================================
// Attendance
// ============================================================================

/// Attendance percentage at or above which a student is in good standing.
pub const GOOD_ATTENDANCE_PERCENT: f64 = 75.0;

/// Attendance percentage below which attendance is critical.
pub const CRITICAL_ATTENDANCE_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttendanceSummary {
    pub total: u32,
    pub present_count: u32,
    pub absent_count: u32,
    /// Rounded to one decimal; 0 when there are no records.
    pub percentage: f64,
}

impl AttendanceSummary {
    /// Whether the low-attendance warning should show.
    pub fn is_low(&self) -> bool {
        self.total > 0 && self.percentage < GOOD_ATTENDANCE_PERCENT
    }

    pub fn level(&self) -> AttendanceLevel {
        attendance_level(self.percentage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceLevel {
    Good,
    Warning,
    Critical,
}

impl std::fmt::Display for AttendanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceLevel::Good => write!(f, "Good"),
            AttendanceLevel::Warning => write!(f, "Warning"),
            AttendanceLevel::Critical => write!(f, "Critical"),
        }
    }
}

pub fn attendance_level(percentage: f64) -> AttendanceLevel {
    if percentage >= GOOD_ATTENDANCE_PERCENT {
        AttendanceLevel::Good
    } else if percentage >= CRITICAL_ATTENDANCE_PERCENT {
        AttendanceLevel::Warning
    } else {
        AttendanceLevel::Critical
    }
}

fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(part) / f64::from(total) * 1000.0).round() / 10.0
}

pub fn attendance_summary(records: &[AttendanceRecord]) -> AttendanceSummary {
    summarize(records.iter())
}

/// Summary restricted to the records of one club.
pub fn per_club_attendance(records: &[AttendanceRecord], club_id: &str) -> AttendanceSummary {
    summarize(records.iter().filter(|r| r.club_id() == Some(club_id)))
}

fn summarize<'a>(records: impl Iterator<Item = &'a AttendanceRecord>) -> AttendanceSummary {
    let (total, present_count) = records.fold((0u32, 0u32), |(total, present), r| {
        (total + 1, present + u32::from(r.present))
    });
    AttendanceSummary {
        total,
        present_count,
        absent_count: total - present_count,
        percentage: percentage(present_count, total),
    }
}

/// One row of the per-club attendance breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ClubAttendance {
    pub club_id: String,
    pub club_name: String,
    pub summary: AttendanceSummary,
}

/// Per-club summaries for every enrolled club, in the clubs' order.
/// Clubs without records are included with an empty summary.
pub fn club_breakdown(records: &[AttendanceRecord], clubs: &[Club]) -> Vec<ClubAttendance> {
    clubs
        .iter()
        .map(|club| ClubAttendance {
            club_id: club.id().to_string(),
            club_name: club.name.clone(),
            summary: per_club_attendance(records, club.id()),
        })
        .collect()
}

// ============================================================================
// Applications
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplicationCounts {
    pub pending: u32,
    pub approved: u32,
    pub rejected: u32,
}

impl ApplicationCounts {
    pub fn total(&self) -> u32 {
        self.pending + self.approved + self.rejected
    }
}

/// Count applications by status. Unrecognized statuses are skipped.
pub fn application_counts(applications: &[Application]) -> ApplicationCounts {
    applications
        .iter()
        .fold(ApplicationCounts::default(), |mut counts, app| {
            match app.status {
                ApplicationStatus::Pending => counts.pending += 1,
                ApplicationStatus::Approved => counts.approved += 1,
                ApplicationStatus::Rejected => counts.rejected += 1,
                ApplicationStatus::Unknown => {}
            }
            counts
        })
}

/// Decided applications the student has not been notified about yet.
pub fn unread_notifications(applications: &[Application]) -> Vec<&Application> {
    applications
        .iter()
        .filter(|a| {
            matches!(a.status, ApplicationStatus::Approved | ApplicationStatus::Rejected)
                && !a.notification_seen()
        })
        .collect()
}

// ============================================================================
// External courses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    Active,
    Expired,
    Inactive,
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseStatus::Active => write!(f, "Active"),
            CourseStatus::Expired => write!(f, "Expired"),
            CourseStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Parse an API date: full RFC 3339 timestamp or a bare `YYYY-MM-DD`
/// (taken as midnight UTC).
fn parse_api_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn is_expired(course: &ExternalCourse, now: DateTime<Utc>) -> bool {
    course
        .end_date
        .as_deref()
        .and_then(parse_api_date)
        .map(|end| end < now)
        .unwrap_or(false)
}

/// Inactive wins over expired; a missing or unparseable end date never expires.
pub fn course_status(course: &ExternalCourse, now: DateTime<Utc>) -> CourseStatus {
    if course.is_active == Some(false) {
        CourseStatus::Inactive
    } else if is_expired(course, now) {
        CourseStatus::Expired
    } else {
        CourseStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseCounts {
    pub total: u32,
    /// Not explicitly deactivated.
    pub active: u32,
    /// End date in the past, whatever the active flag says.
    pub expired: u32,
}

pub fn course_counts(courses: &[ExternalCourse], now: DateTime<Utc>) -> CourseCounts {
    courses.iter().fold(CourseCounts::default(), |mut counts, course| {
        counts.total += 1;
        if course.is_active != Some(false) {
            counts.active += 1;
        }
        if is_expired(course, now) {
            counts.expired += 1;
        }
        counts
    })
}

// ============================================================================
// Clubs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityState {
    Open,
    Full,
}

/// Full only when a seat limit is set and reached.
pub fn capacity_state(club: &Club) -> CapacityState {
    match club.seat_limit() {
        Some(limit) if club.current_students() >= limit => CapacityState::Full,
        _ => CapacityState::Open,
    }
}

/// Share of seats taken, in percent. `None` for unlimited clubs.
pub fn capacity_fill(club: &Club) -> Option<f64> {
    club.seat_limit()
        .map(|limit| percentage(club.current_students(), limit))
}
