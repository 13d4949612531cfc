use serde::{Deserialize, Serialize};

use super::de::{count_or_zero, lenient_f64, null_as_default};
use super::{Club, ExternalCourse, Student};

/// Server-computed counters shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardStatistics {
    #[serde(rename = "enrolledClubs", default, deserialize_with = "count_or_zero")]
    pub enrolled_clubs: u32,
    #[serde(rename = "pendingApplications", default, deserialize_with = "count_or_zero")]
    pub pending_applications: u32,
    #[serde(rename = "externalCourses", default, deserialize_with = "count_or_zero")]
    pub external_courses: u32,
    #[serde(rename = "attendancePercentage", default, deserialize_with = "lenient_f64")]
    pub attendance_percentage: f64,
    #[serde(rename = "thisMonthAttendance", default, deserialize_with = "count_or_zero")]
    pub this_month_attendance: u32,
    #[serde(rename = "thisMonthPresent", default, deserialize_with = "count_or_zero")]
    pub this_month_present: u32,
}

impl DashboardStatistics {
    pub fn this_month_absent(&self) -> u32 {
        self.this_month_attendance.saturating_sub(self.this_month_present)
    }
}

/// Payload of `GET /student/dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Dashboard {
    #[serde(default)]
    pub profile: Option<Student>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub statistics: DashboardStatistics,
    #[serde(rename = "activeClubs", default, deserialize_with = "null_as_default")]
    pub active_clubs: Vec<Club>,
    #[serde(rename = "externalCourses", default, deserialize_with = "null_as_default")]
    pub external_courses: Vec<ExternalCourse>,
}
