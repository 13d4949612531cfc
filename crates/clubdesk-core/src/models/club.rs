use serde::{Deserialize, Serialize};

use super::de::{lenient_count, string_or_number, FromId};
use super::{ApplicationStatus, NamedRef};

/// Which weeks a club meets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    Odd,
    Even,
    Both,
}

impl std::fmt::Display for WeekType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeekType::Odd => write!(f, "Odd weeks"),
            WeekType::Even => write!(f, "Even weeks"),
            WeekType::Both => write!(f, "Every week"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.as_deref().unwrap_or("?"),
            self.end.as_deref().unwrap_or("?")
        )
    }
}

/// Weekly meeting plan. Days are 1 (Monday) through 7 (Sunday).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Schedule {
    #[serde(default)]
    pub days: Vec<u8>,
    #[serde(default)]
    pub time: Option<TimeRange>,
    #[serde(rename = "weekType", default)]
    pub week_type: Option<WeekType>,
}

impl Schedule {
    pub fn day_names(&self) -> Vec<&'static str> {
        self.days.iter().map(|d| day_name(*d)).collect()
    }
}

/// Short weekday name for a 1-based day number.
pub fn day_name(day: u8) -> &'static str {
    match day {
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        6 => "Sat",
        7 => "Sun",
        _ => "?",
    }
}

/// Some payloads (dashboard summaries) send the schedule as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum ClubSchedule {
    Detailed(Schedule),
    Text(String),
}

impl std::fmt::Display for ClubSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClubSchedule::Text(text) => write!(f, "{}", text),
            ClubSchedule::Detailed(schedule) => {
                let days = schedule.day_names().join(", ");
                match (&schedule.time, days.is_empty()) {
                    (Some(time), false) => write!(f, "{} {}", days, time),
                    (Some(time), true) => write!(f, "{}", time),
                    (None, false) => write!(f, "{}", days),
                    (None, true) => write!(f, "-"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TutorProfile {
    #[serde(rename = "fullName", default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Tutor {
    #[serde(default)]
    pub profile: Option<TutorProfile>,
}

impl Tutor {
    pub fn name(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.full_name.as_deref())
    }
}

/// An extracurricular club, as listed or as enrolled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Club {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub faculty: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub tutor: Option<Tutor>,
    #[serde(default)]
    pub schedule: Option<ClubSchedule>,
    #[serde(default)]
    pub location: Option<String>,
    /// Seat limit; `None` means unlimited.
    #[serde(default, deserialize_with = "lenient_count")]
    pub capacity: Option<u32>,
    #[serde(rename = "currentStudents", default, deserialize_with = "lenient_count")]
    pub current_students: Option<u32>,
    /// The requesting student's application state for this club, if any.
    #[serde(rename = "enrollmentStatus", default)]
    pub enrollment_status: Option<ApplicationStatus>,
    #[serde(rename = "telegramChannelLink", default)]
    pub telegram_channel_link: Option<String>,
    #[serde(rename = "enrolledAt", default)]
    pub enrolled_at: Option<String>,
    #[serde(rename = "approvedAt", default)]
    pub approved_at: Option<String>,
}

impl FromId for Club {
    fn from_id(id: String) -> Self {
        Self { id: Some(id), ..Default::default() }
    }
}

impl Club {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn current_students(&self) -> u32 {
        self.current_students.unwrap_or(0)
    }

    /// The seat limit. A capacity of zero means the club has no limit.
    pub fn seat_limit(&self) -> Option<u32> {
        self.capacity.filter(|&capacity| capacity > 0)
    }

    /// "12 / 20", or "12 / ∞" for clubs without a limit.
    pub fn seats_display(&self) -> String {
        match self.seat_limit() {
            Some(capacity) => format!("{} / {}", self.current_students(), capacity),
            None => format!("{} / ∞", self.current_students()),
        }
    }
}

/// Page metadata returned with the club listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Pagination {
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub pages: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn pages(&self) -> u32 {
        self.pages.unwrap_or(1).max(1)
    }
}

/// Payload of `GET /student/clubs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ClubPage {
    #[serde(default)]
    pub clubs: Vec<Club>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_club_listing() {
        let json = r#"{
            "clubs": [{
                "_id": "65aa01",
                "name": "Robototexnika",
                "faculty": {"_id": "f3", "name": "Informatika fakulteti"},
                "schedule": {"days": [1, 3], "time": {"start": "14:00", "end": "15:20"}, "weekType": "odd"},
                "capacity": 20,
                "currentStudents": 18,
                "enrollmentStatus": "pending"
            }],
            "pagination": {"total": 31, "page": 1, "pages": 3, "limit": 12}
        }"#;

        let page: ClubPage = serde_json::from_str(json).expect("club page");
        assert_eq!(page.pagination.pages(), 3);
        let club = &page.clubs[0];
        assert_eq!(club.id(), "65aa01");
        assert_eq!(club.enrollment_status, Some(ApplicationStatus::Pending));
        assert_eq!(club.seats_display(), "18 / 20");
        assert_eq!(
            club.schedule.as_ref().map(|s| s.to_string()).as_deref(),
            Some("Mon, Wed 14:00 - 15:20")
        );
    }

    #[test]
    fn test_schedule_may_be_plain_text() {
        let club: Club =
            serde_json::from_str(r#"{"name": "Shaxmat", "schedule": "Juma 16:00"}"#).expect("club");
        assert_eq!(club.schedule, Some(ClubSchedule::Text("Juma 16:00".to_string())));
        assert_eq!(club.seats_display(), "0 / ∞");
    }

    #[test]
    fn test_pagination_defaults_to_single_page() {
        assert_eq!(Pagination::default().pages(), 1);
    }
}
