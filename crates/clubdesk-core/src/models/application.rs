use serde::{Deserialize, Serialize};

use super::de::{lenient_bool, ref_or_id, string_or_number};
use super::Club;

/// Review state of an enrollment application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "Pending"),
            ApplicationStatus::Approved => write!(f, "Approved"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ApplicationNotification {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub seen: bool,
}

/// A student's application to join a club.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Application {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "ref_or_id")]
    pub club: Option<Club>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(rename = "rejectionReason", default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub notification: Option<ApplicationNotification>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Application {
    pub fn club_name(&self) -> &str {
        self.club
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("-")
    }

    pub fn notification_seen(&self) -> bool {
        self.notification.as_ref().map(|n| n.seen).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_does_not_fail_parsing() {
        let app: Application =
            serde_json::from_str(r#"{"_id": "a1", "status": "withdrawn"}"#).expect("application");
        assert_eq!(app.status, ApplicationStatus::Unknown);
        assert_eq!(app.club_name(), "-");
        assert!(!app.notification_seen());
    }

    #[test]
    fn test_parse_rejected_application() {
        let app: Application = serde_json::from_str(
            r#"{"status": "rejected", "rejectionReason": "Joy qolmagan", "notification": {"seen": true}, "club": {"name": "Drama"}}"#,
        )
        .expect("application");
        assert_eq!(app.status, ApplicationStatus::Rejected);
        assert_eq!(app.rejection_reason.as_deref(), Some("Joy qolmagan"));
        assert!(app.notification_seen());
        assert_eq!(app.club_name(), "Drama");
    }

    #[test]
    fn test_unpopulated_club_and_loose_notification() {
        let app: Application = serde_json::from_str(
            r#"{"club": "65aa01", "status": "approved", "notification": {"seen": null}}"#,
        )
        .expect("application");
        assert_eq!(app.club.as_ref().map(|c| c.id()), Some("65aa01"));
        assert_eq!(app.club_name(), "-");
        assert!(!app.notification_seen());
    }
}
