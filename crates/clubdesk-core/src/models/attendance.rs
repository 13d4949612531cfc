use serde::{Deserialize, Serialize};

use super::de::{lenient_bool, ref_or_id, string_or_number};
use super::NamedRef;

/// One class session in the student's attendance history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceRecord {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Populated club, or just its id when the server did not expand it.
    #[serde(default, deserialize_with = "ref_or_id")]
    pub club: Option<NamedRef>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub present: bool,
    /// Absence reason, when the tutor recorded one
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(rename = "telegramPostLink", default)]
    pub telegram_post_link: Option<String>,
}

impl AttendanceRecord {
    pub fn club_id(&self) -> Option<&str> {
        self.club.as_ref().and_then(|c| c.id.as_deref())
    }

    pub fn club_name(&self) -> &str {
        self.club.as_ref().map(|c| c.display_name()).unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_records_still_parse() {
        let records: Vec<AttendanceRecord> = serde_json::from_str(
            r#"[
                {"club": {"_id": "c1", "name": "Shaxmat"}, "present": true},
                {"club": "c1", "present": null},
                {"present": "true"}
            ]"#,
        )
        .expect("attendance");

        assert_eq!(records[0].club_name(), "Shaxmat");
        assert_eq!(records[1].club_id(), Some("c1"));
        assert!(!records[1].present);
        assert!(records[2].present);
        assert_eq!(records[2].club_id(), None);
    }
}
