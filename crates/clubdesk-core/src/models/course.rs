use serde::{Deserialize, Serialize};

use super::de::string_or_number;
use super::{Schedule, TimeRange};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Instructor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A course the student attends outside the university.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ExternalCourse {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(rename = "courseName", default)]
    pub course_name: String,
    #[serde(rename = "institutionName", default)]
    pub institution_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub instructor: Option<Instructor>,
    #[serde(rename = "studentPhone", default)]
    pub student_phone: Option<String>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
    /// Only an explicit `false` marks the course inactive.
    #[serde(rename = "isActive", default)]
    pub is_active: Option<bool>,
}

/// Schedule part of a course submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseScheduleInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeRange>,
}

/// Body of the create and update course endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExternalCourseInput {
    #[serde(rename = "courseName")]
    pub course_name: String,
    #[serde(rename = "institutionName")]
    pub institution_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub schedule: CourseScheduleInput,
    #[serde(rename = "instructorName", skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
    #[serde(rename = "instructorPhone", skip_serializing_if = "Option::is_none")]
    pub instructor_phone: Option<String>,
    #[serde(rename = "studentPhone", skip_serializing_if = "Option::is_none")]
    pub student_phone: Option<String>,
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ExternalCourseInput {
    /// Prefill an edit form from an existing course.
    pub fn from_course(course: &ExternalCourse) -> Self {
        let schedule = course.schedule.clone().unwrap_or_default();
        let instructor = course.instructor.clone().unwrap_or_default();
        Self {
            course_name: course.course_name.clone(),
            institution_name: course.institution_name.clone().unwrap_or_default(),
            address: course.address.clone(),
            schedule: CourseScheduleInput {
                days: schedule.days,
                time: schedule.time,
            },
            instructor_name: instructor.name,
            instructor_phone: instructor.phone,
            student_phone: course.student_phone.clone(),
            start_date: course.start_date.clone(),
            end_date: course.end_date.clone(),
        }
    }
}
