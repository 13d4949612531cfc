//! Data models for the student club API.
//!
//! This module contains the records the API returns and accepts:
//!
//! - `Student`, login/profile/password bodies
//! - `Club`, `ClubPage`, schedules
//! - `Application` and its status
//! - `AttendanceRecord`
//! - `ExternalCourse` and its submission body
//! - `Dashboard`
//!
//! Only the fields the client aggregates or displays are modelled; unknown
//! fields are ignored.

mod de;

pub mod application;
pub mod attendance;
pub mod club;
pub mod course;
pub mod dashboard;
pub mod student;

pub use application::{Application, ApplicationNotification, ApplicationStatus};
pub use attendance::AttendanceRecord;
pub use club::{day_name, Club, ClubPage, ClubSchedule, Pagination, Schedule, TimeRange, Tutor, TutorProfile, WeekType};
pub use course::{CourseScheduleInput, ExternalCourse, ExternalCourseInput, Instructor};
pub use dashboard::{Dashboard, DashboardStatistics};
pub use student::{ChangePassword, LoginRequest, LoginResponse, NamedRef, ProfileUpdate, Student};
