//! Typed endpoints of the student API.
//!
//! Each read returns a [`Query`] bound to a cache descriptor and the tags
//! it provides; each write goes through [`QueryCache::mutate`] with the
//! tags it invalidates.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ApiError, ApiRequest, Envelope, QueryParams};
use crate::auth::{SessionData, SessionStore};
use crate::models::{
    Application, AttendanceRecord, ChangePassword, Club, ClubPage, Dashboard, ExternalCourse,
    ExternalCourseInput, LoginRequest, LoginResponse, ProfileUpdate, Student,
};
use crate::query::{Query, QueryCache, QueryDescriptor, Tag};

// ============================================================================
// Paths
// ============================================================================

const LOGIN_PATH: &str = "/auth/student/login";
const PROFILE_PATH: &str = "/auth/profile";
const PROFILE_UPDATE_PATH: &str = "/student/profile";
const CHANGE_PASSWORD_PATH: &str = "/student/change-password";
const DASHBOARD_PATH: &str = "/student/dashboard";
const CLUBS_PATH: &str = "/student/clubs";
const APPLICATIONS_PATH: &str = "/student/applications";
const MY_CLUBS_PATH: &str = "/student/my-clubs";
const EXTERNAL_COURSES_PATH: &str = "/student/external-courses";
const EXTERNAL_COURSE_PATH: &str = "/student/external-course";
const ATTENDANCE_PATH: &str = "/student/attendance";

fn club_path(id: &str) -> String {
    format!("/student/club/{}", id)
}

fn course_path(id: &str) -> String {
    format!("{}/{}", EXTERNAL_COURSE_PATH, id)
}

fn session_error(err: anyhow::Error) -> ApiError {
    ApiError::Session(format!("{:#}", err))
}

/// Student-facing API over a shared [`QueryCache`].
/// Clone is cheap - the cache is shared.
#[derive(Clone)]
pub struct StudentApi {
    cache: QueryCache,
}

impl StudentApi {
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.cache.client().session()
    }

    fn query<T: serde::de::DeserializeOwned>(&self, descriptor: QueryDescriptor, tags: &[Tag]) -> Query<T> {
        Query::new(self.cache.subscribe(descriptor, tags))
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Exchange HEMIS credentials for a session.
    ///
    /// On success the session is stored and any cached data from a previous
    /// session is dropped. A failed login leaves the session untouched.
    pub async fn login(&self, student_id: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).anonymous().with_json(&LoginRequest {
            student_id: student_id.to_string(),
            password: password.to_string(),
        })?;

        let response: LoginResponse = self.cache.client().request(&request).await?.decode()?;

        self.cache.clear();
        self.session()
            .login(SessionData {
                token: response.token.clone(),
                student: response.student.clone(),
            })
            .map_err(session_error)?;

        if response.first_login {
            info!(student = %response.student.display_name(), "First login");
        }
        Ok(response)
    }

    /// Drop the session and everything cached under it.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.cache.clear();
        self.session().logout().map_err(session_error)
    }

    pub fn profile(&self) -> Query<Student> {
        self.query(QueryDescriptor::new("profile", PROFILE_PATH), &[Tag::Session])
    }

    /// Fetch the identity from the server and store it in the session.
    /// A cached profile is never returned; the server is always asked.
    pub async fn refresh_profile(&self) -> Result<Student, ApiError> {
        let mut profile = self.profile();
        if !profile.state().is_loading() {
            profile.refetch();
        }
        let student = profile.wait().await?;
        self.session()
            .update_student(student.clone())
            .map_err(session_error)?;
        Ok(student)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Student, ApiError> {
        let request = ApiRequest::put(PROFILE_UPDATE_PATH).with_json(update)?;
        let student: Student = self.cache.mutate(&request, &[Tag::Session]).await?.decode()?;
        self.session()
            .update_student(student.clone())
            .map_err(session_error)?;
        Ok(student)
    }

    pub async fn change_password(&self, change: &ChangePassword) -> Result<Envelope, ApiError> {
        let request = ApiRequest::post(CHANGE_PASSWORD_PATH).with_json(change)?;
        self.cache.mutate(&request, &[Tag::Session]).await
    }

    /// Log out when `err` means the token is no longer accepted.
    /// Returns whether the session was ended.
    pub fn end_session_on_auth_failure(&self, err: &ApiError) -> bool {
        if !err.is_auth_failure() {
            return false;
        }
        warn!(error = %err, "Token rejected, ending session");
        if let Err(e) = self.logout() {
            warn!(error = %e, "Failed to clear session");
        }
        true
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub fn dashboard(&self) -> Query<Dashboard> {
        self.query(QueryDescriptor::new("dashboard", DASHBOARD_PATH), &[Tag::Dashboard])
    }

    // ========================================================================
    // Clubs and applications
    // ========================================================================

    /// Club listing. Accepts `facultyId`, `categoryId`, `search`, `page`, `limit`.
    pub fn clubs(&self, params: QueryParams) -> Query<ClubPage> {
        self.query(
            QueryDescriptor::new("club-list", CLUBS_PATH).with_params(params),
            &[Tag::Club],
        )
    }

    pub fn club(&self, id: &str) -> Query<Club> {
        self.query(QueryDescriptor::new("club-detail", club_path(id)), &[Tag::Club])
    }

    pub fn my_clubs(&self) -> Query<Vec<Club>> {
        self.query(QueryDescriptor::new("my-clubs", MY_CLUBS_PATH), &[Tag::Club])
    }

    pub async fn apply(&self, club_id: &str) -> Result<Envelope, ApiError> {
        let request = ApiRequest::post(format!("{}/apply", club_path(club_id)));
        self.cache
            .mutate(&request, &[Tag::Application, Tag::Club, Tag::Dashboard])
            .await
    }

    pub fn applications(&self) -> Query<Vec<Application>> {
        self.query(QueryDescriptor::new("applications", APPLICATIONS_PATH), &[Tag::Application])
    }

    // ========================================================================
    // External courses
    // ========================================================================

    pub fn external_courses(&self) -> Query<Vec<ExternalCourse>> {
        self.query(
            QueryDescriptor::new("external-courses", EXTERNAL_COURSES_PATH),
            &[Tag::ExternalCourse],
        )
    }

    pub async fn add_course(&self, input: &ExternalCourseInput) -> Result<Envelope, ApiError> {
        let request = ApiRequest::post(EXTERNAL_COURSE_PATH).with_json(input)?;
        self.cache
            .mutate(&request, &[Tag::ExternalCourse, Tag::Dashboard])
            .await
    }

    pub async fn update_course(&self, id: &str, input: &ExternalCourseInput) -> Result<Envelope, ApiError> {
        let request = ApiRequest::put(course_path(id)).with_json(input)?;
        self.cache.mutate(&request, &[Tag::ExternalCourse]).await
    }

    pub async fn delete_course(&self, id: &str) -> Result<Envelope, ApiError> {
        let request = ApiRequest::delete(course_path(id));
        self.cache
            .mutate(&request, &[Tag::ExternalCourse, Tag::Dashboard])
            .await
    }

    // ========================================================================
    // Attendance
    // ========================================================================

    /// Attendance history. Accepts `clubId`, `startDate`, `endDate`.
    pub fn attendance(&self, params: QueryParams) -> Query<Vec<AttendanceRecord>> {
        self.query(
            QueryDescriptor::new("attendance", ATTENDANCE_PATH).with_params(params),
            &[Tag::Attendance],
        )
    }
}
