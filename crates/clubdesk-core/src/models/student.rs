use serde::{Deserialize, Serialize};

use super::de::{string_or_number, FromId};

/// A name reference such as a group, department or faculty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NamedRef {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl NamedRef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }
}

impl FromId for NamedRef {
    fn from_id(id: String) -> Self {
        Self { id: Some(id), name: None }
    }
}

/// The logged-in student's identity, as the API and HEMIS report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Student {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub student_id_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub group: Option<NamedRef>,
    #[serde(default)]
    pub department: Option<NamedRef>,
}

impl Student {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.student_id_number.as_deref())
            .unwrap_or("Student")
    }
}

/// Body of `POST /auth/student/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub student_id: String,
    pub password: String,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub student: Student,
    #[serde(rename = "firstLogin", default)]
    pub first_login: bool,
}

/// Body of `PUT /student/profile`. Only the fields students may edit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of `POST /student/change-password`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangePassword {
    #[serde(rename = "oldPassword")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}
