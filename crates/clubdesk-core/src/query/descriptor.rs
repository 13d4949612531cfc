use std::fmt;

use crate::api::request::escape_component;
use crate::api::{ApiRequest, QueryParams};

/// Invalidation label grouping cache entries by resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Session,
    Dashboard,
    Club,
    Application,
    ExternalCourse,
    Attendance,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Session => write!(f, "session"),
            Tag::Dashboard => write!(f, "dashboard"),
            Tag::Club => write!(f, "club"),
            Tag::Application => write!(f, "application"),
            Tag::ExternalCourse => write!(f, "externalCourse"),
            Tag::Attendance => write!(f, "attendance"),
        }
    }
}

/// Cache identity of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey(String);

impl DescriptorKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to fetch: a resource family, its concrete path and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    pub resource_key: String,
    pub path: String,
    pub params: QueryParams,
}

impl QueryDescriptor {
    pub fn new(resource_key: &str, path: impl Into<String>) -> Self {
        Self {
            resource_key: resource_key.to_string(),
            path: path.into(),
            params: QueryParams::new(),
        }
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    /// Serialized identity. Parameters are canonical, so insertion order
    /// and empty values do not create distinct entries.
    pub fn key(&self) -> DescriptorKey {
        let path = escape_component(&self.path);
        let params = self.params.canonical();
        if params.is_empty() {
            DescriptorKey(format!("{} {}", self.resource_key, path))
        } else {
            DescriptorKey(format!("{} {}?{}", self.resource_key, path, params))
        }
    }

    /// The GET request that loads this descriptor.
    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(self.path.clone()).with_params(self.params.clone())
    }
}
