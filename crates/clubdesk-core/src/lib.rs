//! clubdesk core - client-side data layer for the student club service.
//!
//! - [`api`]: request/envelope types, the transport seam and `ApiClient`
//! - [`query`]: tagged query cache with request deduplication
//! - [`auth`]: session store and remembered credentials
//! - [`filter`]: filter, search and pagination state with debounce
//! - [`stats`]: statistics derived from cached records
//! - [`student`]: typed endpoints binding paths, parameters and tags
//! - [`models`]: payload records
//! - [`config`]: on-disk configuration and directories

pub mod api;
pub mod auth;
pub mod config;
pub mod filter;
pub mod models;
pub mod query;
pub mod stats;
pub mod student;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::SessionStore;
pub use config::Config;
pub use filter::FilterState;
pub use query::{Query, QueryCache, Tag};
pub use student::StudentApi;
