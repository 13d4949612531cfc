//! REST API client module for the student club service.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend that owns clubs, applications, attendance and external courses.
//!
//! Every endpoint answers with the `{ success, data, message }` envelope.
//! Authenticated calls carry the session's JWT as a bearer token.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, HttpTransport, RawResponse, Transport, DEFAULT_API_URL};
pub use error::ApiError;
pub use request::{ApiRequest, Envelope, Method, ParamValue, QueryParams};
