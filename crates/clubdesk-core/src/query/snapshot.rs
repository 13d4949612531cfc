use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Loading,
    Success,
    Error,
}

/// Immutable view of a cache entry. Replaced whole on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    /// Last good payload. Kept while refreshing and after a failed refresh.
    pub data: Option<Arc<Value>>,
    pub error: Option<ApiError>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
    pub(crate) fn initial() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
            updated_at: None,
        }
    }

    /// Loading again, keeping whatever data was there.
    pub(crate) fn refreshing(&self) -> Self {
        Self {
            status: QueryStatus::Loading,
            data: self.data.clone(),
            error: None,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn success(data: Value) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(Arc::new(data)),
            error: None,
            updated_at: Some(Utc::now()),
        }
    }

    pub(crate) fn failed(&self, error: ApiError) -> Self {
        Self {
            status: QueryStatus::Error,
            data: self.data.clone(),
            error: Some(error),
            updated_at: self.updated_at,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Loading with previous data still on display.
    pub fn is_refreshing(&self) -> bool {
        self.is_loading() && self.data.is_some()
    }

    /// Decode the payload, if any.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, ApiError>> {
        self.data.as_ref().map(|value| {
            T::deserialize(&**value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_refresh_and_failure_keep_data() {
        let ok = QuerySnapshot::success(json!([1, 2]));
        let refreshing = ok.refreshing();
        assert!(refreshing.is_refreshing());
        assert_eq!(refreshing.data, ok.data);

        let failed = refreshing.failed(ApiError::Network("offline".into()));
        assert!(failed.is_error());
        assert_eq!(failed.data, ok.data);
        assert_eq!(failed.updated_at, ok.updated_at);
    }

    #[test]
    fn test_first_failure_has_no_data() {
        let failed = QuerySnapshot::initial().failed(ApiError::RateLimited);
        assert!(failed.data.is_none());
        assert!(failed.decode::<Vec<u32>>().is_none());
    }

    #[test]
    fn test_decode() {
        let snap = QuerySnapshot::success(json!([1, 2, 3]));
        let decoded: Vec<u32> = snap.decode().expect("data").expect("decodes");
        assert_eq!(decoded, vec![1, 2, 3]);
        assert!(matches!(snap.decode::<String>(), Some(Err(ApiError::InvalidResponse(_)))));
    }
}
