use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::api::ApiError;

use super::{QuerySnapshot, QueryStatus, Subscription};

/// A snapshot with its payload decoded into a model type.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

impl<T: DeserializeOwned> QueryState<T> {
    /// Decode a snapshot. A payload that does not fit `T` is reported as an
    /// error state instead of data.
    fn from_snapshot(snapshot: &QuerySnapshot) -> Self {
        match snapshot.decode::<T>() {
            Some(Ok(data)) => Self {
                status: snapshot.status,
                data: Some(data),
                error: snapshot.error.clone(),
                updated_at: snapshot.updated_at,
            },
            Some(Err(error)) => Self {
                status: QueryStatus::Error,
                data: None,
                error: Some(error),
                updated_at: snapshot.updated_at,
            },
            None => Self {
                status: snapshot.status,
                data: None,
                error: snapshot.error.clone(),
                updated_at: snapshot.updated_at,
            },
        }
    }
}

/// Typed handle over a [`Subscription`].
pub struct Query<T> {
    subscription: Subscription,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Query<T> {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(&self.subscription.current())
    }

    /// Wait for the next change and decode it.
    pub async fn changed(&mut self) -> QueryState<T> {
        let snapshot = self.subscription.changed().await;
        QueryState::from_snapshot(&snapshot)
    }

    /// Wait for the current load to finish.
    ///
    /// Errors win over stale data here: a failed refresh is reported as
    /// the failure even though the previous payload is still cached.
    pub async fn wait(&mut self) -> Result<T, ApiError> {
        let snapshot = self.subscription.resolved().await;
        if let Some(ref error) = snapshot.error {
            return Err(error.clone());
        }
        match snapshot.decode::<T>() {
            Some(result) => result,
            None => Err(ApiError::InvalidResponse("response carried no data".to_string())),
        }
    }

    pub fn refetch(&self) -> bool {
        self.subscription.refetch()
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Application;
    use crate::query::{QueryCache, QueryDescriptor, Tag};
    use crate::testing::{client_with, failure, ScriptedTransport};
    use serde_json::json;

    fn descriptor() -> QueryDescriptor {
        QueryDescriptor::new("applications", "/student/applications")
    }

    #[tokio::test]
    async fn test_wait_decodes_payload() {
        let transport = ScriptedTransport::ok(json!([
            {"_id": "a1", "status": "approved", "club": {"name": "Chess"}}
        ]));
        let cache = QueryCache::new(client_with(transport));

        let mut query: Query<Vec<Application>> = Query::new(cache.subscribe(descriptor(), &[Tag::Application]));
        let apps = query.wait().await.expect("applications");
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].club_name(), "Chess");

        let state = query.state();
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data.map(|d| d.len()), Some(1));
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_error_state() {
        let transport = ScriptedTransport::ok(json!({"not": "a list"}));
        let cache = QueryCache::new(client_with(transport));

        let mut query: Query<Vec<Application>> = Query::new(cache.subscribe(descriptor(), &[]));
        assert!(matches!(query.wait().await, Err(ApiError::InvalidResponse(_))));
        let state = query.state();
        assert!(state.is_error());
        assert!(state.data.is_none());
    }

    #[tokio::test]
    async fn test_wait_reports_server_error() {
        let transport = ScriptedTransport::new(|_| Ok(failure(404, "Topilmadi")));
        let cache = QueryCache::new(client_with(transport));

        let mut query: Query<Vec<Application>> = Query::new(cache.subscribe(descriptor(), &[]));
        assert_eq!(query.wait().await, Err(ApiError::NotFound("Topilmadi".to_string())));
    }
}
