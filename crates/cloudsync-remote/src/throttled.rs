//! Throttled connector wrapper
//!
//! [`ThrottledConnector`] applies an [`AdaptiveThrottle`] to every call of an
//! inner [`RemoteConnector`]: it waits for its turn, forwards the call and
//! feeds the outcome back into the throttle.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cloudsync_core::domain::{
    CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesOperation,
    FetchLatestChangesResponse, FetchRecordsOperation, FetchRecordsResponse, ModifyOperation,
    ModifyResponse, SyncError,
};
use cloudsync_core::ports::RemoteConnector;

use crate::throttle::AdaptiveThrottle;

/// A connector whose calls are paced by an adaptive throttle
pub struct ThrottledConnector<C> {
    inner: C,
    throttle: Arc<AdaptiveThrottle>,
}

impl<C: RemoteConnector> ThrottledConnector<C> {
    /// Wraps `inner` with its own throttle
    pub fn new(inner: C, throttle: AdaptiveThrottle) -> Self {
        Self::with_shared_throttle(inner, Arc::new(throttle))
    }

    /// Wraps `inner` with a throttle shared with other observers
    pub fn with_shared_throttle(inner: C, throttle: Arc<AdaptiveThrottle>) -> Self {
        Self { inner, throttle }
    }

    /// Returns the throttle
    pub fn throttle(&self) -> &Arc<AdaptiveThrottle> {
        &self.throttle
    }

    /// Returns the wrapped connector
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn paced<T, Fut>(&self, name: &'static str, call: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, SyncError>>,
    {
        self.throttle.wait_turn().await;

        let result = call.await;
        match &result {
            Ok(_) => self.throttle.on_success(),
            // A cancelled call says nothing about backend pressure
            Err(SyncError::Cancelled) => {}
            Err(e) => {
                debug!(call = name, error = %e, "Connector call failed");
                self.throttle.on_failure(e.retry_after());
            }
        }

        result
    }
}

#[async_trait]
impl<C: RemoteConnector> RemoteConnector for ThrottledConnector<C> {
    async fn modify(&self, operation: &ModifyOperation) -> Result<ModifyResponse, SyncError> {
        // Nothing to send; skip the backend and the throttle entirely
        if operation.item_count() == 0 {
            return Ok(ModifyResponse::default());
        }

        self.paced("modify", self.inner.modify(operation)).await
    }

    async fn fetch_latest_changes(
        &self,
        operation: &FetchLatestChangesOperation,
    ) -> Result<FetchLatestChangesResponse, SyncError> {
        self.paced(
            "fetch_latest_changes",
            self.inner.fetch_latest_changes(operation),
        )
        .await
    }

    async fn fetch_records(
        &self,
        operation: &FetchRecordsOperation,
    ) -> Result<FetchRecordsResponse, SyncError> {
        self.paced("fetch_records", self.inner.fetch_records(operation))
            .await
    }

    async fn create_zone(&self, operation: &CreateZoneOperation) -> Result<bool, SyncError> {
        self.paced("create_zone", self.inner.create_zone(operation))
            .await
    }

    async fn create_subscription(
        &self,
        operation: &CreateSubscriptionOperation,
    ) -> Result<bool, SyncError> {
        self.paced(
            "create_subscription",
            self.inner.create_subscription(operation),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::memory::MemoryConnector;
    use cloudsync_core::domain::{OperationMode, Record, ZoneId};

    fn zone() -> ZoneId {
        ZoneId::for_current_user("Notes").unwrap()
    }

    fn connector() -> ThrottledConnector<MemoryConnector> {
        ThrottledConnector::new(MemoryConnector::with_zone(zone()), AdaptiveThrottle::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_with_retry_after_delays_next_call() {
        let connector = connector();
        connector.inner().fail_next(SyncError::RateLimited {
            retry_after: Some(Duration::from_secs(20)),
        });

        let fetch = FetchLatestChangesOperation::new(None);
        assert!(connector.fetch_latest_changes(&fetch).await.is_err());
        assert_eq!(connector.throttle().duration(), Duration::from_secs(20));

        let started = Instant::now();
        connector.fetch_latest_changes(&fetch).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(20));

        // 20s * 2/3
        assert_eq!(
            connector.throttle().duration(),
            Duration::from_secs(20) * 2 / 3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_modify_skips_backend() {
        let connector = connector();
        let response = connector
            .modify(&ModifyOperation::new(vec![], vec![]))
            .await
            .unwrap();
        assert_eq!(response, ModifyResponse::default());
        assert_eq!(connector.inner().call_count(OperationMode::Modify), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_leaves_throttle_untouched() {
        let connector = connector();
        connector.throttle().on_failure(Some(Duration::from_secs(4)));
        connector.inner().fail_next(SyncError::Cancelled);

        let op = ModifyOperation::new(vec![Record::new("a".parse().unwrap(), "Note")], vec![]);
        assert_eq!(connector.modify(&op).await, Err(SyncError::Cancelled));
        assert_eq!(connector.throttle().duration(), Duration::from_secs(4));
    }
}
