//! Zone and subscription bootstrap
//!
//! On `Start`, queues creation of whichever prerequisite is still unknown.
//! Data work stays blocked until both succeed; that rule lives in
//! [`SyncState::allowed_operation_modes`](cloudsync_core::domain::SyncState::allowed_operation_modes).

use tracing::debug;

use cloudsync_core::domain::{
    CreateSubscriptionOperation, CreateZoneOperation, SubscriptionId, SyncEvent, SyncWork, ZoneId,
};

use crate::dispatcher::{Context, Middleware, Next};

pub struct ZoneMiddleware {
    zone_id: ZoneId,
    subscription_id: SubscriptionId,
}

impl ZoneMiddleware {
    pub(crate) fn new(zone_id: ZoneId, subscription_id: SubscriptionId) -> Self {
        Self {
            zone_id,
            subscription_id,
        }
    }
}

impl Middleware for ZoneMiddleware {
    fn name(&self) -> &'static str {
        "zone"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        if event == SyncEvent::Start {
            if ctx.state().has_created_zone.is_none() {
                debug!(zone = %self.zone_id, "Queueing zone creation");
                ctx.dispatch(SyncEvent::DoWork(SyncWork::CreateZone(
                    CreateZoneOperation::new(self.zone_id.clone()),
                )));
            }

            if ctx.state().has_created_subscription.is_none() {
                debug!(subscription = %self.subscription_id, "Queueing subscription creation");
                ctx.dispatch(SyncEvent::DoWork(SyncWork::CreateSubscription(
                    CreateSubscriptionOperation::new(
                        self.zone_id.clone(),
                        self.subscription_id.clone(),
                    ),
                )));
            }
        }

        next.run(ctx, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{running_state, Harness};
    use cloudsync_core::domain::{OperationMode, SyncState};

    fn middleware() -> ZoneMiddleware {
        ZoneMiddleware::new(
            ZoneId::for_current_user("Notes").unwrap(),
            SubscriptionId::new("changes".into()).unwrap(),
        )
    }

    #[test]
    fn test_start_queues_unknown_prerequisites() {
        let mut harness = Harness::new(vec![Box::new(middleware())], SyncState::new());
        harness.dispatch(SyncEvent::Start);

        assert_eq!(harness.state.queue_len(OperationMode::CreateZone), 1);
        assert_eq!(harness.state.queue_len(OperationMode::CreateSubscription), 1);
    }

    #[test]
    fn test_start_skips_known_prerequisites() {
        let mut harness = Harness::new(vec![Box::new(middleware())], running_state());
        harness.dispatch(SyncEvent::Start);

        assert!(!harness.state.has_work_queued());
    }
}
