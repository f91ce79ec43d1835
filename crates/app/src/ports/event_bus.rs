//! Event bus port: publish/subscribe for automation events.

use std::future::Future;

use voltguard_domain::error::VoltGuardError;
use voltguard_domain::event::AutomationEvent;

/// Publishes automation events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(
        &self,
        event: AutomationEvent,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: AutomationEvent,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        (**self).publish(event)
    }
}
