//! In-process automation event bus on a tokio broadcast channel.
//!
//! Publishing never blocks the automation: with no subscriber the event is
//! dropped, and a subscriber that falls behind loses the oldest events.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use voltguard_domain::error::VoltGuardError;
use voltguard_domain::event::AutomationEvent;
use voltguard_domain::id::DeviceId;

use crate::ports::EventPublisher;

/// Events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 256;

pub struct InProcessEventBus {
    sender: broadcast::Sender<AutomationEvent>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            device_id: None,
            missed: 0,
        }
    }

    /// Events of one device published from now on.
    #[must_use]
    pub fn subscribe_device(&self, device_id: DeviceId) -> Subscription {
        Subscription {
            device_id: Some(device_id),
            ..self.subscribe()
        }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        event: AutomationEvent,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        // send only fails without receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

/// Receiving end of the bus, optionally narrowed to one device.
pub struct Subscription {
    receiver: broadcast::Receiver<AutomationEvent>,
    device_id: Option<DeviceId>,
    missed: u64,
}

impl Subscription {
    /// Wait for the next matching event.
    ///
    /// Lag is skipped over and counted in [`missed`](Self::missed). Returns
    /// `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<AutomationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagging behind");
                    self.missed += skipped;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Matching event already buffered, without waiting.
    pub fn try_next(&mut self) -> Option<AutomationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(_) => return None,
            }
        }
    }

    /// Events dropped because this subscriber fell behind.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn matches(&self, event: &AutomationEvent) -> bool {
        self.device_id.is_none_or(|id| event.device_id() == id)
    }
}
