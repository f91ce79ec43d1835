//! Alert service: operator actions on alerts and reporting.

use voltguard_domain::alert::{Alert, AlertLifecycle, AlertQuery, AlertStatistics};
use voltguard_domain::error::{NotFoundError, VoltGuardError};
use voltguard_domain::event::AutomationEvent;
use voltguard_domain::id::AlertId;
use voltguard_domain::time::now;

use crate::ports::{AlertStore, EventPublisher};

/// Application service for the operator side of the alert lifecycle.
pub struct AlertService<S, P> {
    store: S,
    publisher: P,
}

impl<S: AlertStore, P: EventPublisher> AlertService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// # Errors
    ///
    /// Returns [`VoltGuardError::NotFound`] when no alert with `id` exists,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: AlertId) -> Result<Alert, VoltGuardError> {
        self.store.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Alert",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Acknowledge an alert (`nouvelle → vue`).
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::NotFound`] for an unknown id,
    /// [`VoltGuardError::AlertTransition`] if the alert is resolved, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn mark_seen(&self, id: AlertId) -> Result<Alert, VoltGuardError> {
        let alert = AlertLifecycle::mark_seen(self.get(id).await?, now())?;
        self.store.upsert(alert).await
    }

    /// Close an alert with an optional comment.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::NotFound`] for an unknown id,
    /// [`VoltGuardError::AlertTransition`] if the alert is already resolved,
    /// or a storage error.
    #[tracing::instrument(skip(self, comment))]
    pub async fn resolve(
        &self,
        id: AlertId,
        comment: Option<String>,
    ) -> Result<Alert, VoltGuardError> {
        let alert = AlertLifecycle::resolve(self.get(id).await?, comment, now())?;
        let alert = self.store.upsert(alert).await?;
        tracing::info!(alert_type = %alert.alert_type, device_id = %alert.device_id, "alert resolved by operator");
        if let Err(err) = self
            .publisher
            .publish(AutomationEvent::AlertResolved {
                alert: alert.clone(),
            })
            .await
        {
            tracing::warn!(error = %err, "failed to publish automation event");
        }
        Ok(alert)
    }

    /// Alerts matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn list(&self, query: AlertQuery) -> Result<Vec<Alert>, VoltGuardError> {
        self.store.query(query).await
    }

    /// Counts by severity and status for every alert matching `query`.
    ///
    /// The query limit is ignored.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn statistics(&self, query: AlertQuery) -> Result<AlertStatistics, VoltGuardError> {
        let alerts = self
            .store
            .query(AlertQuery {
                limit: None,
                ..query
            })
            .await?;
        Ok(AlertStatistics::from_alerts(&alerts))
    }
}
