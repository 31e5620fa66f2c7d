// Registration lifecycle: create pending, accept, query

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::{AcceptOutcome, CallbackSpec, Registration, RegistrationId};
use crate::core::traits::{CallbackVerifier, RegistrationStore};
use crate::metrics::Metrics;
use crate::notify::{BackgroundTasks, NotificationDispatcher};

/// Lifecycle operations over the registration store
pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    verifier: Arc<dyn CallbackVerifier>,
    dispatcher: Arc<NotificationDispatcher>,
    tasks: BackgroundTasks,
    metrics: Arc<Metrics>,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        verifier: Arc<dyn CallbackVerifier>,
        dispatcher: Arc<NotificationDispatcher>,
        tasks: BackgroundTasks,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            verifier,
            dispatcher,
            tasks,
            metrics,
        }
    }

    /// Create a pending registration
    ///
    /// A supplied callback must pass verification first; if it does not,
    /// nothing is persisted and `CallbackError` is returned.
    pub async fn create(&self, callback: Option<CallbackSpec>) -> RelayResult<RegistrationId> {
        let registration = match callback {
            Some(spec) => {
                self.verifier.verify(&spec).await?;
                info!(callback = %spec.uri, "Registration with callback");
                Registration::pending(Some(spec.uri))
            }
            None => {
                info!("Registration without callback");
                Registration::pending(None)
            }
        };

        self.store.insert(&registration).await?;
        self.metrics.registrations_created.inc();
        Ok(registration.id)
    }

    /// Mark a registration accepted
    ///
    /// Idempotent. Only the pending -> accepted transition of a registration
    /// with a callback schedules the initial sync, and the caller never waits
    /// for it.
    pub async fn accept(&self, id: &RegistrationId) -> RelayResult<()> {
        let outcome = match self.store.accept(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.count_accept("error");
                return Err(e);
            }
        };

        match outcome {
            AcceptOutcome::NotFound => {
                self.count_accept("not_found");
                Err(RelayError::NotFound)
            }
            AcceptOutcome::AlreadyAccepted => {
                self.count_accept("already_accepted");
                info!(registration_id = %id, "Registration already accepted");
                Ok(())
            }
            AcceptOutcome::Accepted(registration) => {
                self.count_accept("accepted");
                info!(registration_id = %id, "Registration accepted");
                if registration.callback_uri().is_some() {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    self.tasks.spawn("initial_sync", async move {
                        dispatcher.initial_sync(&registration).await;
                    });
                }
                Ok(())
            }
        }
    }

    /// Whether `id` is an accepted registration. Unknown ids are simply not accepted.
    pub async fn is_accepted(&self, id: &RegistrationId) -> RelayResult<bool> {
        match self.store.get(id).await {
            Ok(found) => Ok(found.map(|r| r.accepted).unwrap_or(false)),
            Err(e) => {
                warn!(registration_id = %id, error = %e, "Registration lookup failed");
                Err(e)
            }
        }
    }

    pub async fn list_accepted_with_callback(&self) -> RelayResult<Vec<Registration>> {
        self.store.list_accepted_with_callback().await
    }

    fn count_accept(&self, outcome: &str) {
        self.metrics
            .accept_outcomes
            .with_label_values(&[outcome])
            .inc();
    }
}
