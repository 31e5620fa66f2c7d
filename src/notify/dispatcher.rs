// Notification dispatcher: paced initial sync and concurrent fan-out

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::models::{NotificationEvent, Registration, RegistrationId};
use crate::core::traits::{CallbackDelivery, ConfigStore, RegistrationStore};
use crate::metrics::Metrics;

/// Delay between consecutive initial-sync deliveries
pub const DEFAULT_SYNC_PACING: Duration = Duration::from_secs(2);

const MODE_INITIAL_SYNC: &str = "initial_sync";
const MODE_FAN_OUT: &str = "fan_out";

/// Counts for one initial sync or fan-out round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Failed registrations that were removed from the store
    pub pruned: usize,
    /// Deliveries dropped because an earlier round pruned the registration
    pub skipped: usize,
}

enum FanoutOutcome {
    Delivered,
    Pruned,
    DeadNotPruned,
    Skipped,
}

#[derive(Default)]
struct Lane {
    pruned: bool,
}

/// One delivery lane per registration with work in flight
///
/// Deliveries to the same registration queue on its lane; different
/// registrations never wait on each other. Lane handles are taken while the
/// recipient list is read, so a round that listed a registration before it
/// was pruned still sees the prune and skips it.
#[derive(Default)]
struct Lanes {
    open: Mutex<HashMap<RegistrationId, Arc<Mutex<Lane>>>>,
}

impl Lanes {
    async fn release(&self, id: &RegistrationId, lane: Arc<Mutex<Lane>>) {
        let mut open = self.open.lock().await;
        drop(lane);
        if open.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            open.remove(id);
        }
    }
}

/// Pushes configuration events to accepted registrations
///
/// Two delivery shapes:
/// - initial sync: one registration, every record, sequential and paced.
///   Failures are logged and skipped; the consumer is assumed slow, not dead.
/// - fan-out: one event, every eligible registration, one task each, joined
///   before returning. A failed delivery prunes that registration.
///
/// Fan-out rounds run concurrently. Within one registration deliveries are
/// serialized, and nothing more is sent to it once a round has pruned it.
pub struct NotificationDispatcher {
    registrations: Arc<dyn RegistrationStore>,
    configs: Arc<dyn ConfigStore>,
    delivery: Arc<dyn CallbackDelivery>,
    metrics: Arc<Metrics>,
    pacing: Duration,
    lanes: Arc<Lanes>,
}

impl NotificationDispatcher {
    pub fn new(
        registrations: Arc<dyn RegistrationStore>,
        configs: Arc<dyn ConfigStore>,
        delivery: Arc<dyn CallbackDelivery>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registrations,
            configs,
            delivery,
            metrics,
            pacing: DEFAULT_SYNC_PACING,
            lanes: Arc::new(Lanes::default()),
        }
    }

    /// Override the initial-sync pacing delay
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replay every configuration record to one newly accepted registration
    pub async fn initial_sync(&self, registration: &Registration) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let Some(uri) = registration.callback_uri() else {
            return report;
        };

        let records = match self.configs.list_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    registration_id = %registration.id,
                    error = %e,
                    "Initial sync aborted: could not load configs"
                );
                return report;
            }
        };

        info!(
            registration_id = %registration.id,
            callback = %uri,
            count = records.len(),
            pacing_ms = self.pacing.as_millis() as u64,
            "Starting initial sync"
        );

        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            report.attempted += 1;
            match self.delivery.push_config(uri, &registration.id, record).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.count_delivery(MODE_INITIAL_SYNC, "delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    self.count_delivery(MODE_INITIAL_SYNC, "failed");
                    warn!(
                        registration_id = %registration.id,
                        config_id = %record.config_id,
                        error = %e,
                        "Couldn't send config during initial sync"
                    );
                }
            }
        }

        info!(
            registration_id = %registration.id,
            delivered = report.delivered,
            failed = report.failed,
            "Initial sync finished"
        );
        report
    }

    /// Broadcast one event to every accepted registration with a callback
    pub async fn fan_out(&self, event: NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let recipients = {
            let mut open = self.lanes.open.lock().await;
            let recipients = match self.registrations.list_accepted_with_callback().await {
                Ok(recipients) => recipients,
                Err(e) => {
                    error!(event = event.kind(), error = %e, "Fan-out aborted: could not list registrations");
                    return report;
                }
            };
            recipients
                .into_iter()
                .map(|registration| {
                    let lane = Arc::clone(open.entry(registration.id.clone()).or_default());
                    (registration, lane)
                })
                .collect::<Vec<_>>()
        };

        let event = Arc::new(event);
        let mut deliveries = JoinSet::new();

        for (registration, lane) in recipients {
            let store = Arc::clone(&self.registrations);
            let delivery = Arc::clone(&self.delivery);
            let metrics = Arc::clone(&self.metrics);
            let lanes = Arc::clone(&self.lanes);
            let event = Arc::clone(&event);

            deliveries.spawn(async move {
                let outcome = {
                    let mut state = lane.lock().await;
                    if state.pruned {
                        FanoutOutcome::Skipped
                    } else {
                        let outcome =
                            deliver_one(store, delivery, metrics, &registration, &event).await;
                        state.pruned = matches!(outcome, FanoutOutcome::Pruned);
                        outcome
                    }
                };
                lanes.release(&registration.id, lane).await;
                outcome
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            if !matches!(joined, Ok(FanoutOutcome::Skipped)) {
                report.attempted += 1;
            }
            match joined {
                Ok(FanoutOutcome::Delivered) => report.delivered += 1,
                Ok(FanoutOutcome::Pruned) => {
                    report.failed += 1;
                    report.pruned += 1;
                }
                Ok(FanoutOutcome::DeadNotPruned) => report.failed += 1,
                Ok(FanoutOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "Fan-out delivery task panicked");
                }
            }
        }

        info!(
            event = event.kind(),
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned,
            skipped = report.skipped,
            "Fan-out finished"
        );
        report
    }

    fn count_delivery(&self, mode: &str, outcome: &str) {
        self.metrics
            .deliveries
            .with_label_values(&[mode, outcome])
            .inc();
    }
}

async fn deliver_one(
    store: Arc<dyn RegistrationStore>,
    delivery: Arc<dyn CallbackDelivery>,
    metrics: Arc<Metrics>,
    registration: &Registration,
    event: &NotificationEvent,
) -> FanoutOutcome {
    let Some(uri) = registration.callback_uri() else {
        return FanoutOutcome::Delivered;
    };

    let result = match event {
        NotificationEvent::Created(record) => {
            delivery.push_config(uri, &registration.id, record).await
        }
        NotificationEvent::Deleted { config_id } => {
            delivery.push_delete(uri, &registration.id, config_id).await
        }
    };

    match result {
        Ok(()) => {
            metrics
                .deliveries
                .with_label_values(&[MODE_FAN_OUT, "delivered"])
                .inc();
            FanoutOutcome::Delivered
        }
        Err(e) => {
            metrics
                .deliveries
                .with_label_values(&[MODE_FAN_OUT, "failed"])
                .inc();
            warn!(
                registration_id = %registration.id,
                callback = %uri,
                error = %e,
                "Error while sending, removing registration"
            );
            match store.delete(&registration.id).await {
                Ok(_) => {
                    metrics.registrations_pruned.inc();
                    FanoutOutcome::Pruned
                }
                Err(e) => {
                    error!(
                        registration_id = %registration.id,
                        error = %e,
                        "Dead registration could not be removed"
                    );
                    FanoutOutcome::DeadNotPruned
                }
            }
        }
    }
}
