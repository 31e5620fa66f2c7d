// Prometheus metrics for registration, delivery and admission outcomes

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::core::errors::RelayError;

/// All relay metrics, registered in a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub registrations_created: IntCounter,
    pub accept_outcomes: IntCounterVec,
    pub deliveries: IntCounterVec,
    pub registrations_pruned: IntCounter,
    pub auth_decisions: IntCounterVec,
    pub session_cache: IntCounterVec,
    pub background_jobs: IntCounterVec,
    pub background_jobs_running: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, RelayError> {
        let registry = Registry::new_custom(Some("config_relay".to_string()), None)
            .map_err(metrics_error)?;

        let registrations_created = IntCounter::new(
            "registrations_created_total",
            "Registrations persisted",
        )
        .map_err(metrics_error)?;
        let accept_outcomes = IntCounterVec::new(
            Opts::new("accept_total", "Operator accept attempts by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let deliveries = IntCounterVec::new(
            Opts::new("deliveries_total", "Callback deliveries by mode and outcome"),
            &["mode", "outcome"],
        )
        .map_err(metrics_error)?;
        let registrations_pruned = IntCounter::new(
            "registrations_pruned_total",
            "Dead registrations removed after a failed delivery",
        )
        .map_err(metrics_error)?;
        let auth_decisions = IntCounterVec::new(
            Opts::new("auth_decisions_total", "Admission decisions by credential path"),
            &["path", "outcome"],
        )
        .map_err(metrics_error)?;
        let session_cache = IntCounterVec::new(
            Opts::new("session_cache_lookups_total", "Session cache lookups"),
            &["result"],
        )
        .map_err(metrics_error)?;
        let background_jobs = IntCounterVec::new(
            Opts::new("background_jobs_total", "Finished background jobs"),
            &["job", "outcome"],
        )
        .map_err(metrics_error)?;
        let background_jobs_running = IntGauge::new(
            "background_jobs_running",
            "Background jobs currently holding a slot",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(registrations_created.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(accept_outcomes.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(deliveries.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(registrations_pruned.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(auth_decisions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(session_cache.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(background_jobs.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(background_jobs_running.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            registrations_created,
            accept_outcomes,
            deliveries,
            registrations_pruned,
            auth_decisions,
            session_cache,
            background_jobs,
            background_jobs_running,
        })
    }

    /// Prometheus text exposition of every metric
    pub fn render(&self) -> Result<String, RelayError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| RelayError::ConfigurationError(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> RelayError {
    RelayError::ConfigurationError(format!("Metrics error: {}", e))
}
