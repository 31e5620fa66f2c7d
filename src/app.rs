// Component wiring shared by the binary and the test harnesses

use axum::Router;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::auth::AuthState;
use crate::config::Config;
use crate::console::OperatorConsole;
use crate::core::errors::RelayResult;
use crate::core::traits::{
    CallbackDelivery, CallbackVerifier, ConfigStore, IdentityVerifier, RegistrationStore,
};
use crate::metrics::Metrics;
use crate::notify::{BackgroundTasks, NotificationDispatcher};
use crate::registration::RegistrationService;
use crate::state::SessionCache;

/// External collaborators the relay is built from
pub struct Collaborators {
    pub registrations: Arc<dyn RegistrationStore>,
    pub configs: Arc<dyn ConfigStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub callback_verifier: Arc<dyn CallbackVerifier>,
    pub delivery: Arc<dyn CallbackDelivery>,
}

/// Fully wired service components
pub struct Relay {
    pub app_state: AppState,
    pub auth_state: Arc<AuthState>,
    pub registrations: Arc<RegistrationService>,
    pub sessions: Arc<SessionCache>,
    pub tasks: BackgroundTasks,
    pub metrics: Arc<Metrics>,
}

impl Relay {
    pub fn assemble(config: Config, parts: Collaborators) -> RelayResult<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let tasks = BackgroundTasks::new(config.max_background_jobs, Arc::clone(&metrics));

        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                Arc::clone(&parts.registrations),
                Arc::clone(&parts.configs),
                parts.delivery,
                Arc::clone(&metrics),
            )
            .with_pacing(config.initial_sync_pacing()),
        );

        let registrations = Arc::new(RegistrationService::new(
            parts.registrations,
            parts.callback_verifier,
            Arc::clone(&dispatcher),
            tasks.clone(),
            Arc::clone(&metrics),
        ));

        let sessions = Arc::new(SessionCache::new(config.session_ttl()));

        let auth_state = Arc::new(AuthState {
            sessions: Arc::clone(&sessions),
            identity: parts.identity,
            registrations: Arc::clone(&registrations),
            metrics: Arc::clone(&metrics),
        });

        let app_state = AppState {
            configs: parts.configs,
            registrations: Arc::clone(&registrations),
            dispatcher,
            tasks: tasks.clone(),
            metrics: Arc::clone(&metrics),
            config: Arc::new(config),
        };

        Ok(Self {
            app_state,
            auth_state,
            registrations,
            sessions,
            tasks,
            metrics,
        })
    }

    pub fn router(&self) -> Router {
        create_router(self.app_state.clone(), Arc::clone(&self.auth_state))
    }

    pub fn console(&self) -> OperatorConsole {
        OperatorConsole::new(Arc::clone(&self.registrations))
    }
}
