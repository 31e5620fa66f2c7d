// Seams to storage and remote collaborators

use async_trait::async_trait;

use crate::core::errors::RelayResult;
use crate::core::models::{
    AcceptOutcome, CallbackSpec, ConfigRecord, Identity, Registration, RegistrationId,
};

/// Persisted registration records
///
/// Every mutation touches a single record; implementations need no
/// cross-record locking.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn insert(&self, registration: &Registration) -> RelayResult<()>;

    async fn get(&self, id: &RegistrationId) -> RelayResult<Option<Registration>>;

    /// Flip `accepted` to true, reporting whether this call made the transition
    async fn accept(&self, id: &RegistrationId) -> RelayResult<AcceptOutcome>;

    /// Returns `true` if a record was removed
    async fn delete(&self, id: &RegistrationId) -> RelayResult<bool>;

    /// Accepted registrations that carry a non-empty callback
    async fn list_accepted_with_callback(&self) -> RelayResult<Vec<Registration>>;
}

/// Configuration records, owned by the config CRUD surface
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All records, in store order
    async fn list_all(&self) -> RelayResult<Vec<ConfigRecord>>;

    async fn list_for_owner(&self, owner: &str) -> RelayResult<Vec<ConfigRecord>>;

    async fn get(&self, owner: &str, config_id: &str) -> RelayResult<Option<ConfigRecord>>;

    async fn insert(&self, record: &ConfigRecord) -> RelayResult<()>;

    /// Replace model/message of an existing record. Returns `false` if missing.
    async fn update(&self, record: &ConfigRecord) -> RelayResult<bool>;

    async fn delete(&self, owner: &str, config_id: &str) -> RelayResult<bool>;
}

/// Remote "is this session valid" capability
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_session(&self, session_id: &str) -> RelayResult<Identity>;
}

/// Remote "is this callback reachable" capability
#[async_trait]
pub trait CallbackVerifier: Send + Sync {
    async fn verify(&self, callback: &CallbackSpec) -> RelayResult<()>;
}

/// Webhook pushes to registrant callbacks
#[async_trait]
pub trait CallbackDelivery: Send + Sync {
    /// `POST <uri>` with the record as JSON
    async fn push_config(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        record: &ConfigRecord,
    ) -> RelayResult<()>;

    /// `DELETE <uri>/<config_id>`
    async fn push_delete(
        &self,
        uri: &str,
        registration_id: &RegistrationId,
        config_id: &str,
    ) -> RelayResult<()>;
}
