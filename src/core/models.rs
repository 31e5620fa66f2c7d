// Domain models shared across the relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque registration identifier (UUID v4 string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Generate a fresh, globally unique id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RegistrationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RegistrationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A consumer awaiting or holding authorization to receive configuration events
///
/// `accepted` only ever moves from `false` to `true`. `callback` is set at
/// creation time (after verification) and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub accepted: bool,
    pub callback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// New pending registration
    pub fn pending(callback: Option<String>) -> Self {
        Self {
            id: RegistrationId::generate(),
            accepted: false,
            callback,
            created_at: Utc::now(),
        }
    }

    /// Callback URI, if the registration has a non-empty one
    pub fn callback_uri(&self) -> Option<&str> {
        self.callback.as_deref().filter(|uri| !uri.is_empty())
    }
}

/// Result of flipping a registration to accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The registration moved from pending to accepted by this call
    Accepted(Registration),
    /// The registration was already accepted; nothing changed
    AlreadyAccepted,
    /// No record with that id
    NotFound,
}

/// Callback supplied in a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSpec {
    pub uri: String,
    /// Correlation token echoed back in the verification request, empty if omitted
    #[serde(default)]
    pub id: String,
}

/// Body of `POST /api/register`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub callback: Option<CallbackSpec>,
}

/// User record returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

/// Who the admission gate let through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Session-authenticated user
    User(Identity),
    /// Accepted registration (no identity attached)
    Registration(RegistrationId),
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Caller::User(identity) => Some(identity),
            Caller::Registration(_) => None,
        }
    }
}

/// Configuration record as pushed to registrant callbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub config_id: String,
    #[serde(skip)]
    pub owner: String,
    pub name: String,
    pub model: String,
    pub message: String,
}

/// Listing entry for `GET /api/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub id: String,
    pub name: String,
}

impl From<&ConfigRecord> for ConfigSummary {
    fn from(record: &ConfigRecord) -> Self {
        Self {
            id: record.config_id.clone(),
            name: record.name.clone(),
        }
    }
}

/// Body of `POST /api/config`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConfigRequest {
    pub name: Option<String>,
    pub model: Option<String>,
    pub message: Option<String>,
}

/// Body of `PUT /api/config/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeConfigRequest {
    pub model: Option<String>,
    pub message: Option<String>,
}

/// Event produced by a configuration mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Created(ConfigRecord),
    Deleted { config_id: String },
}

impl NotificationEvent {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::Created(_) => "created",
            NotificationEvent::Deleted { .. } => "deleted",
        }
    }
}
