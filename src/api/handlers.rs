// Request handlers for API endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::responses::{ApiError, ConfigListResponse, IdResponse};
use crate::api::AppState;
use crate::core::errors::RelayError;
use crate::core::models::{
    Caller, ChangeConfigRequest, ConfigRecord, ConfigSummary, Identity, NewConfigRequest,
    NotificationEvent, RegisterRequest,
};

/// Register a consumer
///
/// POST /api/register
///
/// An unreadable body is treated as `{}`: the registration is created
/// without a callback.
pub async fn register_handler(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<Json<IdResponse>, ApiError> {
    let request: RegisterRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        if !body.is_empty() {
            debug!(error = %e, "Unreadable register body, registering without callback");
        }
        RegisterRequest::default()
    });

    let id = app_state
        .registrations
        .create(request.callback)
        .await
        .map_err(|e| {
            warn!(error = %e, "Registration failed");
            ApiError::with_cause(e, "creation failed")
        })?;

    info!(registration_id = %id, "Registration created, waiting for operator");
    Ok(Json(IdResponse {
        id: id.to_string(),
    }))
}

/// List the caller's configurations
///
/// GET /api/config
pub async fn list_configs_handler(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ConfigListResponse>, ApiError> {
    let user = require_user(&caller)?;
    let records = app_state
        .configs
        .list_for_owner(&user.id)
        .await
        .map_err(|e| store_error(e, "retrieval failed"))?;

    Ok(Json(ConfigListResponse {
        configs: records.iter().map(ConfigSummary::from).collect(),
    }))
}

/// Create a configuration and notify registrants
///
/// POST /api/config
pub async fn create_config_handler(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<IdResponse>, ApiError> {
    let user = require_user(&caller)?;
    let request: NewConfigRequest = parse_body(&body)?;

    let (Some(name), Some(model), Some(message)) = (
        non_empty(request.name),
        non_empty(request.model),
        non_empty(request.message),
    ) else {
        return Err(RelayError::MissingProperty.into());
    };

    let record = ConfigRecord {
        config_id: uuid::Uuid::new_v4().to_string(),
        owner: user.id.clone(),
        name,
        model,
        message,
    };

    app_state
        .configs
        .insert(&record)
        .await
        .map_err(|e| store_error(e, "creation failed"))?;

    info!(config_id = %record.config_id, user_id = %user.id, "Config created");
    let id = record.config_id.clone();
    notify(&app_state, NotificationEvent::Created(record));

    Ok(Json(IdResponse { id }))
}

/// GET /api/config/:id
pub async fn get_config_handler(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(config_id): Path<String>,
) -> Result<Json<ConfigRecord>, ApiError> {
    let user = require_user(&caller)?;
    match app_state.configs.get(&user.id, &config_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, "config not found")),
        Err(e) => Err(store_error(e, "retrieval failed")),
    }
}

/// Change model and/or message of a configuration
///
/// PUT /api/config/:id
///
/// Registrants are not notified of changes.
pub async fn change_config_handler(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(config_id): Path<String>,
    body: Bytes,
) -> Result<Json<ConfigRecord>, ApiError> {
    let user = require_user(&caller)?;
    let request: ChangeConfigRequest = parse_body(&body)?;

    let model = non_empty(request.model);
    let message = non_empty(request.message);
    if model.is_none() && message.is_none() {
        return Err(RelayError::MissingProperty.into());
    }

    let mut record = match app_state.configs.get(&user.id, &config_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(ApiError::new(StatusCode::NOT_FOUND, "config not found")),
        Err(e) => return Err(store_error(e, "retrieval failed")),
    };

    if let Some(model) = model {
        record.model = model;
    }
    if let Some(message) = message {
        record.message = message;
    }

    match app_state.configs.update(&record).await {
        Ok(true) => {
            info!(config_id = %config_id, "Config changed");
            Ok(Json(record))
        }
        // Deleted between read and write
        Ok(false) => Err(ApiError::new(StatusCode::NOT_FOUND, "config not found")),
        Err(e) => Err(store_error(e, "update failed")),
    }
}

/// Delete a configuration and notify registrants
///
/// DELETE /api/config/:id
pub async fn delete_config_handler(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(config_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = require_user(&caller)?;
    match app_state.configs.delete(&user.id, &config_id).await {
        Ok(true) => {
            info!(config_id = %config_id, user_id = %user.id, "Config deleted");
            notify(&app_state, NotificationEvent::Deleted { config_id });
            Ok(StatusCode::OK)
        }
        Ok(false) => Err(ApiError::new(StatusCode::NOT_FOUND, "config doesn't exist")),
        Err(e) => Err(store_error(e, "deletion failed")),
    }
}

/// Prometheus metrics
///
/// GET /api/metrics
pub async fn metrics_handler(State(app_state): State<AppState>) -> Result<Response, ApiError> {
    let body = app_state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Config routes are for users; an admitted registration has no owner identity
fn require_user(caller: &Caller) -> Result<&Identity, ApiError> {
    caller.identity().ok_or_else(|| {
        warn!("Registration credential used on a user route");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid user")
    })
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        ApiError::new(StatusCode::BAD_REQUEST, "wrong format")
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn store_error(err: RelayError, cause: &str) -> ApiError {
    error!(error = %err, "Config store operation failed");
    ApiError::with_cause(err, cause)
}

/// Hand the event to the background work group; the request never waits
fn notify(app_state: &AppState, event: NotificationEvent) {
    let dispatcher = Arc::clone(&app_state.dispatcher);
    app_state.tasks.spawn("fan_out", async move {
        dispatcher.fan_out(event).await;
    });
}
