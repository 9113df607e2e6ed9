// HTTP handlers: version, inventory listings, trees, operations

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::AppState;
use crate::error::EngineError;
use crate::models::EntityKind;
use crate::operations::{Operation, OperationRequest, Warning};
use crate::presentation;
use crate::version::{DESCRIPTION, NAME, VERSION};

/// Error body: `{"error": "...", "warning": {...}}`.
pub(super) enum ApiError {
    UnknownKind(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<Warning>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::UnknownKind(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::ConfirmationRequired { .. } => StatusCode::PRECONDITION_REQUIRED,
                    EngineError::MissingArgument { .. } | EngineError::InvalidArgument { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    EngineError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    EngineError::Command(_) | EngineError::Parse(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
        };
        (status, Json(ErrorBody { error, warning: None })).into_response()
    }
}

fn parse_kind(kind: &str) -> Result<EntityKind, ApiError> {
    kind.parse().map_err(ApiError::UnknownKind)
}

/// GET /: plain-text banner.
pub(super) async fn root_handler() -> String {
    format!("{} {}: {}", NAME, VERSION, DESCRIPTION)
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/{kind}: cached snapshot, fetched on first use.
pub(super) async fn list_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.inventory.list(kind).await?))
}

/// POST /api/{kind}/refresh
pub(super) async fn refresh_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.inventory.refresh(kind).await?))
}

/// GET /api/{kind}/tree
pub(super) async fn tree_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let snapshot = state.inventory.list(kind).await?;
    Ok(Json(presentation::tree(&snapshot)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationInfo {
    operation: Operation,
    requires_confirmation: bool,
    irreversible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'static str>,
    affects: &'static [EntityKind],
}

/// GET /api/operations: catalogue with confirmation flags.
pub(super) async fn operations_handler() -> impl IntoResponse {
    let catalogue: Vec<OperationInfo> = Operation::ALL
        .into_iter()
        .map(|operation| OperationInfo {
            operation,
            requires_confirmation: operation.requires_confirmation(),
            irreversible: operation.is_irreversible(),
            identifier: operation.identifier_name(),
            affects: operation.affected_kinds(),
        })
        .collect();
    Json(catalogue)
}

/// POST /api/operations: executes one request. An unconfirmed destructive
/// request gets 428 with the warning to show before retrying with `confirmed`.
pub(super) async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<OperationRequest>,
) -> Response {
    match state.inventory.execute(&request).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e @ EngineError::ConfirmationRequired { .. }) => {
            let warning = request.operation.warning(request.identifier.trim());
            let body = ErrorBody {
                error: e.to_string(),
                warning,
            };
            (StatusCode::PRECONDITION_REQUIRED, Json(body)).into_response()
        }
        Err(e) => ApiError::Engine(e).into_response(),
    }
}
