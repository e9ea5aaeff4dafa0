//! HTTP boundary: upload endpoint, accounts listing and broker proxy routes.

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::broker::{BrokerClient, UpstreamResponse};
use crate::config::AppConfig;
use crate::error::{ProcessError, ProxyError};
use crate::ingest::{process_csv, ProcessResponse};
use crate::report::{encode_base64, render_pdf};

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub broker: Option<BrokerClient>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ProxyError> {
        let broker = config.broker.clone().map(BrokerClient::new).transpose()?;
        Ok(Self {
            config: Arc::new(config),
            broker,
        })
    }
}

/// Error body shaped `{ "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<ProcessError> for ApiError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::DecodeFailure(e) => {
                error!(error = %e, "csv decode failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error parsing CSV file.")
            }
            caller => ApiError::new(StatusCode::BAD_REQUEST, caller.to_string()),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::NotConfigured => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Broker API is not configured.")
            }
            ProxyError::Transport(e) => {
                error!(error = %e, "broker request failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "Error contacting broker API.")
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let limit = state.config.max_upload_bytes;
    Router::new()
        .route("/csv/upload-csv", post(upload_csv))
        .route("/accounts", post(list_accounts))
        .route("/broker/token", post(exchange_token))
        .route("/broker/portfolio", get(fetch_portfolio))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    report: bool,
}

/// POST /csv/upload-csv
///
/// Multipart upload with the holdings export in the `file` field. With
/// `?report=true` the response also carries a base64 PDF summary.
async fn upload_csv(
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            upload = Some(bytes);
            break;
        }
    }

    let with_report = query.report;
    let response = tokio::task::spawn_blocking(move || -> Result<ProcessResponse, ApiError> {
        let records = process_csv(upload.as_deref())?;
        let mut response = ProcessResponse::new(records);
        if with_report {
            let today = chrono::Local::now().date_naive();
            let pdf = render_pdf(&response.data, today).map_err(|e| {
                error!(error = %e, "report rendering failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error rendering report.")
            })?;
            response.report = Some(encode_base64(&pdf));
        }
        Ok(response)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "upload worker failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error parsing CSV file.")
    })??;

    info!(records = response.data.len(), report = with_report, "upload processed");
    Ok(Json(response))
}

/// POST /accounts
async fn list_accounts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let raw = state.config.accounts.as_deref().ok_or_else(|| {
        warn!("accounts requested but none configured");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "No accounts configured.")
    })?;

    serde_json::from_str(raw).map(Json).map_err(|e| {
        error!(error = %e, "ACCOUNTS is not valid JSON");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving accounts.")
    })
}

/// POST /broker/token
async fn exchange_token(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let broker = state.broker.as_ref().ok_or(ProxyError::NotConfigured)?;
    Ok(upstream_response(broker.exchange_token(&body).await?))
}

/// GET /broker/portfolio
async fn fetch_portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let broker = state.broker.as_ref().ok_or(ProxyError::NotConfigured)?;
    let upstream = broker
        .fetch_portfolio(headers.get(header::AUTHORIZATION), query.as_deref())
        .await?;
    Ok(upstream_response(upstream))
}

fn upstream_response(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::builder().status(status);
    if let Some(content_type) = &upstream.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(upstream.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
