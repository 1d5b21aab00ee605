//! HTTP adapter: an axum router exposing the order endpoints.

use super::{CORS_HEADERS, Reply};
use crate::application::orders::OrderService;
use crate::error::Result;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub const CREATE_ORDER_PATH: &str = "/api/create-order";
pub const VERIFY_ORDER_PATH: &str = "/api/verify-order";

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, CORS_HEADERS, Json(self.body)).into_response()
    }
}

/// Builds the router. Wrong methods on the order routes get a JSON 405 and
/// `OPTIONS` gets an empty CORS preflight reply.
pub fn router(service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            CREATE_ORDER_PATH,
            post(handle_create_order)
                .options(preflight)
                .fallback(|| async { Reply::method_not_allowed("POST") }),
        )
        .route(
            VERIFY_ORDER_PATH,
            get(handle_verify_order)
                .options(preflight)
                .fallback(|| async { Reply::method_not_allowed("GET") }),
        )
        .with_state(AppState { service })
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: &str, service: Arc<OrderService>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Order API listening on {}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, CORS_HEADERS)
}

async fn handle_create_order(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Reply {
    match body {
        Ok(body) => super::create_order(&state.service, &body).await,
        Err(rejection) => Reply {
            status: rejection.status().as_u16(),
            body: json!({ "error": rejection.body_text() }),
        },
    }
}

async fn handle_verify_order(
    State(state): State<AppState>,
    query: std::result::Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Reply {
    match query {
        Ok(Query(query)) => super::verify_order(&state.service, &query).await,
        Err(rejection) => Reply::bad_request(rejection.body_text()),
    }
}
