//! HTTP surface of the relay: `POST /api/chat`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::error::Error;
use crate::relay::Relay;

pub const CHAT_ROUTE: &str = "/api/chat";

/// Shared across handlers
#[derive(Clone)]
pub struct AppState
{   pub relay: Arc<Relay>
}

pub fn create_router(relay: Relay) -> Router
{   Router::new()
      .route(CHAT_ROUTE, post(chat))
      .with_state(AppState
      {   relay: Arc::new(relay)
      })
}

async fn chat(
  State(state): State<AppState>
, body: Bytes
) -> impl IntoResponse
{   debug!("POST {} ({} bytes)", CHAT_ROUTE, body.len());
    let (status, envelope) = state.relay.handle(&body).await;
    let status = StatusCode::from_u16(status)
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope))
}

/// Serve the relay on an already-bound listener until the task is dropped
pub async fn serve_on(listener: TcpListener, relay: Relay)
  -> Result<(), Error>
{   let addr = listener.local_addr()
      .map_err(|e| Error::Other(e.to_string()))?;
    info!("Relay listening on {}", addr);
    axum::serve(listener, create_router(relay))
      .await
      .map_err(|e| {
        error!("Server error: {}", e);
        Error::Other(e.to_string())
      })
}

/// Bind `config.bind_addr` and serve
pub async fn serve(config: RelayConfig) -> Result<(), Error>
{   let listener = TcpListener::bind(&config.bind_addr)
      .await
      .map_err(|e| {
        error!("Failed to bind {}: {}", config.bind_addr, e);
        Error::Other(format!("bind {}: {}", config.bind_addr, e))
      })?;
    serve_on(listener, Relay::new(config)).await
}
