#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use seido::config::RelayConfig;
use seido::Relay;

/// What the fake provider saw
#[derive(Clone, Default)]
pub struct Recorded
{   pub bodies: Arc<Mutex<Vec<Value>>>
  , pub keys: Arc<Mutex<Vec<Option<String>>>>
}

impl Recorded
{   pub fn calls(&self) -> usize
    {   self.bodies.lock().unwrap().len()
    }

    pub fn last_body(&self) -> Value
    {   self.bodies.lock().unwrap().last().cloned().unwrap_or(Value::Null)
    }

    pub fn last_key(&self) -> Option<String>
    {   self.keys.lock().unwrap().last().cloned().flatten()
    }
}

#[derive(Clone)]
struct UpstreamState
{   status: u16
  , body: String
  , recorded: Recorded
}

/// A stand-in generateContent endpoint on an ephemeral port
pub struct FakeUpstream
{   pub base: String
  , pub recorded: Recorded
  , _task: tokio::task::JoinHandle<()>
}

async fn generate(
  State(state): State<UpstreamState>
, Query(query): Query<HashMap<String, String>>
, body: Bytes
) -> impl IntoResponse
{   state.recorded.bodies.lock().unwrap()
      .push(serde_json::from_slice(&body).unwrap_or(Value::Null));
    state.recorded.keys.lock().unwrap()
      .push(query.get("key").cloned());
    (StatusCode::from_u16(state.status).unwrap(), state.body.clone())
}

pub async fn spawn_upstream(status: u16, body: impl Into<String>)
  -> FakeUpstream
{   let recorded = Recorded::default();
    let state = UpstreamState
    {   status
      , body: body.into()
      , recorded: recorded.clone()
    };
    let app = Router::new().fallback(generate).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _task = tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    FakeUpstream
    {   base: format!("http://{}/v1beta", addr)
      , recorded
      , _task
    }
}

/// Base URL on which nothing is listening
pub fn dead_upstream_base() -> String
{   let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1beta", addr)
}

pub fn gemini_reply(text: &str) -> String
{   serde_json::json!({
      "candidates": [{
        "content": {"role": "model", "parts": [{"text": text}]},
        "finishReason": "STOP"
      }]
    }).to_string()
}

pub fn relay_for(base: &str, key: Option<&str>) -> Relay
{   let config = RelayConfig
    {   api_base: base.to_string()
      , ..RelayConfig::default()
    };
    Relay::new(config.with_api_key(key.map(str::to_string)))
}

/// Serve a relay on an ephemeral port and return its chat URL
pub async fn spawn_relay(relay: Relay) -> String
{   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let _ = seido::server::serve_on(listener, relay).await;
    });
    format!("http://{}{}", addr, seido::server::CHAT_ROUTE)
}
