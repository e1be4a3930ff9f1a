use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, trace, error};

use crate::request::RelayRequest;
use crate::Role;

/// Instruction sent ahead of every conversation
pub const SYSTEM_PROMPT: &str = "You are an expert AI agent.
Think carefully through each query, give precise and professional answers, avoid fluff.";

pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

// ===== Wire Types =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart
{   pub text: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent
{   pub role: String
  , pub parts: Vec<GeminiPart>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig
{   pub temperature: f64
  , pub top_p: f64
  , pub top_k: u32
  , pub max_output_tokens: u32
}

impl GenerationConfig
{   /// Fixed defaults with the given temperature
    pub fn with_temperature(temperature: f64) -> Self
    {   GenerationConfig
        {   temperature
          , top_p: DEFAULT_TOP_P
          , top_k: DEFAULT_TOP_K
          , max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest
{   pub contents: Vec<GeminiContent>
  , pub generation_config: GenerationConfig
}

/// Provider role token for a conversation role
pub fn role_token(role: Role) -> &'static str
{   match role
    {   Role::User => "user"
      , Role::Assistant => "model"
    }
}

/// Build the upstream payload: instruction block first, then one
/// block per message in order.
pub fn build_payload(request: &RelayRequest) -> GeminiRequest
{   let mut contents = Vec::with_capacity(request.messages.len() + 1);
    contents.push(GeminiContent
    {   role: role_token(Role::User).to_string()
      , parts: vec![GeminiPart
        {   text: format!("SYSTEM:\n{}", SYSTEM_PROMPT)
        }]
    });
    contents.extend(request.messages.iter().map(|m| GeminiContent
    {   role: role_token(m.role).to_string()
      , parts: vec![GeminiPart
        {   text: m.content.clone()
        }]
    }));

    GeminiRequest
    {   contents
      , generation_config: GenerationConfig::with_temperature(
          request.effective_temperature()
        )
    }
}

/// First candidate's first text part, or "" when any level is absent
pub fn extract_text(response: &Value) -> String
{   response
      .get("candidates")
      .and_then(|c| c.get(0))
      .and_then(|c| c.get("content"))
      .and_then(|c| c.get("parts"))
      .and_then(|p| p.get(0))
      .and_then(|p| p.get("text"))
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string()
}

// ===== Gemini Client =====

/// Makes the single generateContent call per relay invocation
#[derive(Debug, Clone)]
pub struct GeminiClient
{   http_client: reqwest::Client
  , endpoint: String
}

impl GeminiClient
{   pub fn new(endpoint: String) -> Self
    {   debug!("Creating GeminiClient for {}", endpoint);
        GeminiClient
        {   http_client: reqwest::Client::new()
          , endpoint
        }
    }

    /// Send the payload once. Returns the parsed upstream body on
    /// success; no retries.
    pub async fn generate(
      &self
    , api_key: &str
    , payload: &GeminiRequest
    ) -> Result<Value, crate::error::Error>
    {   trace!("Gemini request: {:?}", payload);

        let response = self.http_client
          .post(&self.endpoint)
          .query(&[("key", api_key)])
          .json(payload)
          .send()
          .await
          .map_err(|e| {
            // The URL carries the key; keep it out of logs and envelopes
            let e = e.without_url();
            error!("HTTP error: {}", e);
            crate::error::Error::RequestFailed(e.to_string())
          })?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   let body = response.text().await
              .map_err(|e| {
                let e = e.without_url();
                error!("Failed to read error body: {}", e);
                crate::error::Error::RequestFailed(e.to_string())
              })?;
            error!("Gemini API error ({}): {}", status, body);
            return Err(crate::error::Error::UpstreamError
            {   status: status.as_u16()
              , body
            });
        }

        response.json::<Value>().await.map_err(|e| {
          let e = e.without_url();
          error!("Parse error: {}", e);
          crate::error::Error::RequestFailed(e.to_string())
        })
    }
}
