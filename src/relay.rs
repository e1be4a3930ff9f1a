//! The relay transaction: validate, build, call, map.
//!
//! Each invocation is independent. Nothing is kept between calls apart
//! from the configuration and the pooled HTTP client.

use log::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::Error;
use crate::providers::gemini::{self, GeminiClient};
use crate::request::{RelayRequest, RelayResponse};

/// Stateless relay to the upstream provider
#[derive(Debug, Clone)]
pub struct Relay
{   config: RelayConfig
  , client: GeminiClient
}

impl Relay
{   pub fn new(config: RelayConfig) -> Self
    {   let client = GeminiClient::new(config.endpoint_url());
        Relay
        {   config
          , client
        }
    }

    /// Run one relay call for a raw request body and return the HTTP
    /// status with the normalized envelope.
    pub async fn handle(&self, body: &[u8]) -> (u16, RelayResponse)
    {   match self.run(body).await
        {   Ok((text, raw)) => (200, RelayResponse::Success { text, raw })
          , Err(err) => {
              warn!("Relay failed: {}", err);
              (err.status_code(), err.into_envelope())
            }
        }
    }

    async fn run(&self, body: &[u8])
      -> Result<(String, serde_json::Value), Error>
    {   // Credential first: a missing key fails whatever the body holds
        let api_key = self.config.credential.resolve()
          .ok_or_else(|| Error::MissingApiKey(
            self.config.credential.name().to_string()
          ))?;

        let request = RelayRequest::from_json(body)?;
        debug!(
          "Relaying {} messages at temperature {}",
          request.messages.len(),
          request.effective_temperature()
        );

        let payload = gemini::build_payload(&request);
        let raw = self.client.generate(&api_key, &payload).await?;
        let text = gemini::extract_text(&raw);
        if text.is_empty()
        {   debug!("Upstream response carried no candidate text");
        }
        info!("Relay succeeded ({} chars)", text.len());
        Ok((text, raw))
    }
}
