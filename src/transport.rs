//! Outbound relay call used by the conversation manager

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use log::{debug, error, trace};

use crate::request::{RelayRequest, RelayResponse};

/// Result of one relay call, as seen by the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome
{   /// Relay answered with this text (possibly empty)
    Success(String)
  , /// Caller cancelled before the call resolved
    Cancelled
  , /// Anything else went wrong
    Failed(String)
}

/// Issues a relay call. The conversation task races the returned
/// future against `cancel` and drops it once the token fires, so
/// implementations only watch `cancel` to stop extra work early.
#[async_trait]
pub trait RelayTransport: Send + Sync
{   async fn relay(
      &self
    , request: RelayRequest
    , cancel: CancellationToken
    ) -> RelayOutcome;
}

/// Talks to the relay endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpRelayTransport
{   http_client: reqwest::Client
  , relay_url: String
}

impl HttpRelayTransport
{   pub fn new(relay_url: impl Into<String>) -> Self
    {   HttpRelayTransport
        {   http_client: reqwest::Client::new()
          , relay_url: relay_url.into()
        }
    }

    async fn post(&self, request: &RelayRequest) -> RelayOutcome
    {   let response = match self.http_client
          .post(&self.relay_url)
          .json(request)
          .send()
          .await
        {   Ok(r) => r
          , Err(e) => {
              error!("Relay call failed: {}", e);
              return RelayOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        trace!("Relay response status: {}", status);
        let body = match response.text().await
        {   Ok(b) => b
          , Err(e) => return RelayOutcome::Failed(e.to_string())
        };

        if !status.is_success()
        {   error!("Relay returned {}: {}", status, body);
            return RelayOutcome::Failed(body);
        }

        match serde_json::from_str::<RelayResponse>(&body)
        {   Ok(RelayResponse::Success { text, .. }) => {
              RelayOutcome::Success(text)
            }
          , Ok(RelayResponse::Failure { error, info }) => {
              RelayOutcome::Failed(format!("{}: {}", error, info))
            }
          , Err(e) => {
              error!("Unreadable relay response: {}", e);
              RelayOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport
{   async fn relay(
      &self
    , request: RelayRequest
    , _cancel: CancellationToken
    ) -> RelayOutcome
    {   debug!(
          "Posting {} messages to {}",
          request.messages.len(),
          self.relay_url
        );
        // Dropped by the conversation task when the token fires
        self.post(&request).await
    }
}
