//! Relay request and response types shared by server and client

use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, warn};

use crate::config::DEFAULT_TEMPERATURE;
use crate::error::Error;
use crate::Role;

/// One conversation turn as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: String
}

impl ChatMessage
{   pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: Role::User
          , content: content.into()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: Role::Assistant
          , content: content.into()
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest
{   /// Full conversation history, oldest first
    pub messages: Vec<ChatMessage>
  , /// Sampling temperature, passed through unclamped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>
}

impl RelayRequest
{   pub fn new(
      messages: Vec<ChatMessage>
    , temperature: Option<f64>
    ) -> Self
    {   RelayRequest
        {   messages
          , temperature
        }
    }

    /// Parse and validate a raw request body.
    ///
    /// `messages` must be an array of `{role, content}` objects with
    /// `role` in {user, assistant} and a string `content`. A
    /// `temperature` that is not a JSON number is treated as absent.
    pub fn from_json(body: &[u8]) -> Result<Self, Error>
    {   let value: Value = serde_json::from_slice(body)
          .map_err(|e| Error::InvalidRequest(
            format!("body is not valid JSON: {}", e)
          ))?;

        let object = value.as_object()
          .ok_or_else(|| Error::InvalidRequest(
            "body must be a JSON object".to_string()
          ))?;

        let raw_messages = object.get("messages")
          .and_then(Value::as_array)
          .ok_or_else(|| Error::InvalidRequest(
            "`messages` must be an array".to_string()
          ))?;

        let messages = raw_messages
          .iter()
          .enumerate()
          .map(|(i, m)| parse_message(i, m))
          .collect::<Result<Vec<_>, _>>()?;

        let temperature = match object.get("temperature")
        {   Some(Value::Number(n)) => n.as_f64()
          , Some(other) => {
              debug!("Ignoring non-numeric temperature: {}", other);
              None
            }
          , None => None
        };

        if let Some(t) = temperature
        {   if !(0.0..=1.0).contains(&t)
            {   warn!("Temperature {} outside [0, 1], passing through", t);
            }
        }

        Ok(RelayRequest
        {   messages
          , temperature
        })
    }

    /// Temperature to send upstream
    pub fn effective_temperature(&self) -> f64
    {   self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

fn parse_message(index: usize, value: &Value)
  -> Result<ChatMessage, Error>
{   let role = match value.get("role").and_then(Value::as_str)
    {   Some("user") => Role::User
      , Some("assistant") => Role::Assistant
      , Some(other) => {
          return Err(Error::InvalidRequest(format!(
            "messages[{}].role must be \"user\" or \"assistant\", got {:?}",
            index, other
          )));
        }
      , None => {
          return Err(Error::InvalidRequest(format!(
            "messages[{}].role is missing", index
          )));
        }
    };

    let content = value.get("content")
      .and_then(Value::as_str)
      .ok_or_else(|| Error::InvalidRequest(format!(
        "messages[{}].content must be a string", index
      )))?;

    Ok(ChatMessage
    {   role
      , content: content.to_string()
    })
}

/// Normalized relay response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayResponse
{   /// Upstream answered; `raw` is the full upstream body
    Success
    {   text: String
      , raw: Value
    }
  , /// Any failure, with a stable category and free-text detail
    Failure
    {   error: String
      , info: String
    }
}
