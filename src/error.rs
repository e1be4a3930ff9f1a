use std::fmt;

use crate::request::RelayResponse;

/// Category label for a missing upstream credential
pub const CATEGORY_MISSING_KEY: &str = "Missing GEMINI_API_KEY";
/// Category label for a non-success upstream status
pub const CATEGORY_UPSTREAM: &str = "Gemini API error";
/// Category label for a failed outbound call
pub const CATEGORY_REQUEST_FAILED: &str = "Request failed";
/// Category label for a body the relay cannot read
pub const CATEGORY_INVALID_REQUEST: &str = "Invalid request";

/// Custom error type for relay and conversation operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Upstream credential is not configured (names the env var)
    MissingApiKey(String)
  , /// Incoming relay body is malformed
    InvalidRequest(String)
  , /// Upstream answered with a non-success status
    UpstreamError
    {   status: u16
      , body: String
    }
  , /// Outbound call failed before a usable response arrived
    RequestFailed(String)
  , /// Failed to parse a response body
    ParseError(String)
  , /// Conversation backend task is gone
    Disconnected
  , /// Generic error
    Other(String)
}

impl Error
{   /// Stable label reported to the client as `error`
    pub fn category(&self) -> &'static str
    {   match self
        {   Error::MissingApiKey(_) => CATEGORY_MISSING_KEY
          , Error::InvalidRequest(_) => CATEGORY_INVALID_REQUEST
          , Error::UpstreamError { .. } => CATEGORY_UPSTREAM
          , Error::RequestFailed(_)
          | Error::ParseError(_)
          | Error::Disconnected
          | Error::Other(_) => CATEGORY_REQUEST_FAILED
        }
    }

    /// HTTP status the relay endpoint answers with
    pub fn status_code(&self) -> u16
    {   match self
        {   Error::InvalidRequest(_) => 400
          , Error::UpstreamError { .. } => 502
          , _ => 500
        }
    }

    /// Free-text detail reported to the client as `info`
    pub fn detail(&self) -> String
    {   match self
        {   Error::MissingApiKey(var) => {
              format!("{} is not set on the server", var)
            }
          , Error::UpstreamError { body, .. } => body.clone()
          , Error::InvalidRequest(msg)
          | Error::RequestFailed(msg)
          | Error::ParseError(msg)
          | Error::Other(msg) => msg.clone()
          , Error::Disconnected => {
              "Conversation backend disconnected".to_string()
            }
        }
    }

    /// Normalized failure envelope
    pub fn into_envelope(self) -> RelayResponse
    {   RelayResponse::Failure
        {   error: self.category().to_string()
          , info: self.detail()
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingApiKey(var) => {
              write!(f, "Missing API key: {}", var)
            }
          , Error::InvalidRequest(msg) => {
              write!(f, "Invalid request: {}", msg)
            }
          , Error::UpstreamError { status, body } => {
              write!(f, "Upstream error ({}): {}", status, body)
            }
          , Error::RequestFailed(msg) => {
              write!(f, "Request failed: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::Disconnected => {
              write!(f, "Conversation backend disconnected")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
