//! Configuration for the relay server and the conversation client

use serde::{Deserialize, Serialize};
use log::debug;

/// Env var holding the upstream credential
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/api/chat";
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

/// Where the upstream credential comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialSource
{   /// Looked up in the process environment on every invocation
    Env(String)
  , /// Held directly (embedding, tests)
    Fixed(Option<String>)
}

impl CredentialSource
{   /// Resolve the credential; an empty value counts as absent
    pub fn resolve(&self) -> Option<String>
    {   let key = match self
        {   CredentialSource::Env(var) => std::env::var(var).ok()
          , CredentialSource::Fixed(key) => key.clone()
        };
        key.filter(|k| !k.trim().is_empty())
    }

    /// Name reported when the credential is missing
    pub fn name(&self) -> &str
    {   match self
        {   CredentialSource::Env(var) => var.as_str()
          , CredentialSource::Fixed(_) => API_KEY_VAR
        }
    }
}

impl Default for CredentialSource
{   fn default() -> Self
    {   CredentialSource::Env(API_KEY_VAR.to_string())
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig
{   /// Upstream credential source
    pub credential: CredentialSource
  , /// Upstream API base URL, without trailing slash
    pub api_base: String
  , /// Upstream model name
    pub model: String
  , /// Address the relay listens on
    pub bind_addr: String
}

impl RelayConfig
{   /// Build from `GEMINI_API_BASE`, `GEMINI_MODEL` and `SEIDO_BIND_ADDR`.
    /// The credential itself stays in the environment and is read per call.
    pub fn from_env() -> Self
    {   let defaults = RelayConfig::default();
        let config = RelayConfig
        {   credential: defaults.credential
          , api_base: env_or("GEMINI_API_BASE", defaults.api_base)
          , model: env_or("GEMINI_MODEL", defaults.model)
          , bind_addr: env_or("SEIDO_BIND_ADDR", defaults.bind_addr)
        };
        debug!(
          "Relay config: api_base={} model={} bind_addr={}",
          config.api_base, config.model, config.bind_addr
        );
        config
    }

    /// Same configuration with a fixed credential
    pub fn with_api_key(mut self, key: Option<String>) -> Self
    {   self.credential = CredentialSource::Fixed(key);
        self
    }

    /// Upstream generateContent URL, without the key
    pub fn endpoint_url(&self) -> String
    {   format!(
          "{}/models/{}:generateContent",
          self.api_base.trim_end_matches('/'),
          self.model
        )
    }
}

impl Default for RelayConfig
{   fn default() -> Self
    {   RelayConfig
        {   credential: CredentialSource::default()
          , api_base: DEFAULT_API_BASE.to_string()
          , model: DEFAULT_MODEL.to_string()
          , bind_addr: DEFAULT_BIND_ADDR.to_string()
        }
    }
}

/// Conversation client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig
{   /// Relay endpoint URL
    pub relay_url: String
  , /// Sampling temperature sent with every call
    pub temperature: f64
}

impl ClientConfig
{   pub fn from_env() -> Self
    {   ClientConfig
        {   relay_url: env_or(
              "SEIDO_RELAY_URL",
              DEFAULT_RELAY_URL.to_string()
            )
          , temperature: DEFAULT_TEMPERATURE
        }
    }
}

impl Default for ClientConfig
{   fn default() -> Self
    {   ClientConfig
        {   relay_url: DEFAULT_RELAY_URL.to_string()
          , temperature: DEFAULT_TEMPERATURE
        }
    }
}

fn env_or(var: &str, default: String) -> String
{   std::env::var(var)
      .ok()
      .filter(|v| !v.trim().is_empty())
      .unwrap_or(default)
}
