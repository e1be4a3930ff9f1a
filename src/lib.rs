pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod relay;
pub mod server;
pub mod conversation;
pub mod transport;
pub mod client;
use serde::{Deserialize, Serialize};

/*

seido relays a browser chat conversation to Gemini and normalizes
the answer (or the failure) into one envelope shape.

seido/
├── Cargo.toml
├── src/
│   ├── lib.rs           # Re-exports and shared API types
│   ├── main.rs          # seido-relay binary
│   ├── error.rs         # Error type, categories, status mapping
│   ├── config.rs        # Relay and client configuration
│   ├── request.rs       # RelayRequest / RelayResponse envelope
│   ├── providers/
│   │   ├── mod.rs
│   │   └── gemini.rs    # Upstream payload, extraction, single call
│   ├── relay.rs         # validate -> build -> call -> map
│   ├── server.rs        # axum router for POST /api/chat
│   ├── conversation.rs  # Entries and the in-memory store
│   ├── transport.rs     # Cancellable outbound relay call
│   └── client.rs        # Conversation manager task
└── tests/

*/

pub use client::ConversationManager;
pub use conversation::{ConversationEntry, ConversationStore};
pub use error::Error;
pub use relay::Relay;
pub use request::{ChatMessage, RelayRequest, RelayResponse};
pub use transport::{HttpRelayTransport, RelayOutcome, RelayTransport};

/// SEIDO API INTERFACE:

// ===== SendMessage / Regenerate =====

pub type SendReply = Result<SendOutcome, crate::error::Error>;
pub type SendReplySender
  = tokio::sync::mpsc::UnboundedSender<SendReply>;
pub type SendReplyReceiver
  = tokio::sync::mpsc::UnboundedReceiver<SendReply>;

/// What a Send (or Regenerate) ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome
{   /// The assistant entry appended for this call
    Answered(ConversationEntry)
  , /// Nothing was sent
    Skipped(SkipReason)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason
{   /// Trimmed input was empty
    EmptyInput
  , /// Another relay call is still outstanding
    InFlight
  , /// Regenerate found no user entry
    NoUserEntry
}

/// SEIDO STRUCTURES:

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   User
  , Assistant
}
