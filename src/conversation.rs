//! In-memory conversation state

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use log::trace;

use crate::request::ChatMessage;
use crate::Role;

/// Shown when the user stops an in-flight call
pub const STOPPED_TEXT: &str = "Stopped.";
/// Shown for every other failed call
pub const ERROR_TEXT: &str = "Error fetching response.";
/// Shown when the relay answered with empty text
pub const EMPTY_REPLY_TEXT: &str = "...";

/// One turn of the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry
{   pub id: Uuid
  , pub role: Role
  , pub content: String
}

impl ConversationEntry
{   pub fn new(role: Role, content: impl Into<String>) -> Self
    {   ConversationEntry
        {   id: Uuid::new_v4()
          , role
          , content: content.into()
        }
    }

    pub fn to_message(&self) -> ChatMessage
    {   ChatMessage
        {   role: self.role
          , content: self.content.clone()
        }
    }
}

/// Ordered entries in send order
#[derive(Debug, Clone, Default)]
pub struct ConversationStore
{   entries: Vec<ConversationEntry>
}

impl ConversationStore
{   pub fn new() -> Self
    {   Self::default()
    }

    /// Append a new entry and return a copy of it
    pub fn append(&mut self, role: Role, content: impl Into<String>)
      -> ConversationEntry
    {   let entry = ConversationEntry::new(role, content);
        trace!("Appending {:?} entry {}", entry.role, entry.id);
        self.entries.push(entry.clone());
        entry
    }

    pub fn clear(&mut self)
    {   self.entries.clear();
    }

    /// Most recent user entry, scanning from the end
    pub fn find_last_user(&self) -> Option<&ConversationEntry>
    {   self.entries.iter().rev().find(|e| e.role == Role::User)
    }

    pub fn find(&self, id: Uuid) -> Option<&ConversationEntry>
    {   self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[ConversationEntry]
    {   &self.entries
    }

    /// Wire form of the whole history
    pub fn history(&self) -> Vec<ChatMessage>
    {   self.entries.iter().map(ConversationEntry::to_message).collect()
    }

    pub fn len(&self) -> usize
    {   self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.entries.is_empty()
    }
}
