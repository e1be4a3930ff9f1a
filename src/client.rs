use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use log::{debug, trace, error, info, warn};

use crate::config::ClientConfig;
use crate::conversation::{
  ConversationEntry, ConversationStore,
  EMPTY_REPLY_TEXT, ERROR_TEXT, STOPPED_TEXT,
};
use crate::request::RelayRequest;
use crate::transport::{HttpRelayTransport, RelayOutcome, RelayTransport};
use crate::{Role, SendOutcome, SendReplyReceiver, SendReplySender, SkipReason};

/// Commands for the conversation task
pub enum ConversationCommand
{   Send
    {   text: String
      , reply: SendReplySender
    }
  , Regenerate
    {   reply: SendReplySender
    }
  , Cancel
    {   reply: mpsc::UnboundedSender<bool>
    }
  , Clear
    {   reply: mpsc::UnboundedSender<()>
    }
  , Entries
    {   reply: mpsc::UnboundedSender<Vec<ConversationEntry>>
    }
  , CopyMessage
    {   id: Uuid
      , reply: mpsc::UnboundedSender<Option<String>>
    }
  , SetTemperature
    {   temperature: f64
      , reply: mpsc::UnboundedSender<()>
    }
  , Shutdown
    {   reply: mpsc::UnboundedSender<()>
    }
}

/// The one outstanding relay call
struct InFlight
{   cancel: CancellationToken
  , reply: SendReplySender
}

/// Conversation task state
struct ConversationState
{   store: ConversationStore
  , temperature: f64
  , in_flight: Option<InFlight>
  , transport: Arc<dyn RelayTransport>
  , done_tx: mpsc::UnboundedSender<RelayOutcome>
}

impl ConversationState
{   fn new(
      transport: Arc<dyn RelayTransport>
    , temperature: f64
    , done_tx: mpsc::UnboundedSender<RelayOutcome>
    ) -> Self
    {   debug!("Creating ConversationState");
        ConversationState
        {   store: ConversationStore::new()
          , temperature
          , in_flight: None
          , transport
          , done_tx
        }
    }

    fn handle_send(&mut self, text: String, reply: SendReplySender)
    {   let content = text.trim();
        if content.is_empty()
        {   trace!("Ignoring empty input");
            let _ = reply.send(Ok(SendOutcome::Skipped(
              SkipReason::EmptyInput
            )));
            return;
        }
        if self.in_flight.is_some()
        {   debug!("Send rejected: a relay call is in flight");
            let _ = reply.send(Ok(SendOutcome::Skipped(
              SkipReason::InFlight
            )));
            return;
        }

        self.store.append(Role::User, content);
        let request = RelayRequest::new(
          self.store.history(),
          Some(self.temperature)
        );
        debug!("Sending {} messages to relay", request.messages.len());

        let cancel = CancellationToken::new();
        let transport = self.transport.clone();
        let done_tx = self.done_tx.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
          let outcome = tokio::select!
          {   biased;
              _ = token.cancelled() => { RelayOutcome::Cancelled }
            , outcome = transport.relay(request, token.clone()) => {
                outcome
              }
          };
          let _ = done_tx.send(outcome);
        });

        self.in_flight = Some(InFlight
        {   cancel
          , reply
        });
    }

    fn handle_regenerate(&mut self, reply: SendReplySender)
    {   match self.store.find_last_user()
        {   Some(entry) => {
              let content = entry.content.clone();
              debug!("Regenerating from last user entry {}", entry.id);
              self.handle_send(content, reply);
            }
          , None => {
              trace!("Nothing to regenerate");
              let _ = reply.send(Ok(SendOutcome::Skipped(
                SkipReason::NoUserEntry
              )));
            }
        }
    }

    fn handle_completion(&mut self, outcome: RelayOutcome)
    {   let content = match outcome
        {   RelayOutcome::Success(text) if text.is_empty() => {
              EMPTY_REPLY_TEXT.to_string()
            }
          , RelayOutcome::Success(text) => text
          , RelayOutcome::Cancelled => {
              info!("Relay call stopped by user");
              STOPPED_TEXT.to_string()
            }
          , RelayOutcome::Failed(detail) => {
              warn!("Relay call failed: {}", detail);
              ERROR_TEXT.to_string()
            }
        };

        let entry = self.store.append(Role::Assistant, content);
        if let Some(in_flight) = self.in_flight.take()
        {   let _ = in_flight.reply.send(Ok(SendOutcome::Answered(entry)));
        }
    }

    fn handle_cancel(&self) -> bool
    {   match &self.in_flight
        {   Some(in_flight) => {
              debug!("Cancelling in-flight relay call");
              in_flight.cancel.cancel();
              true
            }
          , None => false
        }
    }
}

/// Public conversation interface - owns the task
pub struct ConversationManager
{   tx: mpsc::UnboundedSender<ConversationCommand>
  , _task: tokio::task::JoinHandle<()>
}

impl ConversationManager
{   /// Create and spawn a conversation task over `transport`
    pub fn new<T>(transport: T, temperature: f64) -> Self
    where
      T: RelayTransport + 'static
    {   debug!("Creating ConversationManager");
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn RelayTransport> = Arc::new(transport);

        let _task = tokio::spawn(async move {
          run_conversation_loop(cmd_rx, transport, temperature).await;
        });

        ConversationManager
        {   tx: cmd_tx
          , _task
        }
    }

    /// Conversation over HTTP to the configured relay
    pub fn from_config(config: &ClientConfig) -> Self
    {   Self::new(
          HttpRelayTransport::new(config.relay_url.clone()),
          config.temperature
        )
    }

    /// Queue a message - the receiver yields once the assistant
    /// entry is appended, or right away when skipped
    pub async fn send_message(
      &self
    , text: impl Into<String>
    ) -> Result<SendReplyReceiver, crate::error::Error>
    {   let (reply, reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Send
        {   text: text.into()
          , reply
        })?;
        Ok(reply_rx)
    }

    /// Re-send the most recent user entry
    pub async fn regenerate(&self)
      -> Result<SendReplyReceiver, crate::error::Error>
    {   let (reply, reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Regenerate { reply })?;
        Ok(reply_rx)
    }

    /// Abort the in-flight call; false when nothing was in flight
    pub async fn cancel(&self) -> Result<bool, crate::error::Error>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Cancel { reply })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<(), crate::error::Error>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Clear { reply })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    /// Snapshot of the conversation
    pub async fn entries(&self)
      -> Result<Vec<ConversationEntry>, crate::error::Error>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Entries { reply })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    /// Content of the entry with this id, for copying
    pub async fn copy_message(&self, id: Uuid)
      -> Result<Option<String>, crate::error::Error>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::CopyMessage { id, reply })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    /// Temperature for subsequent calls
    pub async fn set_temperature(&self, temperature: f64)
      -> Result<(), crate::error::Error>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::SetTemperature
        {   temperature
          , reply
        })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    /// Gracefully shutdown the task
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down ConversationManager");
        let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.dispatch(ConversationCommand::Shutdown { reply })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Disconnected)
    }

    fn dispatch(&self, cmd: ConversationCommand)
      -> Result<(), crate::error::Error>
    {   self.tx.send(cmd).map_err(|_| {
          error!("Conversation task disconnected");
          crate::error::Error::Disconnected
        })
    }
}

/// Main conversation loop
///
/// Relay calls run in their own task and report back on `done_rx`,
/// so Cancel is handled while a call is outstanding.
async fn run_conversation_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<ConversationCommand>
, transport: Arc<dyn RelayTransport>
, temperature: f64
)
{   debug!("Starting conversation loop");
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut state = ConversationState::new(transport, temperature, done_tx);

    loop
    { tokio::select!
      { cmd = cmd_rx.recv() => {
          match cmd
          {   Some(ConversationCommand::Send { text, reply }) => {
                state.handle_send(text, reply);
              }
            , Some(ConversationCommand::Regenerate { reply }) => {
                state.handle_regenerate(reply);
              }
            , Some(ConversationCommand::Cancel { reply }) => {
                let _ = reply.send(state.handle_cancel());
              }
            , Some(ConversationCommand::Clear { reply }) => {
                debug!("Clearing {} entries", state.store.len());
                state.store.clear();
                let _ = reply.send(());
              }
            , Some(ConversationCommand::Entries { reply }) => {
                let _ = reply.send(state.store.entries().to_vec());
              }
            , Some(ConversationCommand::CopyMessage { id, reply }) => {
                let content = state.store.find(id)
                  .map(|e| e.content.clone());
                let _ = reply.send(content);
              }
            , Some(ConversationCommand::SetTemperature {
                temperature, reply
              }) => {
                debug!("Temperature set to {}", temperature);
                state.temperature = temperature;
                let _ = reply.send(());
              }
            , Some(ConversationCommand::Shutdown { reply }) => {
                if let Some(in_flight) = state.in_flight.take()
                {   in_flight.cancel.cancel();
                }
                let _ = reply.send(());
                info!("Conversation task shutting down");
                break;
              }
            , None => {
                debug!("Command channel closed");
                break;
              }
          }
        }
      , Some(outcome) = done_rx.recv() => {
          trace!("Relay call completed: {:?}", outcome);
          state.handle_completion(outcome);
        }
      }
    }
}
