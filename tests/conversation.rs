mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use common::{gemini_reply, relay_for, spawn_relay, spawn_upstream};
use seido::conversation::{EMPTY_REPLY_TEXT, ERROR_TEXT, STOPPED_TEXT};
use seido::{
  ConversationManager, HttpRelayTransport, RelayOutcome, RelayRequest,
  RelayTransport, Role, SendOutcome, SendReplyReceiver, SkipReason,
};

/// Answers every call with a fixed outcome and records the requests
#[derive(Clone)]
struct ScriptedTransport
{   outcome: RelayOutcome
  , requests: Arc<Mutex<Vec<RelayRequest>>>
}

impl ScriptedTransport
{   fn new(outcome: RelayOutcome) -> Self
    {   ScriptedTransport
        {   outcome
          , requests: Arc::new(Mutex::new(Vec::new()))
        }
    }

    fn requests(&self) -> Vec<RelayRequest>
    {   self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayTransport for ScriptedTransport
{   async fn relay(
      &self
    , request: RelayRequest
    , _cancel: CancellationToken
    ) -> RelayOutcome
    {   self.requests.lock().unwrap().push(request);
        self.outcome.clone()
    }
}

/// Never resolves on its own
struct HangingTransport;

#[async_trait]
impl RelayTransport for HangingTransport
{   async fn relay(
      &self
    , _request: RelayRequest
    , cancel: CancellationToken
    ) -> RelayOutcome
    {   cancel.cancelled().await;
        RelayOutcome::Cancelled
    }
}

async fn outcome_of(mut rx: SendReplyReceiver) -> SendOutcome
{   let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
      .await
      .expect("timed out waiting for reply")
      .expect("reply channel closed");
    assert_ok!(reply)
}

fn contents(entries: &[seido::ConversationEntry]) -> Vec<(Role, &str)>
{   entries.iter().map(|e| (e.role, e.content.as_str())).collect()
}

#[tokio::test]
async fn send_appends_user_then_assistant()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("pong".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    let rx = assert_ok!(manager.send_message("  ping  ").await);
    match outcome_of(rx).await
    {   SendOutcome::Answered(entry) => {
          assert_eq!(entry.role, Role::Assistant);
          assert_eq!(entry.content, "pong");
        }
      , other => panic!("unexpected outcome: {:?}", other)
    }

    let entries = assert_ok!(manager.entries().await);
    assert_eq!(
      contents(&entries),
      vec![(Role::User, "ping"), (Role::Assistant, "pong")]
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].content, "ping");
    assert_eq!(requests[0].temperature, Some(0.4));

    assert_ok!(manager.shutdown().await);
}

#[tokio::test]
async fn full_history_is_resent_on_each_call()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("ok".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    outcome_of(assert_ok!(manager.send_message("one").await)).await;
    outcome_of(assert_ok!(manager.send_message("two").await)).await;

    let requests = transport.requests();
    let second: Vec<(Role, &str)> = requests[1].messages
      .iter()
      .map(|m| (m.role, m.content.as_str()))
      .collect();
    assert_eq!(
      second,
      vec![(Role::User, "one"), (Role::Assistant, "ok"), (Role::User, "two")]
    );
}

#[tokio::test]
async fn blank_input_is_a_no_op()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("x".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    let rx = assert_ok!(manager.send_message(" \n\t ").await);
    assert_eq!(outcome_of(rx).await, SendOutcome::Skipped(SkipReason::EmptyInput));
    assert!(assert_ok!(manager.entries().await).is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn cancel_appends_stopped()
{   let manager = ConversationManager::new(HangingTransport, 0.4);

    let rx = assert_ok!(manager.send_message("ping").await);
    assert!(assert_ok!(manager.cancel().await));

    match outcome_of(rx).await
    {   SendOutcome::Answered(entry) => assert_eq!(entry.content, STOPPED_TEXT)
      , other => panic!("unexpected outcome: {:?}", other)
    }
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(
      contents(&entries),
      vec![(Role::User, "ping"), (Role::Assistant, "Stopped.")]
    );
}

#[tokio::test]
async fn cancel_without_call_in_flight_does_nothing()
{   let manager = ConversationManager::new(
      ScriptedTransport::new(RelayOutcome::Success("x".into())),
      0.4
    );
    assert!(!assert_ok!(manager.cancel().await));
    assert!(assert_ok!(manager.entries().await).is_empty());
}

#[tokio::test]
async fn second_send_is_rejected_while_in_flight()
{   let manager = ConversationManager::new(HangingTransport, 0.4);

    let first = assert_ok!(manager.send_message("a").await);
    let second = assert_ok!(manager.send_message("b").await);
    assert_eq!(outcome_of(second).await, SendOutcome::Skipped(SkipReason::InFlight));

    let regen = assert_ok!(manager.regenerate().await);
    assert_eq!(outcome_of(regen).await, SendOutcome::Skipped(SkipReason::InFlight));

    assert!(assert_ok!(manager.cancel().await));
    outcome_of(first).await;

    let entries = assert_ok!(manager.entries().await);
    assert_eq!(
      contents(&entries),
      vec![(Role::User, "a"), (Role::Assistant, STOPPED_TEXT)]
    );
}

#[tokio::test]
async fn failure_appends_generic_error_text()
{   let transport = ScriptedTransport::new(
      RelayOutcome::Failed("Gemini API error: quota".into())
    );
    let manager = ConversationManager::new(transport, 0.4);

    outcome_of(assert_ok!(manager.send_message("hi").await)).await;
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].content, ERROR_TEXT);
}

#[tokio::test]
async fn empty_reply_shows_placeholder()
{   let manager = ConversationManager::new(
      ScriptedTransport::new(RelayOutcome::Success(String::new())),
      0.4
    );
    outcome_of(assert_ok!(manager.send_message("hi").await)).await;
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(entries[1].content, EMPTY_REPLY_TEXT);
}

#[tokio::test]
async fn regenerate_twice_resends_last_user_content()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("answer".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    outcome_of(assert_ok!(manager.send_message("first").await)).await;
    outcome_of(assert_ok!(manager.send_message("last question").await)).await;

    for _ in 0..2
    {   match outcome_of(assert_ok!(manager.regenerate().await)).await
        {   SendOutcome::Answered(entry) => assert_eq!(entry.content, "answer")
          , other => panic!("unexpected outcome: {:?}", other)
        }
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    for request in &requests[2..]
    {   let last = request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "last question");
    }

    let entries = assert_ok!(manager.entries().await);
    let assistants = entries.iter().filter(|e| e.role == Role::Assistant).count();
    assert_eq!(entries.len(), 8);
    assert_eq!(assistants, 4);
}

#[tokio::test]
async fn regenerate_without_user_entry_is_skipped()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("x".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    let rx = assert_ok!(manager.regenerate().await);
    assert_eq!(outcome_of(rx).await, SendOutcome::Skipped(SkipReason::NoUserEntry));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn clear_starts_a_fresh_conversation()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("ok".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    outcome_of(assert_ok!(manager.send_message("one").await)).await;
    outcome_of(assert_ok!(manager.send_message("two").await)).await;
    assert_eq!(assert_ok!(manager.entries().await).len(), 4);

    assert_ok!(manager.clear().await);
    assert!(assert_ok!(manager.entries().await).is_empty());

    outcome_of(assert_ok!(manager.send_message("three").await)).await;
    assert_eq!(assert_ok!(manager.entries().await).len(), 2);
    assert_eq!(transport.requests().last().unwrap().messages.len(), 1);
}

#[tokio::test]
async fn copy_message_returns_entry_content()
{   let manager = ConversationManager::new(
      ScriptedTransport::new(RelayOutcome::Success("copy me".into())),
      0.4
    );
    let entry = match outcome_of(assert_ok!(manager.send_message("hi").await)).await
    {   SendOutcome::Answered(entry) => entry
      , other => panic!("unexpected outcome: {:?}", other)
    };

    assert_eq!(
      assert_ok!(manager.copy_message(entry.id).await).as_deref(),
      Some("copy me")
    );
    assert_eq!(assert_ok!(manager.copy_message(uuid::Uuid::new_v4()).await), None);
}

#[tokio::test]
async fn temperature_change_applies_to_next_call()
{   let transport = ScriptedTransport::new(RelayOutcome::Success("ok".into()));
    let manager = ConversationManager::new(transport.clone(), 0.4);

    assert_ok!(manager.set_temperature(0.9).await);
    outcome_of(assert_ok!(manager.send_message("hi").await)).await;
    assert_eq!(transport.requests()[0].temperature, Some(0.9));
}

#[tokio::test]
async fn end_to_end_through_relay_and_fake_upstream()
{   let upstream = spawn_upstream(200, gemini_reply("Hello from upstream")).await;
    let relay_url = spawn_relay(relay_for(&upstream.base, Some("live-key"))).await;
    let manager = ConversationManager::new(HttpRelayTransport::new(relay_url), 0.7);

    outcome_of(assert_ok!(manager.send_message("hello").await)).await;
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(
      contents(&entries),
      vec![(Role::User, "hello"), (Role::Assistant, "Hello from upstream")]
    );

    let sent = upstream.recorded.last_body();
    assert_eq!(sent["contents"].as_array().unwrap().len(), 2);
    assert_eq!(sent["generationConfig"]["temperature"], 0.7);
}

#[tokio::test]
async fn end_to_end_missing_key_shows_error_text()
{   let upstream = spawn_upstream(200, gemini_reply("unused")).await;
    let relay_url = spawn_relay(relay_for(&upstream.base, None)).await;
    let manager = ConversationManager::new(HttpRelayTransport::new(relay_url), 0.4);

    outcome_of(assert_ok!(manager.send_message("hello").await)).await;
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].content, ERROR_TEXT);
    assert_eq!(upstream.recorded.calls(), 0);
}

#[tokio::test]
async fn cancel_stops_http_call_that_never_answers()
{   // Accepts connections into the backlog but never responds
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_url = format!("http://{}/api/chat", silent.local_addr().unwrap());
    let manager = ConversationManager::new(HttpRelayTransport::new(relay_url), 0.4);

    let rx = assert_ok!(manager.send_message("ping").await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(assert_ok!(manager.cancel().await));

    match outcome_of(rx).await
    {   SendOutcome::Answered(entry) => assert_eq!(entry.content, STOPPED_TEXT)
      , other => panic!("unexpected outcome: {:?}", other)
    }
    let entries = assert_ok!(manager.entries().await);
    assert_eq!(
      contents(&entries),
      vec![(Role::User, "ping"), (Role::Assistant, STOPPED_TEXT)]
    );
    drop(silent);
}
