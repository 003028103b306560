//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{SnapshotEvent, Topic};
use crate::service::Scheduler;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<SnapshotEvent>,
    scheduler: Arc<Scheduler>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &scheduler).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(snapshot_event) => {
                        let topic = snapshot_event.topic();
                        if subs.matches(&topic) {
                            // an explicit stakes subscription keeps its owner tracked
                            if subs.is_explicit(&topic)
                                && let Ok(Topic::Stakes(owner)) = topic.parse::<Topic>() {
                                    scheduler.track_owner(owner).await;
                                }
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&snapshot_event).unwrap_or_default(),
                            );
                            let Some(json) = msg.to_json() else {
                                continue;
                            };
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Topics named in a command, split into parsed topics, the wildcard flag,
/// and entries that did not parse.
struct TopicArgs {
    topics: Vec<Topic>,
    wildcard: bool,
    rejected: Vec<String>,
}

fn parse_topics(raw: Vec<String>) -> TopicArgs {
    let mut args = TopicArgs {
        topics: Vec::new(),
        wildcard: false,
        rejected: Vec::new(),
    };
    for entry in raw {
        if entry == "*" {
            args.wildcard = true;
        } else if let Ok(topic) = entry.parse::<Topic>() {
            args.topics.push(topic);
        } else {
            args.rejected.push(entry);
        }
    }
    args
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    scheduler: &Arc<Scheduler>,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON").to_json();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command").to_json();
    };

    let payload = match command {
        WsCommand::Subscribe { topics } => {
            let args = parse_topics(topics);
            for topic in &args.topics {
                if let Topic::Stakes(owner) = topic {
                    scheduler.track_owner(owner.clone()).await;
                }
            }
            subs.subscribe(&args.topics, args.wildcard);
            serde_json::json!({
                "subscribed": args.topics.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "rejected": args.rejected,
                "count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::Unsubscribe { topics } => {
            let args = parse_topics(topics);
            subs.unsubscribe(&args.topics, args.wildcard);
            serde_json::json!({
                "unsubscribed": args.topics.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "rejected": args.rejected,
                "remaining_count": subs.count(),
            })
        }
        WsCommand::Refresh { topic } => {
            let Ok(topic) = topic.parse::<Topic>() else {
                return WsMessage::error(msg.id, 400, "invalid topic").to_json();
            };
            if let Topic::Stakes(owner) = &topic {
                scheduler.track_owner(owner.clone()).await;
            }
            drop(scheduler.trigger(topic.clone()).await);
            serde_json::json!({ "scheduled": topic.to_string() })
        }
    };

    WsMessage::new(msg.id, WsMessageType::Response, payload).to_json()
}
