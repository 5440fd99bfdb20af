//! Server-Sent Events support

use crate::runtime::{ChatEvent, ChatUpdate, ConversationSnapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Snapshot first, then live updates.
///
/// `broadcast_rx` must be subscribed before `snapshot` is read. Updates the
/// snapshot already reflects (`seq <= last_seq`) are dropped.
pub fn sse_stream(
    snapshot: ConversationSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<ChatUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_seq = snapshot.last_seq;
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(update) if update.seq > last_seq => Some(Ok(chat_update_to_axum(update))),
        _ => None, // Already in the snapshot, or lagged
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &ConversationSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "conversation_id": snapshot.conversation_id,
        "messages": snapshot.messages,
        "busy": snapshot.busy,
        "state": snapshot.state,
        "model_status": snapshot.model_status,
        "last_seq": snapshot.last_seq,
    });
    Event::default()
        .event("init")
        .id(snapshot.last_seq.to_string())
        .data(data.to_string())
}

fn chat_update_to_axum(update: ChatUpdate) -> Event {
    let (event_type, data) = match update.event {
        ChatEvent::MessageAppended { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        ChatEvent::MessageUpdated { message } => (
            "message_updated",
            json!({
                "type": "message_updated",
                "message": message
            }),
        ),
        ChatEvent::TurnPhase { phase, pending_id } => (
            "turn_phase",
            json!({
                "type": "turn_phase",
                "phase": phase,
                "pending_id": pending_id
            }),
        ),
        ChatEvent::ModelStatus { status } => (
            "model_status",
            json!({
                "type": "model_status",
                "status": status
            }),
        ),
        ChatEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default()
        .event(event_type)
        .id(update.seq.to_string())
        .data(data.to_string())
}

/// One parsed SSE frame
#[cfg(test)]
#[derive(Debug)]
pub(super) struct SseFrame {
    pub event: String,
    pub id: Option<u64>,
    pub data: serde_json::Value,
}

/// Parse a frame; keep-alive comments and partial frames yield `None`
#[cfg(test)]
pub(super) fn parse_frame(frame: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut id = None;
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            id = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push_str(value.trim_start());
        }
    }
    Some(SseFrame {
        event: event?,
        id,
        data: serde_json::from_str(&data).ok()?,
    })
}
