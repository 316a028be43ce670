//! Consultation chat over WebSocket.
//!
//! `GET /ws/consultations/{id}?token=<access JWT>`. Browsers cannot set an
//! Authorization header on the upgrade request, so the token travels in the
//! query string.

use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{
    chat::{ChatMessage, RoomId},
    dto::auth::TokenType,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, decode_token},
    repository::accounts,
    state::AppState,
};

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/consultations/{id}", get(consultation_ws))
}

pub async fn consultation_ws(
    State(state): State<AppState>,
    Path(consultation_id): Path<i64>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let claims = decode_token(&query.token, &state.config.jwt_secret, TokenType::Access)?;
    let user = AuthUser::try_from(claims)?;

    let participants = accounts::consultation_participants(&state.pool, consultation_id)
        .await?
        .ok_or_else(|| AppError::not_found("consultation"))?;
    if !participants.includes(user.user_id) {
        return Err(AppError::Forbidden);
    }

    Ok(ws.on_upgrade(move |socket| chat_session(socket, state, consultation_id, user.user_id)))
}

async fn chat_session(socket: WebSocket, state: AppState, room: RoomId, user_id: i64) {
    let Some((client, mut inbox)) = state.chat.join(room).await else {
        tracing::warn!(room, "chat hub is gone");
        return;
    };
    let (mut sink, mut stream) = socket.split();
    tracing::info!(room, user_id, %client, "chat client connected");

    loop {
        tokio::select! {
            outgoing = inbox.recv() => {
                let Some(message) = outgoing else { break };
                let Ok(text) = serde_json::to_string(&message) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = chat_message(room, user_id, text.as_str()) {
                            state.chat.publish(message).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    state.chat.leave(room, client).await;
    tracing::info!(room, user_id, %client, "chat client disconnected");
}

#[derive(Deserialize)]
struct IncomingMessage {
    message: String,
}

/// Accepts either `{"message": "..."}` or a bare text frame.
fn chat_message(room: RoomId, sender_id: i64, raw: &str) -> Option<ChatMessage> {
    let body = serde_json::from_str::<IncomingMessage>(raw)
        .map(|m| m.message)
        .unwrap_or_else(|_| raw.to_string());
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    Some(ChatMessage {
        room_id: room,
        sender_id,
        message: body.to_string(),
        sent_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_bare_frames_become_messages() {
        let json = chat_message(7, 1, r#"{"message":" take twice daily "}"#).unwrap();
        assert_eq!(json.message, "take twice daily");
        assert_eq!((json.room_id, json.sender_id), (7, 1));

        let bare = chat_message(7, 2, "hello").unwrap();
        assert_eq!(bare.message, "hello");
    }

    #[test]
    fn blank_frames_are_dropped() {
        assert!(chat_message(7, 1, "   ").is_none());
        assert!(chat_message(7, 1, r#"{"message":""}"#).is_none());
    }
}
