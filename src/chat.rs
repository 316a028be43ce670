//! In-memory consultation chat fan-out.
//!
//! A single task owns every room and drains three channels: register,
//! unregister and broadcast. Handlers talk to it only through [`ChatHub`],
//! so the room map never needs a lock. Each client gets a bounded buffer and
//! the hub never waits on it: a full buffer loses that message, a closed one
//! removes the client.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

pub type RoomId = i64;
pub type ClientId = Uuid;

pub const CLIENT_BUFFER: usize = 32;
const HUB_QUEUE: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: i64,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

struct Registration {
    room: RoomId,
    client: ClientId,
    outbox: mpsc::Sender<ChatMessage>,
}

#[derive(Clone)]
pub struct ChatHub {
    register: mpsc::Sender<Registration>,
    unregister: mpsc::Sender<(RoomId, ClientId)>,
    broadcast: mpsc::Sender<ChatMessage>,
}

impl ChatHub {
    /// Starts the hub task. It stops once every handle is dropped.
    pub fn spawn() -> Self {
        let (register, register_rx) = mpsc::channel(HUB_QUEUE);
        let (unregister, unregister_rx) = mpsc::channel(HUB_QUEUE);
        let (broadcast, broadcast_rx) = mpsc::channel(HUB_QUEUE);
        tokio::spawn(run(register_rx, unregister_rx, broadcast_rx));
        Self {
            register,
            unregister,
            broadcast,
        }
    }

    pub async fn join(&self, room: RoomId) -> Option<(ClientId, mpsc::Receiver<ChatMessage>)> {
        let client = Uuid::new_v4();
        let (outbox, inbox) = mpsc::channel(CLIENT_BUFFER);
        self.register
            .send(Registration {
                room,
                client,
                outbox,
            })
            .await
            .ok()?;
        Some((client, inbox))
    }

    pub async fn leave(&self, room: RoomId, client: ClientId) {
        let _ = self.unregister.send((room, client)).await;
    }

    pub async fn publish(&self, message: ChatMessage) {
        let _ = self.broadcast.send(message).await;
    }
}

async fn run(
    mut register: mpsc::Receiver<Registration>,
    mut unregister: mpsc::Receiver<(RoomId, ClientId)>,
    mut broadcast: mpsc::Receiver<ChatMessage>,
) {
    let mut rooms: HashMap<RoomId, HashMap<ClientId, mpsc::Sender<ChatMessage>>> = HashMap::new();

    loop {
        // Registrations drain first so a join always precedes later broadcasts.
        tokio::select! {
            biased;
            reg = register.recv() => {
                let Some(reg) = reg else { break };
                rooms.entry(reg.room).or_default().insert(reg.client, reg.outbox);
                tracing::debug!(room = reg.room, client = %reg.client, "chat client joined");
            }
            leave = unregister.recv() => {
                let Some((room, client)) = leave else { break };
                remove_client(&mut rooms, room, client);
                tracing::debug!(room, client = %client, "chat client left");
            }
            msg = broadcast.recv() => {
                let Some(msg) = msg else { break };
                fan_out(&mut rooms, msg);
            }
        }
    }
}

fn fan_out(
    rooms: &mut HashMap<RoomId, HashMap<ClientId, mpsc::Sender<ChatMessage>>>,
    msg: ChatMessage,
) {
    let room = msg.room_id;
    let Some(clients) = rooms.get_mut(&room) else {
        return;
    };
    clients.retain(|client, outbox| match outbox.try_send(msg.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(room, client = %client, "chat client buffer full, message dropped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
    if clients.is_empty() {
        rooms.remove(&room);
    }
}

fn remove_client(
    rooms: &mut HashMap<RoomId, HashMap<ClientId, mpsc::Sender<ChatMessage>>>,
    room: RoomId,
    client: ClientId,
) {
    if let Some(clients) = rooms.get_mut(&room) {
        clients.remove(&client);
        if clients.is_empty() {
            rooms.remove(&room);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn message(room_id: RoomId, text: &str) -> ChatMessage {
        ChatMessage {
            room_id,
            sender_id: 1,
            message: text.to_string(),
            sent_at: Utc::now(),
        }
    }

    async fn recv(inbox: &mut mpsc::Receiver<ChatMessage>) -> Option<ChatMessage> {
        tokio::time::timeout(Duration::from_millis(200), inbox.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client_in_the_room_only() {
        let hub = ChatHub::spawn();
        let (_, mut a) = hub.join(1).await.unwrap();
        let (_, mut b) = hub.join(1).await.unwrap();
        let (_, mut other) = hub.join(2).await.unwrap();

        hub.publish(message(1, "hello")).await;

        assert_eq!(recv(&mut a).await.unwrap().message, "hello");
        assert_eq!(recv(&mut b).await.unwrap().message, "hello");
        assert!(recv(&mut other).await.is_none());
    }

    #[tokio::test]
    async fn left_clients_stop_receiving() {
        let hub = ChatHub::spawn();
        let (id, mut a) = hub.join(1).await.unwrap();
        let (_, mut b) = hub.join(1).await.unwrap();

        hub.leave(1, id).await;
        hub.publish(message(1, "after leave")).await;

        assert_eq!(recv(&mut b).await.unwrap().message, "after leave");
        assert!(recv(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn slow_client_loses_messages_without_blocking_others() {
        let hub = ChatHub::spawn();
        let (_, _stalled) = hub.join(1).await.unwrap();
        let (_, mut live) = hub.join(1).await.unwrap();

        for i in 0..CLIENT_BUFFER + 5 {
            hub.publish(message(1, &i.to_string())).await;
            assert_eq!(recv(&mut live).await.unwrap().message, i.to_string());
        }
    }

    #[tokio::test]
    async fn closed_clients_are_dropped() {
        let hub = ChatHub::spawn();
        let (_, gone) = hub.join(1).await.unwrap();
        let (_, mut live) = hub.join(1).await.unwrap();
        drop(gone);

        hub.publish(message(1, "one")).await;
        hub.publish(message(1, "two")).await;

        assert_eq!(recv(&mut live).await.unwrap().message, "one");
        assert_eq!(recv(&mut live).await.unwrap().message, "two");
    }
}
