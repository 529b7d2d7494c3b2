//! Rooms: small capacity-limited groups with their own chat hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use marble_shared::protocol::{RoomStateMsg, ServerMsg};

use crate::channel::ChannelHandler;
use crate::chat::{chat_message, parse_chat};
use crate::config::SessionSettings;
use crate::hub::{spawn_hub, ClientInfo, HubHandle, Outbound};
use crate::player::display_name;
use crate::protocol::encode;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Player count already at max")]
    Full,
    #[error("Player already removed or not in room")]
    NotInRoom,
    #[error("Room {0} does not exist")]
    NotFound(u32),
}

pub struct Room {
    pub id: u32,
    pub name: String,
    pub max_players: u32,
    /// Member tokens in join order
    pub players: Vec<String>,
    pub hub: HubHandle,
}

impl Room {
    pub fn state(&self) -> RoomStateMsg {
        RoomStateMsg {
            id: self.id,
            name: self.name.clone(),
            max_players: self.max_players,
            players: self.players.clone(),
        }
    }

    fn broadcast_state(&self) {
        if let Some(json) = encode(&ServerMsg::RoomState(self.state())) {
            self.hub.broadcast(Outbound::text(json));
        }
    }

    /// Idempotent for existing members.
    pub fn add_player(&mut self, user_token: &str) -> Result<(), RoomError> {
        if self.players.iter().any(|p| p == user_token) {
            return Ok(());
        }
        if self.players.len() >= self.max_players as usize {
            return Err(RoomError::Full);
        }
        self.players.push(user_token.to_string());
        self.broadcast_state();
        Ok(())
    }

    pub fn remove_player(&mut self, user_token: &str) -> Result<(), RoomError> {
        let before = self.players.len();
        self.players.retain(|p| p != user_token);
        if self.players.len() == before {
            return Err(RoomError::NotInRoom);
        }
        self.broadcast_state();
        Ok(())
    }
}

struct RoomRegistry {
    rooms: HashMap<u32, Room>,
    max_players: u32,
    settings: SessionSettings,
}

/// Shared handle to every room. Rooms are created on first join and
/// dropped when the last player leaves.
#[derive(Clone)]
pub struct Rooms {
    inner: Arc<Mutex<RoomRegistry>>,
}

impl Rooms {
    pub fn new(max_players: u32, settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RoomRegistry {
                rooms: HashMap::new(),
                max_players,
                settings,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoomRegistry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn from_weak(weak: &Weak<Mutex<RoomRegistry>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn join(&self, id: u32, user_token: &str) -> Result<RoomStateMsg, RoomError> {
        let weak = Arc::downgrade(&self.inner);
        let mut registry = self.lock();
        let max_players = registry.max_players;
        let hook_delay = registry.settings.departure_hook_delay;
        let room = registry.rooms.entry(id).or_insert_with(|| {
            tracing::info!("Creating room {}", id);
            let handler = Arc::new(RoomChannel {
                room_id: id,
                rooms: weak,
            });
            Room {
                id,
                name: id.to_string(),
                max_players,
                players: Vec::new(),
                hub: spawn_hub(handler, hook_delay),
            }
        });
        room.add_player(user_token)?;
        Ok(room.state())
    }

    pub fn leave(&self, id: u32, user_token: &str) -> Result<RoomStateMsg, RoomError> {
        let mut registry = self.lock();
        let room = registry.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        room.remove_player(user_token)?;
        let state = room.state();
        if state.players.is_empty() {
            if let Some(room) = registry.rooms.remove(&id) {
                room.hub.close_all();
                tracing::info!("Room {} closed, nobody left", id);
            }
        }
        Ok(state)
    }

    pub fn list(&self) -> Vec<RoomStateMsg> {
        let registry = self.lock();
        let mut rooms: Vec<RoomStateMsg> = registry.rooms.values().map(Room::state).collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    pub fn is_member(&self, id: u32, user_token: &str) -> bool {
        self.lock()
            .rooms
            .get(&id)
            .is_some_and(|room| room.players.iter().any(|p| p == user_token))
    }

    pub fn hub(&self, id: u32) -> Option<HubHandle> {
        self.lock().rooms.get(&id).map(|room| room.hub.clone())
    }

    /// Tell everyone in the room to go back to the lobby, drop every
    /// connection and forget the room.
    pub fn disband(&self, id: u32, announcement: Option<String>) -> Result<(), RoomError> {
        let room = self.lock().rooms.remove(&id).ok_or(RoomError::NotFound(id))?;
        if let Some(json) = announcement {
            room.hub.broadcast(Outbound::text(json));
        }
        if let Some(json) = encode(&ServerMsg::ReturnToLobby) {
            room.hub.broadcast(Outbound::text(json));
        }
        room.hub.close_all();
        tracing::info!("Room {} disbanded", id);
        Ok(())
    }
}

/// Chat and commands inside one room.
pub struct RoomChannel {
    room_id: u32,
    rooms: Weak<Mutex<RoomRegistry>>,
}

impl RoomChannel {
    fn disconnect(&self, rooms: &Rooms, client: &ClientInfo, hub: &HubHandle) {
        if let Some(json) = chat_message(&display_name(&client.user_token), "Player left") {
            hub.broadcast(Outbound::text(json));
        }
        if let Some(json) = encode(&ServerMsg::ReturnToLobby) {
            hub.send_to(client.id, Outbound::text(json));
        }
        if let Err(e) = rooms.leave(self.room_id, &client.user_token) {
            tracing::warn!("Room {}: {}", self.room_id, e);
        }
    }
}

impl ChannelHandler for RoomChannel {
    fn name(&self) -> &'static str {
        "room"
    }

    fn on_register(&self, client: &ClientInfo, hub: &HubHandle) {
        let Some(rooms) = Rooms::from_weak(&self.rooms) else {
            return;
        };
        let state = rooms.lock().rooms.get(&self.room_id).map(Room::state);
        if let Some(json) = state.and_then(|s| encode(&ServerMsg::RoomState(s))) {
            hub.send_to(client.id, Outbound::text(json));
        }
    }

    fn on_message(&self, client: &ClientInfo, text: &str, hub: &HubHandle) {
        let Some(message) = parse_chat(client, text) else {
            return;
        };
        let sender = display_name(&client.user_token);

        if !message.starts_with('/') {
            if let Some(json) = chat_message(&sender, message) {
                hub.broadcast(Outbound::from_origin(&client.user_token, json));
            }
            return;
        }

        let Some(rooms) = Rooms::from_weak(&self.rooms) else {
            return;
        };
        match message.as_str() {
            "/disband" => {
                let announcement = chat_message(&sender, "Room Leader disbanded the room");
                if let Err(e) = rooms.disband(self.room_id, announcement) {
                    tracing::warn!("Room {}: {}", self.room_id, e);
                }
            }
            "/disconnect" => self.disconnect(&rooms, client, hub),
            other => tracing::debug!("Unknown room command {}", other),
        }
    }
}
