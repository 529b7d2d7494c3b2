use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::GameConfig;
use crate::quat::Quat;
use crate::vec2::Vec2;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "game_state")]
    GameState(GameStateMsg),
    #[serde(rename = "action_rejected")]
    ActionRejected(ActionRejectedMsg),
    #[serde(rename = "chat")]
    Chat(ChatMsg),
    #[serde(rename = "return_to_lobby")]
    ReturnToLobby,
    #[serde(rename = "room_state")]
    RoomState(RoomStateMsg),
}

/// The whole game aggregate: every player, the frame sequence of the
/// latest shot, the config, and whose turn it is.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct GameStateMsg {
    pub players: HashMap<String, PlayerWire>,
    pub frames: Vec<FrameWire>,
    pub config: GameConfig,
    pub turn_order: Vec<String>,
    pub active_player_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub user_token: String,
    pub display_name: String,
    pub score: i32,
    pub hue: u32,
    #[serde(default)]
    pub should_skip_my_turns: bool,
    pub turns_taken: u32,
    pub inventory: Vec<MarbleTypeWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct MarbleTypeWire {
    pub name: String,
    pub description: String,
    pub radius: f64,
    pub mass: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct FrameWire {
    pub marbles: Vec<MarbleWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct MarbleWire {
    pub pos: Vec2,
    pub vel: Vec2,
    #[ts(type = "[number, number, number, number]")]
    pub rot: Quat,
    pub score: i32,
    #[serde(rename = "type")]
    pub marble_type: MarbleTypeWire,
    pub collided: bool,
    pub highlight_color: String,
    /// User token of the player whose shot produced this marble
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct ActionRejectedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct ChatMsg {
    pub sender: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct RoomStateMsg {
    pub id: u32,
    pub name: String,
    pub max_players: u32,
    pub players: Vec<String>,
}

// === Client -> Server ===

/// Outer wrapper of a turn action. The browser sends the action itself as a
/// JSON string inside the `action` field.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct ActionRequest {
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ActionWire {
    /// Index into the player's inventory, -1 when nothing is selected
    pub inventory_slot: i32,
    /// Launch origin
    pub pos: Vec2,
    /// Raw pointer/drag point, not yet clamped to the board
    pub vel: Vec2,
}

impl ActionRequest {
    /// Wrap an action the way the browser client does.
    pub fn wrap(action: &ActionWire) -> serde_json::Result<Self> {
        Ok(Self {
            action: serde_json::to_string(action)?,
        })
    }

    /// Decode both layers of a raw turn-action payload.
    pub fn decode(text: &str) -> serde_json::Result<ActionWire> {
        let outer: ActionRequest = serde_json::from_str(text)?;
        serde_json::from_str(&outer.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct ChatRequest {
    pub message: String,
}

/// Pointer position, sent by clients and echoed verbatim (with the token
/// rewritten server side) to everybody else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct CursorMsg {
    #[serde(default)]
    pub user_token: String,
    pub mouse_x: String,
    pub mouse_y: String,
}

// === Conversion helpers ===

/// Round to 4 decimal places (plenty for pixel positions, keeps frame payloads small)
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}
