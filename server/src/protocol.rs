//! Conversions from server-side state to the shared wire types.

use marble_shared::protocol::{
    round4, ActionWire, FrameWire, GameStateMsg, MarbleTypeWire, MarbleWire, PlayerWire,
    ServerMsg,
};
use marble_shared::quat::Quat;
use marble_shared::vec2::Vec2;

use crate::engine::Action;
use crate::game::Game;
use crate::marble::{Frame, Marble, MarbleKind};
use crate::player::Player;

fn round_vec(v: Vec2) -> Vec2 {
    Vec2::new(round4(v.x), round4(v.y))
}

fn round_quat(q: Quat) -> Quat {
    Quat {
        x: round4(q.x),
        y: round4(q.y),
        z: round4(q.z),
        w: round4(q.w),
    }
}

pub fn marble_type_wire(kind: MarbleKind) -> MarbleTypeWire {
    MarbleTypeWire {
        name: kind.name().to_string(),
        description: kind.description().to_string(),
        radius: kind.radius(),
        mass: kind.mass(),
    }
}

pub fn marble_wire(marble: &Marble) -> MarbleWire {
    MarbleWire {
        pos: round_vec(marble.pos),
        vel: round_vec(marble.vel),
        rot: round_quat(marble.rot),
        score: marble.score,
        marble_type: marble_type_wire(marble.kind),
        collided: marble.collided,
        highlight_color: marble.highlight.color().to_string(),
        owner: marble.owner.clone(),
    }
}

pub fn frame_wire(frame: &Frame) -> FrameWire {
    FrameWire {
        marbles: frame.marbles.iter().map(marble_wire).collect(),
    }
}

pub fn player_wire(player: &Player) -> PlayerWire {
    PlayerWire {
        user_token: player.user_token.clone(),
        display_name: player.display_name.clone(),
        score: player.score,
        hue: player.hue,
        should_skip_my_turns: player.should_skip_my_turns,
        turns_taken: player.turns_taken,
        inventory: player.inventory.iter().copied().map(marble_type_wire).collect(),
    }
}

pub fn game_state_msg(game: &Game) -> GameStateMsg {
    GameStateMsg {
        players: game
            .players
            .iter()
            .map(|(token, player)| (token.clone(), player_wire(player)))
            .collect(),
        frames: game.frames.iter().map(frame_wire).collect(),
        config: game.config,
        turn_order: game.turn_order.clone(),
        active_player_index: game.active_player_index as u32,
    }
}

/// Attach the connection's token to a decoded wire action.
pub fn action_from_wire(wire: &ActionWire, user_token: &str) -> Action {
    Action {
        inventory_slot: i64::from(wire.inventory_slot),
        pos: wire.pos,
        drag: wire.vel,
        user_token: user_token.to_string(),
    }
}

/// Serialize a server message. A failure is logged and the message skipped.
pub fn encode(msg: &ServerMsg) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to encode server message: {}", e);
            None
        }
    }
}
