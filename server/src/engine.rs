//! Turn validation and the settle loop.
//!
//! A shot is validated against the game, turned into a new marble on a copy
//! of the latest frame, and then stepped until every marble is at rest.

use std::collections::HashMap;

use marble_shared::config::GameConfig;
use marble_shared::vec2::{add, cap_length, clamp_to_rect, length, scale, sub, Vec2};

use crate::collision::handle_collisions;
use crate::game::Game;
use crate::marble::{Frame, Marble};
use crate::player::Player;
use crate::scoring::{apply_scoring, is_outside_scoring_zone};

/// Maximum launch speed (px per velocity unit)
pub const MAX_LAUNCH_SPEED: f64 = 215.0;
/// Fraction of the velocity applied to the position each sub-step
pub const STEP: f64 = 0.1;
/// Velocity multiplier per sub-step
pub const FRICTION: f64 = 0.96;
/// Speeds below this snap to exactly zero
pub const REST_THRESHOLD: f64 = 1.0;
/// Default cap on sub-steps per shot
pub const DEFAULT_MAX_SETTLE_STEPS: usize = 10_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid Player")]
    UnknownPlayer,
    #[error("Not your turn")]
    NotPlayersTurn,
    #[error("No Inventory Slot selected")]
    NoSlotSelected,
    #[error("Inventory Slot out of range")]
    SlotOutOfRange,
    #[error("Marbles failed to settle after {0} steps")]
    FailedToSettle(usize),
}

/// A validated-shape shot request. The token is assigned by the server
/// from the connection, never taken from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Inventory index, -1 when nothing is selected
    pub inventory_slot: i64,
    /// Launch origin
    pub pos: Vec2,
    /// Raw drag point, clamped to the board before use
    pub drag: Vec2,
    pub user_token: String,
}

/// Launch velocity for a drag: from the (board-clamped) drag point back to
/// the origin, capped at [`MAX_LAUNCH_SPEED`].
pub fn launch_velocity(origin: Vec2, drag: Vec2, config: &GameConfig) -> Vec2 {
    let clamped = clamp_to_rect(drag, config.width as f64, config.height as f64);
    cap_length(sub(origin, clamped), MAX_LAUNCH_SPEED)
}

/// Check the action against the game and, if it is legal, consume the
/// inventory slot and return a copy of `current` with the new marble added.
///
/// The slot is removed before anything else can fail, so a later
/// simulation failure still costs the player the marble.
pub fn validate_action(game: &mut Game, action: &Action, current: &Frame) -> Result<Frame, EngineError> {
    if !game.players.contains_key(&action.user_token) {
        return Err(EngineError::UnknownPlayer);
    }
    if game.active_player_token() != Some(action.user_token.as_str()) {
        return Err(EngineError::NotPlayersTurn);
    }

    let config = game.config;
    let player = game
        .players
        .get_mut(&action.user_token)
        .ok_or(EngineError::UnknownPlayer)?;

    if action.inventory_slot == -1 {
        return Err(EngineError::NoSlotSelected);
    }
    let slot = usize::try_from(action.inventory_slot).map_err(|_| EngineError::SlotOutOfRange)?;
    if slot >= player.inventory.len() {
        return Err(EngineError::SlotOutOfRange);
    }
    let kind = player.inventory.remove(slot);

    let vel = launch_velocity(action.pos, action.drag, &config);
    let mut next = current.clone();
    next.marbles
        .push(Marble::launched(kind, action.pos, vel, &action.user_token));
    Ok(next)
}

/// Advance one sub-step: integrate, apply friction, snap slow marbles to
/// rest, resolve contacts, rescore.
pub fn step_frame(frame: &mut Frame, players: &mut HashMap<String, Player>, config: &GameConfig) {
    for marble in &mut frame.marbles {
        marble.pos = add(marble.pos, scale(marble.vel, STEP));
        marble.vel = scale(marble.vel, FRICTION);
        if length(marble.vel) < REST_THRESHOLD {
            marble.vel = Vec2::ZERO;
        }
    }
    handle_collisions(frame, config.width as f64, config.height as f64);
    apply_scoring(frame, players, config);
}

/// Step `start` until every marble is at rest. The returned sequence begins
/// with `start` and always contains at least one stepped frame.
///
/// Player scores are recomputed as a side effect of every sub-step.
pub fn simulate(
    start: Frame,
    players: &mut HashMap<String, Player>,
    config: &GameConfig,
    max_steps: usize,
) -> Result<Vec<Frame>, EngineError> {
    let mut frames = vec![start];
    let mut steps = 0;
    loop {
        if steps >= max_steps {
            return Err(EngineError::FailedToSettle(steps));
        }
        let mut next = frames[frames.len() - 1].clone();
        step_frame(&mut next, players, config);
        steps += 1;
        let settled = next.are_settled();
        frames.push(next);
        if settled {
            break;
        }
    }

    if let Some(last) = frames.last_mut() {
        last.reset_rotations();
        if config.remove_marbles_from_outside_scoring_zone {
            prune_outside(last, config);
        }
        last.reset_collided_flags();
    }
    tracing::debug!(steps, frames = frames.len(), "shot settled");
    Ok(frames)
}

/// Drop marbles resting entirely outside the scoring zone. Marks first, then
/// filters, so the decision for one marble never depends on another.
pub fn prune_outside(frame: &mut Frame, config: &GameConfig) {
    let keep: Vec<bool> = frame
        .marbles
        .iter()
        .map(|m| !is_outside_scoring_zone(m, config))
        .collect();
    let mut flags = keep.into_iter();
    frame.marbles.retain(|_| flags.next().unwrap_or(true));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marble::MarbleKind;
    use marble_shared::vec2::distance;

    fn two_player_game() -> Game {
        let mut game = Game::new(GameConfig::default(), DEFAULT_MAX_SETTLE_STEPS, 7);
        game.add_player("alice");
        game.add_player("bob");
        game
    }

    fn shot(token: &str, slot: i64, pos: Vec2, drag: Vec2) -> Action {
        Action {
            inventory_slot: slot,
            pos,
            drag,
            user_token: token.to_string(),
        }
    }

    #[test]
    fn unknown_player_rejected_first() {
        let mut game = two_player_game();
        let action = shot("mallory", -1, Vec2::ZERO, Vec2::ZERO);
        let err = validate_action(&mut game, &action, &Frame::default()).unwrap_err();
        assert_eq!(err, EngineError::UnknownPlayer);
        assert_eq!(err.to_string(), "Invalid Player");
    }

    #[test]
    fn out_of_turn_rejected_before_slot_checks() {
        let mut game = two_player_game();
        let action = shot("bob", -1, Vec2::ZERO, Vec2::ZERO);
        let err = validate_action(&mut game, &action, &Frame::default()).unwrap_err();
        assert_eq!(err, EngineError::NotPlayersTurn);
        assert_eq!(game.players["bob"].inventory.len(), 11);
    }

    #[test]
    fn missing_and_bad_slots_rejected() {
        let mut game = two_player_game();
        let none = shot("alice", -1, Vec2::ZERO, Vec2::ZERO);
        assert_eq!(
            validate_action(&mut game, &none, &Frame::default()),
            Err(EngineError::NoSlotSelected)
        );
        for slot in [11, 50, -2] {
            let bad = shot("alice", slot, Vec2::ZERO, Vec2::ZERO);
            assert_eq!(
                validate_action(&mut game, &bad, &Frame::default()),
                Err(EngineError::SlotOutOfRange),
                "slot {slot}"
            );
        }
        assert_eq!(game.players["alice"].inventory.len(), 11);
    }

    #[test]
    fn valid_action_consumes_slot_and_appends_marble() {
        let mut game = two_player_game();
        let action = shot("alice", 2, Vec2::new(300.0, 400.0), Vec2::new(300.0, 450.0));
        let frame = validate_action(&mut game, &action, &Frame::default()).unwrap();

        let inv = &game.players["alice"].inventory;
        assert_eq!(inv.len(), 10);
        assert_eq!(inv[2], MarbleKind::Marble);

        assert_eq!(frame.marbles.len(), 1);
        let marble = &frame.marbles[0];
        assert_eq!(marble.kind, MarbleKind::BigMarble);
        assert_eq!(marble.owner, "alice");
        assert_eq!(marble.score, 0);
        assert_eq!(marble.vel, Vec2::new(0.0, -50.0));
    }

    #[test]
    fn launch_velocity_is_capped() {
        let config = GameConfig::default();
        let vel = launch_velocity(Vec2::new(0.0, 0.0), Vec2::new(600.0, 480.0), &config);
        assert!((length(vel) - MAX_LAUNCH_SPEED).abs() < 1e-9);
        assert!(vel.x < 0.0 && vel.y < 0.0);
        // Direction preserved
        assert!((vel.y / vel.x - 480.0 / 600.0).abs() < 1e-9);
    }

    #[test]
    fn launch_velocity_clamps_drag_point_to_board() {
        let config = GameConfig::default();
        let inside = launch_velocity(Vec2::new(100.0, 240.0), Vec2::new(0.0, 240.0), &config);
        let outside = launch_velocity(Vec2::new(100.0, 240.0), Vec2::new(-5000.0, 240.0), &config);
        assert_eq!(inside, outside);
        assert_eq!(inside, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn simulate_reaches_rest_and_keeps_start_frame() {
        let config = GameConfig::default();
        let mut game = two_player_game();
        let action = shot("alice", 0, Vec2::new(300.0, 420.0), Vec2::new(300.0, 900.0));
        let start = validate_action(&mut game, &action, &Frame::default()).unwrap();

        let frames = simulate(start.clone(), &mut game.players, &config, DEFAULT_MAX_SETTLE_STEPS).unwrap();
        assert!(frames.len() >= 2);
        assert_eq!(frames[0], start);

        let last = frames.last().unwrap();
        assert!(last.are_settled());
        for marble in &last.marbles {
            assert_eq!(marble.rot, marble_shared::quat::Quat::IDENTITY);
            assert!(!marble.collided);
        }
    }

    #[test]
    fn zero_velocity_shot_settles_after_one_step() {
        let config = GameConfig::default();
        let start = Frame::new(vec![Marble::launched(
            MarbleKind::Marble,
            Vec2::new(300.0, 240.0),
            Vec2::ZERO,
            "alice",
        )]);
        let mut players = HashMap::new();
        players.insert("alice".to_string(), Player::new("alice", 0));
        let frames = simulate(start, &mut players, &config, DEFAULT_MAX_SETTLE_STEPS).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(players["alice"].score, 40);
    }

    #[test]
    fn settle_cap_reports_failure() {
        let config = GameConfig::default();
        let start = Frame::new(vec![Marble::launched(
            MarbleKind::Marble,
            Vec2::new(300.0, 240.0),
            Vec2::new(200.0, 0.0),
            "alice",
        )]);
        let mut players = HashMap::new();
        let err = simulate(start, &mut players, &config, 5).unwrap_err();
        assert_eq!(err, EngineError::FailedToSettle(5));
    }

    #[test]
    fn every_stepped_frame_stays_on_board() {
        let config = GameConfig::default();
        let start = Frame::new(vec![
            Marble::launched(MarbleKind::BigMarble, Vec2::new(100.0, 100.0), Vec2::new(215.0, 0.0), "a"),
            Marble::launched(MarbleKind::SmallMarble, Vec2::new(500.0, 380.0), Vec2::new(-150.0, -150.0), "a"),
            Marble::launched(MarbleKind::Marble, Vec2::new(300.0, 240.0), Vec2::ZERO, "a"),
        ]);
        let mut players = HashMap::new();
        let frames = simulate(start, &mut players, &config, DEFAULT_MAX_SETTLE_STEPS).unwrap();
        for frame in &frames[1..] {
            for m in &frame.marbles {
                let r = m.radius();
                assert!(m.pos.x >= r - 1e-9 && m.pos.x <= 600.0 - r + 1e-9);
                assert!(m.pos.y >= r - 1e-9 && m.pos.y <= 480.0 - r + 1e-9);
            }
        }
    }

    #[test]
    fn resting_outside_zone_is_pruned() {
        let config = GameConfig::default();
        let start = Frame::new(vec![
            Marble::launched(MarbleKind::Marble, Vec2::new(40.0, 40.0), Vec2::ZERO, "a"),
            Marble::launched(MarbleKind::Marble, Vec2::new(300.0, 240.0), Vec2::ZERO, "a"),
        ]);
        let mut players = HashMap::new();
        let frames = simulate(start, &mut players, &config, DEFAULT_MAX_SETTLE_STEPS).unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last.marbles.len(), 1);
        assert!(distance(last.marbles[0].pos, config.center()) < 1.0);
        // Intermediate frames keep it
        assert_eq!(frames[0].marbles.len(), 2);
    }

    #[test]
    fn pruning_can_be_disabled() {
        let config = GameConfig {
            remove_marbles_from_outside_scoring_zone: false,
            ..Default::default()
        };
        let start = Frame::new(vec![Marble::launched(
            MarbleKind::Marble,
            Vec2::new(40.0, 40.0),
            Vec2::ZERO,
            "a",
        )]);
        let mut players = HashMap::new();
        let frames = simulate(start, &mut players, &config, DEFAULT_MAX_SETTLE_STEPS).unwrap();
        assert_eq!(frames.last().unwrap().marbles.len(), 1);
    }
}
