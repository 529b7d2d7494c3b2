use std::collections::HashMap;

use marble_shared::config::GameConfig;
use marble_shared::protocol::GameStateMsg;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::engine::{simulate, validate_action, Action, EngineError};
use crate::marble::Frame;
use crate::player::Player;
use crate::protocol::game_state_msg;

/// How a token's first contact with the game was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New player, appended to the turn order
    Joined,
    /// Token already had a player
    Returning,
    /// Player limit reached; the token only watches
    Spectating,
}

/// The single global game. Owned by the session task.
pub struct Game {
    pub players: HashMap<String, Player>,
    /// Frame sequence of the most recent shot only
    pub frames: Vec<Frame>,
    pub config: GameConfig,
    pub turn_order: Vec<String>,
    pub active_player_index: usize,
    pub max_settle_steps: usize,
    rng: ChaCha8Rng,
}

impl Game {
    pub fn new(config: GameConfig, max_settle_steps: usize, rng_seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            players: HashMap::new(),
            frames: Vec::new(),
            config,
            turn_order: Vec::new(),
            active_player_index: 0,
            max_settle_steps,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    /// Create a player for `user_token` unless it already has one or the
    /// game is full.
    pub fn add_player(&mut self, user_token: &str) -> JoinOutcome {
        if self.players.contains_key(user_token) {
            return JoinOutcome::Returning;
        }
        if self.players.len() >= self.config.player_limit as usize {
            return JoinOutcome::Spectating;
        }
        let hue = self.rng.gen_range(0..256);
        self.players
            .insert(user_token.to_string(), Player::new(user_token, hue));
        self.turn_order.push(user_token.to_string());
        JoinOutcome::Joined
    }

    pub fn active_player_token(&self) -> Option<&str> {
        self.turn_order
            .get(self.active_player_index)
            .map(String::as_str)
    }

    /// The latest resting frame, or an empty board before the first shot.
    pub fn current_frame(&self) -> Frame {
        self.frames.last().cloned().unwrap_or_default()
    }

    /// Validate and play a shot, then hand the turn to the next player.
    ///
    /// On a settle failure only the consumed inventory slot persists:
    /// frames, scores and the turn stay as they were.
    pub fn apply_action(&mut self, action: &Action) -> Result<(), EngineError> {
        let current = self.current_frame();
        let start = validate_action(self, action, &current)?;

        let mut players = self.players.clone();
        let frames = simulate(start, &mut players, &self.config, self.max_settle_steps)?;

        self.players = players;
        self.frames = frames;
        if let Some(player) = self.players.get_mut(&action.user_token) {
            player.turns_taken += 1;
        }
        self.advance_turn();
        Ok(())
    }

    fn advance_turn(&mut self) {
        if self.turn_order.is_empty() {
            return;
        }
        self.active_player_index = (self.active_player_index + 1) % self.turn_order.len();
    }

    pub fn snapshot(&self) -> GameStateMsg {
        game_state_msg(self)
    }
}
