use std::time::Duration;

use marble_shared::config::GameConfig;

use crate::engine::DEFAULT_MAX_SETTLE_STEPS;

/// Per-connection timing and sizing shared by every hub.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity of each client's outbound queue; a full queue drops the client
    pub send_queue_capacity: usize,
    /// Largest inbound message accepted, in bytes
    pub max_message_size: usize,
    /// Deadline for a single outbound write
    pub write_wait: Duration,
    /// Inbound silence (including pongs) tolerated before the client is dropped
    pub pong_wait: Duration,
    /// Must be shorter than `pong_wait`
    pub ping_period: Duration,
    /// Delay between removing a client and running the departure hook
    pub departure_hook_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            send_queue_capacity: 256,
            max_message_size: 512,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10, // 54s
            departure_hook_delay: Duration::from_millis(100),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub session: SessionSettings,
    /// Delay before a freshly connected game client is joined and sent the state
    pub join_delay: Duration,
    /// Inbound coalescing window for cursor updates; zero disables it
    pub cursor_debounce: Duration,
    pub room_max_players: u32,
    pub max_settle_steps: usize,
    /// Seed for player hues
    pub rng_seed: u64,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            session: SessionSettings::default(),
            join_delay: Duration::from_millis(500),
            cursor_debounce: Duration::from_millis(50),
            room_max_players: 2,
            max_settle_steps: DEFAULT_MAX_SETTLE_STEPS,
            rng_seed: 42,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, with `LISTEN_ADDR` overriding the listen address when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if !addr.is_empty() {
                config.listen_addr = addr;
            }
        }
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        let s = &self.session;
        if s.send_queue_capacity == 0 {
            return Err("send_queue_capacity must be > 0".to_string());
        }
        if s.max_message_size == 0 {
            return Err("max_message_size must be > 0".to_string());
        }
        if s.ping_period.is_zero() {
            return Err("ping_period must be > 0".to_string());
        }
        if s.ping_period >= s.pong_wait {
            return Err(format!(
                "ping_period ({:?}) must be shorter than pong_wait ({:?})",
                s.ping_period, s.pong_wait
            ));
        }
        if s.write_wait.is_zero() {
            return Err("write_wait must be > 0".to_string());
        }
        if self.room_max_players == 0 {
            return Err("room_max_players must be > 0".to_string());
        }
        if self.max_settle_steps == 0 {
            return Err("max_settle_steps must be > 0".to_string());
        }
        self.game.validate()
    }
}
