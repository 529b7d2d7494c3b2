use crate::marble::MarbleKind;

/// A participant in the global game, keyed by user token.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub user_token: String,
    pub display_name: String,
    /// Sum of the scores of this player's marbles on the latest frame
    pub score: i32,
    pub hue: u32,
    /// Carried on the wire, not read by any game logic yet
    pub should_skip_my_turns: bool,
    pub turns_taken: u32,
    /// Marbles the player may still launch. Only ever shrinks.
    pub inventory: Vec<MarbleKind>,
}

impl Player {
    pub fn new(user_token: &str, hue: u32) -> Self {
        Self {
            user_token: user_token.to_string(),
            display_name: display_name(user_token),
            score: 0,
            hue,
            should_skip_my_turns: false,
            turns_taken: 0,
            inventory: starting_inventory(),
        }
    }
}

/// Short name shown to other players: the first four characters of the token.
pub fn display_name(user_token: &str) -> String {
    user_token.chars().take(4).collect()
}

/// Every new player starts with the same eleven marbles.
pub fn starting_inventory() -> Vec<MarbleKind> {
    use MarbleKind::*;
    vec![
        Marble,
        Marble,
        BigMarble,
        Marble,
        SmallMarble,
        BigMarble,
        Marble,
        Marble,
        SmallMarble,
        Marble,
        Marble,
    ]
}
