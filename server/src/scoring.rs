use std::collections::HashMap;

use marble_shared::config::GameConfig;
use marble_shared::vec2::distance;

use crate::marble::{Frame, Highlight, Marble};
use crate::player::Player;

/// Score and highlight for a marble with the given centre distance and radius.
///
/// Zones are concentric around the board centre and a marble counts as
/// inside a zone as soon as any part of it overlaps the zone.
pub fn zone_score(dist: f64, radius: f64, config: &GameConfig) -> (i32, Highlight) {
    if dist > config.scoring_zone_radius + radius {
        return (0, Highlight::Outside);
    }
    if dist <= config.bullseye_zone_radius + radius {
        return (config.bullseye_zone_score, Highlight::Bullseye);
    }

    let min = config.scoring_zone_min_score;
    let max = config.scoring_zone_max_score;
    let pct = (dist - radius - config.bullseye_zone_radius)
        / (config.scoring_zone_radius - config.bullseye_zone_radius);
    let bonus = ((1.0 - pct) * (max - min + 1) as f64).floor() as i32;
    (min + bonus, Highlight::ScoringZone)
}

pub fn score_marble(marble: &mut Marble, config: &GameConfig) {
    let dist = distance(marble.pos, config.center());
    let (score, highlight) = zone_score(dist, marble.radius(), config);
    marble.score = score;
    marble.highlight = highlight;
}

/// Rescore every marble on the frame and rebuild each player's total from
/// scratch. Marbles whose owner is unknown still get scored.
pub fn apply_scoring(frame: &mut Frame, players: &mut HashMap<String, Player>, config: &GameConfig) {
    for player in players.values_mut() {
        player.score = 0;
    }
    for marble in &mut frame.marbles {
        score_marble(marble, config);
        if let Some(owner) = players.get_mut(&marble.owner) {
            owner.score += marble.score;
        }
    }
}

/// Marbles resting entirely outside the scoring zone.
pub fn is_outside_scoring_zone(marble: &Marble, config: &GameConfig) -> bool {
    distance(marble.pos, config.center()) - marble.radius() > config.scoring_zone_radius
}
