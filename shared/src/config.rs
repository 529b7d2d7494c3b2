use crate::vec2::Vec2;

/// Board and scoring configuration. Sent to clients as part of every game state.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub player_limit: u32,
    pub scoring_zone_radius: f64,
    pub scoring_zone_max_score: i32,
    pub scoring_zone_min_score: i32,
    pub bullseye_zone_radius: f64,
    pub bullseye_zone_score: i32,
    pub width: u32,
    pub height: u32,
    /// Drop marbles that come to rest outside the scoring zone
    pub remove_marbles_from_outside_scoring_zone: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_limit: 2,
            scoring_zone_radius: 150.0,
            scoring_zone_max_score: 20,
            scoring_zone_min_score: 5,
            bullseye_zone_radius: 15.0,
            bullseye_zone_score: 40,
            width: 600,
            height: 480,
            remove_marbles_from_outside_scoring_zone: true,
        }
    }
}

impl GameConfig {
    /// Centre of the board; both zones are concentric around it.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.player_limit == 0 {
            return Err("player_limit must be > 0".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be > 0".to_string());
        }
        if !self.bullseye_zone_radius.is_finite() || self.bullseye_zone_radius < 0.0 {
            return Err("bullseye_zone_radius must be finite and >= 0".to_string());
        }
        if !self.scoring_zone_radius.is_finite()
            || self.scoring_zone_radius <= self.bullseye_zone_radius
        {
            return Err("scoring_zone_radius must be finite and > bullseye_zone_radius".to_string());
        }
        if self.scoring_zone_min_score > self.scoring_zone_max_score {
            return Err("scoring_zone_min_score must be <= scoring_zone_max_score".to_string());
        }
        Ok(())
    }
}
