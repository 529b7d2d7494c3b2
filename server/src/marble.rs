use marble_shared::quat::Quat;
use marble_shared::vec2::{length, Vec2};

/// The fixed marble catalog. Bigger marbles are heavier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarbleKind {
    Marble,
    BigMarble,
    SmallMarble,
}

impl MarbleKind {
    pub const ALL: [MarbleKind; 3] = [
        MarbleKind::Marble,
        MarbleKind::BigMarble,
        MarbleKind::SmallMarble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarbleKind::Marble => "Marble",
            MarbleKind::BigMarble => "Big Marble",
            MarbleKind::SmallMarble => "Small Marble",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MarbleKind::Marble => "Scores normally.",
            MarbleKind::BigMarble => "Big. Scores normally.",
            MarbleKind::SmallMarble => "Small. Scores normally.",
        }
    }

    pub fn radius(self) -> f64 {
        match self {
            MarbleKind::Marble => 30.0,
            MarbleKind::BigMarble => 50.0,
            MarbleKind::SmallMarble => 15.0,
        }
    }

    pub fn mass(self) -> f64 {
        match self {
            MarbleKind::Marble => 10.0,
            MarbleKind::BigMarble => 20.0,
            MarbleKind::SmallMarble => 5.0,
        }
    }
}

/// Zone indicator drawn around a marble by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Highlight {
    /// Not scored yet (freshly launched)
    #[default]
    Unscored,
    Bullseye,
    ScoringZone,
    Outside,
}

impl Highlight {
    /// RGBA hex colour sent on the wire
    pub fn color(self) -> &'static str {
        match self {
            Highlight::Unscored => "",
            Highlight::Bullseye => "#ffffffff",
            Highlight::ScoringZone => "#ffffff80",
            Highlight::Outside => "#12121200",
        }
    }
}

/// A live physics body on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Marble {
    pub pos: Vec2,
    pub vel: Vec2,
    pub rot: Quat,
    pub score: i32,
    pub kind: MarbleKind,
    /// Set when the marble touched another one during the current sub-step
    pub collided: bool,
    pub highlight: Highlight,
    /// User token of the player whose shot produced this marble.
    /// Resolved through the game's player map, never owned.
    pub owner: String,
}

impl Marble {
    pub fn launched(kind: MarbleKind, pos: Vec2, vel: Vec2, owner: &str) -> Self {
        Self {
            pos,
            vel,
            rot: Quat::IDENTITY,
            score: 0,
            kind,
            collided: false,
            highlight: Highlight::Unscored,
            owner: owner.to_string(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.kind.radius()
    }

    pub fn mass(&self) -> f64 {
        self.kind.mass()
    }
}

/// One snapshot of every live marble. Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub marbles: Vec<Marble>,
}

impl Frame {
    pub fn new(marbles: Vec<Marble>) -> Self {
        Self { marbles }
    }

    /// True when every marble's velocity is exactly zero.
    pub fn are_settled(&self) -> bool {
        self.marbles.iter().all(|m| length(m.vel) == 0.0)
    }

    pub fn reset_rotations(&mut self) {
        for marble in &mut self.marbles {
            marble.rot = Quat::IDENTITY;
        }
    }

    pub fn reset_collided_flags(&mut self) {
        for marble in &mut self.marbles {
            marble.collided = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_and_mass_grow_together() {
        let mut kinds = MarbleKind::ALL.to_vec();
        kinds.sort_by(|a, b| a.radius().total_cmp(&b.radius()));
        for pair in kinds.windows(2) {
            assert!(pair[0].mass() < pair[1].mass());
        }
    }

    #[test]
    fn catalog_values_are_positive() {
        for kind in MarbleKind::ALL {
            assert!(kind.radius() > 0.0, "{} radius", kind.name());
            assert!(kind.mass() > 0.0, "{} mass", kind.name());
        }
    }

    #[test]
    fn empty_frame_is_settled() {
        assert!(Frame::default().are_settled());
    }

    #[test]
    fn moving_marble_is_not_settled() {
        let frame = Frame::new(vec![
            Marble::launched(MarbleKind::Marble, Vec2::new(10.0, 10.0), Vec2::ZERO, "a"),
            Marble::launched(MarbleKind::Marble, Vec2::new(90.0, 10.0), Vec2::new(0.0, 0.5), "a"),
        ]);
        assert!(!frame.are_settled());
    }

    #[test]
    fn reset_helpers_clear_transient_state() {
        let mut marble = Marble::launched(MarbleKind::SmallMarble, Vec2::ZERO, Vec2::ZERO, "a");
        marble.collided = true;
        marble.rot = Quat::from_axis_angle([0.0, 1.0, 0.0], 1.0);
        let mut frame = Frame::new(vec![marble]);
        frame.reset_rotations();
        frame.reset_collided_flags();
        assert_eq!(frame.marbles[0].rot, Quat::IDENTITY);
        assert!(!frame.marbles[0].collided);
    }
}
