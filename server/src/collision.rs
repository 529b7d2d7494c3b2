//! Per-sub-step contact resolution: rolling rotation, marble pairs, walls.

use marble_shared::quat::rolling_rotation;
use marble_shared::vec2::{add, distance, dot, normalize, perp, scale, sub};

use crate::marble::{Frame, Marble};

/// Extra push applied to each marble of an overlapping pair, so the pair is
/// no longer touching when later pairs in the same pass are checked.
pub const SEPARATION_EPSILON: f64 = 1.0;

/// Run one sub-step of contact resolution in the fixed order:
/// rotation, marble/marble, marble/wall.
pub fn handle_collisions(frame: &mut Frame, width: f64, height: f64) {
    accumulate_rotations(frame);
    frame.reset_collided_flags();
    resolve_marble_collisions(frame);
    resolve_wall_collisions(frame, width, height);
}

/// Compose each marble's rotation with the roll it picked up this sub-step.
/// Cosmetic only.
pub fn accumulate_rotations(frame: &mut Frame) {
    for marble in &mut frame.marbles {
        let roll = rolling_rotation(marble.vel.x, marble.vel.y, marble.radius());
        marble.rot = marble.rot.mul(roll);
    }
}

/// Check every unordered pair once, in index order. Later pairs see the
/// positions already displaced by earlier ones.
pub fn resolve_marble_collisions(frame: &mut Frame) {
    let n = frame.marbles.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (head, tail) = frame.marbles.split_at_mut(j);
            resolve_pair(&mut head[i], &mut tail[0]);
        }
    }
}

/// Separate and bounce two marbles if they overlap. Returns whether they did.
pub fn resolve_pair(a: &mut Marble, b: &mut Marble) -> bool {
    let centers = distance(a.pos, b.pos);
    let min_distance = a.radius() + b.radius();
    if centers >= min_distance {
        return false;
    }

    a.collided = true;
    b.collided = true;

    let overlap = min_distance - centers;
    let normal = normalize(sub(a.pos, b.pos));
    let push = scale(normal, overlap / 2.0 + SEPARATION_EPSILON);
    a.pos = add(a.pos, push);
    b.pos = sub(b.pos, push);

    let (m1, m2) = (a.mass(), b.mass());
    let tangent = perp(normal);

    let v1n = dot(normal, a.vel);
    let v1t = dot(tangent, a.vel);
    let v2n = dot(normal, b.vel);
    let v2t = dot(tangent, b.vel);

    // 1D elastic collision along the normal; tangential parts are untouched
    let v1n_after = (v1n * (m1 - m2) + 2.0 * m2 * v2n) / (m1 + m2);
    let v2n_after = (v2n * (m2 - m1) + 2.0 * m1 * v1n) / (m1 + m2);

    a.vel = add(scale(normal, v1n_after), scale(tangent, v1t));
    b.vel = add(scale(normal, v2n_after), scale(tangent, v2t));
    true
}

/// Keep marbles inside [0, width] x [0, height]. Each border is checked on
/// its own, so a marble can bounce off two walls in a corner.
pub fn resolve_wall_collisions(frame: &mut Frame, width: f64, height: f64) {
    for marble in &mut frame.marbles {
        let r = marble.radius();
        if marble.pos.x - r < 0.0 {
            marble.pos.x = r;
            marble.vel.x = -marble.vel.x;
        }
        if marble.pos.x + r > width {
            marble.pos.x = width - r;
            marble.vel.x = -marble.vel.x;
        }
        if marble.pos.y - r < 0.0 {
            marble.pos.y = r;
            marble.vel.y = -marble.vel.y;
        }
        if marble.pos.y + r > height {
            marble.pos.y = height - r;
            marble.vel.y = -marble.vel.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marble::MarbleKind;
    use marble_shared::quat::Quat;
    use marble_shared::vec2::{length, Vec2};

    fn marble(kind: MarbleKind, x: f64, y: f64, vx: f64, vy: f64) -> Marble {
        Marble::launched(kind, Vec2::new(x, y), Vec2::new(vx, vy), "owner")
    }

    fn momentum(a: &Marble, b: &Marble) -> Vec2 {
        add(scale(a.vel, a.mass()), scale(b.vel, b.mass()))
    }

    #[test]
    fn head_on_collision_conserves_momentum() {
        // Far from any wall so only the pair response matters
        let mut a = marble(MarbleKind::Marble, 1000.0, 1000.0, 50.0, 0.0);
        let mut b = marble(MarbleKind::BigMarble, 1075.0, 1000.0, -20.0, 0.0);
        let before = momentum(&a, &b);

        assert!(resolve_pair(&mut a, &mut b));

        let after = momentum(&a, &b);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn equal_masses_exchange_normal_velocity() {
        let mut a = marble(MarbleKind::Marble, 100.0, 100.0, 40.0, 0.0);
        let mut b = marble(MarbleKind::Marble, 150.0, 100.0, 0.0, 0.0);
        resolve_pair(&mut a, &mut b);
        assert!(a.vel.x.abs() < 1e-9);
        assert!((b.vel.x - 40.0).abs() < 1e-9);
    }

    #[test]
    fn glancing_collision_keeps_tangential_component() {
        // Normal along x, so the y velocity is purely tangential
        let mut a = marble(MarbleKind::Marble, 100.0, 100.0, 10.0, 7.0);
        let mut b = marble(MarbleKind::Marble, 155.0, 100.0, 0.0, -3.0);
        resolve_pair(&mut a, &mut b);
        assert!((a.vel.y - 7.0).abs() < 1e-9);
        assert!((b.vel.y + 3.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_is_pushed_apart_past_contact() {
        let mut a = marble(MarbleKind::Marble, 100.0, 100.0, 0.0, 0.0);
        let mut b = marble(MarbleKind::Marble, 140.0, 100.0, 0.0, 0.0);
        resolve_pair(&mut a, &mut b);
        let gap = distance(a.pos, b.pos);
        assert!((gap - (60.0 + 2.0 * SEPARATION_EPSILON)).abs() < 1e-9);
        assert!(a.collided && b.collided);
    }

    #[test]
    fn separated_marbles_are_untouched() {
        let mut a = marble(MarbleKind::Marble, 100.0, 100.0, 5.0, 0.0);
        let mut b = marble(MarbleKind::Marble, 161.0, 100.0, 0.0, 0.0);
        let (a0, b0) = (a.clone(), b.clone());
        assert!(!resolve_pair(&mut a, &mut b));
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn coincident_centers_still_separate() {
        let mut a = marble(MarbleKind::SmallMarble, 200.0, 200.0, 0.0, 0.0);
        let mut b = marble(MarbleKind::SmallMarble, 200.0, 200.0, 0.0, 0.0);
        resolve_pair(&mut a, &mut b);
        assert!(distance(a.pos, b.pos) > 30.0);
        assert!(a.pos.x.is_finite() && b.pos.x.is_finite());
    }

    #[test]
    fn wall_bounce_clamps_edge_and_reflects() {
        let mut frame = Frame::new(vec![marble(MarbleKind::Marble, 10.0, 200.0, -25.0, 4.0)]);
        resolve_wall_collisions(&mut frame, 600.0, 480.0);
        let m = &frame.marbles[0];
        assert_eq!(m.pos.x, 30.0);
        assert_eq!(m.vel.x, 25.0);
        assert_eq!(m.vel.y, 4.0);
    }

    #[test]
    fn corner_bounces_off_both_walls() {
        let mut frame = Frame::new(vec![marble(MarbleKind::BigMarble, 590.0, 470.0, 10.0, 12.0)]);
        resolve_wall_collisions(&mut frame, 600.0, 480.0);
        let m = &frame.marbles[0];
        assert_eq!(m.pos, Vec2::new(550.0, 430.0));
        assert_eq!(m.vel, Vec2::new(-10.0, -12.0));
    }

    #[test]
    fn rotation_accumulates_only_while_moving() {
        let mut frame = Frame::new(vec![
            marble(MarbleKind::Marble, 100.0, 100.0, 30.0, 0.0),
            marble(MarbleKind::Marble, 400.0, 100.0, 0.0, 0.0),
        ]);
        accumulate_rotations(&mut frame);
        assert_ne!(frame.marbles[0].rot, Quat::IDENTITY);
        assert_eq!(frame.marbles[1].rot, Quat::IDENTITY);
    }

    #[test]
    fn handle_collisions_clears_stale_flags() {
        let mut m = marble(MarbleKind::Marble, 100.0, 100.0, 0.0, 0.0);
        m.collided = true;
        let mut frame = Frame::new(vec![m]);
        handle_collisions(&mut frame, 600.0, 480.0);
        assert!(!frame.marbles[0].collided);
        assert_eq!(length(frame.marbles[0].vel), 0.0);
    }
}
