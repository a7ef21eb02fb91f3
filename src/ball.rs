// Bouncing ball - demo state producer
//
// Integrates one ball inside the [-1, 1] clip square and hands out its
// instance record once per cycle.

use crate::config::BallConfig;
use crate::geometry::InstanceRecord;
use glam::Vec2;

pub struct BouncingBall {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    gravity: f32,
}

impl BouncingBall {
    pub fn new(config: &BallConfig) -> Self {
        Self {
            position: Vec2::new(config.x, config.y),
            velocity: Vec2::new(config.vx, config.vy),
            radius: config.radius,
            gravity: config.gravity,
        }
    }

    pub fn record(&self) -> InstanceRecord {
        InstanceRecord::new(self.position.x, self.position.y, self.radius)
    }

    /// Advance by `dt` seconds.
    ///
    /// Positive `vy` moves the ball towards -y (Vulkan clip space points y
    /// down, so this is "up" on screen) and gravity pulls `vy` back.
    pub fn update(&mut self, dt: f32) {
        self.position.x += self.velocity.x * dt;
        self.position.y -= self.velocity.y * dt;
        self.velocity.y -= self.gravity * dt;

        let limit = 1.0 - self.radius;
        if self.position.x > limit {
            self.velocity.x = -self.velocity.x;
            self.position.x = limit;
        }
        if self.position.x < -limit {
            self.velocity.x = -self.velocity.x;
            self.position.x = -limit;
        }
        if self.position.y > limit {
            self.velocity.y = -self.velocity.y;
            self.position.y = limit;
        }
        if self.position.y < -limit {
            self.velocity.y = -self.velocity.y;
            self.position.y = -limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(x: f32, y: f32, vx: f32, vy: f32) -> BouncingBall {
        BouncingBall::new(&BallConfig {
            x,
            y,
            vx,
            vy,
            radius: 0.2,
            gravity: 0.5,
        })
    }

    #[test]
    fn record_reflects_state() {
        let b = ball(0.25, -0.5, 0.0, 0.0);
        assert_eq!(b.record(), InstanceRecord::new(0.25, -0.5, 0.2));
    }

    #[test]
    fn free_flight_integrates_velocity_and_gravity() {
        let mut b = ball(0.0, 0.0, 0.1, 0.2);
        b.update(0.5);
        let r = b.record();
        assert!((r.x - 0.05).abs() < 1e-6);
        assert!((r.y + 0.1).abs() < 1e-6);
        assert!((b.velocity.y - (0.2 - 0.25)).abs() < 1e-6);
    }

    #[test]
    fn wall_hit_clamps_and_reflects() {
        let mut b = ball(0.79, 0.0, 1.0, 0.0);
        b.update(0.1);
        assert_eq!(b.record().x, 0.8);
        assert!(b.velocity.x < 0.0);

        let mut b = ball(0.0, -0.79, 0.0, 1.0);
        b.update(0.1);
        assert_eq!(b.record().y, -0.8);
        assert!(b.velocity.y < 0.0);
    }

    #[test]
    fn ball_stays_inside_clip_square() {
        let mut b = ball(0.0, 0.0, 0.7, 0.9);
        for _ in 0..10_000 {
            b.update(1.0 / 60.0);
            let r = b.record();
            assert!(r.x.abs() <= 1.0 - r.radius + 1e-6);
            assert!(r.y.abs() <= 1.0 - r.radius + 1e-6);
        }
    }
}
