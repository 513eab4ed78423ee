use glam::Vec2;

use super::Obstacle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub position: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(pos: Vec2, radius: f32) -> Self {
        Circle {
            position: pos,
            radius,
        }
    }

    /// The obstacle the simulation places at the center of the domain.
    pub fn centered() -> Self {
        Circle::new(Vec2::splat(0.5), 0.1)
    }
}

impl Obstacle for Circle {
    fn distance(&self, p: Vec2) -> f32 {
        (p - self.position).length() - self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_is_negative() {
        let circle = Circle::centered();

        assert!(circle.contains(Vec2::splat(0.5)));
        assert!(circle.contains(Vec2::new(0.55, 0.5)));
        assert!(!circle.contains(Vec2::new(0.7, 0.5)));
        assert!((circle.distance(Vec2::new(0.8, 0.5)) - 0.2).abs() < 1e-6);
        assert!((circle.distance(Vec2::splat(0.5)) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn boundary_counts_as_inside() {
        let circle = Circle::new(Vec2::ZERO, 1.0);

        assert!(circle.contains(Vec2::new(0.0, 1.0)));
        assert!(!circle.contains(Vec2::new(0.0, 1.001)));
    }
}
