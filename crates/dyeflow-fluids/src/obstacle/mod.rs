use glam::Vec2;

pub mod circle;

/// A static solid region inside the simulation domain.
pub trait Obstacle {
    /// Signed distance from `p` (normalized grid coordinates) to the obstacle surface, negative
    /// inside.
    fn distance(&self, p: Vec2) -> f32;

    #[inline]
    fn contains(&self, p: Vec2) -> bool {
        self.distance(p) <= 0.0
    }
}
