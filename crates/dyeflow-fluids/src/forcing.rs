use glam::{Vec2, Vec3};
use log::trace;
use rand::Rng;

use crate::{backend::Backend, config::SimConfig, error::FluidError, stable::fluid_2d::StableFluid2D};

/// Pointer state fed by the host, in viewport pixels with `y` pointing down.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pointer {
    previous: Vec2,
    current: Vec2,
    down: bool,
    moved: bool,
    /// Whether `current` holds a position from the ongoing drag.
    tracking: bool,
}

impl Pointer {
    pub fn press(&mut self) {
        self.down = true;
        self.tracking = false;
    }

    /// Records a pointer move. Moves are ignored unless the pointer is down, and the first move
    /// of a drag has a zero delta.
    pub fn move_to(&mut self, x: f32, y: f32) {
        if !self.down {
            return;
        }

        let position = Vec2::new(x, y);
        self.previous = if self.tracking { self.current } else { position };
        self.current = position;
        self.tracking = true;
        self.moved = true;
    }

    pub fn release(&mut self) {
        self.down = false;
        self.moved = false;
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.current
    }

    #[inline]
    pub fn delta(&self) -> Vec2 {
        self.current - self.previous
    }

    #[inline]
    pub fn is_down(&self) -> bool {
        self.down
    }

    #[inline]
    pub fn moved(&self) -> bool {
        self.moved
    }
}

/// The pixel area pointer coordinates are measured in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    /// Maps a pixel position to normalized grid coordinates, flipping `y` up.
    #[inline]
    pub fn normalize(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x / self.width, 1.0 - p.y / self.height)
    }
}

/// Turns the pointer drag into a velocity impulse and a dye splat of a random color.
///
/// With `stop_on_halt` the drag is consumed; otherwise the last impulse repeats every frame until
/// the pointer is released.
pub fn apply_forcing<B: Backend, R: Rng + ?Sized>(
    fluid: &mut StableFluid2D,
    backend: &mut B,
    pointer: &mut Pointer,
    viewport: Viewport,
    config: &SimConfig,
    rng: &mut R,
) -> Result<(), FluidError> {
    if !pointer.moved {
        return Ok(());
    }

    if config.stop_on_halt {
        pointer.moved = false;
    }

    let delta = pointer.delta();
    let point = viewport.normalize(pointer.position());
    let aspect_ratio = viewport.aspect_ratio();
    let radius = config.radius / 100.0;

    let impulse = Vec2::new(
        config.force * delta.x / viewport.width,
        -config.force * delta.y / viewport.height,
    );
    trace!("splat at {point} with impulse {impulse}");
    fluid.splat_velocity(backend, point, impulse, aspect_ratio, radius)?;

    let color = random_color(rng) * config.density;
    fluid.splat_dye(backend, point, color, aspect_ratio, radius)
}

/// A fully saturated color of random hue.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match sector as u32 % 6 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}
