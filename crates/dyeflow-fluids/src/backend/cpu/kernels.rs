use glam::{Vec2, Vec3, Vec4};

use crate::{
    backend::{boundary_mode, FragmentStage, UniformKind, UniformValue, VertexStage},
    obstacle::{circle::Circle, Obstacle},
};

use super::texture::Texture;

#[derive(Clone, Copy, Debug)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

const fn decl(name: &'static str, kind: UniformKind) -> UniformDecl {
    UniformDecl { name, kind }
}

const NEIGHBORHOOD_UNIFORMS: &[UniformDecl] = &[decl("u_texelSize", UniformKind::Vec2)];

/// Index of `u_texelSize` among the neighborhood vertex uniforms.
pub const VERTEX_TEXEL_SIZE: usize = 0;

pub fn vertex_uniforms(stage: VertexStage) -> &'static [UniformDecl] {
    match stage {
        VertexStage::Neighborhood => NEIGHBORHOOD_UNIFORMS,
        VertexStage::Position => &[],
    }
}

pub fn fragment_uniforms(stage: FragmentStage) -> &'static [UniformDecl] {
    match stage {
        FragmentStage::Clear => clear::UNIFORMS,
        FragmentStage::Splat => splat::UNIFORMS,
        FragmentStage::Curl => curl::UNIFORMS,
        FragmentStage::Vorticity => vorticity::UNIFORMS,
        FragmentStage::Divergence => divergence::UNIFORMS,
        FragmentStage::Pressure => pressure::UNIFORMS,
        FragmentStage::GradientSubtract => gradient_subtract::UNIFORMS,
        FragmentStage::Advection => advection::UNIFORMS,
        FragmentStage::Obstacle => obstacle::UNIFORMS,
        FragmentStage::Transfer => transfer::UNIFORMS,
    }
}

/// Interpolated inputs of one fragment.
#[derive(Clone, Copy, Debug)]
pub struct Fragment {
    pub p: Vec2,
    pub l: Vec2,
    pub r: Vec2,
    pub t: Vec2,
    pub b: Vec2,
}

impl Fragment {
    /// The fragment at the center of cell `(x, y)` of a `width`x`height` target.
    pub fn at(x: usize, y: usize, width: usize, height: usize, texel_size: Option<Vec2>) -> Self {
        let p = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );

        match texel_size {
            Some(ts) => Fragment {
                p,
                l: p - Vec2::new(ts.x, 0.0),
                r: p + Vec2::new(ts.x, 0.0),
                t: p + Vec2::new(0.0, ts.y),
                b: p - Vec2::new(0.0, ts.y),
            },
            None => Fragment { p, l: p, r: p, t: p, b: p },
        }
    }
}

/// Uniform values and texture units visible to a fragment stage while it runs.
pub struct ShadeContext<'a> {
    values: &'a [UniformValue],
    slots: &'a [usize],
    units: &'a [Option<&'a Texture>],
}

impl<'a> ShadeContext<'a> {
    pub fn new(values: &'a [UniformValue], slots: &'a [usize], units: &'a [Option<&'a Texture>]) -> Self {
        Self { values, slots, units }
    }

    #[inline]
    fn value(&self, slot: usize) -> UniformValue {
        self.values[self.slots[slot]]
    }

    #[inline]
    fn float(&self, slot: usize) -> f32 {
        match self.value(slot) {
            UniformValue::Float(v) => v,
            _ => 0.0,
        }
    }

    #[inline]
    fn int(&self, slot: usize) -> i32 {
        match self.value(slot) {
            UniformValue::Int(v) => v,
            _ => 0,
        }
    }

    #[inline]
    fn vec2(&self, slot: usize) -> Vec2 {
        match self.value(slot) {
            UniformValue::Vec2(v) => v,
            _ => Vec2::ZERO,
        }
    }

    #[inline]
    fn vec3(&self, slot: usize) -> Vec3 {
        match self.value(slot) {
            UniformValue::Vec3(v) => v,
            _ => Vec3::ZERO,
        }
    }

    #[inline]
    fn vec4(&self, slot: usize) -> Vec4 {
        match self.value(slot) {
            UniformValue::Vec4(v) => v,
            _ => Vec4::ZERO,
        }
    }

    /// Samples the texture bound to the unit held by a sampler slot. An empty unit reads as
    /// opaque black.
    #[inline]
    fn texture(&self, slot: usize, uv: Vec2) -> Vec4 {
        let unit = match self.value(slot) {
            UniformValue::Sampler(unit) => unit.0 as usize,
            _ => 0,
        };

        match self.units.get(unit).copied().flatten() {
            Some(texture) => texture.sample(uv),
            None => Vec4::W,
        }
    }
}

pub fn shade(stage: FragmentStage, ctx: &ShadeContext, f: &Fragment) -> Vec4 {
    match stage {
        FragmentStage::Clear => clear::shade(ctx, f),
        FragmentStage::Splat => splat::shade(ctx, f),
        FragmentStage::Curl => curl::shade(ctx, f),
        FragmentStage::Vorticity => vorticity::shade(ctx, f),
        FragmentStage::Divergence => divergence::shade(ctx, f),
        FragmentStage::Pressure => pressure::shade(ctx, f),
        FragmentStage::GradientSubtract => gradient_subtract::shade(ctx, f),
        FragmentStage::Advection => advection::shade(ctx, f),
        FragmentStage::Obstacle => obstacle::shade(ctx, f),
        FragmentStage::Transfer => transfer::shade(ctx, f),
    }
}

#[inline]
fn xy(v: Vec4) -> Vec2 {
    Vec2::new(v.x, v.y)
}

mod clear {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[decl("u_color", UniformKind::Vec4)];
    const COLOR: usize = 0;

    pub fn shade(ctx: &ShadeContext, _f: &Fragment) -> Vec4 {
        ctx.vec4(COLOR)
    }
}

mod splat {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_base", UniformKind::Sampler),
        decl("u_aspectRatio", UniformKind::Float),
        decl("u_color", UniformKind::Vec3),
        decl("u_point", UniformKind::Vec2),
        decl("u_radius", UniformKind::Float),
    ];
    const BASE: usize = 0;
    const ASPECT_RATIO: usize = 1;
    const COLOR: usize = 2;
    const POINT: usize = 3;
    const RADIUS: usize = 4;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let mut p = f.p - ctx.vec2(POINT);
        p.x *= ctx.float(ASPECT_RATIO);

        let splat = (-p.dot(p) / ctx.float(RADIUS)).exp() * ctx.vec3(COLOR);
        let base = ctx.texture(BASE, f.p).truncate();

        (base + splat).extend(1.0)
    }
}

mod curl {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[decl("u_velocity", UniformKind::Sampler)];
    const VELOCITY: usize = 0;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let l = ctx.texture(VELOCITY, f.l).y;
        let r = ctx.texture(VELOCITY, f.r).y;
        let t = ctx.texture(VELOCITY, f.t).x;
        let b = ctx.texture(VELOCITY, f.b).x;

        let vorticity = r - l - t + b;
        Vec4::new(0.5 * vorticity, 0.0, 0.0, 1.0)
    }
}

mod vorticity {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_velocity", UniformKind::Sampler),
        decl("u_curl", UniformKind::Sampler),
        decl("u_coef", UniformKind::Float),
        decl("u_dt", UniformKind::Float),
    ];
    const VELOCITY: usize = 0;
    const CURL: usize = 1;
    const COEF: usize = 2;
    const DT: usize = 3;

    const VELOCITY_LIMIT: f32 = 1000.0;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let l = ctx.texture(CURL, f.l).x;
        let r = ctx.texture(CURL, f.r).x;
        let t = ctx.texture(CURL, f.t).x;
        let b = ctx.texture(CURL, f.b).x;
        let c = ctx.texture(CURL, f.p).x;

        let mut force = 0.5 * Vec2::new(t.abs() - b.abs(), r.abs() - l.abs());
        force /= force.length() + 0.0001;
        force *= ctx.float(COEF) * c;
        force.y *= -1.0;

        let velocity = xy(ctx.texture(VELOCITY, f.p)) + force * ctx.float(DT);
        let velocity = velocity.clamp(Vec2::splat(-VELOCITY_LIMIT), Vec2::splat(VELOCITY_LIMIT));

        Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
    }
}

mod divergence {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[decl("u_velocity", UniformKind::Sampler)];
    const VELOCITY: usize = 0;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let mut l = ctx.texture(VELOCITY, f.l).x;
        let mut r = ctx.texture(VELOCITY, f.r).x;
        let mut t = ctx.texture(VELOCITY, f.t).y;
        let mut b = ctx.texture(VELOCITY, f.b).y;

        // Free-slip walls: the outside neighbor mirrors the normal component.
        let c = ctx.texture(VELOCITY, f.p);
        if f.l.x < 0.0 {
            l = -c.x;
        }
        if f.r.x > 1.0 {
            r = -c.x;
        }
        if f.t.y > 1.0 {
            t = -c.y;
        }
        if f.b.y < 0.0 {
            b = -c.y;
        }

        let div = 0.5 * (r - l + t - b);
        Vec4::new(div, 0.0, 0.0, 1.0)
    }
}

mod pressure {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_pressure", UniformKind::Sampler),
        decl("u_divergence", UniformKind::Sampler),
        decl("u_boundaryMode", UniformKind::Int),
        decl("u_boundaryValue", UniformKind::Float),
    ];
    const PRESSURE: usize = 0;
    const DIVERGENCE: usize = 1;
    const BOUNDARY_MODE: usize = 2;
    const BOUNDARY_VALUE: usize = 3;

    fn outside(uv: Vec2) -> bool {
        uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0
    }

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let fixed = ctx.int(BOUNDARY_MODE) == boundary_mode::FIXED;
        let boundary = ctx.float(BOUNDARY_VALUE);

        let neighbor = |uv: Vec2| {
            if fixed && outside(uv) {
                boundary
            } else {
                ctx.texture(PRESSURE, uv).x
            }
        };

        let l = neighbor(f.l);
        let r = neighbor(f.r);
        let t = neighbor(f.t);
        let b = neighbor(f.b);
        let divergence = ctx.texture(DIVERGENCE, f.p).x;

        let pressure = (l + r + b + t - divergence) * 0.25;
        Vec4::new(pressure, 0.0, 0.0, 1.0)
    }
}

mod gradient_subtract {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_pressure", UniformKind::Sampler),
        decl("u_velocity", UniformKind::Sampler),
    ];
    const PRESSURE: usize = 0;
    const VELOCITY: usize = 1;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let l = ctx.texture(PRESSURE, f.l).x;
        let r = ctx.texture(PRESSURE, f.r).x;
        let t = ctx.texture(PRESSURE, f.t).x;
        let b = ctx.texture(PRESSURE, f.b).x;

        let velocity = xy(ctx.texture(VELOCITY, f.p)) - 0.5 * Vec2::new(r - l, t - b);
        Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
    }
}

mod advection {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_velocity", UniformKind::Sampler),
        decl("u_source", UniformKind::Sampler),
        decl("u_texelSize", UniformKind::Vec2),
        decl("u_dt", UniformKind::Float),
        decl("u_dissipation", UniformKind::Float),
    ];
    const VELOCITY: usize = 0;
    const SOURCE: usize = 1;
    const TEXEL_SIZE: usize = 2;
    const DT: usize = 3;
    const DISSIPATION: usize = 4;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let dt = ctx.float(DT);
        let coord = f.p - dt * xy(ctx.texture(VELOCITY, f.p)) * ctx.vec2(TEXEL_SIZE);
        let result = ctx.texture(SOURCE, coord);

        let decay = 1.0 + ctx.float(DISSIPATION) * dt;
        result / decay
    }
}

mod obstacle {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[
        decl("u_source", UniformKind::Sampler),
        decl("u_center", UniformKind::Vec2),
        decl("u_radius", UniformKind::Float),
        decl("u_sentinel", UniformKind::Vec4),
    ];
    const SOURCE: usize = 0;
    const CENTER: usize = 1;
    const RADIUS: usize = 2;
    const SENTINEL: usize = 3;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        let circle = Circle::new(ctx.vec2(CENTER), ctx.float(RADIUS));

        if circle.contains(f.p) {
            ctx.vec4(SENTINEL)
        } else {
            ctx.texture(SOURCE, f.p)
        }
    }
}

mod transfer {
    use super::*;

    pub const UNIFORMS: &[UniformDecl] = &[decl("u_tex", UniformKind::Sampler)];
    const TEX: usize = 0;

    pub fn shade(ctx: &ShadeContext, f: &Fragment) -> Vec4 {
        ctx.texture(TEX, f.p)
    }
}
