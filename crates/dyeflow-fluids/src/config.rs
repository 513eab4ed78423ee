use std::{fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the pressure relaxation treats neighbors outside the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureBoundary {
    /// Outside neighbors read the nearest edge cell.
    #[default]
    Edge,
    /// Outside neighbors read a constant pressure.
    Fixed,
}

/// Parameters read by every stage of a simulation step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SimConfig {
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Number of Jacobi pressure iterations per step.
    pub iterations: u32,
    /// Scale of the pointer impulse.
    pub force: f32,
    pub velocity_dissipation: f32,
    pub dye_dissipation: f32,
    /// Scale of the dye color added by a splat.
    pub density: f32,
    /// Initial pressure guess written before relaxation.
    pub pressure: f32,
    /// Splat radius, divided by 100 before use.
    pub radius: f32,
    /// Only apply an impulse when the pointer actually moved this frame.
    pub stop_on_halt: bool,
    /// Enforce the static obstacle at the center of the grid.
    pub obstacle: bool,
    pub pressure_boundary: PressureBoundary,
    /// Outside pressure for [`PressureBoundary::Fixed`].
    pub pressure_boundary_value: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            curl: 20.0,
            iterations: 10,
            force: 6000.0,
            velocity_dissipation: 0.2,
            dye_dissipation: 0.5,
            density: 0.1,
            pressure: 1.8,
            radius: 0.2,
            stop_on_halt: false,
            obstacle: false,
            pressure_boundary: PressureBoundary::Edge,
            pressure_boundary_value: 0.0,
        }
    }
}

impl SimConfig {
    /// Merges the fields present in `overrides`; absent fields keep their value.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        merge("CURL", &mut self.curl, overrides.curl);
        merge("ITERATIONS", &mut self.iterations, overrides.iterations);
        merge("FORCE", &mut self.force, overrides.force);
        merge("VELOCITY_DISSIPATION", &mut self.velocity_dissipation, overrides.velocity_dissipation);
        merge("DYE_DISSIPATION", &mut self.dye_dissipation, overrides.dye_dissipation);
        merge("DENSITY", &mut self.density, overrides.density);
        merge("PRESSURE", &mut self.pressure, overrides.pressure);
        merge("RADIUS", &mut self.radius, overrides.radius);
        merge("STOP_ON_HALT", &mut self.stop_on_halt, overrides.stop_on_halt);
        merge("OBSTACLE", &mut self.obstacle, overrides.obstacle);
        merge("PRESSURE_BOUNDARY", &mut self.pressure_boundary, overrides.pressure_boundary);
        merge("PRESSURE_BOUNDARY_VALUE", &mut self.pressure_boundary_value, overrides.pressure_boundary_value);
    }
}

fn merge<T: Copy + std::fmt::Debug>(key: &str, slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        debug!("config {key} = {value:?}");
        *slot = value;
    }
}

/// A partial [`SimConfig`]. Keys are the upper-case field names, e.g. `CURL` or `STOP_ON_HALT`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct ConfigOverrides {
    pub curl: Option<f32>,
    pub iterations: Option<u32>,
    pub force: Option<f32>,
    pub velocity_dissipation: Option<f32>,
    pub dye_dissipation: Option<f32>,
    pub density: Option<f32>,
    pub pressure: Option<f32>,
    pub radius: Option<f32>,
    pub stop_on_halt: Option<bool>,
    pub obstacle: Option<bool>,
    pub pressure_boundary: Option<PressureBoundary>,
    pub pressure_boundary_value: Option<f32>,
}

impl ConfigOverrides {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overrides: Self = serde_json::from_str(json)?;
        overrides.validate()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parses a single `KEY=VALUE` assignment. The value is read as JSON, falling back to a
    /// string, so `PRESSURE_BOUNDARY=fixed` and `CURL=30` both work.
    pub fn parse_assignment(assignment: &str) -> Result<Self, ConfigError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::Assignment(assignment.to_owned()))?;

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(ConfigError::Assignment(assignment.to_owned()));
        }

        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));

        let mut object = serde_json::Map::new();
        object.insert(key.to_uppercase(), value);

        let overrides: Self = serde_json::from_value(serde_json::Value::Object(object))?;
        overrides.validate()
    }

    /// Rejects values no simulation can run with, e.g. a non-positive `RADIUS`.
    fn validate(self) -> Result<Self, ConfigError> {
        if let Some(radius) = self.radius {
            if radius.is_nan() || radius <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: "RADIUS",
                    value: radius.to_string(),
                    reason: "must be positive",
                });
            }
        }

        Ok(self)
    }

    /// Overlays `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: ConfigOverrides) {
        self.curl = other.curl.or(self.curl);
        self.iterations = other.iterations.or(self.iterations);
        self.force = other.force.or(self.force);
        self.velocity_dissipation = other.velocity_dissipation.or(self.velocity_dissipation);
        self.dye_dissipation = other.dye_dissipation.or(self.dye_dissipation);
        self.density = other.density.or(self.density);
        self.pressure = other.pressure.or(self.pressure);
        self.radius = other.radius.or(self.radius);
        self.stop_on_halt = other.stop_on_halt.or(self.stop_on_halt);
        self.obstacle = other.obstacle.or(self.obstacle);
        self.pressure_boundary = other.pressure_boundary.or(self.pressure_boundary);
        self.pressure_boundary_value = other.pressure_boundary_value.or(self.pressure_boundary_value);
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected KEY=VALUE, got `{0}`")]
    Assignment(String),
    #[error("invalid {key} = {value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
