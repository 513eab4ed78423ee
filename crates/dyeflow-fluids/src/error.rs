use thiserror::Error;

use crate::backend::{FieldId, TextureId};

/// Errors raised by a [`Backend`](crate::backend::Backend) or by the simulation driving it.
///
/// None of these are transient: each one means a field or program is unusable and the
/// simulation state after the failing pass is undefined.
#[derive(Debug, Error)]
pub enum FluidError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    IncompleteTarget(#[from] IncompleteTargetError),
    #[error("texture {texture:?} is sampled by the bound program while attached to the target {field:?}")]
    FeedbackLoop {
        texture: TextureId,
        field: FieldId,
    },
    #[error("texture unit {unit} is out of range (backend has {available} units)")]
    TextureUnit {
        unit: u32,
        available: u32,
    },
    #[error("expected data of shape {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

#[derive(Debug, Error)]
#[error("cannot allocate a {width}x{height} field: {reason}")]
pub struct AllocationError {
    pub width: u32,
    pub height: u32,
    pub reason: String,
}

#[derive(Debug, Error)]
#[error("program `{program}` failed to build: {log}")]
pub struct CompileError {
    /// Label of the program that failed.
    pub program: String,
    /// Diagnostic reported by the backend.
    pub log: String,
}

#[derive(Debug, Error)]
#[error("render target {field:?} is incomplete: {reason}")]
pub struct IncompleteTargetError {
    pub field: FieldId,
    pub reason: String,
}
