//! The three interchangeable renderers and the selector choosing between them.

mod gpu;
mod shader;
mod software;
mod surface;

use anyhow::{anyhow, Result};
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;

use crate::error::{GeometryError, InitError};
use crate::params::{ChangeSet, Settings};
use crate::runtime::FrameTick;
use crate::types::BackendKind;

pub(crate) use gpu::GpuBackend;
pub(crate) use shader::ShaderBackend;
pub(crate) use software::{open_pixel_sink, PixelSink, SoftwareBackend};
pub(crate) use surface::CpuSurface;

/// What happened to one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    Presented,
    /// Surface was lost or outdated and has been reconfigured; draw again.
    Reconfigured,
    /// Surface timed out; the next frame retries.
    Skipped,
    /// The device is gone. The backend must be destroyed.
    DeviceLost,
}

/// Common contract of every renderer.
///
/// A backend owns all of its resources. The window loop hands it parameter
/// changes between frames and calls `destroy` exactly once, after the frame
/// chain that drives it has been cancelled.
pub(crate) trait RenderBackend {
    fn kind(&self) -> BackendKind;

    fn resize(&mut self, size: PhysicalSize<u32>);

    /// Applies the parameter groups in `changes`, reading values from
    /// `settings`.
    fn apply(&mut self, changes: ChangeSet, settings: &Settings);

    fn render(&mut self, tick: &FrameTick) -> Result<FrameOutcome>;

    fn destroy(self: Box<Self>);
}

/// Turns a presentation result into a frame outcome, reconfiguring the
/// surface when it went stale.
pub(crate) fn classify_surface_result(
    result: Result<(), wgpu::SurfaceError>,
    reconfigure: impl FnOnce(),
) -> Result<FrameOutcome> {
    match result {
        Ok(()) => Ok(FrameOutcome::Presented),
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            reconfigure();
            Ok(FrameOutcome::Reconfigured)
        }
        Err(wgpu::SurfaceError::Timeout) => {
            warn!("surface timeout; retrying next frame");
            Ok(FrameOutcome::Skipped)
        }
        Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("surface out of memory")),
        Err(wgpu::SurfaceError::Other) => Err(anyhow!("surface reported an unknown error")),
    }
}

/// Why one backend could not start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl StartError {
    pub fn user_message(&self) -> String {
        match self {
            StartError::Init(err) => format!("{} ({})", err.user_message(), err.fallback_hint()),
            StartError::Geometry(err) => err.to_string(),
        }
    }
}

/// No backend in the fallback chain could start.
#[derive(Debug, Error)]
#[error("no rendering backend could be started (tried {})", describe_attempts(.attempts))]
pub struct SelectionError {
    pub attempts: Vec<(BackendKind, StartError)>,
}

fn describe_attempts(attempts: &[(BackendKind, StartError)]) -> String {
    attempts
        .iter()
        .map(|(kind, err)| format!("{kind}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builds a backend of a requested kind.
pub(crate) trait BackendFactory {
    fn create(&mut self, kind: BackendKind) -> Result<Box<dyn RenderBackend>, StartError>;
}

/// Outcome of a successful selection.
pub(crate) struct Selection {
    pub backend: Box<dyn RenderBackend>,
    /// Backends tried before the one that started, with their errors.
    pub downgrades: Vec<(BackendKind, StartError)>,
}

/// The preferred backend followed by every lesser tier, best first.
pub(crate) fn fallback_chain(preference: BackendKind) -> Vec<BackendKind> {
    let mut chain = vec![preference];
    chain.extend(
        BackendKind::ALL
            .into_iter()
            .rev()
            .filter(|kind| *kind < preference),
    );
    chain
}

/// Starts the preferred backend, walking down the tiers on failure when
/// `allow_fallback` is set.
pub(crate) fn select_backend(
    factory: &mut dyn BackendFactory,
    preference: BackendKind,
    allow_fallback: bool,
) -> Result<Selection, SelectionError> {
    let chain = if allow_fallback {
        fallback_chain(preference)
    } else {
        vec![preference]
    };

    let mut attempts = Vec::new();
    for kind in chain {
        match factory.create(kind) {
            Ok(backend) => {
                if attempts.is_empty() {
                    info!(backend = %kind, "rendering backend started");
                } else {
                    warn!(
                        preferred = %preference,
                        backend = %kind,
                        downgrades = attempts.len(),
                        "fell back to a lesser rendering backend"
                    );
                }
                return Ok(Selection {
                    backend,
                    downgrades: attempts,
                });
            }
            Err(err) => {
                debug!(backend = %kind, error = %err, "rendering backend failed to start");
                attempts.push((kind, err));
            }
        }
    }

    Err(SelectionError { attempts })
}
