//! GPU device and pipeline management.
//!
//! - `context` negotiates instance, adapter, device and surface in three
//!   ordered stages, each failing with its own [`InitError`](crate::InitError).
//! - `uniforms` holds the byte-exact uniform layouts.
//! - `pipeline` builds the noise, scene and blit pipelines.
//! - `state` carries the typed phases: a [`DeviceReady`] is consumed to build
//!   exactly one pipeline, which then only accepts targeted buffer updates.
//! - `scene` and `present` are the other two consumers of a ready device:
//!   the GLSL scene program and the software frame presenter.

mod context;
#[cfg(test)]
mod offscreen;
mod pipeline;
mod present;
mod scene;
mod state;
mod uniforms;

pub(crate) use present::FramePresenter;
pub(crate) use scene::SceneRenderer;
pub(crate) use state::{DeviceReady, GpuRenderer};

#[cfg(test)]
pub(crate) use context::{acquire, AcquireStages};
#[cfg(test)]
pub(crate) use offscreen::Offscreen;
