use anyhow::Result;
use tracing::trace;
use winit::dpi::PhysicalSize;

use crate::gpu::GpuRenderer;
use crate::params::{ChangeSet, ParamGroup, Settings};
use crate::runtime::FrameTick;
use crate::types::BackendKind;

use super::{classify_surface_result, FrameOutcome, RenderBackend};

/// Uniform buffers a change set requires rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniformWrite {
    Transform,
    Noise,
    Color,
    Clamp,
}

fn planned_writes(changes: ChangeSet) -> Vec<UniformWrite> {
    [
        (ParamGroup::Transform, UniformWrite::Transform),
        (ParamGroup::Noise, UniformWrite::Noise),
        (ParamGroup::Color, UniformWrite::Color),
        (ParamGroup::Clamp, UniformWrite::Clamp),
    ]
    .into_iter()
    .filter(|(group, _)| changes.contains(*group))
    .map(|(_, write)| write)
    .collect()
}

/// GPU-accelerated backend: WGSL program with one buffer per parameter
/// group and a fixed per-frame time step.
pub(crate) struct GpuBackend {
    renderer: GpuRenderer,
}

impl GpuBackend {
    pub fn new(renderer: GpuRenderer) -> Self {
        Self { renderer }
    }
}

impl RenderBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GpuAccelerated
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.renderer.resize(size);
    }

    fn apply(&mut self, changes: ChangeSet, settings: &Settings) {
        for write in planned_writes(changes) {
            trace!(?write, "rewriting uniform buffer");
            match write {
                UniformWrite::Transform => self
                    .renderer
                    .update_model_view_projection_settings(&settings.transform),
                UniformWrite::Noise => self.renderer.update_noise_settings(&settings.noise),
                UniformWrite::Color => self.renderer.update_color_settings(&settings.color),
                UniformWrite::Clamp => self.renderer.update_clamp_settings(settings.clamp),
            }
        }
    }

    fn render(&mut self, tick: &FrameTick) -> Result<FrameOutcome> {
        if self.renderer.is_device_lost() {
            return Ok(FrameOutcome::DeviceLost);
        }
        let result = self.renderer.render(tick.step_time);
        trace!(time = tick.step_time, "gpu frame");
        let renderer = &mut self.renderer;
        classify_surface_result(result, || renderer.reconfigure())
    }

    fn destroy(self: Box<Self>) {
        self.renderer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_edit_never_rewrites_transform() {
        let changes: ChangeSet = [ParamGroup::Noise].into_iter().collect();
        assert_eq!(planned_writes(changes), vec![UniformWrite::Noise]);
    }

    #[test]
    fn status_and_backend_need_no_uniform_writes() {
        let changes: ChangeSet = [ParamGroup::Status, ParamGroup::Backend]
            .into_iter()
            .collect();
        assert!(planned_writes(changes).is_empty());
    }

    #[test]
    fn full_refresh_rewrites_every_buffer_once() {
        assert_eq!(
            planned_writes(ChangeSet::all()),
            vec![
                UniformWrite::Transform,
                UniformWrite::Noise,
                UniformWrite::Color,
                UniformWrite::Clamp,
            ]
        );
    }
}
