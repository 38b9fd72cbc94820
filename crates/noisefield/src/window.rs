use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::{
    open_pixel_sink, select_backend, BackendFactory, CpuSurface, FrameOutcome, GpuBackend,
    PixelSink, RenderBackend, ShaderBackend, SoftwareBackend, StartError,
};
use crate::gpu::DeviceReady;
use crate::params::{ChangeSet, ParamChange, ParamGroup, ParameterBus, Settings, NOISE_RANGES};
use crate::runtime::{FrameClock, FrameScheduler};
use crate::types::{BackendKind, RendererConfig};

/// Frame cap for the CPU rasteriser unless the user picked one.
const SOFTWARE_FPS_CAP: f32 = 30.0;

/// Parameter edits reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    TogglePause,
    SwapColors,
    ToggleClamp,
    SwitchBackend(BackendKind),
    Octaves(i32),
    Frequency(i32),
    Quit,
}

impl KeyAction {
    fn repeats(self) -> bool {
        matches!(self, KeyAction::Octaves(_) | KeyAction::Frequency(_))
    }
}

pub(crate) fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Space) => Some(KeyAction::TogglePause),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::Octaves(1)),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::Octaves(-1)),
        Key::Named(NamedKey::ArrowRight) => Some(KeyAction::Frequency(1)),
        Key::Named(NamedKey::ArrowLeft) => Some(KeyAction::Frequency(-1)),
        Key::Character(value) => match value.as_str() {
            " " => Some(KeyAction::TogglePause),
            "s" | "S" => Some(KeyAction::SwapColors),
            "c" | "C" => Some(KeyAction::ToggleClamp),
            "1" => Some(KeyAction::SwitchBackend(BackendKind::Software)),
            "2" => Some(KeyAction::SwitchBackend(BackendKind::IntermediateShader)),
            "3" => Some(KeyAction::SwitchBackend(BackendKind::GpuAccelerated)),
            _ => None,
        },
        _ => None,
    }
}

/// Writes `action` to the bus. Returns `false` when the action ends the loop.
pub(crate) fn apply_key_action(bus: &mut ParameterBus, action: KeyAction) -> bool {
    match action {
        KeyAction::TogglePause => {
            bus.toggle_pause();
        }
        KeyAction::SwapColors => bus.swap_colors(),
        KeyAction::ToggleClamp => {
            let clamp = !bus.clamp();
            bus.set_clamp(clamp);
        }
        KeyAction::SwitchBackend(kind) => bus.set_backend(kind),
        KeyAction::Octaves(steps) => bus.update_noise(|noise| {
            let octaves = NOISE_RANGES
                .octaves
                .clamp(f64::from(noise.octaves) + f64::from(steps));
            noise.octaves = octaves as u32;
        }),
        KeyAction::Frequency(steps) => bus.update_noise(|noise| {
            noise.freq = NOISE_RANGES.freq.nudge(noise.freq, steps);
        }),
        KeyAction::Quit => return false,
    }
    true
}

/// Builds backends drawing into the preview window.
struct WindowFactory<'a> {
    window: &'a Arc<Window>,
    settings: &'a Settings,
    pixel_scale: f32,
}

impl BackendFactory for WindowFactory<'_> {
    fn create(&mut self, kind: BackendKind) -> Result<Box<dyn RenderBackend>, StartError> {
        let size = self.window.inner_size();
        let backend: Box<dyn RenderBackend> = match kind {
            BackendKind::Software => {
                let sink = open_pixel_sink(
                    || CpuSurface::new(self.window.clone()).map(boxed_sink),
                    || {
                        DeviceReady::acquire_for_presentation(self.window.as_ref(), size)
                            .map(|device| boxed_sink(device.build_presenter()))
                    },
                )?;
                Box::new(SoftwareBackend::new(sink, self.settings, self.pixel_scale))
            }
            BackendKind::IntermediateShader => {
                let device = DeviceReady::acquire(self.window.as_ref(), size)?;
                debug!(adapter = %device.adapter_profile().name, "building shader backend");
                Box::new(ShaderBackend::new(device, size, self.settings)?)
            }
            BackendKind::GpuAccelerated => {
                let device = DeviceReady::acquire(self.window.as_ref(), size)?;
                Box::new(GpuBackend::new(device.build_pipeline(self.settings)))
            }
        };
        Ok(backend)
    }
}

fn boxed_sink(sink: impl PixelSink + 'static) -> Box<dyn PixelSink> {
    Box::new(sink)
}

/// Everything the preview loop owns. `backend` is declared before `window`
/// so its surface is released first.
struct WindowState {
    backend: Option<Box<dyn RenderBackend>>,
    window: Arc<Window>,
    bus: ParameterBus,
    changes: Receiver<ParamChange>,
    scheduler: FrameScheduler,
    clock: FrameClock,
    allow_fallback: bool,
    pixel_scale: f32,
    target_fps: Option<f32>,
    title: String,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let mut bus = ParameterBus::new(config.settings.clone());
        let size = window.inner_size();
        bus.set_resolution(size.width, size.height);
        let changes = bus.subscribe();
        let clock = FrameClock::new(bus.status());

        let mut state = Self {
            backend: None,
            window,
            bus,
            changes,
            scheduler: FrameScheduler::new(config.target_fps),
            clock,
            allow_fallback: config.allow_fallback,
            pixel_scale: config.pixel_scale,
            target_fps: config.target_fps,
            title: config.title.clone(),
        };
        state.start_backend()?;
        Ok(state)
    }

    fn start_backend(&mut self) -> Result<()> {
        let preference = self.bus.backend();
        let settings = self.bus.settings().clone();
        let mut factory = WindowFactory {
            window: &self.window,
            settings: &settings,
            pixel_scale: self.pixel_scale,
        };
        let selection = select_backend(&mut factory, preference, self.allow_fallback)?;
        let kind = selection.backend.kind();
        for (failed, err) in &selection.downgrades {
            warn!(backend = %failed, error = %err, "{}", err.user_message());
        }
        // Record the backend actually running so a later switch compares
        // against it.
        self.bus.set_backend(kind);
        let _ = ChangeSet::drain(&self.changes);

        let target_fps = self
            .target_fps
            .or((!kind.requires_gpu_pipeline()).then_some(SOFTWARE_FPS_CAP));
        self.scheduler.set_target_fps(target_fps);
        self.scheduler.start();
        self.backend = Some(selection.backend);
        self.window.set_title(&format!("{} [{kind}]", self.title));
        Ok(())
    }

    /// Cancels the frame chain, then releases the backend.
    fn stop_backend(&mut self) {
        self.scheduler.cancel();
        if let Some(backend) = self.backend.take() {
            info!(backend = %backend.kind(), "tearing down rendering backend");
            backend.destroy();
        }
    }

    fn switch_backend(&mut self) -> Result<()> {
        self.stop_backend();
        self.start_backend()
    }

    /// Forwards parameter edits to the running backend, switching backends
    /// when the preference changed.
    fn sync_parameters(&mut self) -> Result<()> {
        let changes = ChangeSet::drain(&self.changes);
        if changes.is_empty() {
            return Ok(());
        }
        if changes.contains(ParamGroup::Status) {
            info!(status = ?self.bus.status(), "animation status changed");
        }

        let running = self.backend.as_ref().map(|backend| backend.kind());
        if changes.contains(ParamGroup::Backend) && running != Some(self.bus.backend()) {
            info!(from = ?running, to = %self.bus.backend(), "switching rendering backend");
            return self.switch_backend();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.apply(changes, self.bus.settings());
        }
        Ok(())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) -> Result<()> {
        if new_size.width == 0 || new_size.height == 0 {
            return Ok(());
        }
        debug!(width = new_size.width, height = new_size.height, "resizing surface");
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(new_size);
        }
        self.bus.set_resolution(new_size.width, new_size.height);
        self.sync_parameters()
    }

    fn handle_key(&mut self, action: KeyAction) -> Result<bool> {
        if !apply_key_action(&mut self.bus, action) {
            return Ok(false);
        }
        self.sync_parameters()?;
        Ok(true)
    }

    /// Draws the frame the scheduler asked for. Returns `false` when the loop
    /// has to stop.
    fn redraw(&mut self) -> bool {
        if self.scheduler.claim().is_none() {
            return true;
        }
        let Some(backend) = self.backend.as_mut() else {
            return true;
        };

        let now = Instant::now();
        let tick = self.clock.tick(now, self.bus.status());
        match backend.render(&tick) {
            Ok(FrameOutcome::Presented) => {
                self.clock.presented(&tick);
                self.scheduler.mark_rendered(now);
                true
            }
            Ok(FrameOutcome::Reconfigured | FrameOutcome::Skipped) => true,
            Ok(FrameOutcome::DeviceLost) => {
                error!(backend = %backend.kind(), "GPU device lost; stopping renderer");
                self.stop_backend();
                false
            }
            Err(err) => {
                error!(backend = %backend.kind(), error = %err, "frame failed; stopping renderer");
                self.stop_backend();
                false
            }
        }
    }
}

pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config)?;
    let mut result = Ok(());

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
            let outcome = match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => Ok(false),
                WindowEvent::KeyboardInput { event, .. } => {
                    match key_action(&event.logical_key) {
                        Some(action)
                            if event.state == ElementState::Pressed
                                && (!event.repeat || action.repeats()) =>
                        {
                            state.handle_key(action)
                        }
                        _ => Ok(true),
                    }
                }
                WindowEvent::Resized(new_size) => state.resize(new_size).map(|_| true),
                WindowEvent::RedrawRequested => Ok(state.redraw()),
                _ => Ok(true),
            };
            match outcome {
                Ok(true) => {}
                Ok(false) => elwt.exit(),
                Err(err) => {
                    result = Err(err);
                    elwt.exit();
                }
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if state.scheduler.ready_for_frame(now) {
                if state.scheduler.request().is_some() {
                    tracing::trace!("scheduler: issuing redraw now");
                    state.window.request_redraw();
                }
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = state.scheduler.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => state.stop_backend(),
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    result
}
