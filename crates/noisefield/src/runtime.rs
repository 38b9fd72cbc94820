use std::time::{Duration, Instant};

use crate::params::RunStatus;

/// Per-frame time increment used by the GPU-accelerated backend.
///
/// That backend steps time by a constant per rendered frame instead of the
/// wall clock, so its animation speed follows the display refresh rate.
pub const GPU_TIME_STEP: f32 = 0.01;

/// Animation state observed by the wall-clock backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub status: RunStatus,
    /// Seconds of unpaused animation since the last restart.
    pub elapsed: f64,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            status: RunStatus::Running,
            elapsed: 0.0,
        }
    }
}

/// Time handed to a backend for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub elapsed: f64,
    /// Fixed-step time this frame draws with if it is presented.
    pub step_time: f32,
    pub paused: bool,
    pub frame_index: u64,
}

/// Wall-clock accumulator that stops while paused.
///
/// Resuming continues from the frozen value; the paused span is never
/// counted because the first running tick after a pause contributes zero.
#[derive(Debug, Clone)]
pub struct FrameClock {
    state: RenderState,
    last: Option<Instant>,
    frame: u64,
    step: FixedStepClock,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(RunStatus::Running)
    }
}

impl FrameClock {
    pub fn new(status: RunStatus) -> Self {
        Self {
            state: RenderState {
                status,
                elapsed: 0.0,
            },
            last: None,
            frame: 0,
            step: FixedStepClock::default(),
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn tick(&mut self, now: Instant, status: RunStatus) -> FrameTick {
        let delta = match (self.state.status, status, self.last) {
            (RunStatus::Running, RunStatus::Running, Some(last)) => {
                now.saturating_duration_since(last).as_secs_f64()
            }
            _ => 0.0,
        };
        self.state.elapsed += delta;
        self.state.status = status;
        self.last = Some(now);

        let tick = FrameTick {
            elapsed: self.state.elapsed,
            step_time: self.step.peek(status.is_paused()),
            paused: status.is_paused(),
            frame_index: self.frame,
        };
        self.frame = self.frame.saturating_add(1);
        tick
    }

    /// Commits the fixed step of a frame that reached the screen.
    pub fn presented(&mut self, tick: &FrameTick) {
        self.step.advance(tick.paused);
    }

    pub fn step_time(&self) -> f32 {
        self.step.time()
    }

    /// Full restart: the only way elapsed time goes back to zero.
    pub fn restart(&mut self) {
        self.state.elapsed = 0.0;
        self.last = None;
        self.frame = 0;
        self.step = FixedStepClock::default();
    }
}

/// Deterministic per-frame time used by the GPU-accelerated backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedStepClock {
    time: f32,
}

impl FixedStepClock {
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Time the next frame would draw with; only `advance` commits it.
    pub fn peek(&self, paused: bool) -> f32 {
        if paused {
            self.time
        } else {
            self.time + GPU_TIME_STEP
        }
    }

    pub fn advance(&mut self, paused: bool) -> f32 {
        self.time = self.peek(paused);
        self.time
    }
}

/// Permission to draw one frame, valid only for the chain that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    generation: u64,
}

impl FrameToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Gatekeeper for the redraw chain.
///
/// Every `start`/`cancel` bumps the generation so tokens handed out to a
/// previous chain can no longer be claimed. At most one token is outstanding
/// at a time, which keeps two chains from ever drawing interleaved.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    generation: u64,
    active: bool,
    pending: Option<FrameToken>,
    target_interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(target_fps: Option<f32>) -> Self {
        Self {
            generation: 0,
            active: false,
            pending: None,
            target_interval: frame_interval(target_fps),
            last_frame: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_target_fps(&mut self, target_fps: Option<f32>) {
        self.target_interval = frame_interval(target_fps);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.active = true;
        self.pending = None;
        self.last_frame = None;
        tracing::debug!(generation = self.generation, "frame chain started");
        self.generation
    }

    /// Invalidates the outstanding token; must run before resources the
    /// chain draws with are released.
    pub fn cancel(&mut self) {
        if self.active || self.pending.is_some() {
            tracing::debug!(generation = self.generation, "frame chain cancelled");
        }
        self.generation = self.generation.wrapping_add(1);
        self.active = false;
        self.pending = None;
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if !self.active || self.pending.is_some() {
            return false;
        }
        match (self.target_interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn request(&mut self) -> Option<FrameToken> {
        if !self.active || self.pending.is_some() {
            return None;
        }
        let token = FrameToken {
            generation: self.generation,
        };
        self.pending = Some(token);
        Some(token)
    }

    /// Takes the outstanding token if it still belongs to the live chain.
    pub fn claim(&mut self) -> Option<FrameToken> {
        let token = self.pending.take()?;
        self.is_current(token).then_some(token)
    }

    pub fn is_current(&self, token: FrameToken) -> bool {
        self.active && token.generation == self.generation
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.active {
            return None;
        }
        let interval = self.target_interval?;
        self.last_frame.map(|last| last + interval)
    }
}

fn frame_interval(target_fps: Option<f32>) -> Option<Duration> {
    target_fps
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_freezes_elapsed_and_resume_continues() {
        let origin = Instant::now();
        let at = |ms: u64| origin + Duration::from_millis(ms);
        let mut clock = FrameClock::default();

        clock.tick(at(0), RunStatus::Running);
        let before_pause = clock.tick(at(500), RunStatus::Running).elapsed;
        assert!((before_pause - 0.5).abs() < 1e-9);

        for step in 1..=10 {
            let tick = clock.tick(at(500 + step * 100), RunStatus::Paused);
            assert!(tick.paused);
            assert_eq!(tick.elapsed, before_pause);
        }

        let resumed = clock.tick(at(2000), RunStatus::Running);
        assert_eq!(resumed.elapsed, before_pause);
        let later = clock.tick(at(2250), RunStatus::Running);
        assert!((later.elapsed - 0.75).abs() < 1e-9);
    }

    #[test]
    fn elapsed_never_decreases() {
        let origin = Instant::now() + Duration::from_secs(10);
        let mut clock = FrameClock::default();
        clock.tick(origin, RunStatus::Running);
        let first = clock.tick(origin + Duration::from_millis(40), RunStatus::Running);
        let back_in_time = clock.tick(origin, RunStatus::Running);
        assert!(back_in_time.elapsed >= first.elapsed);
    }

    #[test]
    fn only_restart_resets_elapsed() {
        let origin = Instant::now();
        let mut clock = FrameClock::default();
        clock.tick(origin, RunStatus::Running);
        clock.tick(origin + Duration::from_secs(3), RunStatus::Running);
        assert!(clock.state().elapsed > 2.9);
        clock.restart();
        assert_eq!(clock.state().elapsed, 0.0);
        assert_eq!(clock.step_time(), 0.0);
        assert_eq!(clock.tick(origin + Duration::from_secs(4), RunStatus::Running).frame_index, 0);
    }

    #[test]
    fn gpu_clock_steps_by_constant_not_wall_time() {
        let mut clock = FixedStepClock::default();
        for _ in 0..100 {
            clock.advance(false);
        }
        assert!((clock.time() - 1.0).abs() < 1e-4);
        let frozen = clock.time();
        clock.advance(true);
        assert_eq!(clock.time(), frozen);
    }

    #[test]
    fn fixed_step_commits_only_presented_frames() {
        let origin = Instant::now();
        let mut clock = FrameClock::default();

        let dropped = clock.tick(origin, RunStatus::Running);
        assert!((dropped.step_time - GPU_TIME_STEP).abs() < 1e-6);
        let retried = clock.tick(origin, RunStatus::Running);
        assert_eq!(retried.step_time, dropped.step_time, "unpresented frames keep time");

        clock.presented(&retried);
        let next = clock.tick(origin, RunStatus::Running);
        assert!((next.step_time - 2.0 * GPU_TIME_STEP).abs() < 1e-6);

        let paused = clock.tick(origin, RunStatus::Paused);
        clock.presented(&paused);
        assert!((clock.step_time() - GPU_TIME_STEP).abs() < 1e-6);
    }

    #[test]
    fn cancelled_chain_cannot_claim_its_token() {
        let mut scheduler = FrameScheduler::new(None);
        assert!(scheduler.request().is_none());

        let first = scheduler.start();
        let token = scheduler.request().unwrap();
        assert_eq!(token.generation(), first);
        assert!(scheduler.request().is_none(), "one outstanding token at a time");

        scheduler.cancel();
        assert!(!scheduler.is_current(token));
        assert!(scheduler.claim().is_none());

        let second = scheduler.start();
        assert_ne!(first, second);
        assert!(!scheduler.is_current(token));
        let fresh = scheduler.request().unwrap();
        assert_eq!(scheduler.claim(), Some(fresh));
        assert!(scheduler.claim().is_none());
    }

    #[test]
    fn frame_cap_defers_until_deadline() {
        let origin = Instant::now();
        let mut scheduler = FrameScheduler::new(Some(10.0));
        scheduler.start();
        assert!(scheduler.ready_for_frame(origin));
        scheduler.request().unwrap();
        scheduler.claim().unwrap();
        scheduler.mark_rendered(origin);

        assert!(!scheduler.ready_for_frame(origin + Duration::from_millis(50)));
        assert_eq!(
            scheduler.next_deadline(),
            Some(origin + Duration::from_millis(100))
        );
        assert!(scheduler.ready_for_frame(origin + Duration::from_millis(100)));

        scheduler.cancel();
        assert_eq!(scheduler.next_deadline(), None);
        assert!(!scheduler.ready_for_frame(origin + Duration::from_secs(1)));
    }

    #[test]
    fn retargeting_keeps_the_generation_moving_forward() {
        let origin = Instant::now();
        let mut scheduler = FrameScheduler::new(None);
        let first = scheduler.start();
        scheduler.cancel();
        scheduler.set_target_fps(Some(0.0));
        let second = scheduler.start();
        assert!(second > first);

        scheduler.request().unwrap();
        scheduler.claim().unwrap();
        scheduler.mark_rendered(origin);
        assert_eq!(scheduler.next_deadline(), None, "non-positive caps are ignored");
    }
}
