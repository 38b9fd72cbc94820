//! Live parameters shared between the controls and the active backend.
//!
//! The [`ParameterBus`] is the single writer. Backends subscribe once and
//! drain a [`ChangeSet`] before each frame so only the groups that actually
//! changed are re-uploaded.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::gradient::Rgb;
use crate::types::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfig {
    pub freq: f64,
    pub amp: f64,
    pub hardness: f64,
    pub octaves: u32,
    pub lacunarity: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            freq: 0.75,
            amp: 0.25,
            hardness: 1.25,
            octaves: 8,
            lacunarity: 1.0,
        }
    }
}

impl NoiseConfig {
    /// Replaces negative or non-finite fields with zero.
    pub fn sanitized(self) -> Self {
        let non_negative = |value: f64| if value.is_finite() && value > 0.0 { value } else { 0.0 };
        Self {
            freq: non_negative(self.freq),
            amp: non_negative(self.amp),
            hardness: non_negative(self.hardness),
            octaves: self.octaves,
            lacunarity: non_negative(self.lacunarity),
        }
    }
}

/// Slider bounds for one noise parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Moves `value` by `steps` increments, staying inside the range.
    pub fn nudge(&self, value: f64, steps: i32) -> f64 {
        self.clamp(value + self.step * steps as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseRanges {
    pub freq: ParamRange,
    pub amp: ParamRange,
    pub hardness: ParamRange,
    pub octaves: ParamRange,
    pub lacunarity: ParamRange,
}

pub const NOISE_RANGES: NoiseRanges = NoiseRanges {
    freq: ParamRange { label: "Frequency", min: 0.0, max: 4.0, step: 0.05 },
    amp: ParamRange { label: "Amplitude", min: 0.0, max: 1.0, step: 0.005 },
    hardness: ParamRange { label: "Hardness", min: 0.0, max: 5.0, step: 0.05 },
    octaves: ParamRange { label: "Octaves", min: 0.0, max: 12.0, step: 0.5 },
    lacunarity: ParamRange { label: "Lacunarity", min: 0.0, max: 2.0, step: 0.005 },
};

pub const DEFAULT_PRIMARY: Rgb = Rgb::new(0x00, 0x6e, 0xff);
pub const DEFAULT_SECONDARY: Rgb = Rgb::new(0x1a, 0x00, 0x84);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorConfig {
    pub primary: Rgb,
    pub secondary: Rgb,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY,
            secondary: DEFAULT_SECONDARY,
        }
    }
}

impl ColorConfig {
    pub fn swapped(self) -> Self {
        Self {
            primary: self.secondary,
            secondary: self.primary,
        }
    }
}

/// Perspective parameters. `fov` is the vertical field of view in degrees.
///
/// The aspect ratio is owned by [`TransformConfig`] and only changes when the
/// resolution does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Projection {
    pub(crate) fn new(fov: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            near,
            far,
            aspect: 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(75.0, 0.1, 1000.0)
    }
}

/// Model placement; `rotation` holds Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub eye: [f32; 3],
    pub center: [f32; 3],
    pub up: [f32; 3],
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 5.0],
            center: [0.0; 3],
            up: [0.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    resolution: (u32, u32),
    projection: Projection,
    pub model: ModelTransform,
    pub view: ViewTransform,
    /// Refit `model.scale` to the visible frustum whenever the resolution
    /// changes. Cleared when the configuration pins an explicit scale.
    pub fit_model: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        let mut transform = Self {
            resolution: (1, 1),
            projection: Projection::default(),
            model: ModelTransform::default(),
            view: ViewTransform::default(),
            fit_model: true,
        };
        transform.set_resolution(1280, 720);
        transform
    }
}

impl TransformConfig {
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Replaces the perspective parameters, keeping the aspect derived from
    /// the current resolution.
    pub fn set_projection(&mut self, fov: f32, near: f32, far: f32) {
        let aspect = self.projection.aspect;
        self.projection = Projection {
            fov,
            near,
            far,
            aspect,
        };
        if self.fit_model {
            self.fit_model_to_view();
        }
    }

    /// Updates the resolution and re-derives everything that depends on it.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.resolution = (width, height);
        self.projection.aspect = width as f32 / height as f32;
        if self.fit_model {
            self.fit_model_to_view();
        }
    }

    /// Size of the frustum cross-section at the model's distance from the eye.
    pub fn visible_extent(&self) -> (f32, f32) {
        let distance = distance(self.view.eye, self.model.position);
        let height = 2.0 * distance * (self.projection.fov.to_radians() / 2.0).tan();
        (height * self.projection.aspect, height)
    }

    pub fn fit_model_to_view(&mut self) {
        let (width, height) = self.visible_extent();
        self.model.scale = [width, height, 1.0];
    }
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Paused,
}

impl RunStatus {
    pub fn is_paused(self) -> bool {
        matches!(self, RunStatus::Paused)
    }

    pub fn toggled(self) -> Self {
        match self {
            RunStatus::Running => RunStatus::Paused,
            RunStatus::Paused => RunStatus::Running,
        }
    }
}

/// Everything a renderer reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub noise: NoiseConfig,
    pub color: ColorConfig,
    pub transform: TransformConfig,
    pub clamp: bool,
    pub status: RunStatus,
    pub backend: BackendKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    Noise,
    Color,
    Transform,
    Clamp,
    Status,
    Backend,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 6] = [
        ParamGroup::Noise,
        ParamGroup::Color,
        ParamGroup::Transform,
        ParamGroup::Clamp,
        ParamGroup::Status,
        ParamGroup::Backend,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Notification sent to subscribers after a group changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamChange {
    pub group: ParamGroup,
    pub version: u64,
}

/// Set of groups touched since the last drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    bits: u8,
}

impl ChangeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        ParamGroup::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, group: ParamGroup) {
        self.bits |= group.bit();
    }

    pub fn contains(&self, group: ParamGroup) -> bool {
        self.bits & group.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Collects every pending notification without blocking.
    pub fn drain(receiver: &Receiver<ParamChange>) -> Self {
        receiver.try_iter().map(|change| change.group).collect()
    }
}

impl FromIterator<ParamGroup> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ParamGroup>>(iter: I) -> Self {
        let mut set = ChangeSet::empty();
        for group in iter {
            set.insert(group);
        }
        set
    }
}

/// Settings stamped with the bus version they were read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub settings: Settings,
}

/// Owner of the live [`Settings`].
///
/// Setters compare against the current value and only publish when something
/// actually changed, so a subscriber never re-uploads an unchanged group.
#[derive(Debug)]
pub struct ParameterBus {
    settings: Settings,
    version: u64,
    subscribers: Vec<Sender<ParamChange>>,
}

impl Default for ParameterBus {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl ParameterBus {
    pub fn new(mut settings: Settings) -> Self {
        settings.noise = settings.noise.sanitized();
        Self {
            settings,
            version: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<ParamChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            settings: self.settings.clone(),
        }
    }

    pub fn noise(&self) -> NoiseConfig {
        self.settings.noise
    }

    pub fn set_noise(&mut self, noise: NoiseConfig) {
        let noise = noise.sanitized();
        if self.settings.noise != noise {
            self.settings.noise = noise;
            self.publish(ParamGroup::Noise);
        }
    }

    /// Edits one or more noise fields as a single change.
    pub fn update_noise(&mut self, edit: impl FnOnce(&mut NoiseConfig)) {
        let mut noise = self.settings.noise;
        edit(&mut noise);
        self.set_noise(noise);
    }

    pub fn color(&self) -> ColorConfig {
        self.settings.color
    }

    pub fn set_color(&mut self, color: ColorConfig) {
        if self.settings.color != color {
            self.settings.color = color;
            self.publish(ParamGroup::Color);
        }
    }

    /// Exchanges primary and secondary in one step.
    pub fn swap_colors(&mut self) {
        let swapped = self.settings.color.swapped();
        self.set_color(swapped);
    }

    pub fn transform(&self) -> &TransformConfig {
        &self.settings.transform
    }

    pub fn set_transform(&mut self, transform: TransformConfig) {
        if self.settings.transform != transform {
            self.settings.transform = transform;
            self.publish(ParamGroup::Transform);
        }
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let mut transform = self.settings.transform;
        transform.set_resolution(width, height);
        self.set_transform(transform);
    }

    pub fn clamp(&self) -> bool {
        self.settings.clamp
    }

    pub fn set_clamp(&mut self, clamp: bool) {
        if self.settings.clamp != clamp {
            self.settings.clamp = clamp;
            self.publish(ParamGroup::Clamp);
        }
    }

    pub fn status(&self) -> RunStatus {
        self.settings.status
    }

    pub fn set_status(&mut self, status: RunStatus) {
        if self.settings.status != status {
            self.settings.status = status;
            self.publish(ParamGroup::Status);
        }
    }

    pub fn toggle_pause(&mut self) -> RunStatus {
        let next = self.settings.status.toggled();
        self.set_status(next);
        next
    }

    pub fn backend(&self) -> BackendKind {
        self.settings.backend
    }

    pub fn set_backend(&mut self, backend: BackendKind) {
        if self.settings.backend != backend {
            self.settings.backend = backend;
            self.publish(ParamGroup::Backend);
        }
    }

    fn publish(&mut self, group: ParamGroup) {
        self.version = self.version.wrapping_add(1);
        let change = ParamChange {
            group,
            version: self.version,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(change).is_ok());
        tracing::trace!(?group, version = self.version, "parameter group changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_swap_restores_original_pair() {
        let mut bus = ParameterBus::default();
        let original = bus.color();
        bus.swap_colors();
        assert_eq!(bus.color().primary, original.secondary);
        assert_eq!(bus.color().secondary, original.primary);
        bus.swap_colors();
        assert_eq!(bus.color(), original);
    }

    #[test]
    fn swap_publishes_a_single_colour_change() {
        let mut bus = ParameterBus::default();
        let receiver = bus.subscribe();
        bus.swap_colors();
        let changes: Vec<_> = receiver.try_iter().collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].group, ParamGroup::Color);
    }

    #[test]
    fn resizing_derives_aspect() {
        let mut transform = TransformConfig::default();
        transform.set_resolution(1920, 1080);
        assert_eq!(transform.resolution(), (1920, 1080));
        assert!((transform.projection().aspect() - 1920.0 / 1080.0).abs() < 1e-6);

        transform.set_resolution(300, 600);
        assert!((transform.projection().aspect() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn replacing_projection_keeps_derived_aspect() {
        let mut transform = TransformConfig::default();
        transform.set_resolution(1920, 1080);
        transform.set_projection(60.0, 0.1, 100.0);

        let projection = transform.projection();
        assert_eq!(projection.fov, 60.0);
        assert_eq!(projection.far, 100.0);
        assert!((projection.aspect() - 1920.0 / 1080.0).abs() < 1e-6);

        let expected_height = 2.0 * 5.0 * (60.0_f32.to_radians() / 2.0).tan();
        assert!((transform.model.scale[1] - expected_height).abs() < 1e-4);
    }

    #[test]
    fn zero_resolution_is_treated_as_one_pixel() {
        let mut transform = TransformConfig::default();
        transform.set_resolution(0, 0);
        assert_eq!(transform.resolution(), (1, 1));
        assert_eq!(transform.projection().aspect(), 1.0);
    }

    #[test]
    fn fitted_model_fills_the_frustum() {
        let mut transform = TransformConfig::default();
        transform.set_resolution(1600, 800);
        let expected_height = 2.0 * 5.0 * (75.0_f32.to_radians() / 2.0).tan();
        assert!((transform.model.scale[1] - expected_height).abs() < 1e-4);
        assert!((transform.model.scale[0] - expected_height * 2.0).abs() < 1e-4);
        assert_eq!(transform.model.scale[2], 1.0);
    }

    #[test]
    fn pinned_scale_survives_resize() {
        let mut transform = TransformConfig::default();
        transform.fit_model = false;
        transform.model.scale = [3.0, 2.0, 1.0];
        transform.set_resolution(640, 480);
        assert_eq!(transform.model.scale, [3.0, 2.0, 1.0]);
    }

    #[test]
    fn noise_edit_does_not_touch_transform_group() {
        let mut bus = ParameterBus::default();
        let receiver = bus.subscribe();
        bus.update_noise(|noise| noise.freq = 2.0);
        let changes = ChangeSet::drain(&receiver);
        assert!(changes.contains(ParamGroup::Noise));
        assert!(!changes.contains(ParamGroup::Transform));
        assert!(!changes.contains(ParamGroup::Color));
    }

    #[test]
    fn unchanged_values_are_not_published() {
        let mut bus = ParameterBus::default();
        let receiver = bus.subscribe();
        bus.set_noise(NoiseConfig::default());
        bus.set_clamp(false);
        bus.set_status(RunStatus::Running);
        assert!(ChangeSet::drain(&receiver).is_empty());
        assert_eq!(bus.version(), 0);
    }

    #[test]
    fn versions_stamp_snapshots() {
        let mut bus = ParameterBus::default();
        let before = bus.snapshot();
        bus.set_clamp(true);
        bus.toggle_pause();
        let after = bus.snapshot();
        assert_eq!(after.version, before.version + 2);
        assert!(after.settings.clamp);
        assert_eq!(after.settings.status, RunStatus::Paused);
        assert!(!before.settings.clamp);
    }

    #[test]
    fn negative_noise_values_are_sanitized() {
        let mut bus = ParameterBus::default();
        bus.update_noise(|noise| {
            noise.freq = -1.0;
            noise.hardness = f64::NAN;
        });
        assert_eq!(bus.noise().freq, 0.0);
        assert_eq!(bus.noise().hardness, 0.0);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = ParameterBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.set_backend(BackendKind::Software);
        assert_eq!(bus.subscribers.len(), 1);
        assert_eq!(ChangeSet::drain(&kept), [ParamGroup::Backend].into_iter().collect());
    }

    #[test]
    fn ranges_clamp_nudges() {
        assert_eq!(NOISE_RANGES.freq.nudge(3.98, 1), 4.0);
        assert_eq!(NOISE_RANGES.octaves.nudge(0.0, -2), 0.0);
        assert!((NOISE_RANGES.amp.nudge(0.25, 2) - 0.26).abs() < 1e-12);
    }
}
