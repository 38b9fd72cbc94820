use thiserror::Error;

/// Failures while acquiring a GPU device for one of the shader backends.
///
/// Variants are ordered by the acquisition stage that raises them; the stages
/// run strictly in that order so the first failing stage decides the error.
/// Every variant is recoverable: the caller downgrades to a lesser backend and
/// shows [`InitError::user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InitError {
    #[error("no GPU entry point is available on this platform")]
    NoGpuSupport,
    #[error("failed to find a suitable GPU adapter")]
    NoSuitableAdapter,
    #[error("failed to bind the drawable surface to the GPU device")]
    ContextCreationFailed,
}

impl InitError {
    /// Text suitable for showing to the user next to the fallback notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            InitError::NoGpuSupport => "GPU rendering not supported, falling back to a lesser backend",
            InitError::NoSuitableAdapter => "Failed to find a suitable GPU adapter",
            InitError::ContextCreationFailed => "Failed to create a GPU rendering context",
        }
    }

    /// Short follow-up shown after the message.
    pub fn fallback_hint(&self) -> &'static str {
        match self {
            InitError::NoGpuSupport => "check that a Vulkan, Metal, DX12 or GL driver is installed",
            InitError::NoSuitableAdapter => "try `--backend software` or update the graphics driver",
            InitError::ContextCreationFailed => {
                "the window surface may not support GPU presentation; try `--backend software`"
            }
        }
    }
}

/// Rejected plane construction parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("invalid geometry parameters: {0}")]
    InvalidGeometryParameters(String),
}
