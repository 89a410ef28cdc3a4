/// Core error types for the Strata engine.
use std::path::PathBuf;

/// A specialized Result type for Strata operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Status codes returned by engine initialization. The set is closed:
/// external callers match on the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InitStatus {
    Ok = 0,
    AlreadyInitialized = 1,
    DeviceCreateFailed = 2,
    RenderTargetFailed = 3,
    ShaderCompileFailed = 4,
    GeometryFailed = 5,
    StagingTextureFailed = 6,
    FrameBufferFailed = 7,
}

impl InitStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, InitStatus::Ok)
    }

    /// The numeric code exposed at the boundary.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Top-level error type for soft (non-fatal) engine failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("render error: {0}")]
    Render(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("text layout error: {0}")]
    TextLayout(String),

    #[error("render target needs recreation")]
    TargetLost,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        EngineError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }
}
