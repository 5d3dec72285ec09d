use audiotile_core::SourceError;
use std::convert::Infallible;
use thiserror::Error;

/// A tile or derived block could not be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("audio source: {0}")]
    Source(#[from] SourceError),
}

impl From<Infallible> for RenderError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Rejected configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("tile width {0} is not a power of two")]
    TileWidthNotPowerOfTwo(u32),

    #[error("spectrum window 2^{0} is outside the supported range")]
    WindowOutOfRange(u32),

    #[error("spectrum stride 2^{stride_log2} exceeds window 2^{window_log2}")]
    StrideExceedsWindow { stride_log2: u32, window_log2: u32 },

    #[error("spectrum log mix {0} is outside [0, 1]")]
    LogMixOutOfRange(f32),

    #[error("{0} cache budget must be non-zero")]
    ZeroBudget(&'static str),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
