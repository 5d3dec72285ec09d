//! Tiled, cached waveform and spectrum rendering for audio timelines.
//!
//! [`AudioRenderer`] paints any column range of a virtual timeline by blitting
//! tiles from per-style caches, asking the active [`BitmapProvider`] for the
//! tiles it doesn't have yet.

pub mod canvas;
pub mod config;
pub mod error;
pub mod renderer;
pub mod types;

pub use audiotile_core::{audio, block_cache, dsp, SourceError};

pub use canvas::colors::{ColorScheme, WaveformColors};
pub use canvas::provider::{BitmapProvider, ProviderParams};
pub use canvas::spectrogram_renderer::SpectrogramRenderer;
pub use canvas::style::RenderingStyle;
pub use canvas::surface::{Bitmap, Canvas};
pub use canvas::waveform_renderer::WaveformRenderer;
pub use config::RenderConfig;
pub use error::{ConfigError, RenderError};
pub use renderer::AudioRenderer;
pub use types::{Point, Rect, Rgb};
