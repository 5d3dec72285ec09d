use crate::error::ConfigError;
use audiotile_core::dsp::fft::{MAX_WINDOW_LOG2, MIN_WINDOW_LOG2};
use serde::{Deserialize, Serialize};

/// Hard ceiling for a single style's bitmap cache.
pub const MAX_BITMAP_CACHE_BYTES: usize = 16 * 1024 * 1024;

/// Default total memory handed to the renderer.
pub const DEFAULT_CACHE_BYTES: usize = 32 * 1024 * 1024;

/// Tuning knobs for [`AudioRenderer`](crate::AudioRenderer) and its providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixel width of one cached tile. Power of two, fixed for the renderer's lifetime.
    pub tile_width: u32,
    /// Byte budget for each style's bitmap cache.
    pub bitmap_cache_bytes: usize,
    /// Byte budget for the active provider's own cache.
    pub provider_cache_bytes: usize,
    /// Spectrum window length, log2 of the sample count.
    pub spectrum_window_log2: u32,
    /// Distance between consecutive spectrum windows, log2 of the sample count.
    pub spectrum_stride_log2: u32,
    /// 0 = linear frequency axis, 1 = logarithmic.
    pub spectrum_log_mix: f32,
    /// Highest frequency shown by the spectrum, in Hz. `None` shows up to Nyquist.
    pub spectrum_max_frequency: Option<f32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_width: 32,
            bitmap_cache_bytes: 0,
            provider_cache_bytes: 0,
            spectrum_window_log2: 9,
            spectrum_stride_log2: 8,
            spectrum_log_mix: 0.0,
            spectrum_max_frequency: None,
        }
        .with_total_cache_size(DEFAULT_CACHE_BYTES)
    }
}

/// Split one memory budget into (per-style bitmap, provider) budgets.
///
/// Each bitmap cache gets an eighth, capped at 16 MiB; the provider gets
/// what is left after reserving four bitmap shares.
pub fn split_cache_budget(total: usize) -> (usize, usize) {
    let bitmap = (total / 8).min(MAX_BITMAP_CACHE_BYTES);
    (bitmap, total.saturating_sub(4 * bitmap))
}

impl RenderConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_total_cache_size(mut self, total: usize) -> Self {
        let (bitmap, provider) = split_cache_budget(total);
        self.bitmap_cache_bytes = bitmap;
        self.provider_cache_bytes = provider;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tile_width.is_power_of_two() {
            return Err(ConfigError::TileWidthNotPowerOfTwo(self.tile_width));
        }
        if !(MIN_WINDOW_LOG2..=MAX_WINDOW_LOG2).contains(&self.spectrum_window_log2) {
            return Err(ConfigError::WindowOutOfRange(self.spectrum_window_log2));
        }
        if self.spectrum_stride_log2 > self.spectrum_window_log2 {
            return Err(ConfigError::StrideExceedsWindow {
                stride_log2: self.spectrum_stride_log2,
                window_log2: self.spectrum_window_log2,
            });
        }
        if !(0.0..=1.0).contains(&self.spectrum_log_mix) {
            return Err(ConfigError::LogMixOutOfRange(self.spectrum_log_mix));
        }
        if self.bitmap_cache_bytes == 0 {
            return Err(ConfigError::ZeroBudget("bitmap"));
        }
        if self.provider_cache_bytes == 0 {
            return Err(ConfigError::ZeroBudget("provider"));
        }
        Ok(())
    }
}
