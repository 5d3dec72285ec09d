use crate::canvas::style::RenderingStyle;
use crate::canvas::surface::{Bitmap, Canvas};
use crate::error::RenderError;
use crate::types::Rect;
use audiotile_core::audio::AudioSource;
use std::rc::Rc;

/// Parameters every provider renders against, kept in sync by [`AudioRenderer`](crate::AudioRenderer).
#[derive(Clone)]
pub struct ProviderParams {
    pub source: Option<Rc<dyn AudioSource>>,
    /// Horizontal zoom; may be fractional when zoomed in past one sample per column.
    pub samples_per_pixel: f64,
    pub amplitude_scale: f32,
}

impl Default for ProviderParams {
    fn default() -> Self {
        Self {
            source: None,
            samples_per_pixel: 1.0,
            amplitude_scale: 1.0,
        }
    }
}

impl ProviderParams {
    /// First sample frame shown in absolute column `x`.
    pub fn column_start(&self, x: usize) -> u64 {
        (x as f64 * self.samples_per_pixel).floor() as u64
    }

    /// Sample frames `[start, end)` reduced into absolute column `x`. Never empty.
    pub fn column_range(&self, x: usize) -> (u64, u64) {
        let start = self.column_start(x);
        (start, self.column_start(x + 1).max(start + 1))
    }
}

/// Whether two optional sources are the same object.
pub(crate) fn same_source(a: &Option<Rc<dyn AudioSource>>, b: &Option<Rc<dyn AudioSource>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

/// A rendering backend turning audio into tile bitmaps.
pub trait BitmapProvider {
    fn params(&self) -> &ProviderParams;

    fn params_mut(&mut self) -> &mut ProviderParams;

    /// Paint all of `bmp` with the columns `[start_pixel, start_pixel + bmp.width)`.
    fn render_tile(
        &mut self,
        bmp: &mut Bitmap,
        start_pixel: usize,
        style: RenderingStyle,
    ) -> Result<(), RenderError>;

    /// Paint the silence representation of `style` over `rect`.
    fn render_blank(&self, canvas: &mut dyn Canvas, rect: Rect, style: RenderingStyle);

    fn on_source_changed(&mut self) {}

    fn on_zoom_changed(&mut self) {}

    fn on_scale_changed(&mut self) {}

    /// Trim the provider's own caches to about `max_bytes`.
    fn age_cache(&mut self, _max_bytes: usize) {}

    /// Bytes currently held by the provider's own caches.
    fn cache_live_bytes(&self) -> usize {
        0
    }

    /// Change the analysis window and stride, both as log2 of a sample count.
    /// Ignored by backends that do no frequency analysis.
    fn set_resolution(&mut self, _window_log2: u32, _stride_log2: u32) {}

    /// Change the frequency axis: `log_mix` blends linear (0) into logarithmic (1).
    fn set_frequency_scale(&mut self, _log_mix: f32, _max_frequency: Option<f32>) {}

    fn set_source(&mut self, source: Option<Rc<dyn AudioSource>>) {
        if same_source(&self.params().source, &source) {
            return;
        }
        self.params_mut().source = source;
        self.on_source_changed();
    }

    fn set_samples_per_pixel(&mut self, samples_per_pixel: f64) {
        if self.params().samples_per_pixel == samples_per_pixel {
            return;
        }
        self.params_mut().samples_per_pixel = samples_per_pixel;
        self.on_zoom_changed();
    }

    fn set_amplitude_scale(&mut self, scale: f32) {
        if self.params().amplitude_scale == scale {
            return;
        }
        self.params_mut().amplitude_scale = scale;
        self.on_scale_changed();
    }
}
