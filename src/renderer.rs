//! The rendering orchestrator: maps a visible column range onto cached tiles.

use crate::canvas::provider::{same_source, BitmapProvider};
use crate::canvas::style::RenderingStyle;
use crate::canvas::surface::Canvas;
use crate::canvas::tile_cache::{tile_count_for, TileCache, TileCaches};
use crate::config::{split_cache_budget, RenderConfig};
use crate::error::RenderError;
use crate::types::{Point, Rect};
use audiotile_core::audio::AudioSource;
use audiotile_core::block_cache::BlockFactory;
use std::rc::Rc;

/// Paints horizontal slices of audio imagery from per-style tile caches.
///
/// The virtual timeline is `ceil(num_samples / samples_per_pixel)` columns
/// wide and split into tiles of `tile_width` columns. Tiles are produced on
/// demand by the active [`BitmapProvider`] and kept until aged out.
pub struct AudioRenderer {
    provider: Option<Box<dyn BitmapProvider>>,
    source: Option<Rc<dyn AudioSource>>,
    samples_per_pixel: f64,
    amplitude_scale: f32,
    tile_width: u32,
    height: u32,
    bitmap_cache_bytes: usize,
    provider_cache_bytes: usize,
    total_columns: usize,
    tiles: TileCaches,
}

impl AudioRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        debug_assert!(config.tile_width.is_power_of_two(), "tile width must be a power of two");
        debug_assert!(
            config.bitmap_cache_bytes > 0 && config.provider_cache_bytes > 0,
            "cache budgets must be non-zero"
        );
        let tile_width = config.tile_width.max(1).next_power_of_two();
        Self {
            provider: None,
            source: None,
            samples_per_pixel: 1.0,
            amplitude_scale: 1.0,
            tile_width,
            height: 0,
            bitmap_cache_bytes: config.bitmap_cache_bytes,
            provider_cache_bytes: config.provider_cache_bytes,
            total_columns: 0,
            tiles: TileCaches::new(tile_width, 0),
        }
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> f64 {
        self.samples_per_pixel
    }

    pub fn amplitude_scale(&self) -> f32 {
        self.amplitude_scale
    }

    pub fn source(&self) -> Option<&Rc<dyn AudioSource>> {
        self.source.as_ref()
    }

    /// Width of the virtual timeline in columns.
    pub fn total_columns(&self) -> usize {
        self.total_columns
    }

    pub fn tile_count(&self) -> usize {
        tile_count_for(self.total_columns, self.tile_width)
    }

    /// Byte budgets of each style's bitmap cache and of the provider's cache.
    pub fn cache_budgets(&self) -> (usize, usize) {
        (self.bitmap_cache_bytes, self.provider_cache_bytes)
    }

    pub fn bitmap_cache(&self, style: RenderingStyle) -> &TileCache {
        self.tiles.get(style)
    }

    pub fn provider(&self) -> Option<&dyn BitmapProvider> {
        self.provider.as_deref()
    }

    /// Direct access to the active provider. Changes that alter its imagery
    /// must be followed by [`invalidate`](Self::invalidate).
    pub fn provider_mut(&mut self) -> Option<&mut (dyn BitmapProvider + 'static)> {
        self.provider.as_deref_mut()
    }

    fn recompute_columns(&mut self) {
        self.total_columns = match &self.source {
            Some(source) => (source.num_samples() as f64 / self.samples_per_pixel).ceil() as usize,
            None => 0,
        };
        self.tiles.set_tile_count(self.tile_count());
        log::debug!(
            "timeline is {} columns, {} tiles",
            self.total_columns,
            self.tile_count()
        );
    }

    pub fn set_source(&mut self, source: Option<Rc<dyn AudioSource>>) {
        if same_source(&self.source, &source) {
            return;
        }
        match &source {
            Some(s) => log::debug!(
                "source bound: {} Hz, {} ch, {} samples",
                s.sample_rate(),
                s.channels(),
                s.num_samples()
            ),
            None => log::debug!("source unbound"),
        }
        self.source = source;
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_source(self.source.clone());
        }
        self.recompute_columns();
    }

    pub fn set_samples_per_pixel(&mut self, samples_per_pixel: f64) {
        debug_assert!(samples_per_pixel > 0.0, "zoom must be positive");
        if !(samples_per_pixel > 0.0 && samples_per_pixel.is_finite()) {
            return;
        }
        if self.samples_per_pixel == samples_per_pixel {
            return;
        }
        log::debug!("zoom: {samples_per_pixel} samples per pixel");
        self.samples_per_pixel = samples_per_pixel;
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_samples_per_pixel(samples_per_pixel);
        }
        self.recompute_columns();
    }

    pub fn set_height(&mut self, height: u32) {
        if self.height == height {
            return;
        }
        log::debug!("tile height: {height}");
        self.height = height;
        self.tiles.set_tile_height(height);
    }

    pub fn set_amplitude_scale(&mut self, scale: f32) {
        if self.amplitude_scale == scale {
            return;
        }
        log::debug!("amplitude scale: {scale}");
        self.amplitude_scale = scale;
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_amplitude_scale(scale);
        }
        self.tiles.invalidate();
    }

    /// Make `provider` the active backend and return the previous one.
    ///
    /// The new provider is brought up to date with the current source, zoom
    /// and amplitude scale.
    pub fn set_provider(
        &mut self,
        provider: Option<Box<dyn BitmapProvider>>,
    ) -> Option<Box<dyn BitmapProvider>> {
        let old = std::mem::replace(&mut self.provider, provider);
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_source(self.source.clone());
            provider.set_samples_per_pixel(self.samples_per_pixel);
            provider.set_amplitude_scale(self.amplitude_scale);
        }
        log::debug!("provider swapped, active: {}", self.provider.is_some());
        self.tiles.invalidate();
        old
    }

    /// Change the active provider's analysis window and stride and redraw.
    ///
    /// A stride-only change lets the spectrum backend keep its derived blocks;
    /// the tiles drawn from them are dropped either way.
    pub fn set_spectrum_resolution(&mut self, window_log2: u32, stride_log2: u32) {
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_resolution(window_log2, stride_log2);
        }
        log::debug!("spectrum resolution: window 2^{window_log2}, stride 2^{stride_log2}");
        self.tiles.invalidate();
    }

    pub fn set_frequency_scale(&mut self, log_mix: f32, max_frequency: Option<f32>) {
        if let Some(provider) = self.provider.as_deref_mut() {
            provider.set_frequency_scale(log_mix, max_frequency);
        }
        self.tiles.invalidate();
    }

    /// Split `total` bytes between the bitmap caches and the provider cache.
    /// Takes effect at the next aging pass.
    pub fn set_cache_max_size(&mut self, total: usize) {
        let (bitmap, provider) = split_cache_budget(total);
        debug_assert!(bitmap > 0 && provider > 0, "cache budget of {total} bytes is too small");
        self.bitmap_cache_bytes = bitmap;
        self.provider_cache_bytes = provider;
    }

    /// Drop every cached tile of every style. The provider's own cache is kept.
    pub fn invalidate(&mut self) {
        self.tiles.invalidate();
    }

    /// Draw columns `[start, start + length)` of the timeline onto `canvas`,
    /// with column `start` landing at `origin`.
    ///
    /// A tile that fails to render is replaced by the provider's blank and the
    /// remaining tiles are still drawn; the first failure is returned after
    /// the caches have been aged.
    pub fn render(
        &mut self,
        canvas: &mut dyn Canvas,
        origin: Point,
        start: usize,
        length: usize,
        style: RenderingStyle,
    ) -> Result<(), RenderError> {
        if length == 0 {
            return Ok(());
        }
        let Some(provider) = self.provider.as_deref_mut() else {
            return Ok(());
        };

        let tile_width = self.tile_width as usize;
        let height = self.height as i32;
        let total_tiles = tile_count_for(self.total_columns, self.tile_width);
        let end = start + length;
        let clip = Rect::new(origin.x, origin.y, length as i32, height);
        let tile_x = |index: usize| origin.x + (index * tile_width) as i32 - start as i32;

        let cache = self.tiles.for_style(style);
        let mut needs_age = false;
        let mut first_error = None;

        let first_tile = start / tile_width;
        let last_tile = ((end - 1) / tile_width).min(total_tiles.saturating_sub(1));
        if first_tile < total_tiles {
            for index in first_tile..=last_tile {
                let dest = Point::new(tile_x(index), origin.y);
                let result = cache.get_with(index, |index, bmp| {
                    provider.render_tile(bmp, index * tile_width, style)
                });
                match result {
                    Ok((bmp, created)) => {
                        needs_age |= created;
                        canvas.blit(bmp, dest, clip);
                    }
                    Err(e) => {
                        log::warn!("tile {index} failed to render: {e}");
                        let area = Rect::new(dest.x, dest.y, tile_width as i32, height).intersect(&clip);
                        provider.render_blank(canvas, area, style);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        let audio_end = total_tiles * tile_width;
        if end > audio_end {
            let blank_start = start.max(audio_end);
            let x = origin.x + (blank_start - start) as i32;
            provider.render_blank(canvas, Rect::new(x, origin.y, (end - blank_start) as i32, height), style);
        }

        if needs_age {
            // A zero budget would flush; always keep room for one tile.
            let tile_bytes = cache.factory().block_size();
            cache.age(self.bitmap_cache_bytes.max(tile_bytes));
            provider.age_cache(self.provider_cache_bytes.max(1));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::provider::ProviderParams;
    use crate::canvas::surface::Bitmap;
    use crate::types::Rgb;
    use audiotile_core::audio::MemorySource;
    use audiotile_core::SourceError;
    use std::cell::{Cell, RefCell};

    const BLANK: Rgb = [1, 2, 3];

    #[derive(Default)]
    struct Recorder {
        rendered: RefCell<Vec<usize>>,
        blanks: RefCell<Vec<Rect>>,
        fail_at: Cell<Option<usize>>,
        aged: RefCell<Vec<usize>>,
    }

    /// Paints every column with a color derived from its absolute index.
    struct RecordingProvider {
        params: ProviderParams,
        recorder: Rc<Recorder>,
    }

    fn column_color(x: usize) -> Rgb {
        [(x % 251) as u8, (x / 251) as u8, 200]
    }

    impl BitmapProvider for RecordingProvider {
        fn params(&self) -> &ProviderParams {
            &self.params
        }

        fn params_mut(&mut self) -> &mut ProviderParams {
            &mut self.params
        }

        fn render_tile(
            &mut self,
            bmp: &mut Bitmap,
            start_pixel: usize,
            _style: RenderingStyle,
        ) -> Result<(), RenderError> {
            if self.recorder.fail_at.get() == Some(start_pixel) {
                return Err(SourceError::Read {
                    start: 0,
                    count: 0,
                    reason: "scripted failure".into(),
                }
                .into());
            }
            self.recorder.rendered.borrow_mut().push(start_pixel);
            for x in 0..bmp.width {
                bmp.draw_vline(x, 0, bmp.height as i32, column_color(start_pixel + x as usize));
            }
            Ok(())
        }

        fn render_blank(&self, canvas: &mut dyn Canvas, rect: Rect, _style: RenderingStyle) {
            self.recorder.blanks.borrow_mut().push(rect);
            canvas.fill_rect(rect, BLANK);
        }

        fn age_cache(&mut self, max_bytes: usize) {
            self.recorder.aged.borrow_mut().push(max_bytes);
        }
    }

    fn recording_provider() -> (Box<dyn BitmapProvider>, Rc<Recorder>) {
        let recorder = Rc::new(Recorder::default());
        let provider: Box<dyn BitmapProvider> = Box::new(RecordingProvider {
            params: ProviderParams::default(),
            recorder: recorder.clone(),
        });
        (provider, recorder)
    }

    /// 1000 samples at 10 samples per pixel: 100 columns in 4 tiles of 32.
    fn setup() -> (AudioRenderer, Rc<Recorder>) {
        let mut renderer = AudioRenderer::new(&RenderConfig::default());
        let (provider, recorder) = recording_provider();
        renderer.set_provider(Some(provider));
        renderer.set_height(8);
        renderer.set_samples_per_pixel(10.0);
        renderer.set_source(Some(Rc::new(MemorySource::from_i16(vec![0; 1000], 8000, 1))));
        (renderer, recorder)
    }

    #[test]
    fn test_geometry() {
        let (renderer, _) = setup();
        assert_eq!(renderer.total_columns(), 100);
        assert_eq!(renderer.tile_count(), 4);
        assert_eq!(renderer.bitmap_cache(RenderingStyle::Normal).len(), 256);
    }

    #[test]
    fn test_render_touches_covering_tiles() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(64, 8);

        renderer.render(&mut canvas, Point::new(0, 0), 0, 64, RenderingStyle::Normal).unwrap();
        assert_eq!(*recorder.rendered.borrow(), vec![0, 32]);
        assert!(recorder.blanks.borrow().is_empty());
        assert_eq!(canvas.pixel(40, 3), column_color(40));
    }

    #[test]
    fn test_second_render_hits_cache() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(64, 8);

        renderer.render(&mut canvas, Point::new(0, 0), 0, 64, RenderingStyle::Normal).unwrap();
        renderer.render(&mut canvas, Point::new(0, 0), 0, 64, RenderingStyle::Normal).unwrap();
        assert_eq!(recorder.rendered.borrow().len(), 2);
        assert_eq!(recorder.aged.borrow().len(), 1, "aging only follows new tiles");
    }

    #[test]
    fn test_styles_have_separate_caches() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(32, 8);

        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Selected).unwrap();
        assert_eq!(*recorder.rendered.borrow(), vec![0, 0]);
    }

    #[test]
    fn test_blank_past_end() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(40, 8);

        renderer.render(&mut canvas, Point::new(0, 0), 120, 40, RenderingStyle::Normal).unwrap();
        assert_eq!(*recorder.rendered.borrow(), vec![96]);
        assert_eq!(*recorder.blanks.borrow(), vec![Rect::new(8, 0, 32, 8)]);
        assert_eq!(canvas.pixel(7, 0), column_color(127));
        assert_eq!(canvas.pixel(8, 0), BLANK);
    }

    #[test]
    fn test_range_entirely_past_end_never_produces() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(10, 8);

        renderer.render(&mut canvas, Point::new(0, 0), 500, 10, RenderingStyle::Normal).unwrap();
        assert!(recorder.rendered.borrow().is_empty());
        assert_eq!(*recorder.blanks.borrow(), vec![Rect::new(0, 0, 10, 8)]);
        assert_eq!(renderer.bitmap_cache(RenderingStyle::Normal).live_blocks(), 0);
    }

    #[test]
    fn test_partial_range_matches_clipped_full_render() {
        let (mut renderer, _) = setup();
        let mut full = Bitmap::new(128, 8);
        renderer.render(&mut full, Point::new(0, 0), 0, 128, RenderingStyle::Normal).unwrap();

        for (start, length) in [(32, 32), (40, 50), (0, 1), (95, 33)] {
            let mut part = Bitmap::new(length as u32, 8);
            renderer
                .render(&mut part, Point::new(0, 0), start, length, RenderingStyle::Normal)
                .unwrap();
            assert_eq!(part, full.crop(Rect::new(start as i32, 0, length as i32, 8)), "range {start}+{length}");
        }
    }

    #[test]
    fn test_render_respects_origin_and_clip() {
        let (mut renderer, _) = setup();
        let mut canvas = Bitmap::new(20, 12);
        canvas.fill([9, 9, 9]);

        renderer.render(&mut canvas, Point::new(5, 2), 30, 10, RenderingStyle::Normal).unwrap();
        assert_eq!(canvas.pixel(4, 4), [9, 9, 9]);
        assert_eq!(canvas.pixel(5, 2), column_color(30));
        assert_eq!(canvas.pixel(14, 9), column_color(39));
        assert_eq!(canvas.pixel(15, 4), [9, 9, 9]);
        assert_eq!(canvas.pixel(6, 10), [9, 9, 9], "below the tile height");
    }

    #[test]
    fn test_zero_length_is_noop() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(4, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 0, RenderingStyle::Normal).unwrap();
        assert!(recorder.rendered.borrow().is_empty());
        assert!(recorder.blanks.borrow().is_empty());
    }

    #[test]
    fn test_zoom_change_invalidates_tiles() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(32, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();

        renderer.set_samples_per_pixel(10.0);
        assert_eq!(renderer.bitmap_cache(RenderingStyle::Normal).live_blocks(), 1, "unchanged zoom is a no-op");

        renderer.set_samples_per_pixel(5.0);
        assert_eq!(renderer.total_columns(), 200);
        assert_eq!(renderer.bitmap_cache(RenderingStyle::Normal).live_blocks(), 0);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        assert_eq!(recorder.rendered.borrow().len(), 2);
    }

    #[test]
    fn test_height_and_scale_changes_invalidate() {
        let (mut renderer, _) = setup();
        let mut canvas = Bitmap::new(32, 16);
        let normal = RenderingStyle::Normal;

        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, normal).unwrap();
        renderer.set_height(8);
        renderer.set_amplitude_scale(1.0);
        assert_eq!(renderer.bitmap_cache(normal).live_blocks(), 1);

        renderer.set_amplitude_scale(2.0);
        assert_eq!(renderer.bitmap_cache(normal).live_blocks(), 0);

        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, normal).unwrap();
        renderer.set_height(16);
        assert_eq!(renderer.bitmap_cache(normal).live_blocks(), 0);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, normal).unwrap();
        assert_eq!(canvas.pixel(0, 15), column_color(0));
    }

    #[test]
    fn test_invalidate_forces_rerender() {
        let (mut renderer, recorder) = setup();
        let mut canvas = Bitmap::new(32, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        renderer.invalidate();
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        assert_eq!(*recorder.rendered.borrow(), vec![0, 0]);
    }

    #[test]
    fn test_failed_tile_is_blanked_and_not_cached() {
        let (mut renderer, recorder) = setup();
        recorder.fail_at.set(Some(32));
        let mut canvas = Bitmap::new(96, 8);

        let result = renderer.render(&mut canvas, Point::new(0, 0), 0, 96, RenderingStyle::Normal);
        assert!(matches!(result, Err(RenderError::Source(SourceError::Read { .. }))));
        assert_eq!(*recorder.rendered.borrow(), vec![0, 64], "later tiles still render");
        assert_eq!(*recorder.blanks.borrow(), vec![Rect::new(32, 0, 32, 8)]);
        assert_eq!(canvas.pixel(40, 0), BLANK);
        assert!(!renderer.bitmap_cache(RenderingStyle::Normal).contains(1));

        recorder.fail_at.set(None);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 96, RenderingStyle::Normal).unwrap();
        assert_eq!(*recorder.rendered.borrow(), vec![0, 64, 32]);
        assert_eq!(canvas.pixel(40, 0), column_color(40));
    }

    #[test]
    fn test_cache_budgets() {
        let (mut renderer, recorder) = setup();
        assert_eq!(renderer.cache_budgets(), (4 << 20, 16 << 20));

        renderer.set_cache_max_size(8 << 20);
        assert_eq!(renderer.cache_budgets(), (1 << 20, 4 << 20));

        let mut canvas = Bitmap::new(32, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        assert_eq!(*recorder.aged.borrow(), vec![4 << 20]);
    }

    #[test]
    fn test_tiny_budget_keeps_fresh_tiles() {
        let mut renderer = AudioRenderer::new(&RenderConfig {
            bitmap_cache_bytes: 1,
            provider_cache_bytes: 1,
            ..RenderConfig::default()
        });
        let (provider, recorder) = recording_provider();
        renderer.set_provider(Some(provider));
        renderer.set_height(8);
        renderer.set_samples_per_pixel(10.0);
        renderer.set_source(Some(Rc::new(MemorySource::from_i16(vec![0; 1000], 8000, 1))));

        let mut canvas = Bitmap::new(64, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 64, RenderingStyle::Normal).unwrap();
        assert_eq!(renderer.bitmap_cache(RenderingStyle::Normal).live_blocks(), 2);
        assert_eq!(*recorder.aged.borrow(), vec![1]);

        renderer.render(&mut canvas, Point::new(0, 0), 0, 64, RenderingStyle::Normal).unwrap();
        assert_eq!(recorder.rendered.borrow().len(), 2, "second paint is served from the cache");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cache budgets must be non-zero")]
    fn test_zero_budget_is_rejected() {
        let _ = AudioRenderer::new(&RenderConfig {
            bitmap_cache_bytes: 0,
            ..RenderConfig::default()
        });
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "too small")]
    fn test_cache_max_size_below_split_is_rejected() {
        let (mut renderer, _) = setup();
        renderer.set_cache_max_size(7);
    }

    #[test]
    fn test_set_provider_forwards_state_and_returns_old() {
        let (mut renderer, _) = setup();
        renderer.set_amplitude_scale(3.0);
        let (next, next_recorder) = recording_provider();

        let old = renderer.set_provider(Some(next));
        assert!(old.is_some_and(|p| p.params().samples_per_pixel == 10.0));

        let active = renderer.provider().unwrap();
        assert!(active.params().source.is_some());
        assert_eq!(active.params().samples_per_pixel, 10.0);
        assert_eq!(active.params().amplitude_scale, 3.0);

        let mut canvas = Bitmap::new(32, 8);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 32, RenderingStyle::Normal).unwrap();
        assert_eq!(*next_recorder.rendered.borrow(), vec![0]);
    }

    #[test]
    fn test_without_provider_nothing_is_drawn() {
        let mut renderer = AudioRenderer::new(&RenderConfig::default());
        renderer.set_height(8);
        let mut canvas = Bitmap::new(8, 8);
        canvas.fill([9, 9, 9]);
        renderer.render(&mut canvas, Point::new(0, 0), 0, 8, RenderingStyle::Normal).unwrap();
        assert!(canvas.pixels.iter().all(|&b| b == 9));
    }
}
