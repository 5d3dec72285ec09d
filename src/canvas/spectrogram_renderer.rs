use crate::canvas::colors::ColorScheme;
use crate::canvas::provider::{BitmapProvider, ProviderParams};
use crate::canvas::style::RenderingStyle;
use crate::canvas::surface::{Bitmap, Canvas};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::types::Rect;
use audiotile_core::audio::{AudioSource, SampleReader};
use audiotile_core::block_cache::{BlockCache, BlockFactory};
use audiotile_core::dsp::fft::{Resolution, SpectrumDeriver, MAX_WINDOW_LOG2, MIN_WINDOW_LOG2};
use audiotile_core::SourceError;
use std::rc::Rc;

/// Derived blocks per macroblock, as log2.
pub const CACHE_MACROBLOCK_EXPONENT: u32 = 10;

/// Produces one power vector per derived block index.
pub struct SpectrumBlockFactory {
    source: Option<Rc<dyn AudioSource>>,
    reader: SampleReader,
    deriver: SpectrumDeriver,
}

impl SpectrumBlockFactory {
    pub fn new(source: Option<Rc<dyn AudioSource>>, resolution: Resolution) -> Self {
        Self {
            source,
            reader: SampleReader::new(),
            deriver: SpectrumDeriver::new(resolution),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.deriver.resolution()
    }

    /// Derive block `index` into `out`. Without a source the block is silent.
    pub fn fill(&mut self, index: usize, out: &mut [f32]) -> Result<(), SourceError> {
        match &self.source {
            Some(source) => self.deriver.fill_block(&mut self.reader, source.as_ref(), index, out),
            None => {
                out.fill(0.0);
                Ok(())
            }
        }
    }
}

impl BlockFactory for SpectrumBlockFactory {
    type Block = Vec<f32>;
    type Error = SourceError;

    fn produce_block(&mut self, index: usize) -> Result<Vec<f32>, SourceError> {
        let mut block = vec![0.0; self.deriver.bin_count()];
        self.fill(index, &mut block)?;
        log::trace!("spectrum block {index} derived");
        Ok(block)
    }

    fn block_size(&self) -> usize {
        std::mem::size_of::<Vec<f32>>() + self.deriver.bin_count() * std::mem::size_of::<f32>()
    }
}

pub type SpectrumCache = BlockCache<SpectrumBlockFactory>;

/// Fractional bin boundaries for each of `height` rows, bottom row first.
///
/// Returns `height + 1` edges from bin 1 (DC is not shown) up to the bin of
/// `max_frequency`. Each edge blends the linear and logarithmic curves by `log_mix`.
pub fn band_edges(
    bin_count: usize,
    sample_rate: f32,
    max_frequency: Option<f32>,
    log_mix: f32,
    height: u32,
) -> Vec<f32> {
    let min_band = 1.0f32;
    let nbins = bin_count as f32;
    let max_band = match max_frequency {
        Some(freq) if sample_rate > 0.0 => (nbins * freq / (sample_rate * 0.5)).round().clamp(min_band + 1.0, nbins),
        _ => nbins,
    };
    let scale_log = (max_band / min_band).ln();

    (0..=height)
        .map(|i| {
            if i == 0 {
                return min_band;
            }
            if i == height {
                return max_band;
            }
            let pos = i as f32 / height as f32;
            let lin = min_band + pos * (max_band - min_band);
            let log = min_band * (pos * scale_log).exp();
            lin + log_mix * (log - lin)
        })
        .collect()
}

/// Value of the band `[prv, nxt)` centered on `cur`: interpolated when the band
/// is narrower than two bins, otherwise the loudest bin inside it.
fn sample_band(power: &[f32], prv: f32, cur: f32, nxt: f32) -> f32 {
    let last = power.len() - 1;
    if nxt - prv < 2.0 {
        let bin0 = (cur.floor() as usize).min(last);
        let bin1 = (bin0 + 1).min(last);
        let frac = cur - bin0 as f32;
        power[bin0] + frac * (power[bin1] - power[bin0])
    } else {
        let inf = (((prv + cur) * 0.5).floor() as usize).min(last - 1);
        let sup = (((cur + nxt) * 0.5).floor() as usize).min(last).max(inf + 1);
        power[inf..sup].iter().copied().fold(f32::MIN, f32::max)
    }
}

/// Spectrum backend. Caches one power vector per derived block, independent of zoom.
pub struct SpectrogramRenderer {
    params: ProviderParams,
    /// Requested resolution, before sample-rate compensation.
    window_log2: u32,
    stride_log2: u32,
    log_mix: f32,
    max_frequency: Option<f32>,
    cache: SpectrumCache,
    palettes: [ColorScheme; RenderingStyle::COUNT],
}

impl SpectrogramRenderer {
    pub fn new(window_log2: u32, stride_log2: u32) -> Self {
        debug_assert!((MIN_WINDOW_LOG2..=MAX_WINDOW_LOG2).contains(&window_log2));
        debug_assert!(stride_log2 <= window_log2);
        let window_log2 = window_log2.clamp(MIN_WINDOW_LOG2, MAX_WINDOW_LOG2);
        let stride_log2 = stride_log2.min(window_log2);

        let resolution = Resolution::for_sample_rate(window_log2, stride_log2, None);
        Self {
            params: ProviderParams::default(),
            window_log2,
            stride_log2,
            log_mix: 0.0,
            max_frequency: None,
            cache: BlockCache::new(0, CACHE_MACROBLOCK_EXPONENT, SpectrumBlockFactory::new(None, resolution)),
            palettes: RenderingStyle::ALL.map(ColorScheme::spectrum),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        let mut renderer = Self::new(config.spectrum_window_log2, config.spectrum_stride_log2);
        renderer.set_frequency_scale(config.spectrum_log_mix, config.spectrum_max_frequency);
        renderer
    }

    /// Resolution in effect for the current source.
    pub fn resolution(&self) -> Resolution {
        self.cache.factory().resolution()
    }

    pub fn derived_cache(&self) -> &SpectrumCache {
        &self.cache
    }

    /// Replace the palette of `style`. Tiles already rendered must be invalidated by the caller.
    pub fn set_palette(&mut self, style: RenderingStyle, palette: ColorScheme) {
        self.palettes[style.index()] = palette;
    }

    fn compensated(&self, window_log2: u32, stride_log2: u32) -> Resolution {
        let sample_rate = self.params.source.as_ref().map(|s| s.sample_rate());
        Resolution::for_sample_rate(window_log2, stride_log2, sample_rate)
    }

    fn block_count_for(&self, resolution: Resolution) -> usize {
        self.params
            .source
            .as_ref()
            .map_or(0, |s| resolution.block_count(s.num_samples()))
    }

    /// Throw away every derived block and start over with a fresh transform plan.
    fn recreate_cache(&mut self) {
        let resolution = self.compensated(self.window_log2, self.stride_log2);
        let count = self.block_count_for(resolution);
        let factory = SpectrumBlockFactory::new(self.params.source.clone(), resolution);
        self.cache = BlockCache::new(count, CACHE_MACROBLOCK_EXPONENT, factory);
        log::debug!(
            "spectrum cache rebuilt: window 2^{}, stride 2^{}, {count} blocks",
            resolution.window_log2,
            resolution.stride_log2
        );
    }

    /// Derive block `index` of the current source into `out`, bypassing the cache.
    pub fn fill_block(&mut self, index: usize, out: &mut [f32]) -> Result<(), SourceError> {
        self.cache.factory_mut().fill(index, out)
    }
}

impl BitmapProvider for SpectrogramRenderer {
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
        style: RenderingStyle,
    ) -> Result<(), RenderError> {
        let palette = &self.palettes[style.index()];
        let silence = palette.map(0.0);
        let Some(source) = self.params.source.as_deref() else {
            bmp.fill(silence);
            return Ok(());
        };
        if bmp.height == 0 {
            return Ok(());
        }

        let resolution = self.cache.factory().resolution();
        let block_count = resolution.block_count(source.num_samples()).min(self.cache.len());
        let edges = band_edges(
            resolution.bin_count(),
            source.sample_rate() as f32,
            self.max_frequency,
            self.log_mix,
            bmp.height,
        );
        let scale = self.params.amplitude_scale;
        let bottom = bmp.height - 1;

        for x in 0..bmp.width {
            let sample = self.params.column_start(start_pixel + x as usize);
            let index = (sample >> resolution.stride_log2) as usize;
            if index >= block_count {
                bmp.draw_vline(x, 0, bottom as i32, silence);
                continue;
            }

            let power = self.cache.get(index)?;
            for y in 0..bmp.height {
                let cur = edges[y as usize];
                let prv = edges[(y as usize).saturating_sub(1)];
                let nxt = edges[y as usize + 1];
                let value = sample_band(power, prv, cur, nxt);
                bmp.set_pixel(x, bottom - y, palette.map(value * scale));
            }
        }
        log::trace!("spectrum tile at column {start_pixel} rendered");
        Ok(())
    }

    fn render_blank(&self, canvas: &mut dyn Canvas, rect: Rect, style: RenderingStyle) {
        canvas.fill_rect(rect, self.palettes[style.index()].map(0.0));
    }

    fn on_source_changed(&mut self) {
        self.recreate_cache();
    }

    fn age_cache(&mut self, max_bytes: usize) {
        self.cache.age(max_bytes);
    }

    fn cache_live_bytes(&self) -> usize {
        self.cache.live_bytes()
    }

    /// Change window and stride, both as log2 of a sample count.
    ///
    /// A new window discards every derived block. A new stride alone keeps the
    /// blocks whose window start still falls on the new stride grid.
    fn set_resolution(&mut self, window_log2: u32, stride_log2: u32) {
        debug_assert!((MIN_WINDOW_LOG2..=MAX_WINDOW_LOG2).contains(&window_log2));
        debug_assert!(stride_log2 <= window_log2);
        let window_log2 = window_log2.clamp(MIN_WINDOW_LOG2, MAX_WINDOW_LOG2);
        let stride_log2 = stride_log2.min(window_log2);

        if window_log2 != self.window_log2 {
            self.window_log2 = window_log2;
            self.stride_log2 = stride_log2;
            self.recreate_cache();
            return;
        }
        if stride_log2 == self.stride_log2 {
            return;
        }

        let old = self.resolution();
        self.stride_log2 = stride_log2;
        let new = self.compensated(window_log2, stride_log2);
        let count = self.block_count_for(new);
        let mask = (1u64 << new.stride_log2) - 1;
        let kept = self.cache.remap(count, |i| {
            let start = old.block_start(i);
            (start & mask == 0).then(|| (start >> new.stride_log2) as usize)
        });
        self.cache.factory_mut().deriver.set_resolution(new);
        log::debug!("spectrum stride now 2^{}, {kept} derived blocks kept", new.stride_log2);
    }

    fn set_frequency_scale(&mut self, log_mix: f32, max_frequency: Option<f32>) {
        self.log_mix = log_mix.clamp(0.0, 1.0);
        self.max_frequency = max_frequency;
    }
}
