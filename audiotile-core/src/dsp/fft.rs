use crate::audio::{AudioSource, SampleReader};
use crate::error::SourceError;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Sources sampled faster than this get proportionally longer windows so the
/// spectrum keeps the same frequency resolution per displayed band.
pub const REFERENCE_SAMPLE_RATE: f32 = 50_000.0;

/// Smallest and largest supported window size, as log2 of the sample count.
pub const MIN_WINDOW_LOG2: u32 = 2;
pub const MAX_WINDOW_LOG2: u32 = 20;

/// Window and stride actually used for a given source, after sample-rate
/// compensation of the requested ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub window_log2: u32,
    pub stride_log2: u32,
    /// How many doublings were added on top of the requested values.
    pub extra_log2: u32,
}

impl Resolution {
    /// Compensate the requested resolution for `sample_rate`.
    ///
    /// Rates up to 50 kHz keep the requested values; every halving needed to
    /// bring a faster rate under that threshold adds one to both exponents.
    pub fn for_sample_rate(window_log2: u32, stride_log2: u32, sample_rate: Option<u32>) -> Self {
        let mut extra_log2 = 0;
        if let Some(rate) = sample_rate {
            let mut mult = rate as f32 / REFERENCE_SAMPLE_RATE;
            while mult > 1.0 && window_log2 + extra_log2 < MAX_WINDOW_LOG2 {
                extra_log2 += 1;
                mult *= 0.5;
            }
        }
        Self {
            window_log2: window_log2 + extra_log2,
            stride_log2: stride_log2 + extra_log2,
            extra_log2,
        }
    }

    pub fn window_len(&self) -> usize {
        1 << self.window_log2
    }

    /// Frequency bins per derived block, excluding the Nyquist bin.
    pub fn bin_count(&self) -> usize {
        1 << (self.window_log2 - 1)
    }

    /// Number of derived blocks needed to cover `num_samples` frames.
    pub fn block_count(&self, num_samples: u64) -> usize {
        num_samples.div_ceil(1u64 << self.stride_log2) as usize
    }

    /// First sample frame covered by block `index`.
    pub fn block_start(&self, index: usize) -> u64 {
        (index as u64) << self.stride_log2
    }
}

/// FFT plan and scratch buffers for one window size.
///
/// Turns a window of audio into `log10(magnitude * scale + 1)` per frequency
/// bin. The `+ 1` keeps silence at exactly zero. Loud content can push values
/// past one; clamping is left to color mapping.
pub struct SpectrumDeriver {
    resolution: Resolution,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    /// FFT input; overwritten by every transform.
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    scale: f32,
}

impl SpectrumDeriver {
    pub fn new(resolution: Resolution) -> Self {
        let n = resolution.window_len();
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(n);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        // Unnormalized DFT: compensate for windows lengthened by sample-rate
        // scaling so the display doesn't depend on the source rate.
        let scale_fix = 1.0 / ((1u32 << resolution.extra_log2) as f32).sqrt();
        let scale = scale_fix * 9.0 / (2.0 * n as f32).sqrt();

        Self {
            resolution,
            fft,
            window: vec![0.0; n],
            input,
            spectrum,
            scratch,
            scale,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn bin_count(&self) -> usize {
        self.resolution.bin_count()
    }

    /// Switch to another stride. The window, and therefore the plan, must not change.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        debug_assert_eq!(resolution.window_log2, self.resolution.window_log2);
        debug_assert_eq!(resolution.extra_log2, self.resolution.extra_log2);
        self.resolution = resolution;
    }

    /// Transform `samples` (normalized to `[-1, 1)`, one window long) into
    /// `out`, which must hold `bin_count()` values.
    pub fn derive(&mut self, samples: &[f32], out: &mut [f32]) {
        self.window.copy_from_slice(samples);
        self.transform(out);
    }

    /// Read the window for block `index` from `source` and derive it into `out`.
    pub fn fill_block(
        &mut self,
        reader: &mut SampleReader,
        source: &dyn AudioSource,
        index: usize,
        out: &mut [f32],
    ) -> Result<(), SourceError> {
        reader.read_mono(source, self.resolution.block_start(index), &mut self.window)?;
        self.transform(out);
        Ok(())
    }

    fn transform(&mut self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.bin_count());

        self.input.copy_from_slice(&self.window);
        if let Err(e) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            log::error!("FFT failed: {e}");
            out.fill(0.0);
            return;
        }

        for (dst, c) in out.iter_mut().zip(self.spectrum.iter()) {
            *dst = (c.norm() * self.scale + 1.0).log10();
        }
    }
}
