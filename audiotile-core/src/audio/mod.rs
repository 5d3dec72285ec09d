//! The PCM sample source the renderers pull audio from.

mod memory;
mod pcm;

pub use memory::MemorySource;
pub use pcm::{decode_sample, SampleReader};

use crate::error::SourceError;

/// Read-only access to interleaved little-endian PCM audio.
///
/// Implementations are called synchronously from the rendering thread; a slow
/// source stalls rendering directly.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    fn bytes_per_sample(&self) -> u16;

    /// Number of sample frames (one sample per channel) in the stream.
    fn num_samples(&self) -> u64;

    /// Copy `count` frames starting at frame `start` into `buf`.
    ///
    /// `buf` holds at least `count * channels * bytes_per_sample` bytes and
    /// the range lies within `[0, num_samples)`.
    fn read(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), SourceError>;

    fn bytes_per_frame(&self) -> usize {
        self.channels() as usize * self.bytes_per_sample() as usize
    }

    fn duration_ms(&self) -> f64 {
        if self.sample_rate() == 0 {
            return 0.0;
        }
        self.num_samples() as f64 * 1000.0 / self.sample_rate() as f64
    }
}
