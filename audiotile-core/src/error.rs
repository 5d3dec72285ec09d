use thiserror::Error;

/// Failures raised while pulling PCM data out of an [`AudioSource`](crate::audio::AudioSource).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The underlying device or file failed to deliver the requested range.
    #[error("failed to read {count} samples at {start}: {reason}")]
    Read {
        start: u64,
        count: usize,
        reason: String,
    },

    /// Sample width the PCM decoder does not understand.
    #[error("unsupported sample width: {bytes_per_sample} bytes")]
    UnsupportedFormat { bytes_per_sample: u16 },

    /// Caller handed in a buffer shorter than `count * channels * bytes_per_sample`.
    #[error("buffer of {got} bytes cannot hold {needed} bytes of audio")]
    BufferTooSmall { needed: usize, got: usize },
}
