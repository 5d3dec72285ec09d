//! Data core for tiled audio rendering: the macroblock cache, PCM access and
//! spectrum derivation. Nothing in here draws.

pub mod audio;
pub mod block_cache;
pub mod dsp;
pub mod error;

pub use audio::{AudioSource, MemorySource, SampleReader};
pub use block_cache::{BlockCache, BlockFactory};
pub use dsp::fft::{Resolution, SpectrumDeriver};
pub use error::SourceError;
