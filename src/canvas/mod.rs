pub mod colors;
pub mod provider;
pub mod spectrogram_renderer;
pub mod style;
pub mod surface;
pub mod tile_cache;
pub mod waveform_renderer;
