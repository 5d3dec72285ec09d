use super::AudioSource;
use crate::error::SourceError;

/// An [`AudioSource`] over PCM bytes already held in memory.
#[derive(Clone, Debug)]
pub struct MemorySource {
    data: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u16,
}

impl MemorySource {
    /// Wrap interleaved little-endian PCM bytes. Trailing bytes that don't
    /// make up a whole frame are ignored.
    pub fn from_bytes(data: Vec<u8>, sample_rate: u32, channels: u16, bytes_per_sample: u16) -> Self {
        Self {
            data,
            sample_rate,
            channels: channels.max(1),
            bytes_per_sample,
        }
    }

    /// Wrap interleaved 16-bit samples.
    pub fn from_i16(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_bytes(data, sample_rate, channels, 2)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl AudioSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn bytes_per_sample(&self) -> u16 {
        self.bytes_per_sample
    }

    fn num_samples(&self) -> u64 {
        let frame = self.bytes_per_frame();
        if frame == 0 {
            return 0;
        }
        (self.data.len() / frame) as u64
    }

    fn read(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), SourceError> {
        let frame = self.bytes_per_frame();
        let needed = count * frame;
        if buf.len() < needed {
            return Err(SourceError::BufferTooSmall { needed, got: buf.len() });
        }
        if start + count as u64 > self.num_samples() {
            return Err(SourceError::Read {
                start,
                count,
                reason: format!("stream holds only {} samples", self.num_samples()),
            });
        }
        let offset = start as usize * frame;
        buf[..needed].copy_from_slice(&self.data[offset..offset + needed]);
        Ok(())
    }
}
