use super::AudioSource;
use crate::error::SourceError;

/// Decode one little-endian PCM sample to `[-1, 1)`.
///
/// 8-bit audio is unsigned, wider formats are signed.
pub fn decode_sample(bytes: &[u8]) -> Result<f32, SourceError> {
    let value = match *bytes {
        [b] => (b as f32 - 128.0) / 128.0,
        [b0, b1] => i16::from_le_bytes([b0, b1]) as f32 / 32768.0,
        [b0, b1, b2] => {
            // Sign-extend the 24-bit value through the top byte of an i32.
            (i32::from_le_bytes([0, b0, b1, b2]) >> 8) as f32 / 8_388_608.0
        }
        [b0, b1, b2, b3] => i32::from_le_bytes([b0, b1, b2, b3]) as f32 / 2_147_483_648.0,
        _ => {
            return Err(SourceError::UnsupportedFormat {
                bytes_per_sample: bytes.len() as u16,
            })
        }
    };
    Ok(value)
}

/// Pulls normalized mono audio out of an [`AudioSource`].
///
/// Owns the raw byte scratch buffer so repeated reads don't allocate. Frames
/// outside `[0, num_samples)` read as silence, and multi-channel frames are
/// averaged down to one channel.
#[derive(Default)]
pub struct SampleReader {
    bytes: Vec<u8>,
}

impl SampleReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill `out` with the frames `[start, start + out.len())`.
    pub fn read_mono(
        &mut self,
        source: &dyn AudioSource,
        start: u64,
        out: &mut [f32],
    ) -> Result<(), SourceError> {
        let total = source.num_samples();
        let available = total.saturating_sub(start).min(out.len() as u64) as usize;
        out[available..].fill(0.0);
        if available == 0 {
            return Ok(());
        }

        let width = source.bytes_per_sample() as usize;
        let channels = source.channels().max(1) as usize;
        let frame = width * channels;
        if !(1..=4).contains(&width) {
            return Err(SourceError::UnsupportedFormat {
                bytes_per_sample: width as u16,
            });
        }

        self.bytes.resize(available * frame, 0);
        source.read(&mut self.bytes, start, available)?;

        let norm = 1.0 / channels as f32;
        for (dst, frame_bytes) in out.iter_mut().zip(self.bytes.chunks_exact(frame)) {
            let mut sum = 0.0;
            for sample in frame_bytes.chunks_exact(width) {
                sum += decode_sample(sample)?;
            }
            *dst = sum * norm;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemorySource;

    #[test]
    fn test_decode_widths() {
        assert_eq!(decode_sample(&[0x80]).unwrap(), 0.0);
        assert_eq!(decode_sample(&[0x00]).unwrap(), -1.0);
        assert_eq!(decode_sample(&(-16384i16).to_le_bytes()).unwrap(), -0.5);
        assert_eq!(decode_sample(&[0x00, 0x00, 0x40]).unwrap(), 0.5);
        assert_eq!(decode_sample(&[0x00, 0x00, 0x80]).unwrap(), -1.0);
        assert_eq!(decode_sample(&i32::MIN.to_le_bytes()).unwrap(), -1.0);
        assert!(decode_sample(&[0; 5]).is_err());
    }

    #[test]
    fn test_read_past_end_is_silent() {
        let source = MemorySource::from_i16(vec![16384; 10], 8000, 1);
        let mut reader = SampleReader::new();
        let mut out = vec![1.0f32; 8];

        reader.read_mono(&source, 6, &mut out).unwrap();
        assert_eq!(&out[..4], &[0.5; 4]);
        assert_eq!(&out[4..], &[0.0; 4]);

        reader.read_mono(&source, 100, &mut out).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_read_downmixes_channels() {
        // Interleaved stereo: left full positive half, right silent.
        let samples = vec![16384, 0, 16384, 0];
        let source = MemorySource::from_i16(samples, 8000, 2);
        let mut reader = SampleReader::new();
        let mut out = vec![0.0f32; 2];

        reader.read_mono(&source, 0, &mut out).unwrap();
        assert_eq!(out, vec![0.25, 0.25]);
    }
}
