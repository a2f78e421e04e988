//! Assembly of captured PCM chunks into a single audio blob.

use crate::error::CaptureError;
use hound::WavWriter;
use std::io::Cursor;
use std::time::Duration;

/// MIME type of every assembled blob.
pub const WAV_MIME: &str = "audio/wav";

/// A finished recording: one self-contained WAV file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    bytes: Vec<u8>,
    sample_rate: u32,
    sample_count: usize,
}

impl AudioBlob {
    /// Concatenates chunks in arrival order into a mono 16-bit WAV.
    ///
    /// An empty chunk list still yields a valid, zero-length WAV.
    ///
    /// # Errors
    /// - If the WAV header or samples cannot be written
    pub fn from_chunks(chunks: &[Vec<i16>], sample_rate: u32) -> Result<Self, CaptureError> {
        let wav_spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut bytes = Vec::new();
        let mut sample_count = 0;
        {
            let mut writer = WavWriter::new(Cursor::new(&mut bytes), wav_spec)
                .map_err(|e| CaptureError::Assembly(e.to_string()))?;
            for &sample in chunks.iter().flatten() {
                writer
                    .write_sample(sample)
                    .map_err(|e| CaptureError::Assembly(e.to_string()))?;
                sample_count += 1;
            }
            writer
                .finalize()
                .map_err(|e| CaptureError::Assembly(e.to_string()))?;
        }

        tracing::debug!(
            "Assembled {} chunks into {} samples ({} bytes)",
            chunks.len(),
            sample_count,
            bytes.len()
        );

        Ok(Self {
            bytes,
            sample_rate,
            sample_count,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        WAV_MIME
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// True when nothing was captured before the recording was stopped.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_are_concatenated_in_order() {
        let blob = AudioBlob::from_chunks(&[vec![1, 2], vec![3]], 16000).unwrap();
        assert_eq!(blob.sample_count(), 3);
        assert_eq!(blob.mime(), "audio/wav");

        let mut reader = hound::WavReader::new(Cursor::new(blob.bytes())).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3]);
        assert_eq!(reader.spec().channels, 1);
    }

    #[test]
    fn test_no_chunks_yields_empty_but_valid_wav() {
        let blob = AudioBlob::from_chunks(&[], 48000).unwrap();
        assert!(blob.is_empty());
        assert_eq!(blob.duration(), Duration::ZERO);
        assert!(hound::WavReader::new(Cursor::new(blob.bytes())).is_ok());
    }

    #[test]
    fn test_duration_follows_sample_rate() {
        let blob = AudioBlob::from_chunks(&[vec![0; 8000]], 16000).unwrap();
        assert_eq!(blob.duration(), Duration::from_millis(500));
    }
}
