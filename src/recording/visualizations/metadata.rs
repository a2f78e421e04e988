//! Recorded magnitude sequence that lets a session's waveform be rebuilt.

/// Append-only, ordered magnitudes sampled during a live recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleMetadata {
    magnitudes: Vec<f32>,
}

impl SampleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, magnitude: f32) {
        self.magnitudes.push(magnitude);
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.magnitudes.iter().copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.magnitudes
    }
}

impl FromIterator<f32> for SampleMetadata {
    fn from_iter<I: IntoIterator<Item = f32>>(iter: I) -> Self {
        Self {
            magnitudes: iter.into_iter().collect(),
        }
    }
}
