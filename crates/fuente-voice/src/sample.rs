//! Waveform metadata a voice plays from.

use std::sync::Arc;

/// How playback treats the loop region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleMode {
    /// Play from start to end once.
    #[default]
    Unlooped,
    /// Cycle the loop region until the volume envelope finishes.
    Looped,
    /// Reserved mode; plays unlooped.
    Unused,
    /// Cycle the loop region while held, then play through to the end on
    /// release.
    LoopedWithRemainder,
}

impl SampleMode {
    /// Decodes the `sampleModes` generator amount. Reserved and unknown
    /// values play unlooped.
    pub fn from_raw(raw: i16) -> SampleMode {
        match raw {
            1 => SampleMode::Looped,
            2 => SampleMode::Unused,
            3 => SampleMode::LoopedWithRemainder,
            _ => SampleMode::Unlooped,
        }
    }
}

/// A bank sample: a shared immutable waveform plus its addressing and
/// tuning header.
///
/// The buffer is shared read-only across every voice of a bank and must
/// outlive them all. Addresses index frames in the buffer; the voice adds
/// its zone's offset generators on top.
#[derive(Clone, Debug)]
pub struct Sample {
    /// The 16-bit waveform data, shared across voices.
    pub buffer: Arc<[i16]>,
    /// First frame of the sample.
    pub start: u32,
    /// Last playable frame.
    pub end: u32,
    /// First frame of the loop region.
    pub start_loop: u32,
    /// One past the last frame of the loop region.
    pub end_loop: u32,
    /// Rate the waveform was recorded at, in frames per second.
    pub sample_rate: u32,
    /// Root key: the MIDI key the waveform plays back untransposed at.
    pub key: u8,
    /// Tuning correction in cents, applied on top of the root key.
    pub correction: i8,
}

/// The voice-local view of a sample after zone offsets and overrides.
#[derive(Clone, Debug)]
pub(crate) struct SampleInfo {
    pub buffer: Arc<[i16]>,
    pub start: u32,
    pub end: u32,
    pub start_loop: u32,
    pub end_loop: u32,
    pub mode: SampleMode,
    /// Effective root pitch in fractional key units.
    pub pitch: f64,
    pub sample_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_decoding() {
        assert_eq!(SampleMode::from_raw(0), SampleMode::Unlooped);
        assert_eq!(SampleMode::from_raw(1), SampleMode::Looped);
        assert_eq!(SampleMode::from_raw(2), SampleMode::Unused);
        assert_eq!(SampleMode::from_raw(3), SampleMode::LoopedWithRemainder);
        // Out-of-range values play unlooped.
        assert_eq!(SampleMode::from_raw(4), SampleMode::Unlooped);
        assert_eq!(SampleMode::from_raw(-1), SampleMode::Unlooped);
    }
}
