//! Error types for voice construction.

use thiserror::Error;

/// Errors detected while building a voice, before it reaches the audio
/// thread.
///
/// The rendering path itself has no failure mode: conditions that arise at
/// runtime (degenerate loop points, out-of-range pitches) produce silence
/// instead of errors.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// A sample address left the waveform buffer after the zone's offset
    /// generators were applied.
    #[error("sample {name} address {address} is outside the {buffer_len}-frame buffer")]
    AddressOutOfRange {
        /// Which address went out of range (start, end, loop start, loop end).
        name: &'static str,
        /// The offset-adjusted address; may be negative.
        address: i64,
        /// Length of the waveform buffer in frames.
        buffer_len: usize,
    },
}
