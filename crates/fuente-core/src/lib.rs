//! Fuente Core - DSP primitives for SoundFont voice synthesis
//!
//! This crate provides the building blocks the voice kernel is assembled
//! from:
//!
//! - [`conversion`] - the logarithmic unit maps SoundFont banks are written
//!   in (centibels, timecents, absolute cents), backed by process-wide
//!   lookup tables
//! - [`FixedPoint`] - 32.32 fixed-point playback phase with sub-sample
//!   resolution that does not drift over long notes
//! - [`StereoValue`] - pairwise arithmetic over a left/right amplitude pair
//! - [`Envelope`] - six-section delay/attack/hold/decay/sustain/release
//!   generator
//! - [`Lfo`] - triangle low-frequency oscillator with a delayed start
//!
//! All transcendental math goes through [`libm`] so table contents and
//! rendered output are bit-identical across platforms and toolchains.
//!
//! # Example
//!
//! ```rust
//! use fuente_core::{conversion, Envelope, EnvelopeSection};
//!
//! // 0 centibels of attenuation leaves the signal untouched.
//! assert_eq!(conversion::centibel_to_ratio(0.0), 1.0);
//!
//! // A volume envelope with a 600ms decay (timecents encode seconds
//! // as 1200*log2(s)).
//! let mut env = Envelope::new(48000.0);
//! env.set_parameter(EnvelopeSection::Decay, -884.0);
//! let level = env.advance();
//! ```

pub mod conversion;
pub mod envelope;
pub mod fixed;
pub mod lfo;
pub mod stereo;

// Re-export main types at crate root
pub use envelope::{Envelope, EnvelopeSection};
pub use fixed::FixedPoint;
pub use lfo::Lfo;
pub use stereo::StereoValue;
