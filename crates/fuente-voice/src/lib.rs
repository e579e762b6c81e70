//! Fuente Voice - the SoundFont 2 voice kernel
//!
//! This crate renders one note of a SoundFont bank: it owns the playback
//! phase into a shared waveform, the volume and modulation envelopes, the
//! vibrato and modulation LFOs, and the modulator routes that map
//! controller motion onto generator destinations.
//!
//! The kernel sits below voice allocation and above bank parsing. Its
//! collaborators hand it a decoded [`Sample`], the merged [`GeneratorSet`]
//! of the selected zones, and a [`ModulatorParameterSet`]; in return it
//! produces one [`StereoValue`](fuente_core::StereoValue) per output sample.
//!
//! # Realtime contract
//!
//! A voice is owned and mutated by a single audio thread. After
//! construction, `update`, `render`, the controller entry points, and
//! `release` never allocate, lock, block, or fail; anything unplayable
//! becomes silence. Events arriving from other threads must be marshalled
//! onto the audio thread before they reach the voice.
//!
//! # Example
//!
//! ```rust
//! use fuente_voice::{GeneratorSet, ModulatorParameterSet, Sample, Voice};
//!
//! let sample = Sample {
//!     buffer: vec![0i16; 1024].into(),
//!     start: 0,
//!     end: 1023,
//!     start_loop: 8,
//!     end_loop: 1000,
//!     sample_rate: 48000,
//!     key: 60,
//!     correction: 0,
//! };
//!
//! let mut voice = Voice::new(
//!     0,
//!     48000.0,
//!     &sample,
//!     GeneratorSet::new(),
//!     &ModulatorParameterSet::default_set(),
//!     60,
//!     100,
//! )?;
//!
//! for _ in 0..256 {
//!     voice.update();
//!     let frame = voice.render();
//!     let _ = (frame.left, frame.right);
//! }
//! voice.release();
//! # Ok::<(), fuente_voice::VoiceError>(())
//! ```

pub mod error;
pub mod generator;
pub mod modulator;
pub mod sample;
pub mod voice;

// Re-export main types at crate root
pub use error::VoiceError;
pub use generator::{Generator, GeneratorSet, GENERATOR_COUNT};
pub use modulator::{
    ControllerSource, GeneralController, Modulator, ModulatorDescriptor, ModulatorParameterSet,
    SourceDirection, SourceOperator, SourcePolarity, SourceShape, TransformOperator,
};
pub use sample::{Sample, SampleMode};
pub use voice::{panned_volume, Voice};

// Conversions are part of the kernel's vocabulary; surface them here too.
pub use fuente_core::{conversion, StereoValue};
