//! The voice kernel: one sounding note.
//!
//! A voice reads a stored waveform at a pitch-dependent rate and shapes the
//! result with two envelopes, two LFOs, and whatever modulators its zone
//! installed. The host drives it with interleaved `update`/`render` calls,
//! one per output sample, plus controller events delivered between blocks.
//!
//! Everything a voice needs is allocated at construction time; `update` and
//! `render` neither allocate nor fail. Runtime trouble (running off the
//! sample, degenerate loop points) is expressed by finishing the volume
//! envelope, after which the voice renders silence and reports itself as no
//! longer sounding.

use std::f64::consts::PI;
use std::sync::Arc;

use fuente_core::conversion::{centibel_to_ratio, key_to_hz};
use fuente_core::{Envelope, EnvelopeSection, FixedPoint, Lfo, StereoValue};

use crate::error::VoiceError;
use crate::generator::{Generator, GeneratorSet, GENERATOR_COUNT};
use crate::modulator::{GeneralController, Modulator, ModulatorParameterSet};
use crate::sample::{Sample, SampleInfo, SampleMode};

/// Generators recomputed once at construction, after the modulators have
/// been seeded with the note's velocity, key, and wheel sensitivity.
const INIT_GENERATORS: [Generator; 18] = [
    Generator::Pan,
    Generator::DelayModLfo,
    Generator::FreqModLfo,
    Generator::DelayVibLfo,
    Generator::FreqVibLfo,
    Generator::DelayModEnv,
    Generator::AttackModEnv,
    Generator::HoldModEnv,
    Generator::DecayModEnv,
    Generator::SustainModEnv,
    Generator::ReleaseModEnv,
    Generator::DelayVolEnv,
    Generator::AttackVolEnv,
    Generator::HoldVolEnv,
    Generator::DecayVolEnv,
    Generator::SustainVolEnv,
    Generator::ReleaseVolEnv,
    Generator::CoarseTune,
];

/// Equal-power stereo placement for a pan amount in tenths of a percent
/// from center, clamped to the full-left/full-right range.
pub fn panned_volume(pan: f64) -> StereoValue {
    if pan <= -500.0 {
        StereoValue::new(1.0, 0.0)
    } else if pan >= 500.0 {
        StereoValue::new(0.0, 1.0)
    } else {
        const F: f64 = PI / 2000.0;
        StereoValue::new(libm::sin(F * (-pan + 500.0)), libm::sin(F * (pan + 500.0)))
    }
}

/// A single sounding note.
pub struct Voice {
    note_id: u64,
    /// The key as played, before any generator override.
    actual_key: u8,
    /// Effective key, possibly overridden by the zone.
    key: u8,
    /// Effective velocity, possibly overridden by the zone.
    velocity: u8,
    generators: GeneratorSet,
    modulators: Vec<Modulator>,
    /// Summed modulator contribution per destination.
    modulations: [f64; GENERATOR_COUNT],
    sample: SampleInfo,
    phase: FixedPoint,
    delta_phase: FixedPoint,
    /// Precomputed `sample_rate / (output_rate * hz(root pitch))`; the
    /// per-sample pitch math multiplies this by the current frequency.
    delta_phase_factor: f64,
    /// Effective pitch in fractional key units, before per-sample
    /// LFO/envelope wobble.
    voice_pitch: f64,
    /// Attenuation and pan folded into one per-channel gain.
    volume: StereoValue,
    vol_env: Envelope,
    mod_env: Envelope,
    vib_lfo: Lfo,
    mod_lfo: Lfo,
    released: bool,
}

impl Voice {
    /// Builds a voice for one note.
    ///
    /// `generators` carries the merged zone values for this note and
    /// `modulator_parameters` its modulator list. `key` and `velocity` are
    /// the note event as played; zones may override either through the
    /// dedicated generators.
    ///
    /// Fails if the zone's address offsets push any sample address outside
    /// the waveform buffer. Loop points that are merely out of order
    /// construct a voice that renders silence instead.
    pub fn new(
        note_id: u64,
        output_rate: f64,
        sample: &Sample,
        generators: GeneratorSet,
        modulator_parameters: &ModulatorParameterSet,
        key: u8,
        velocity: u8,
    ) -> Result<Voice, VoiceError> {
        let overridden_key = generators.get(Generator::Keynum);
        let effective_key = if overridden_key > 0 {
            overridden_key as u8
        } else {
            key
        };
        let overridden_velocity = generators.get(Generator::Velocity);
        let effective_velocity = if overridden_velocity > 0 {
            overridden_velocity as u8
        } else {
            velocity
        };

        let overridden_root = generators.get(Generator::OverridingRootKey);
        let root_key = if overridden_root > 0 {
            f64::from(overridden_root)
        } else {
            f64::from(sample.key)
        };
        let pitch = root_key - 0.01 * f64::from(sample.correction);

        let start = offset_address(
            sample.start,
            generators.get(Generator::StartAddrsCoarseOffset),
            generators.get(Generator::StartAddrsOffset),
        );
        let end = offset_address(
            sample.end,
            generators.get(Generator::EndAddrsCoarseOffset),
            generators.get(Generator::EndAddrsOffset),
        );
        let start_loop = offset_address(
            sample.start_loop,
            generators.get(Generator::StartLoopAddrsCoarseOffset),
            generators.get(Generator::StartLoopAddrsOffset),
        );
        let end_loop = offset_address(
            sample.end_loop,
            generators.get(Generator::EndLoopAddrsCoarseOffset),
            generators.get(Generator::EndLoopAddrsOffset),
        );

        // Interpolation reads one frame past the current index, so every
        // address up to `end` must be readable.
        let buffer_len = sample.buffer.len();
        for (name, address) in [
            ("start", start),
            ("end", end),
            ("start_loop", start_loop),
            ("end_loop", end_loop),
        ] {
            if address < 0 || address >= buffer_len as i64 {
                return Err(VoiceError::AddressOutOfRange {
                    name,
                    address,
                    buffer_len,
                });
            }
        }

        let sample_info = SampleInfo {
            buffer: Arc::clone(&sample.buffer),
            start: start as u32,
            end: end as u32,
            start_loop: start_loop as u32,
            end_loop: end_loop as u32,
            mode: SampleMode::from_raw(generators.get(Generator::SampleModes)),
            pitch,
            sample_rate: f64::from(sample.sample_rate),
        };

        let mut voice = Voice {
            note_id,
            actual_key: key,
            key: effective_key,
            velocity: effective_velocity,
            generators,
            modulators: modulator_parameters.iter().copied().map(Modulator::new).collect(),
            modulations: [0.0; GENERATOR_COUNT],
            phase: FixedPoint::from_frames(sample_info.start),
            delta_phase: FixedPoint::ZERO,
            delta_phase_factor: sample_info.sample_rate / (output_rate * key_to_hz(pitch)),
            voice_pitch: pitch,
            volume: StereoValue::new(1.0, 1.0),
            vol_env: Envelope::new(output_rate),
            mod_env: Envelope::new(output_rate),
            vib_lfo: Lfo::new(output_rate),
            mod_lfo: Lfo::new(output_rate),
            released: false,
            sample: sample_info,
        };

        voice.update_sf_controller(GeneralController::NoteOnVelocity, i16::from(velocity));
        voice.update_sf_controller(GeneralController::NoteOnKeyNumber, i16::from(key));
        voice.update_sf_controller(GeneralController::PitchWheelSensitivity, 2);

        for generator in INIT_GENERATORS {
            voice.update_modulated_params(generator);
        }

        // Out-of-order loop points cannot be played; the voice exists but
        // stays silent.
        let s = &voice.sample;
        if !(s.start <= s.start_loop && s.start_loop < s.end_loop && s.end_loop <= s.end) {
            voice.vol_env.finish();
        }

        Ok(voice)
    }

    /// Advances the voice by one output sample.
    ///
    /// Moves the playback phase, runs the loop-mode boundary logic, steps
    /// both LFOs and both envelopes, and recomputes the phase increment
    /// from the current pitch modulation.
    pub fn update(&mut self) {
        if self.vol_env.is_finished() {
            return;
        }

        self.phase += self.delta_phase;

        match self.sample.mode {
            SampleMode::Unused | SampleMode::Unlooped => {
                if self.phase.integer_part() >= self.sample.end {
                    self.vol_env.finish();
                    return;
                }
            }
            SampleMode::Looped => {
                if self.phase.integer_part() >= self.sample.end_loop {
                    if self.released {
                        self.vol_env.finish();
                        return;
                    }
                    self.phase -=
                        FixedPoint::from_frames(self.sample.end_loop - self.sample.start_loop);
                }
            }
            SampleMode::LoopedWithRemainder => {
                if self.released {
                    if self.phase.integer_part() >= self.sample.end {
                        self.vol_env.finish();
                        return;
                    }
                } else if self.phase.integer_part() >= self.sample.end_loop {
                    self.phase -=
                        FixedPoint::from_frames(self.sample.end_loop - self.sample.start_loop);
                }
            }
        }

        self.vib_lfo.advance();
        self.mod_lfo.advance();
        self.vol_env.advance();
        self.mod_env.advance();

        self.delta_phase = FixedPoint::from_f64(
            self.delta_phase_factor
                * key_to_hz(
                    self.voice_pitch
                        + self.modulated(Generator::ModEnvToPitch) * self.mod_env.value()
                        + self.modulated(Generator::VibLfoToPitch) * self.vib_lfo.value()
                        + self.modulated(Generator::ModLfoToPitch) * self.mod_lfo.value(),
                ),
        );
    }

    /// The stereo sample at the current phase.
    ///
    /// Linear interpolation between the two neighboring frames, scaled by
    /// the volume envelope, the tremolo contribution, and the precomputed
    /// attenuation/pan gain. A finished voice renders exact silence.
    #[inline]
    pub fn render(&self) -> StereoValue {
        if self.vol_env.is_finished() {
            return StereoValue::ZERO;
        }
        let index = self.phase.integer_part() as usize;
        let fraction = self.phase.fractional_part();
        let interpolated = (1.0 - fraction) * f64::from(self.sample.buffer[index])
            + fraction * f64::from(self.sample.buffer[index + 1]);

        self.vol_env.value()
            * centibel_to_ratio(self.modulated(Generator::ModLfoToVolume) * self.mod_lfo.value())
            * self.volume
            * (interpolated / f64::from(i16::MAX))
    }

    /// Routes a general controller change to every modulator reading it and
    /// refreshes the destinations that actually moved.
    pub fn update_sf_controller(&mut self, controller: GeneralController, value: i16) {
        for i in 0..self.modulators.len() {
            if self.modulators[i].is_source_sf_controller(controller) {
                self.modulators[i].update_sf_controller(controller, value);
                let destination = self.modulators[i].destination();
                self.update_modulated_params(destination);
            }
        }
    }

    /// Routes a MIDI continuous controller change to every modulator
    /// reading it and refreshes the destinations that actually moved.
    pub fn update_midi_controller(&mut self, controller: u8, value: u8) {
        for i in 0..self.modulators.len() {
            if self.modulators[i].is_source_midi_controller(controller) {
                self.modulators[i].update_midi_controller(controller, value);
                let destination = self.modulators[i].destination();
                self.update_modulated_params(destination);
            }
        }
    }

    /// Writes a generator amount directly.
    ///
    /// Used for exclusive-class kills and similar host interventions. Does
    /// not recompute dependent parameters on its own; the caller follows up
    /// with the appropriate event.
    pub fn override_generator(&mut self, generator: Generator, value: i16) {
        self.generators.set(generator, value);
    }

    /// Starts the note's release: both envelopes enter their release
    /// sections and loop modes that play out a tail switch to draining.
    pub fn release(&mut self) {
        self.released = true;
        self.vol_env.release();
        self.mod_env.release();
    }

    /// Whether the voice still produces audio.
    #[inline]
    pub fn is_sounding(&self) -> bool {
        !self.vol_env.is_finished()
    }

    /// Monotonic identifier of the note event that spawned this voice.
    pub fn note_id(&self) -> u64 {
        self.note_id
    }

    /// The key as played, ignoring any zone override.
    pub fn actual_key(&self) -> u8 {
        self.actual_key
    }

    /// The effective velocity, after any zone override.
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// The modulated exclusive-class tag; nonzero classes silence one
    /// another.
    pub fn exclusive_class(&self) -> i16 {
        self.modulated(Generator::ExclusiveClass) as i16
    }

    /// A generator's effective value: zone amount plus summed modulation.
    fn modulated(&self, generator: Generator) -> f64 {
        f64::from(self.generators.get(generator)) + self.modulations[generator as usize]
    }

    /// Re-sums the modulator contributions for one destination and applies
    /// its side effects: gain for pan/attenuation, LFO and envelope
    /// parameters for their generators, pitch for the tuning family.
    fn update_modulated_params(&mut self, destination: Generator) {
        let mut total = 0.0;
        for modulator in &self.modulators {
            if modulator.destination() == destination {
                total += modulator.value();
            }
        }
        self.modulations[destination as usize] = total;

        match destination {
            Generator::Pan | Generator::InitialAttenuation => {
                let attenuation = 0.4
                    * f64::from(self.generators.get(Generator::InitialAttenuation))
                    + self.modulations[Generator::InitialAttenuation as usize];
                self.volume =
                    centibel_to_ratio(attenuation) * panned_volume(self.modulated(Generator::Pan));
            }
            Generator::DelayModLfo => {
                let delay = self.modulated(Generator::DelayModLfo);
                self.mod_lfo.set_delay(delay);
            }
            Generator::FreqModLfo => {
                let frequency = self.modulated(Generator::FreqModLfo);
                self.mod_lfo.set_frequency(frequency);
            }
            Generator::DelayVibLfo => {
                let delay = self.modulated(Generator::DelayVibLfo);
                self.vib_lfo.set_delay(delay);
            }
            Generator::FreqVibLfo => {
                let frequency = self.modulated(Generator::FreqVibLfo);
                self.vib_lfo.set_frequency(frequency);
            }
            Generator::DelayModEnv => {
                let value = self.modulated(Generator::DelayModEnv);
                self.mod_env.set_parameter(EnvelopeSection::Delay, value);
            }
            Generator::AttackModEnv => {
                let value = self.modulated(Generator::AttackModEnv);
                self.mod_env.set_parameter(EnvelopeSection::Attack, value);
            }
            Generator::HoldModEnv | Generator::KeynumToModEnvHold => {
                let value = self.modulated(Generator::HoldModEnv)
                    + self.modulated(Generator::KeynumToModEnvHold) * self.keynum_scale();
                self.mod_env.set_parameter(EnvelopeSection::Hold, value);
            }
            Generator::DecayModEnv | Generator::KeynumToModEnvDecay => {
                let value = self.modulated(Generator::DecayModEnv)
                    + self.modulated(Generator::KeynumToModEnvDecay) * self.keynum_scale();
                self.mod_env.set_parameter(EnvelopeSection::Decay, value);
            }
            Generator::SustainModEnv => {
                let value = self.modulated(Generator::SustainModEnv);
                self.mod_env.set_parameter(EnvelopeSection::Sustain, value);
            }
            Generator::ReleaseModEnv => {
                let value = self.modulated(Generator::ReleaseModEnv);
                self.mod_env.set_parameter(EnvelopeSection::Release, value);
            }
            Generator::DelayVolEnv => {
                let value = self.modulated(Generator::DelayVolEnv);
                self.vol_env.set_parameter(EnvelopeSection::Delay, value);
            }
            Generator::AttackVolEnv => {
                let value = self.modulated(Generator::AttackVolEnv);
                self.vol_env.set_parameter(EnvelopeSection::Attack, value);
            }
            Generator::HoldVolEnv | Generator::KeynumToVolEnvHold => {
                let value = self.modulated(Generator::HoldVolEnv)
                    + self.modulated(Generator::KeynumToVolEnvHold) * self.keynum_scale();
                self.vol_env.set_parameter(EnvelopeSection::Hold, value);
            }
            Generator::DecayVolEnv | Generator::KeynumToVolEnvDecay => {
                let value = self.modulated(Generator::DecayVolEnv)
                    + self.modulated(Generator::KeynumToVolEnvDecay) * self.keynum_scale();
                self.vol_env.set_parameter(EnvelopeSection::Decay, value);
            }
            Generator::SustainVolEnv => {
                let value = self.modulated(Generator::SustainVolEnv);
                self.vol_env.set_parameter(EnvelopeSection::Sustain, value);
            }
            Generator::ReleaseVolEnv => {
                let value = self.modulated(Generator::ReleaseVolEnv);
                self.vol_env.set_parameter(EnvelopeSection::Release, value);
            }
            Generator::CoarseTune
            | Generator::FineTune
            | Generator::ScaleTuning
            | Generator::Pitch => {
                self.voice_pitch = self.sample.pitch
                    + 1e-4 * self.modulations[Generator::Pitch as usize]
                    + 0.01
                        * self.modulated(Generator::ScaleTuning)
                        * (f64::from(self.actual_key) - self.sample.pitch)
                    + self.modulated(Generator::CoarseTune)
                    + 0.01 * self.modulated(Generator::FineTune);
            }
            _ => {}
        }
    }

    /// Keynum scaling for the hold/decay cross generators: centered on
    /// middle C, one unit per key away from it.
    fn keynum_scale(&self) -> f64 {
        60.0 - f64::from(self.key)
    }
}

fn offset_address(base: u32, coarse: i16, fine: i16) -> i64 {
    i64::from(base) + 32768 * i64::from(coarse) + i64::from(fine)
}
