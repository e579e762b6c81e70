//! Six-section SoundFont envelope generator.
//!
//! SoundFont envelopes run Delay, Attack, Hold, Decay, Sustain, Release in
//! order, with every timed section length given in timecents and the sustain
//! level in centibels of attenuation. The same generator drives both the
//! volume envelope and the modulation envelope of a voice.
//!
//! # Shape
//!
//! - **Delay** outputs 0 until its length elapses.
//! - **Attack** ramps linearly from 0 to 1.
//! - **Hold** stays at 1.
//! - **Decay** follows a linear-in-centibel attenuation ramp (geometric per
//!   sample) and parks at the sustain level once it crosses it.
//! - **Sustain** holds the sustain level until release.
//! - **Release** applies the same centibel ramp multiplicatively from the
//!   level at release time and finishes exactly when its length elapses, so
//!   a released voice dies within a bounded number of samples.

use crate::conversion::{centibel_to_ratio, timecent_to_second};

/// Centibel span covered by a full decay or release section. Matches the
/// end of the attenuation table, where the ratio reaches zero.
const FULL_SCALE_CENTIBELS: f64 = 1441.0;

/// Timecent values at or below this count as zero-length sections. This is
/// the bank default for every timed section, so untouched envelopes open
/// instantly instead of ramping for a millisecond.
const INSTANT_TIMECENTS: f64 = -12000.0;

/// Envelope sections in running order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeSection {
    /// Output is zero, waiting to start.
    #[default]
    Delay,
    /// Linear ramp from zero to peak.
    Attack,
    /// Holding at peak level.
    Hold,
    /// Falling from peak toward the sustain level.
    Decay,
    /// Holding at the sustain level.
    Sustain,
    /// Falling from the release-time level toward zero.
    Release,
    /// Done; output is zero forever.
    Finished,
}

/// A delay/attack/hold/decay/sustain/release envelope.
///
/// Section lengths are set in their native SoundFont units via
/// [`set_parameter`](Envelope::set_parameter) and may be changed while the
/// envelope runs; the change applies to the current section as well as the
/// remaining ones.
#[derive(Debug, Clone)]
pub struct Envelope {
    output_rate: f64,
    /// Section lengths in output samples, indexed Delay..=Decay plus
    /// Release in the last slot.
    lengths: [f64; 5],
    /// Sustain attenuation in centibels, clamped to the table range.
    sustain_centibels: f64,
    /// Cached amplitude ratio for the sustain attenuation.
    sustain_level: f64,
    section: EnvelopeSection,
    /// Samples spent in the current timed section.
    elapsed: f64,
    /// Level captured when release began.
    release_level: f64,
    value: f64,
}

impl Envelope {
    /// Creates an envelope at the given output sample rate.
    ///
    /// All section lengths start at zero and sustain starts at full level,
    /// so an unconfigured envelope opens to 1.0 on the first advance.
    pub fn new(output_rate: f64) -> Self {
        Self {
            output_rate,
            lengths: [0.0; 5],
            sustain_centibels: 0.0,
            sustain_level: 1.0,
            section: EnvelopeSection::Delay,
            elapsed: 0.0,
            release_level: 1.0,
            value: 0.0,
        }
    }

    /// Sets a section parameter in its native unit.
    ///
    /// Timed sections (Delay, Attack, Hold, Decay, Release) take timecents;
    /// Sustain takes centibels of attenuation. Values for the section the
    /// envelope is currently in take effect immediately.
    pub fn set_parameter(&mut self, section: EnvelopeSection, value: f64) {
        match section {
            EnvelopeSection::Sustain => {
                self.sustain_centibels = value.clamp(0.0, FULL_SCALE_CENTIBELS);
                self.sustain_level = centibel_to_ratio(self.sustain_centibels);
            }
            EnvelopeSection::Delay
            | EnvelopeSection::Attack
            | EnvelopeSection::Hold
            | EnvelopeSection::Decay => {
                self.lengths[section as usize] = self.timecents_to_samples(value);
            }
            EnvelopeSection::Release => {
                self.lengths[4] = self.timecents_to_samples(value);
            }
            EnvelopeSection::Finished => {}
        }
    }

    /// Advances by one output sample and returns the new level in `[0, 1]`.
    pub fn advance(&mut self) -> f64 {
        match self.section {
            EnvelopeSection::Sustain => {
                self.value = self.sustain_level;
                return self.value;
            }
            EnvelopeSection::Finished => {
                self.value = 0.0;
                return self.value;
            }
            _ => {}
        }

        self.elapsed += 1.0;

        // Step over every section the new time has already passed, carrying
        // the leftover into the next one. Zero-length sections fall through
        // in a single call.
        loop {
            let length = self.current_length();
            if self.elapsed < length {
                break;
            }
            self.elapsed -= length;
            self.section = match self.section {
                EnvelopeSection::Delay => EnvelopeSection::Attack,
                EnvelopeSection::Attack => EnvelopeSection::Hold,
                EnvelopeSection::Hold => EnvelopeSection::Decay,
                EnvelopeSection::Decay => EnvelopeSection::Sustain,
                EnvelopeSection::Release => EnvelopeSection::Finished,
                section => section,
            };
            if matches!(
                self.section,
                EnvelopeSection::Sustain | EnvelopeSection::Finished
            ) {
                break;
            }
        }

        self.value = match self.section {
            EnvelopeSection::Delay => 0.0,
            EnvelopeSection::Attack => self.elapsed / self.lengths[EnvelopeSection::Attack as usize],
            EnvelopeSection::Hold => 1.0,
            EnvelopeSection::Decay => {
                let centibels = FULL_SCALE_CENTIBELS * self.elapsed
                    / self.lengths[EnvelopeSection::Decay as usize];
                if centibels >= self.sustain_centibels {
                    self.section = EnvelopeSection::Sustain;
                    self.sustain_level
                } else {
                    centibel_to_ratio(centibels)
                }
            }
            EnvelopeSection::Sustain => self.sustain_level,
            EnvelopeSection::Release => {
                self.release_level * centibel_to_ratio(FULL_SCALE_CENTIBELS * self.elapsed / self.lengths[4])
            }
            EnvelopeSection::Finished => 0.0,
        };

        self.value
    }

    /// Enters the release section from any earlier one, keeping the current
    /// level as the release starting point.
    pub fn release(&mut self) {
        if matches!(
            self.section,
            EnvelopeSection::Release | EnvelopeSection::Finished
        ) {
            return;
        }
        self.release_level = self.value;
        self.elapsed = 0.0;
        self.section = EnvelopeSection::Release;
    }

    /// Jumps straight to the finished state; output becomes zero.
    pub fn finish(&mut self) {
        self.section = EnvelopeSection::Finished;
        self.value = 0.0;
    }

    /// The current level without advancing.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The section the envelope is currently in.
    pub fn section(&self) -> EnvelopeSection {
        self.section
    }

    /// Whether the envelope has run out (or was finished explicitly).
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.section == EnvelopeSection::Finished
    }

    fn timecents_to_samples(&self, timecents: f64) -> f64 {
        if timecents <= INSTANT_TIMECENTS {
            0.0
        } else {
            timecent_to_second(timecents) * self.output_rate
        }
    }

    fn current_length(&self) -> f64 {
        match self.section {
            EnvelopeSection::Delay
            | EnvelopeSection::Attack
            | EnvelopeSection::Hold
            | EnvelopeSection::Decay => self.lengths[self.section as usize],
            EnvelopeSection::Release => self.lengths[4],
            // Untimed sections never elapse on their own.
            EnvelopeSection::Sustain | EnvelopeSection::Finished => f64::INFINITY,
        }
    }
}
