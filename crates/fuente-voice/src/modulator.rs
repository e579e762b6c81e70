//! SoundFont modulators: controller sources, normalization curves, and the
//! runtime state that turns controller motion into generator deltas.
//!
//! A modulator is a fixed route: a primary source and an amount source, each
//! a controller read through a shaping curve, scaled by a signed amount and
//! summed into one generator destination. Banks may define their own; the
//! ten routes every synthesizer carries (velocity to attenuation, mod wheel
//! to vibrato, pitch wheel to pitch, and so on) are available as
//! [`ModulatorParameterSet::default_set`].

use crate::generator::Generator;

/// The general (non-MIDI) controller indices a source operator can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneralController {
    /// No controller: the source holds its seed value forever.
    NoController,
    /// Key-on velocity, 1..=127.
    NoteOnVelocity,
    /// Key-on key number, 0..=127.
    NoteOnKeyNumber,
    /// Polyphonic key pressure, 0..=127.
    PolyPressure,
    /// Channel pressure, 0..=127.
    ChannelPressure,
    /// Pitch wheel as a signed offset from center, -8192..=8192.
    PitchWheel,
    /// Pitch wheel range in semitones.
    PitchWheelSensitivity,
    /// Link target; carries no value of its own.
    Link,
}

impl GeneralController {
    fn from_index(index: u8) -> GeneralController {
        match index {
            2 => GeneralController::NoteOnVelocity,
            3 => GeneralController::NoteOnKeyNumber,
            10 => GeneralController::PolyPressure,
            13 => GeneralController::ChannelPressure,
            14 => GeneralController::PitchWheel,
            16 => GeneralController::PitchWheelSensitivity,
            127 => GeneralController::Link,
            _ => GeneralController::NoController,
        }
    }
}

/// Which controller population a source operator reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerSource {
    /// One of the general controllers.
    General(GeneralController),
    /// A 7-bit MIDI continuous controller.
    Midi(u8),
}

/// Whether the curve runs from minimum to maximum or the reverse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceDirection {
    #[default]
    Increasing,
    Decreasing,
}

/// Whether the normalized output is `[0, 1]` or `[-1, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourcePolarity {
    #[default]
    Unipolar,
    Bipolar,
}

/// The shaping curve applied to the controller fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceShape {
    #[default]
    Linear,
    Concave,
    Convex,
    Switch,
}

/// A decoded source operator: which controller feeds the modulator and how
/// its raw value maps into the normalized range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceOperator {
    pub controller: ControllerSource,
    pub direction: SourceDirection,
    pub polarity: SourcePolarity,
    pub shape: SourceShape,
}

impl SourceOperator {
    /// Decodes the packed 16-bit operator layout: bits 0-6 controller index,
    /// bit 7 the MIDI flag, bit 8 direction, bit 9 polarity, bits 10-15 the
    /// curve type.
    pub fn from_raw(raw: u16) -> SourceOperator {
        let index = (raw & 0x7F) as u8;
        let controller = if raw & 0x80 != 0 {
            ControllerSource::Midi(index)
        } else {
            ControllerSource::General(GeneralController::from_index(index))
        };
        let direction = if raw & 0x100 != 0 {
            SourceDirection::Decreasing
        } else {
            SourceDirection::Increasing
        };
        let polarity = if raw & 0x200 != 0 {
            SourcePolarity::Bipolar
        } else {
            SourcePolarity::Unipolar
        };
        let shape = match (raw >> 10) & 0x3F {
            1 => SourceShape::Concave,
            2 => SourceShape::Convex,
            3 => SourceShape::Switch,
            _ => SourceShape::Linear,
        };
        SourceOperator {
            controller,
            direction,
            polarity,
            shape,
        }
    }

    /// Maps a controller fraction in `[0, 1]` through direction, curve, and
    /// polarity into the normalized source value.
    pub fn normalize(&self, fraction: f64) -> f64 {
        let x = match self.direction {
            SourceDirection::Increasing => fraction.clamp(0.0, 1.0),
            SourceDirection::Decreasing => 1.0 - fraction.clamp(0.0, 1.0),
        };
        match self.polarity {
            SourcePolarity::Unipolar => shape_unipolar(self.shape, x),
            SourcePolarity::Bipolar => {
                let centered = 2.0 * x - 1.0;
                if centered >= 0.0 {
                    shape_unipolar(self.shape, centered)
                } else {
                    -shape_unipolar(self.shape, -centered)
                }
            }
        }
    }
}

fn shape_unipolar(shape: SourceShape, x: f64) -> f64 {
    match shape {
        SourceShape::Linear => x,
        SourceShape::Concave => concave(x),
        SourceShape::Convex => convex(x),
        SourceShape::Switch => {
            if x < 0.5 {
                0.0
            } else {
                1.0
            }
        }
    }
}

/// Slow start, steep finish: `-(20/96) * log10((1-x)^2)`, clamped to `[0, 1]`.
fn concave(x: f64) -> f64 {
    if x >= 1.0 {
        return 1.0;
    }
    let distance = 1.0 - x;
    (-(20.0 / 96.0) * libm::log10(distance * distance)).clamp(0.0, 1.0)
}

/// Steep start, slow finish: the complement of the concave curve.
fn convex(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    (1.0 + (20.0 / 96.0) * libm::log10(x * x)).clamp(0.0, 1.0)
}

/// The transform applied to the primary source before scaling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformOperator {
    #[default]
    Linear,
    AbsoluteValue,
}

impl TransformOperator {
    /// Decodes the bank-file transform enumeration (0 linear, 2 absolute
    /// value; anything else falls back to linear).
    pub fn from_raw(raw: u16) -> TransformOperator {
        match raw {
            2 => TransformOperator::AbsoluteValue,
            _ => TransformOperator::Linear,
        }
    }

    #[inline]
    fn apply(self, value: f64) -> f64 {
        match self {
            TransformOperator::Linear => value,
            TransformOperator::AbsoluteValue => value.abs(),
        }
    }
}

/// An immutable modulator definition: sources, destination, amount,
/// transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModulatorDescriptor {
    pub source: SourceOperator,
    pub amount_source: SourceOperator,
    pub destination: Generator,
    pub amount: i16,
    pub transform: TransformOperator,
}

impl ModulatorDescriptor {
    /// Decodes a raw bank-file modulator record. Returns `None` when the
    /// destination operator is not a valid generator.
    pub fn from_raw(
        source: u16,
        destination: u16,
        amount: i16,
        amount_source: u16,
        transform: u16,
    ) -> Option<ModulatorDescriptor> {
        Some(ModulatorDescriptor {
            source: SourceOperator::from_raw(source),
            amount_source: SourceOperator::from_raw(amount_source),
            destination: Generator::from_raw(destination)?,
            amount,
            transform: TransformOperator::from_raw(transform),
        })
    }
}

/// An ordered list of modulator descriptors for one voice.
#[derive(Clone, Debug, Default)]
pub struct ModulatorParameterSet {
    parameters: Vec<ModulatorDescriptor>,
}

impl ModulatorParameterSet {
    /// An empty set: controllers move nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The ten standard routes every SoundFont synthesizer installs before
    /// bank-defined modulators: velocity and CC7/CC11 to attenuation
    /// (concave, reversed), mod wheel and channel pressure to vibrato depth,
    /// CC10 to pan, CC91/CC93 to the effect sends, velocity to filter
    /// cutoff, and the pitch wheel to pitch scaled by its sensitivity.
    pub fn default_set() -> Self {
        let raw: [(u16, Generator, i16, u16); 10] = [
            (0x0502, Generator::InitialAttenuation, 960, 0x0),
            (0x0102, Generator::InitialFilterFc, -2400, 0x0),
            (0x000D, Generator::VibLfoToPitch, 50, 0x0),
            (0x0081, Generator::VibLfoToPitch, 50, 0x0),
            (0x0587, Generator::InitialAttenuation, 960, 0x0),
            (0x028A, Generator::Pan, 1000, 0x0),
            (0x058B, Generator::InitialAttenuation, 960, 0x0),
            (0x00DB, Generator::ReverbEffectsSend, 200, 0x0),
            (0x00DD, Generator::ChorusEffectsSend, 200, 0x0),
            (0x020E, Generator::Pitch, 12700, 0x0010),
        ];
        let parameters = raw
            .into_iter()
            .map(|(source, destination, amount, amount_source)| ModulatorDescriptor {
                source: SourceOperator::from_raw(source),
                amount_source: SourceOperator::from_raw(amount_source),
                destination,
                amount,
                transform: TransformOperator::Linear,
            })
            .collect();
        Self { parameters }
    }

    /// Appends a descriptor.
    pub fn push(&mut self, descriptor: ModulatorDescriptor) {
        self.parameters.push(descriptor);
    }

    /// Iterates the descriptors in order.
    pub fn iter(&self) -> impl Iterator<Item = &ModulatorDescriptor> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// One live modulator inside a voice.
///
/// Caches the normalized values of both sources so a controller event only
/// recomputes what it touched. The primary source seeds at 0; the amount
/// source seeds at 1 so routes whose amount source is "no controller" scale
/// by unity instead of being permanently muted.
#[derive(Clone, Debug)]
pub struct Modulator {
    descriptor: ModulatorDescriptor,
    source: f64,
    amount_source: f64,
    value: f64,
}

impl Modulator {
    /// Builds the runtime state for one descriptor.
    pub fn new(descriptor: ModulatorDescriptor) -> Modulator {
        Modulator {
            descriptor,
            source: 0.0,
            amount_source: 1.0,
            value: 0.0,
        }
    }

    /// Whether either operator reads the given general controller.
    pub fn is_source_sf_controller(&self, controller: GeneralController) -> bool {
        self.descriptor.source.controller == ControllerSource::General(controller)
            || self.descriptor.amount_source.controller == ControllerSource::General(controller)
    }

    /// Whether either operator reads the given MIDI continuous controller.
    pub fn is_source_midi_controller(&self, controller: u8) -> bool {
        self.descriptor.source.controller == ControllerSource::Midi(controller)
            || self.descriptor.amount_source.controller == ControllerSource::Midi(controller)
    }

    /// Feeds a general controller value into whichever operators read it
    /// and recomputes the modulator output.
    pub fn update_sf_controller(&mut self, controller: GeneralController, value: i16) {
        let matched = ControllerSource::General(controller);
        if self.descriptor.source.controller == matched {
            self.source = normalize_general(controller, &self.descriptor.source, value);
        }
        if self.descriptor.amount_source.controller == matched {
            self.amount_source = normalize_general(controller, &self.descriptor.amount_source, value);
        }
        self.recalculate();
    }

    /// Feeds a 7-bit MIDI controller value into whichever operators read it
    /// and recomputes the modulator output.
    pub fn update_midi_controller(&mut self, controller: u8, value: u8) {
        let matched = ControllerSource::Midi(controller);
        let fraction = f64::from(value) / 127.0;
        if self.descriptor.source.controller == matched {
            self.source = self.descriptor.source.normalize(fraction);
        }
        if self.descriptor.amount_source.controller == matched {
            self.amount_source = self.descriptor.amount_source.normalize(fraction);
        }
        self.recalculate();
    }

    /// The generator this modulator feeds.
    #[inline]
    pub fn destination(&self) -> Generator {
        self.descriptor.destination
    }

    /// The current contribution, in the destination's native unit.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    fn recalculate(&mut self) {
        self.value = f64::from(self.descriptor.amount)
            * self.descriptor.transform.apply(self.source)
            * self.amount_source;
    }
}

/// Normalizes a general controller's raw value for one operator.
///
/// Most general controllers are 7-bit and scale by 127. The pitch wheel
/// arrives as a signed offset from center and spans its 14-bit range. The
/// wheel sensitivity bypasses the curve entirely: it scales to percent of
/// the 127-semitone full range, which puts the standard 12700-amount pitch
/// route in hundredths-of-cent units downstream.
fn normalize_general(controller: GeneralController, operator: &SourceOperator, value: i16) -> f64 {
    match controller {
        GeneralController::PitchWheelSensitivity => f64::from(value) / 1.27,
        GeneralController::PitchWheel => {
            operator.normalize((f64::from(value) + 8192.0) / 16384.0)
        }
        _ => operator.normalize(f64::from(value) / 127.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_unipolar(controller: ControllerSource) -> SourceOperator {
        SourceOperator {
            controller,
            direction: SourceDirection::Increasing,
            polarity: SourcePolarity::Unipolar,
            shape: SourceShape::Linear,
        }
    }

    fn descriptor_to(
        source: SourceOperator,
        destination: Generator,
        amount: i16,
    ) -> ModulatorDescriptor {
        ModulatorDescriptor {
            source,
            amount_source: SourceOperator::from_raw(0),
            destination,
            amount,
            transform: TransformOperator::Linear,
        }
    }

    #[test]
    fn test_operator_decoding() {
        // Velocity to attenuation: concave, unipolar, decreasing.
        let op = SourceOperator::from_raw(0x0502);
        assert_eq!(
            op.controller,
            ControllerSource::General(GeneralController::NoteOnVelocity)
        );
        assert_eq!(op.direction, SourceDirection::Decreasing);
        assert_eq!(op.polarity, SourcePolarity::Unipolar);
        assert_eq!(op.shape, SourceShape::Concave);

        // CC10 pan: linear, bipolar, increasing.
        let op = SourceOperator::from_raw(0x028A);
        assert_eq!(op.controller, ControllerSource::Midi(10));
        assert_eq!(op.direction, SourceDirection::Increasing);
        assert_eq!(op.polarity, SourcePolarity::Bipolar);
        assert_eq!(op.shape, SourceShape::Linear);

        // Pitch wheel: linear, bipolar, general.
        let op = SourceOperator::from_raw(0x020E);
        assert_eq!(
            op.controller,
            ControllerSource::General(GeneralController::PitchWheel)
        );
        assert_eq!(op.polarity, SourcePolarity::Bipolar);
    }

    #[test]
    fn test_linear_curves() {
        let uni = SourceOperator::from_raw(0x0002); // linear unipolar velocity
        assert_eq!(uni.normalize(0.0), 0.0);
        assert_eq!(uni.normalize(0.5), 0.5);
        assert_eq!(uni.normalize(1.0), 1.0);

        let bi = SourceOperator::from_raw(0x0202);
        assert_eq!(bi.normalize(0.0), -1.0);
        assert_eq!(bi.normalize(0.5), 0.0);
        assert_eq!(bi.normalize(1.0), 1.0);
    }

    #[test]
    fn test_direction_reverses_input() {
        let reversed = SourceOperator::from_raw(0x0102); // linear unipolar decreasing
        assert_eq!(reversed.normalize(0.0), 1.0);
        assert_eq!(reversed.normalize(1.0), 0.0);
        assert_eq!(reversed.normalize(0.25), 0.75);
    }

    #[test]
    fn test_concave_anchors_and_monotonicity() {
        let op = SourceOperator::from_raw(0x0402); // concave unipolar
        assert_eq!(op.normalize(0.0), 0.0);
        assert_eq!(op.normalize(1.0), 1.0);
        let mut previous = 0.0;
        for i in 1..=100 {
            let y = op.normalize(i as f64 / 100.0);
            assert!(y >= previous, "concave fell at step {i}");
            assert!((0.0..=1.0).contains(&y));
            previous = y;
        }
        // Slow start: well below linear in the first half.
        assert!(op.normalize(0.5) < 0.5);
    }

    #[test]
    fn test_convex_is_concave_complement() {
        let concave_op = SourceOperator::from_raw(0x0402);
        let convex_op = SourceOperator::from_raw(0x0802);
        assert_eq!(convex_op.normalize(0.0), 0.0);
        assert_eq!(convex_op.normalize(1.0), 1.0);
        for i in 0..=20 {
            let x = i as f64 / 20.0;
            let sum = convex_op.normalize(x) + concave_op.normalize(1.0 - x);
            assert!(
                (sum - 1.0).abs() < 1e-12,
                "complement broken at {x}: {sum}"
            );
        }
    }

    #[test]
    fn test_switch_curve() {
        let uni = SourceOperator::from_raw(0x0C02); // switch unipolar
        assert_eq!(uni.normalize(0.2), 0.0);
        assert_eq!(uni.normalize(0.8), 1.0);

        let bi = SourceOperator::from_raw(0x0E02); // switch bipolar
        assert_eq!(bi.normalize(0.1), -1.0);
        assert_eq!(bi.normalize(0.9), 1.0);
    }

    #[test]
    fn test_bipolar_mirrors_through_origin() {
        let op = SourceOperator::from_raw(0x0602); // concave bipolar
        for i in 0..=10 {
            let x = i as f64 / 20.0; // [0, 0.5]
            let below = op.normalize(0.5 - x);
            let above = op.normalize(0.5 + x);
            assert!(
                (below + above).abs() < 1e-12,
                "not symmetric at +/-{x}: {below} vs {above}"
            );
        }
    }

    #[test]
    fn test_modulator_routes_value() {
        let source = linear_unipolar(ControllerSource::General(
            GeneralController::NoteOnVelocity,
        ));
        let mut modulator = Modulator::new(descriptor_to(source, Generator::Pan, 1000));
        assert_eq!(modulator.value(), 0.0);

        modulator.update_sf_controller(GeneralController::NoteOnVelocity, 127);
        assert!((modulator.value() - 1000.0).abs() < 1e-9);

        // A controller it does not read leaves the value untouched.
        assert!(!modulator.is_source_sf_controller(GeneralController::ChannelPressure));
    }

    #[test]
    fn test_amount_source_seeds_at_unity() {
        // Amount source "no controller" must scale by 1, not mute the route.
        let source = linear_unipolar(ControllerSource::Midi(1));
        let mut modulator = Modulator::new(descriptor_to(source, Generator::VibLfoToPitch, 50));
        modulator.update_midi_controller(1, 127);
        assert!((modulator.value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_wheel_full_scale() {
        let set = ModulatorParameterSet::default_set();
        let bend = set
            .iter()
            .find(|d| d.destination == Generator::Pitch)
            .expect("default set carries the pitch wheel route");
        let mut modulator = Modulator::new(*bend);

        modulator.update_sf_controller(GeneralController::PitchWheelSensitivity, 2);
        modulator.update_sf_controller(GeneralController::PitchWheel, 8192);
        // 2 semitones in hundredths of a cent.
        assert!(
            (modulator.value() - 20000.0).abs() < 1e-9,
            "full bend at sensitivity 2 was {}",
            modulator.value()
        );

        modulator.update_sf_controller(GeneralController::PitchWheel, -8192);
        assert!((modulator.value() + 20000.0).abs() < 1e-9);

        modulator.update_sf_controller(GeneralController::PitchWheel, 0);
        assert_eq!(modulator.value(), 0.0);
    }

    #[test]
    fn test_absolute_value_transform() {
        let source = SourceOperator::from_raw(0x0202); // linear bipolar velocity
        let descriptor = ModulatorDescriptor {
            transform: TransformOperator::AbsoluteValue,
            ..descriptor_to(source, Generator::InitialAttenuation, 100)
        };
        let mut modulator = Modulator::new(descriptor);
        modulator.update_sf_controller(GeneralController::NoteOnVelocity, 0);
        // Source is -1; the transform folds it positive.
        assert!((modulator.value() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_is_idempotent() {
        let set = ModulatorParameterSet::default_set();
        let attenuation = set
            .iter()
            .find(|d| d.destination == Generator::InitialAttenuation)
            .unwrap();
        let mut modulator = Modulator::new(*attenuation);
        modulator.update_sf_controller(GeneralController::NoteOnVelocity, 64);
        let first = modulator.value();
        modulator.update_sf_controller(GeneralController::NoteOnVelocity, 64);
        assert_eq!(modulator.value(), first);
    }

    #[test]
    fn test_default_set_contents() {
        let set = ModulatorParameterSet::default_set();
        assert_eq!(set.len(), 10);
        assert!(
            set.iter()
                .filter(|d| d.destination == Generator::InitialAttenuation)
                .count()
                == 3
        );
        assert!(set.iter().any(|d| d.destination == Generator::Pan));
        assert!(set.iter().any(|d| d.destination == Generator::Pitch));
    }

    #[test]
    fn test_descriptor_from_raw_rejects_bad_destination() {
        assert!(ModulatorDescriptor::from_raw(0x0502, 48, 960, 0, 0).is_some());
        assert!(ModulatorDescriptor::from_raw(0x0502, 61, 960, 0, 0).is_none());
        assert!(ModulatorDescriptor::from_raw(0x0502, 999, 960, 0, 0).is_none());
    }
}
