//! Unit conversions between SoundFont parameter encodings and linear values.
//!
//! SoundFont banks express nearly every parameter logarithmically:
//! attenuation in centibels, durations in timecents, frequencies in absolute
//! cents, pitch in fractional key numbers. The two conversions that sit on
//! the per-sample path (centibel to amplitude ratio, key number to Hz) are
//! backed by process-wide lookup tables built once and read lock-free
//! afterwards.
//!
//! Tables are built lazily on first use. Call [`initialize`] during setup to
//! keep the one-time construction cost off the audio thread.

use std::sync::OnceLock;

/// Entry count of the centibel table. Attenuations at or beyond this are
/// treated as silence.
const CENTIBEL_TABLE_SIZE: usize = 1441;

/// One octave of cent-to-Hz values; lookups walk octaves by doubling.
const CENT_TABLE_SIZE: usize = 1200;

struct Tables {
    centibel_to_ratio: [f64; CENTIBEL_TABLE_SIZE],
    cent_to_hz: [f64; CENT_TABLE_SIZE],
}

impl Tables {
    fn build() -> Self {
        let mut centibel_to_ratio = [0.0; CENTIBEL_TABLE_SIZE];
        for (i, entry) in centibel_to_ratio.iter_mut().enumerate() {
            // Divisor is -200 rather than the SoundFont spec's -100. Common
            // banks are authored against implementations that attenuate at
            // half the nominal rate, and must keep sounding the same here.
            *entry = libm::pow(10.0, i as f64 / -200.0);
        }

        let mut cent_to_hz = [0.0; CENT_TABLE_SIZE];
        for (i, entry) in cent_to_hz.iter_mut().enumerate() {
            *entry = 6.875 * libm::exp2(i as f64 / 1200.0);
        }

        Self {
            centibel_to_ratio,
            cent_to_hz,
        }
    }
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}

/// Builds the conversion tables eagerly.
///
/// Optional: every lookup initializes the tables on demand. Calling this once
/// while loading a bank keeps the construction cost out of the first audio
/// callback.
pub fn initialize() {
    let _ = tables();
}

/// Converts centibels of attenuation to an amplitude ratio.
///
/// Zero or negative centibels pass the signal unchanged (ratio 1.0); values
/// at or beyond the table end are full attenuation (ratio 0.0). Fractional
/// input is truncated to the table step.
#[inline]
pub fn centibel_to_ratio(centibel: f64) -> f64 {
    if centibel <= 0.0 {
        1.0
    } else if centibel >= CENTIBEL_TABLE_SIZE as f64 {
        0.0
    } else {
        tables().centibel_to_ratio[centibel as usize]
    }
}

/// Converts a fractional MIDI key number to a frequency in Hz.
///
/// Key 69 (A4) maps to exactly 440 Hz. Negative keys and keys past the top
/// of the covered range return 1.0, which downstream phase math treats as
/// an inert pitch.
///
/// The lookup walks octave thresholds with a doubling ratio so one
/// 1200-entry table covers the whole keyboard at cent resolution.
#[inline]
pub fn key_to_hz(key: f64) -> f64 {
    if key < 0.0 {
        return 1.0;
    }

    let cents = (key * 100.0) as i32;
    let mut threshold = 900;
    let mut offset = 300;
    let mut ratio = 1.0;
    while threshold <= 14100 {
        if cents < threshold {
            return ratio * tables().cent_to_hz[(cents + offset) as usize];
        }
        threshold += 1200;
        offset -= 1200;
        ratio *= 2.0;
    }

    1.0
}

/// Converts timecents to seconds: `2^(tc/1200)`.
///
/// 0 timecents is one second; -1200 is half a second; 1200 is two seconds.
#[inline]
pub fn timecent_to_second(timecent: f64) -> f64 {
    libm::exp2(timecent / 1200.0)
}

/// Converts absolute cents to a frequency in Hz: `8.176 * 2^(ac/1200)`.
///
/// 0 absolute cents is 8.176 Hz (MIDI key 0); 6900 is 440 Hz.
#[inline]
pub fn absolute_cent_to_hz(absolute_cent: f64) -> f64 {
    8.176 * libm::exp2(absolute_cent / 1200.0)
}

/// Joins two 7-bit MIDI data bytes into a 14-bit value.
#[inline]
pub fn join_bytes(msb: u8, lsb: u8) -> u16 {
    (u16::from(msb) << 7) | u16::from(lsb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centibel_endpoints() {
        assert_eq!(centibel_to_ratio(0.0), 1.0);
        assert_eq!(centibel_to_ratio(-10.0), 1.0);
        assert_eq!(centibel_to_ratio(1441.0), 0.0);
        assert_eq!(centibel_to_ratio(5000.0), 0.0);
    }

    #[test]
    fn test_centibel_uses_compatibility_divisor() {
        // 200 centibels attenuate by a factor of 10 under the -200 divisor.
        let ratio = centibel_to_ratio(200.0);
        assert!(
            (ratio - 0.1).abs() < 1e-12,
            "200 cB should be ratio 0.1, got {ratio}"
        );
    }

    #[test]
    fn test_centibel_monotonically_non_increasing() {
        let mut previous = centibel_to_ratio(0.0);
        for cb in 1..=1441 {
            let current = centibel_to_ratio(cb as f64);
            assert!(
                current <= previous,
                "ratio increased at {cb} cB: {previous} -> {current}"
            );
            previous = current;
        }
    }

    #[test]
    fn test_key_to_hz_a4() {
        let hz = key_to_hz(69.0);
        assert!(
            (hz - 440.0).abs() / 440.0 < 1e-9,
            "A4 should be 440 Hz, got {hz}"
        );
    }

    #[test]
    fn test_key_to_hz_octaves_double() {
        let a3 = key_to_hz(57.0);
        let a4 = key_to_hz(69.0);
        let a5 = key_to_hz(81.0);
        assert!((a4 / a3 - 2.0).abs() < 1e-9);
        assert!((a5 / a4 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_to_hz_out_of_range() {
        assert_eq!(key_to_hz(-1.0), 1.0);
        assert_eq!(key_to_hz(-0.001), 1.0);
        assert_eq!(key_to_hz(141.0), 1.0);
        assert_eq!(key_to_hz(500.0), 1.0);
    }

    #[test]
    fn test_key_to_hz_bottom_of_range() {
        // Key 0 is 8.176 Hz within the cent-table step.
        let hz = key_to_hz(0.0);
        assert!((hz - 8.1758).abs() < 1e-3, "key 0 should be ~8.176 Hz, got {hz}");
    }

    #[test]
    fn test_timecent_to_second() {
        assert!((timecent_to_second(0.0) - 1.0).abs() < 1e-12);
        assert!((timecent_to_second(1200.0) - 2.0).abs() < 1e-12);
        assert!((timecent_to_second(-1200.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_absolute_cent_to_hz() {
        assert!((absolute_cent_to_hz(0.0) - 8.176).abs() < 1e-12);
        // 6900 absolute cents is A4.
        assert!((absolute_cent_to_hz(6900.0) - 440.0).abs() < 0.02);
    }

    #[test]
    fn test_join_bytes() {
        assert_eq!(join_bytes(0, 0), 0);
        assert_eq!(join_bytes(0x7F, 0x7F), 16383);
        assert_eq!(join_bytes(0x40, 0x00), 8192);
    }
}
