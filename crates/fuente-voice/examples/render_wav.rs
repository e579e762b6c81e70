//! Offline render demo: play one looped voice through its whole life and
//! write the result to a stereo WAV file.
//!
//! Run with: cargo run -p fuente-voice --example render_wav

use std::f64::consts::PI;

use fuente_voice::{
    conversion, GeneralController, Generator, GeneratorSet, ModulatorParameterSet, Sample, Voice,
};

const OUTPUT_RATE: f64 = 48000.0;

fn main() -> anyhow::Result<()> {
    conversion::initialize();

    // A synthetic bank sample: one second of A4 sawtooth with a loop region
    // covering the middle.
    let frames = 48_000;
    let buffer: Vec<i16> = (0..frames)
        .map(|i| {
            let cycle = 440.0 * i as f64 / 48000.0;
            let saw = 2.0 * (cycle - (cycle + 0.5).floor());
            (saw * 0.8 * f64::from(i16::MAX)) as i16
        })
        .collect();
    let sample = Sample {
        buffer: buffer.into(),
        start: 0,
        end: frames as u32 - 1,
        start_loop: 4_800,
        end_loop: 43_200,
        sample_rate: 48000,
        key: 69,
        correction: 0,
    };

    let mut generators = GeneratorSet::new();
    generators.set(Generator::SampleModes, 1);
    generators.set(Generator::Pan, -120);
    // Half-second release: 1200 * log2(0.5) = -1200 timecents.
    generators.set(Generator::ReleaseVolEnv, -1200);
    generators.set(Generator::VibLfoToPitch, 12);
    generators.set(Generator::DelayVibLfo, -1200);

    let mut voice = Voice::new(
        0,
        OUTPUT_RATE,
        &sample,
        generators,
        &ModulatorParameterSet::default_set(),
        57, // A3: one octave below the root key
        100,
    )?;

    // Ride the mod wheel up over the first half second for some vibrato.
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create("voice.wav", spec)?;

    let mut rendered = 0usize;
    for n in 0..(2 * 48_000) {
        if n % 4_800 == 0 && n <= 24_000 {
            let wheel = (127 * n / 24_000) as u8;
            voice.update_midi_controller(1, wheel);
        }
        if n == 72_000 {
            voice.release();
        }
        // A slow pitch sweep across the second half, for flavor.
        if n == 48_000 {
            let bend = (8192.0 * (PI / 6.0).sin()) as i16;
            voice.update_sf_controller(GeneralController::PitchWheel, bend);
        }

        voice.update();
        if !voice.is_sounding() {
            break;
        }
        let frame = voice.render();
        writer.write_sample((frame.left.clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16)?;
        writer.write_sample((frame.right.clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16)?;
        rendered += 1;
    }
    writer.finalize()?;

    println!(
        "rendered {rendered} frames ({:.2}s) to voice.wav",
        rendered as f64 / OUTPUT_RATE
    );
    Ok(())
}
