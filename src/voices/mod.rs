//! Voice generators: one self-contained, finite-duration sound event per
//! grid cell.
//!
//! A [`Voice`] is built from an instrument's timbre, a row index, a
//! duration and a sample rate, produces exactly `duration * sample_rate`
//! samples, and is fully decayed by its last sample. Out-of-range rows
//! fall back to a default pitch or sample tag instead of failing; an
//! unplayable cell should degrade, not abort the step it belongs to.

pub mod timbre;

mod noise;
mod osc;
mod pluck;

pub use noise::NoiseVoice;
pub use osc::OscillatorVoice;
pub use pluck::PluckVoice;
pub use timbre::{
    Instrument, SampleTag, Timbre, FALLBACK_FREQUENCY, NUM_INSTRUMENTS, ROWS_PER_INSTRUMENT,
};

/// Duration of the preview played when a cell is toggled on.
pub const PREVIEW_DURATION: f32 = 0.2;

pub enum Voice {
    Oscillator(OscillatorVoice),
    Noise(NoiseVoice),
    Pluck(PluckVoice),
}

impl Voice {
    /// Build the voice for one grid cell.
    ///
    /// `seed` only matters for noise timbres; passing the same seed yields
    /// a bit-identical burst, which the offline renderer relies on.
    pub fn build(
        instrument: Instrument,
        row: usize,
        duration: f32,
        sample_rate: f32,
        seed: u32,
    ) -> Voice {
        let timbre = instrument.timbre();
        match timbre {
            Timbre::Oscillator { wave, .. } => Voice::Oscillator(OscillatorVoice::new(
                *wave,
                timbre.frequency(row),
                row,
                duration,
                sample_rate,
            )),
            Timbre::Noise { .. } => {
                // sample_tag is always Some for noise timbres
                let tag = timbre.sample_tag(row).unwrap_or(SampleTag::Kick);
                Voice::Noise(NoiseVoice::new(tag, duration, sample_rate, seed))
            }
            Timbre::Pluck { .. } => Voice::Pluck(PluckVoice::new(
                timbre.frequency(row),
                duration,
                sample_rate,
            )),
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self {
            Voice::Oscillator(v) => v.next_sample(),
            Voice::Noise(v) => v.next_sample(),
            Voice::Pluck(v) => v.next_sample(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Voice::Oscillator(v) => v.is_finished(),
            Voice::Noise(v) => v.is_finished(),
            Voice::Pluck(v) => v.is_finished(),
        }
    }

    /// Additively mix this voice into `out`, scaled by `gain`, until either
    /// the voice finishes or the buffer ends.
    pub fn mix_into(&mut self, out: &mut [f32], gain: f32) {
        for sample in out.iter_mut() {
            if self.is_finished() {
                break;
            }
            *sample += self.next_sample() * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;

    #[test]
    fn builds_every_instrument() {
        for instrument in Instrument::ALL {
            let mut voice = Voice::build(instrument, 0, 0.125, SAMPLE_RATE, 1);
            let heard = (0..(0.125 * SAMPLE_RATE) as usize)
                .map(|_| voice.next_sample())
                .any(|s| s.abs() > 1e-4);
            assert!(heard, "{instrument:?} should be audible");
        }
    }

    #[test]
    fn out_of_range_row_still_builds() {
        let mut voice = Voice::build(Instrument::Piano, 99, 0.1, SAMPLE_RATE, 1);
        let audible = (0..(0.1 * SAMPLE_RATE) as usize)
            .map(|_| voice.next_sample())
            .any(|s| s.abs() > 1e-4);
        assert!(audible, "fallback frequency should still sound");

        let mut drum = Voice::build(Instrument::Drums, 99, 0.1, SAMPLE_RATE, 1);
        assert!(!drum.is_finished());
        drum.next_sample();
    }

    #[test]
    fn mix_into_is_additive_and_bounded_by_voice_length() {
        let mut voice = Voice::build(Instrument::Synth, 2, 0.01, SAMPLE_RATE, 1);
        let mut out = vec![1.0f32; 1024];
        voice.mix_into(&mut out, 1.0);

        let voice_len = (0.01 * SAMPLE_RATE) as usize;
        assert!(out[..voice_len].iter().any(|&s| s != 1.0));
        assert!(out[voice_len + 1..].iter().all(|&s| s == 1.0));
    }
}
