use serde::{Deserialize, Serialize};

use crate::dsp::Waveform;

pub const NUM_INSTRUMENTS: usize = 8;
pub const ROWS_PER_INSTRUMENT: usize = 8;

/// Frequency used when a row index runs off the end of a timbre's table.
pub const FALLBACK_FREQUENCY: f32 = 440.0;

/// The fixed instrument roster.
///
/// Serialized by its lowercase name in the JSON exchange format
/// (`"piano"`, `"drums"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Piano,
    Drums,
    Bass,
    Synth,
    Guitar,
    Strings,
    Brass,
    Percussion,
}

impl Instrument {
    pub const ALL: [Instrument; NUM_INSTRUMENTS] = [
        Instrument::Piano,
        Instrument::Drums,
        Instrument::Bass,
        Instrument::Synth,
        Instrument::Guitar,
        Instrument::Strings,
        Instrument::Brass,
        Instrument::Percussion,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Piano => "Piano",
            Instrument::Drums => "Drums",
            Instrument::Bass => "Bass",
            Instrument::Synth => "Synth",
            Instrument::Guitar => "Guitar",
            Instrument::Strings => "Strings",
            Instrument::Brass => "Brass",
            Instrument::Percussion => "Percussion",
        }
    }

    pub fn timbre(self) -> &'static Timbre {
        &TIMBRES[self.index()]
    }
}

/// Percussion row tags. Only kick/snare/hihat get dedicated noise shaping;
/// everything else renders as the generic burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTag {
    Kick,
    Snare,
    Hihat,
    OpenHat,
    Crash,
    Ride,
    Tom1,
    Tom2,
    Conga1,
    Conga2,
    Bongo1,
    Bongo2,
    Shaker,
    Bell,
    Cowbell,
    Clap,
}

/// The synthesis recipe for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timbre {
    Oscillator {
        wave: Waveform,
        freqs: [f32; ROWS_PER_INSTRUMENT],
    },
    Noise {
        samples: [SampleTag; ROWS_PER_INSTRUMENT],
    },
    Pluck {
        freqs: [f32; ROWS_PER_INSTRUMENT],
    },
}

impl Timbre {
    /// Row frequency with the 440 Hz fallback. Noise timbres have no pitch
    /// table and always report the fallback (this is what lands in the
    /// `frequency` field of exported notes).
    pub fn frequency(&self, row: usize) -> f32 {
        match self {
            Timbre::Oscillator { freqs, .. } | Timbre::Pluck { freqs } => {
                freqs.get(row).copied().unwrap_or(FALLBACK_FREQUENCY)
            }
            Timbre::Noise { .. } => FALLBACK_FREQUENCY,
        }
    }

    /// Row sample tag, falling back to the first tag for out-of-range rows.
    pub fn sample_tag(&self, row: usize) -> Option<SampleTag> {
        match self {
            Timbre::Noise { samples } => Some(samples.get(row).copied().unwrap_or(samples[0])),
            _ => None,
        }
    }
}

static TIMBRES: [Timbre; NUM_INSTRUMENTS] = [
    // piano: C4 major scale
    Timbre::Oscillator {
        wave: Waveform::Sine,
        freqs: [261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25],
    },
    // drums
    Timbre::Noise {
        samples: [
            SampleTag::Kick,
            SampleTag::Snare,
            SampleTag::Hihat,
            SampleTag::OpenHat,
            SampleTag::Crash,
            SampleTag::Ride,
            SampleTag::Tom1,
            SampleTag::Tom2,
        ],
    },
    // bass: E2 chromatic walk
    Timbre::Oscillator {
        wave: Waveform::Sawtooth,
        freqs: [82.41, 87.31, 92.50, 98.00, 103.83, 110.00, 116.54, 123.47],
    },
    // synth: same scale as piano, hollower wave
    Timbre::Oscillator {
        wave: Waveform::Square,
        freqs: [261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25],
    },
    // guitar
    Timbre::Pluck {
        freqs: [196.00, 246.94, 293.66, 329.63, 369.99, 415.30, 466.16, 523.25],
    },
    // strings
    Timbre::Oscillator {
        wave: Waveform::Triangle,
        freqs: [196.00, 220.00, 246.94, 261.63, 293.66, 329.63, 349.23, 392.00],
    },
    // brass
    Timbre::Oscillator {
        wave: Waveform::Sawtooth,
        freqs: [174.61, 196.00, 220.00, 246.94, 261.63, 293.66, 329.63, 349.23],
    },
    // percussion
    Timbre::Noise {
        samples: [
            SampleTag::Conga1,
            SampleTag::Conga2,
            SampleTag::Bongo1,
            SampleTag::Bongo2,
            SampleTag::Shaker,
            SampleTag::Bell,
            SampleTag::Cowbell,
            SampleTag::Clap,
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_instrument_has_a_timbre() {
        for instrument in Instrument::ALL {
            match instrument.timbre() {
                Timbre::Oscillator { freqs, .. } | Timbre::Pluck { freqs } => {
                    assert!(freqs.iter().all(|f| *f > 0.0), "{instrument:?}");
                }
                Timbre::Noise { .. } => {}
            }
        }
    }

    #[test]
    fn out_of_range_row_falls_back() {
        let piano = Instrument::Piano.timbre();
        assert_eq!(piano.frequency(99), FALLBACK_FREQUENCY);

        let drums = Instrument::Drums.timbre();
        assert_eq!(drums.sample_tag(99), Some(SampleTag::Kick));
        assert_eq!(drums.frequency(0), FALLBACK_FREQUENCY);
    }

    #[test]
    fn instrument_ids_round_trip_as_lowercase_json() {
        let json = serde_json::to_string(&Instrument::Percussion).unwrap();
        assert_eq!(json, "\"percussion\"");
        let back: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Instrument::Percussion);
    }

    #[test]
    fn indices_match_roster_order() {
        for (i, instrument) in Instrument::ALL.iter().enumerate() {
            assert_eq!(instrument.index(), i);
        }
    }
}
