use crate::dsp::envelope::OneShotEnvelope;
use crate::dsp::filter::StateVariableFilter;
use crate::dsp::oscillator::NoiseSource;

use super::timbre::SampleTag;

/*
Percussion is shaped white noise: the raw noise is multiplied by a
per-sample decay curve, pushed through a tag-specific filter, and scaled
by an exponential gain envelope.

  tag     decay window     extra character            filter
  ------  ---------------  -------------------------  -----------------
  kick    10% of samples   slow sine wobble (+/-50%)  lowpass 100 Hz
  snare    5% of samples                              bandpass 200 Hz Q .5
  hihat    2% of samples   stochastic gate: ~30% of   highpass 8 kHz
                           samples pass, rest at 10%
  other    5% of samples                              bandpass 1 kHz
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoiseShape {
    Kick,
    Snare,
    Hihat,
    Generic,
}

impl NoiseShape {
    fn from_tag(tag: SampleTag) -> Self {
        match tag {
            SampleTag::Kick => NoiseShape::Kick,
            SampleTag::Snare => NoiseShape::Snare,
            SampleTag::Hihat => NoiseShape::Hihat,
            _ => NoiseShape::Generic,
        }
    }
}

const GAIN_START: f32 = 0.4;
const GAIN_FLOOR: f32 = 0.001;

pub struct NoiseVoice {
    noise: NoiseSource,
    filter: StateVariableFilter,
    env: OneShotEnvelope,
    shape: NoiseShape,

    position: u32,
    total: u32,
}

impl NoiseVoice {
    pub fn new(tag: SampleTag, duration: f32, sample_rate: f32, seed: u32) -> Self {
        let shape = NoiseShape::from_tag(tag);
        let filter = match shape {
            NoiseShape::Kick => StateVariableFilter::lowpass(100.0, sample_rate),
            NoiseShape::Snare => StateVariableFilter::bandpass(200.0, 0.5, sample_rate),
            NoiseShape::Hihat => StateVariableFilter::highpass(8_000.0, sample_rate),
            NoiseShape::Generic => StateVariableFilter::bandpass(1_000.0, 1.0, sample_rate),
        };
        let total = ((duration * sample_rate) as u32).max(1);

        Self {
            noise: NoiseSource::with_seed(seed),
            filter,
            env: OneShotEnvelope::decay(GAIN_START, GAIN_FLOOR, duration, sample_rate),
            shape,
            position: 0,
            total,
        }
    }

    /// Decay curve and per-tag character for sample index `i` of `n`.
    #[inline]
    fn shaped_noise(&mut self, i: u32, n: u32) -> f32 {
        let white = self.noise.next_sample();
        let i = i as f32;
        let n = n as f32;
        match self.shape {
            NoiseShape::Kick => {
                white * (-i / (n * 0.1)).exp() * (1.0 + (i * 0.001).sin() * 0.5)
            }
            NoiseShape::Snare => white * (-i / (n * 0.05)).exp(),
            NoiseShape::Hihat => {
                let gate = if self.noise.next_unit() > 0.7 { 1.0 } else { 0.1 };
                white * (-i / (n * 0.02)).exp() * gate
            }
            NoiseShape::Generic => white * (-i / (n * 0.05)).exp(),
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.position >= self.total {
            return 0.0;
        }
        let shaped = self.shaped_noise(self.position, self.total);
        self.position += 1;
        self.filter.process(shaped) * self.env.next_sample()
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total
    }
}
