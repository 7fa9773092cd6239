use crate::dsp::envelope::OneShotEnvelope;
use crate::dsp::filter::StateVariableFilter;
use crate::dsp::oscillator::Oscillator;
use crate::dsp::Waveform;

/// Melodic oscillator voice: waveform → row-dependent lowpass → envelope.
///
/// The lowpass cutoff climbs with the row index (`2000 + row*200` Hz) so
/// higher rows read brighter as well as higher-pitched. The envelope rises
/// linearly to 0.3 over 10 ms and decays exponentially to silence by the
/// end of the note.
pub struct OscillatorVoice {
    osc: Oscillator,
    filter: StateVariableFilter,
    env: OneShotEnvelope,
}

const PEAK: f32 = 0.3;
const FLOOR: f32 = 0.001;
const RISE_SECS: f32 = 0.01;

impl OscillatorVoice {
    pub fn new(
        wave: Waveform,
        frequency: f32,
        row: usize,
        duration: f32,
        sample_rate: f32,
    ) -> Self {
        let cutoff = 2_000.0 + row as f32 * 200.0;
        Self {
            osc: Oscillator::new(wave, frequency, sample_rate),
            filter: StateVariableFilter::lowpass(cutoff, sample_rate),
            env: OneShotEnvelope::new(PEAK, FLOOR, RISE_SECS, duration, sample_rate),
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.env.is_finished() {
            return 0.0;
        }
        let raw = self.osc.next_sample();
        self.filter.process(raw) * self.env.next_sample()
    }

    pub fn is_finished(&self) -> bool {
        self.env.is_finished()
    }
}
