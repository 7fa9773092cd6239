use crate::dsp::delay::DelayLine;
use crate::dsp::envelope::OneShotEnvelope;
use crate::dsp::filter::StateVariableFilter;
use crate::dsp::oscillator::Oscillator;
use crate::dsp::Waveform;

/// Karplus-Strong style plucked string.
///
/// A sawtooth burst excites a delay line one period (`1/frequency`) long.
/// The delayed signal is damped by a lowpass at twice the fundamental and
/// fed back at 50%, so the loop keeps ringing after the 0.1 s excitation
/// stops. The audible tap is the damped loop output through the note
/// envelope (5 ms rise to 0.3, exponential decay).
pub struct PluckVoice {
    exciter: Oscillator,
    string: DelayLine,
    damping: StateVariableFilter,
    env: OneShotEnvelope,

    burst_remaining: u32,
}

const FEEDBACK: f32 = 0.5;
const BURST_SECS: f32 = 0.1;
const PEAK: f32 = 0.3;
const FLOOR: f32 = 0.001;
const RISE_SECS: f32 = 0.005;

impl PluckVoice {
    pub fn new(frequency: f32, duration: f32, sample_rate: f32) -> Self {
        let period_samples = (sample_rate / frequency).round() as usize;
        Self {
            exciter: Oscillator::new(Waveform::Sawtooth, frequency, sample_rate),
            string: DelayLine::new(period_samples),
            damping: StateVariableFilter::lowpass(frequency * 2.0, sample_rate),
            env: OneShotEnvelope::new(PEAK, FLOOR, RISE_SECS, duration, sample_rate),
            burst_remaining: (BURST_SECS * sample_rate) as u32,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.env.is_finished() {
            return 0.0;
        }

        let excitation = if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            self.exciter.next_sample()
        } else {
            0.0
        };

        let delayed = self.string.read();
        let damped = self.damping.process(delayed);
        self.string.push(excitation + FEEDBACK * damped);

        damped * self.env.next_sample()
    }

    pub fn is_finished(&self) -> bool {
        self.env.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn render(frequency: f32, duration: f32) -> Vec<f32> {
        let mut voice = PluckVoice::new(frequency, duration, SAMPLE_RATE);
        let total = (duration * SAMPLE_RATE) as usize;
        (0..total).map(|_| voice.next_sample()).collect()
    }

    #[test]
    fn string_rings_past_the_burst() {
        let duration = 0.5;
        let samples = render(196.0, duration);
        let burst_end = (BURST_SECS * SAMPLE_RATE) as usize;

        let after: f32 = samples[burst_end..burst_end + 4_000]
            .iter()
            .map(|s| s * s)
            .sum();
        assert!(after > 0.0, "loop should ring after the excitation stops");
    }

    #[test]
    fn voice_ends_silent_and_finished() {
        let duration = 0.125;
        let samples = render(329.63, duration);

        let tail = &samples[samples.len() - 16..];
        assert!(tail.iter().all(|s| s.abs() < 0.02));

        let mut voice = PluckVoice::new(329.63, duration, SAMPLE_RATE);
        for _ in 0..samples.len() {
            voice.next_sample();
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn output_is_bounded() {
        let samples = render(523.25, 0.25);
        assert!(samples.iter().all(|s| s.abs() <= 1.0 && s.is_finite()));
    }
}
