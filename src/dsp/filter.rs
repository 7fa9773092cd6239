use std::f32::consts::PI;

/*
| mode      | passes          | sequencer use                         |
| --------- | --------------- | ------------------------------------- |
| low-pass  | below cutoff    | oscillator brightness, kick body      |
| band-pass | around cutoff   | snare crack, generic percussion       |
| high-pass | above cutoff    | hi-hat sizzle                         |
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    BandPass,
    HighPass,
}

/// Topology-preserving state-variable filter.
///
/// The voice layer constructs one per voice with a fixed cutoff and Q, so
/// the warped coefficient `g` is computed once up front rather than per
/// block. `k` is the damping, `1/Q`.
pub struct StateVariableFilter {
    mode: FilterMode,
    g: f32,
    k: f32,

    ic1eq: f32, // first integrator state
    ic2eq: f32, // second integrator state
}

impl StateVariableFilter {
    pub fn new(mode: FilterMode, cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        // keep the prewarp stable below Nyquist
        let cutoff = cutoff_hz.clamp(10.0, 0.49 * sample_rate);
        Self {
            mode,
            g: (PI * cutoff / sample_rate).tan(),
            k: 1.0 / q.max(0.05),
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    pub fn lowpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        Self::new(FilterMode::LowPass, cutoff_hz, 1.0, sample_rate)
    }

    pub fn bandpass(cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        Self::new(FilterMode::BandPass, cutoff_hz, q, sample_rate)
    }

    pub fn highpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        Self::new(FilterMode::HighPass, cutoff_hz, 1.0, sample_rate)
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let g = self.g;
        let h = 1.0 / (1.0 + g * (g + self.k));

        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.mode {
            FilterMode::LowPass => v2,
            FilterMode::BandPass => v1,
            FilterMode::HighPass => sample - self.k * v1 - v2,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        buffer[buffer.len().min(64)..]
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn sine_through(filter: &mut StateVariableFilter, frequency: f32) -> f32 {
        let mut osc = Oscillator::new(Waveform::Sine, frequency, SAMPLE_RATE);
        let mut buffer = vec![0.0f32; 1024];
        osc.render(&mut buffer);
        filter.render(&mut buffer);
        peak_after_transient(&buffer)
    }

    #[test]
    fn lowpass_passes_dc_rejects_high() {
        let mut filter = StateVariableFilter::lowpass(500.0, SAMPLE_RATE);
        let mut dc = vec![1.0f32; 1024];
        filter.render(&mut dc);
        assert!(dc[1023] > 0.99, "lowpass should settle to unity at DC");

        filter.reset();
        let high = sine_through(&mut filter, 8_000.0);
        assert!(high < 0.1, "expected high-frequency rejection, got {high}");
    }

    #[test]
    fn highpass_rejects_low_passes_high() {
        let mut filter = StateVariableFilter::highpass(4_000.0, SAMPLE_RATE);
        let low = sine_through(&mut filter, 100.0);
        filter.reset();
        let high = sine_through(&mut filter, 12_000.0);

        assert!(
            high > low * 4.0,
            "expected highpass tilt, got low={low}, high={high}"
        );
    }

    #[test]
    fn bandpass_emphasizes_center() {
        let mut filter = StateVariableFilter::bandpass(1_000.0, 0.5, SAMPLE_RATE);
        let center = sine_through(&mut filter, 1_000.0);
        filter.reset();
        let off = sine_through(&mut filter, 8_000.0);

        assert!(
            center > off * 2.0,
            "expected bandpass emphasis, got center={center}, off={off}"
        );
    }

    #[test]
    fn cutoff_above_nyquist_is_clamped() {
        let mut filter = StateVariableFilter::lowpass(30_000.0, SAMPLE_RATE);
        let peak = sine_through(&mut filter, 1_000.0);
        assert!(peak.is_finite() && peak > 0.5);
    }
}
