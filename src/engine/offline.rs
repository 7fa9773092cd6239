use std::error::Error;
use std::fmt;

use crate::io::AudioBuffer;
use crate::sequencing::{step_seconds, SequenceGrid};
use crate::voices::{Instrument, Voice};

/// Master gain applied to the offline mix, matching the live default
/// volume of 70.
pub const OFFLINE_MASTER_GAIN: f32 = 0.7;

/// Seconds of tail appended after the last step so final notes can ring
/// out.
pub const RENDER_TAIL_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Tempo must be strictly positive to derive a step duration.
    InvalidTempo(f32),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidTempo(tempo) => {
                write!(f, "cannot render at non-positive tempo {tempo}")
            }
        }
    }
}

impl Error for RenderError {}

/// Deterministic seed for one cell's noise voice, so the same grid always
/// renders the same bytes.
pub(crate) fn voice_seed(instrument: Instrument, row: usize, step: usize) -> u32 {
    ((instrument.index() as u32) << 24) ^ ((row as u32) << 16) ^ step as u32
}

/// Render the whole grid into a stereo buffer, with no wall clock
/// anywhere: `current_time` accumulates one exact step interval per step.
///
/// The duration is `steps * interval + RENDER_TAIL_SECS`, so a note on the
/// final step decays inside the buffer instead of being cut. Identical
/// inputs produce bit-identical output.
pub fn render_offline(
    grid: &SequenceGrid,
    tempo: f32,
    sample_rate: u32,
) -> Result<AudioBuffer, RenderError> {
    if tempo <= 0.0 {
        return Err(RenderError::InvalidTempo(tempo));
    }

    let steps = grid.steps();
    let interval = step_seconds(tempo);
    let total_secs = steps as f64 * interval + RENDER_TAIL_SECS;
    let total_frames = (total_secs * sample_rate as f64).ceil() as usize;

    let mut buffer = AudioBuffer::stereo(total_frames, sample_rate);

    let mut current_time = 0.0f64;
    for step in 0..steps {
        let offset = (current_time * sample_rate as f64).round() as usize;
        for (instrument, row) in grid.active_cells(step) {
            let mut voice = Voice::build(
                instrument,
                row,
                interval as f32,
                sample_rate as f32,
                voice_seed(instrument, row, step),
            );

            let (left, right) = buffer.stereo_pair_mut();
            for i in offset..total_frames {
                if voice.is_finished() {
                    break;
                }
                let sample = voice.next_sample() * OFFLINE_MASTER_GAIN;
                left[i] += sample;
                right[i] += sample;
            }
        }
        current_time += interval;
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::SequenceGrid;

    #[test]
    fn duration_includes_one_second_tail() {
        let grid = SequenceGrid::new(16);
        let buffer = render_offline(&grid, 120.0, 44_100).unwrap();
        // 16 * 0.125 + 1.0 = 3.0 seconds
        assert_eq!(buffer.frames(), 3 * 44_100);
        assert_eq!(buffer.channels(), 2);
    }

    #[test]
    fn empty_grid_renders_silence() {
        let grid = SequenceGrid::new(8);
        let buffer = render_offline(&grid, 120.0, 44_100).unwrap();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn rendering_is_bit_identical_across_runs() {
        let mut grid = SequenceGrid::new(16);
        grid.set(Instrument::Drums, 0, 0, true);
        grid.set(Instrument::Drums, 2, 4, true);
        grid.set(Instrument::Guitar, 3, 8, true);

        let a = render_offline(&grid, 120.0, 44_100).unwrap();
        let b = render_offline(&grid, 120.0, 44_100).unwrap();
        for ch in 0..2 {
            let same = a
                .channel(ch)
                .iter()
                .zip(b.channel(ch))
                .all(|(x, y)| x.to_bits() == y.to_bits());
            assert!(same, "channel {ch} must be deterministic");
        }
    }

    #[test]
    fn disabled_instruments_are_not_rendered() {
        let mut grid = SequenceGrid::new(8);
        grid.set(Instrument::Drums, 0, 0, true);
        grid.set_enabled(Instrument::Drums, false);

        let buffer = render_offline(&grid, 120.0, 44_100).unwrap();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn non_positive_tempo_is_an_error() {
        let grid = SequenceGrid::new(8);
        assert_eq!(
            render_offline(&grid, 0.0, 44_100),
            Err(RenderError::InvalidTempo(0.0))
        );
        assert!(render_offline(&grid, -3.0, 44_100).is_err());
    }
}
