use crate::voices::{Instrument, NUM_INSTRUMENTS, ROWS_PER_INSTRUMENT};

pub const DEFAULT_STEPS: usize = 32;
pub const STEPS_PER_BAR: usize = 4;

/// One instrument's lane: eight boolean rows plus an enabled flag.
#[derive(Debug, Clone)]
struct Lane {
    rows: [Vec<bool>; ROWS_PER_INSTRUMENT],
    enabled: bool,
}

impl Lane {
    fn new(steps: usize) -> Self {
        Self {
            rows: std::array::from_fn(|_| vec![false; steps]),
            enabled: true,
        }
    }
}

/// The sequence grid: instrument → row → per-step booleans.
///
/// Owned by the editor/UI; the scheduler and offline renderer only read
/// it. Every row is kept at exactly `steps` cells: `resize` pads with
/// inactive cells or truncates in place, so a reader never observes a
/// ragged row.
#[derive(Debug, Clone)]
pub struct SequenceGrid {
    steps: usize,
    lanes: [Lane; NUM_INSTRUMENTS],
}

impl SequenceGrid {
    pub fn new(steps: usize) -> Self {
        let steps = steps.max(1);
        Self {
            steps,
            lanes: std::array::from_fn(|_| Lane::new(steps)),
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn bars(&self) -> usize {
        self.steps.div_ceil(STEPS_PER_BAR)
    }

    pub fn get(&self, instrument: Instrument, row: usize, step: usize) -> bool {
        self.lanes[instrument.index()]
            .rows
            .get(row)
            .and_then(|r| r.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, instrument: Instrument, row: usize, step: usize, active: bool) {
        if let Some(cell) = self.lanes[instrument.index()]
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(step))
        {
            *cell = active;
        }
    }

    /// Flip one cell and return its new state. Out-of-range coordinates
    /// leave the grid untouched and report `false`.
    pub fn toggle(&mut self, instrument: Instrument, row: usize, step: usize) -> bool {
        match self.lanes[instrument.index()]
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(step))
        {
            Some(cell) => {
                *cell = !*cell;
                *cell
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            for row in &mut lane.rows {
                row.fill(false);
            }
        }
    }

    /// Grow or shrink every row to `steps` cells. New cells are inactive;
    /// truncation keeps the remaining prefix in order.
    pub fn resize(&mut self, steps: usize) {
        let steps = steps.max(1);
        for lane in &mut self.lanes {
            for row in &mut lane.rows {
                row.resize(steps, false);
            }
        }
        self.steps = steps;
    }

    pub fn is_enabled(&self, instrument: Instrument) -> bool {
        self.lanes[instrument.index()].enabled
    }

    pub fn set_enabled(&mut self, instrument: Instrument, enabled: bool) {
        self.lanes[instrument.index()].enabled = enabled;
    }

    pub fn enabled_instruments(&self) -> Vec<Instrument> {
        Instrument::ALL
            .into_iter()
            .filter(|i| self.is_enabled(*i))
            .collect()
    }

    pub fn row(&self, instrument: Instrument, row: usize) -> &[bool] {
        &self.lanes[instrument.index()].rows[row]
    }

    /// Every active `(instrument, row)` at `step`, skipping disabled
    /// instruments. Cells are read individually so a concurrent toggle for
    /// a later step is simply observed on its own turn.
    pub fn active_cells(&self, step: usize) -> impl Iterator<Item = (Instrument, usize)> + '_ {
        Instrument::ALL.into_iter().flat_map(move |instrument| {
            let lane = &self.lanes[instrument.index()];
            lane.rows
                .iter()
                .enumerate()
                .filter(move |(_, row)| lane.enabled && row.get(step).copied().unwrap_or(false))
                .map(move |(row_index, _)| (instrument, row_index))
        })
    }

    /// True when no cell is active anywhere.
    pub fn is_silent(&self) -> bool {
        self.lanes
            .iter()
            .all(|lane| lane.rows.iter().all(|row| !row.iter().any(|c| *c)))
    }
}

impl Default for SequenceGrid {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}
