use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sequencing::{step_seconds, SequenceGrid, STEPS_PER_BAR};
use crate::voices::{Instrument, ROWS_PER_INSTRUMENT};

/// The JSON exchange envelope.
///
/// `tempo` and `instruments` are mandatory; everything else degrades:
/// missing `bars` falls back to `totalSteps`, missing `totalSteps` to 32,
/// missing `enabledInstruments` enables everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceExport {
    pub tempo: f32,
    #[serde(default)]
    pub total_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_instruments: Option<Vec<Instrument>>,
    pub instruments: BTreeMap<Instrument, Vec<RowExport>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowExport {
    pub note_index: usize,
    pub notes: Vec<NoteExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteExport {
    pub step: usize,
    pub note: usize,
    pub frequency: f32,
    pub duration: f32,
}

/// Serialize the grid. Rows with no active cells are omitted, as are
/// instruments with no populated rows. `bars` is only emitted when the
/// step count divides evenly into bars.
pub fn export_sequence(grid: &SequenceGrid, tempo: f32) -> SequenceExport {
    let steps = grid.steps();
    let duration = step_seconds(tempo) as f32;

    let mut instruments = BTreeMap::new();
    for instrument in Instrument::ALL {
        let timbre = instrument.timbre();
        let mut rows = Vec::new();
        for row in 0..ROWS_PER_INSTRUMENT {
            let notes: Vec<NoteExport> = grid
                .row(instrument, row)
                .iter()
                .enumerate()
                .filter(|(_, active)| **active)
                .map(|(step, _)| NoteExport {
                    step,
                    note: row,
                    frequency: timbre.frequency(row),
                    duration,
                })
                .collect();
            if !notes.is_empty() {
                rows.push(RowExport {
                    note_index: row,
                    notes,
                });
            }
        }
        if !rows.is_empty() {
            instruments.insert(instrument, rows);
        }
    }

    SequenceExport {
        tempo,
        total_steps: Some(steps),
        bars: (steps % STEPS_PER_BAR == 0).then(|| steps / STEPS_PER_BAR),
        enabled_instruments: Some(grid.enabled_instruments()),
        instruments,
    }
}

pub fn export_json(grid: &SequenceGrid, tempo: f32) -> String {
    // SequenceExport contains only map/vec/number fields; serialization
    // cannot fail
    serde_json::to_string_pretty(&export_sequence(grid, tempo)).unwrap_or_default()
}

/// A validated import: a fresh grid plus the tempo that came with it.
/// Nothing is applied to any existing state; the caller swaps the grid
/// in whole, so a failed import leaves everything untouched.
#[derive(Debug, Clone)]
pub struct ImportedSequence {
    pub tempo: f32,
    pub grid: SequenceGrid,
}

#[derive(Debug)]
pub enum ImportError {
    /// Not JSON, or missing the mandatory `tempo`/`instruments` fields.
    Malformed(serde_json::Error),
    /// Parsed fine but the tempo cannot drive a scheduler.
    InvalidTempo(f32),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Malformed(err) => write!(f, "malformed sequence data: {err}"),
            ImportError::InvalidTempo(tempo) => {
                write!(f, "imported tempo {tempo} is not positive")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImportError::Malformed(err) => Some(err),
            ImportError::InvalidTempo(_) => None,
        }
    }
}

pub fn import_sequence(json: &str) -> Result<ImportedSequence, ImportError> {
    let data: SequenceExport = serde_json::from_str(json).map_err(ImportError::Malformed)?;
    if data.tempo <= 0.0 {
        return Err(ImportError::InvalidTempo(data.tempo));
    }

    // bars wins over totalSteps, 32 is the last resort
    let steps = data
        .bars
        .map(|bars| bars * STEPS_PER_BAR)
        .or(data.total_steps)
        .unwrap_or(32)
        .max(1);

    let mut grid = SequenceGrid::new(steps);

    if let Some(enabled) = &data.enabled_instruments {
        for instrument in Instrument::ALL {
            grid.set_enabled(instrument, enabled.contains(&instrument));
        }
    }

    for (instrument, rows) in &data.instruments {
        for row in rows {
            if row.note_index >= ROWS_PER_INSTRUMENT {
                continue;
            }
            for note in &row.notes {
                if note.step < steps {
                    grid.set(*instrument, row.note_index, note.step, true);
                }
            }
        }
    }

    Ok(ImportedSequence {
        tempo: data.tempo,
        grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_grid() -> SequenceGrid {
        let mut grid = SequenceGrid::new(16);
        grid.set(Instrument::Drums, 0, 0, true);
        grid.set(Instrument::Drums, 0, 8, true);
        grid.set(Instrument::Drums, 2, 4, true);
        grid.set(Instrument::Piano, 5, 3, true);
        grid.set(Instrument::Guitar, 7, 15, true);
        grid
    }

    #[test]
    fn export_omits_empty_rows_and_instruments() {
        let export = export_sequence(&demo_grid(), 120.0);

        assert!(!export.instruments.contains_key(&Instrument::Bass));
        let drums = &export.instruments[&Instrument::Drums];
        assert_eq!(drums.len(), 2); // rows 0 and 2 only
        assert_eq!(drums[0].note_index, 0);
        assert_eq!(drums[0].notes.len(), 2);
    }

    #[test]
    fn export_carries_step_duration_and_frequency() {
        let export = export_sequence(&demo_grid(), 120.0);

        let piano = &export.instruments[&Instrument::Piano];
        let note = &piano[0].notes[0];
        assert_eq!(note.step, 3);
        assert_eq!(note.note, 5);
        assert_eq!(note.frequency, 440.0); // piano row 5
        assert_eq!(note.duration, 0.125);

        // drums have no pitch table: fallback frequency
        assert_eq!(export.instruments[&Instrument::Drums][0].notes[0].frequency, 440.0);
    }

    #[test]
    fn round_trip_reproduces_active_cells() {
        let grid = demo_grid();
        let json = export_json(&grid, 97.0);
        let imported = import_sequence(&json).unwrap();

        assert_eq!(imported.tempo, 97.0);
        assert_eq!(imported.grid.steps(), 16);
        for instrument in Instrument::ALL {
            for row in 0..ROWS_PER_INSTRUMENT {
                for step in 0..16 {
                    assert_eq!(
                        imported.grid.get(instrument, row, step),
                        grid.get(instrument, row, step),
                        "{instrument:?} row {row} step {step}"
                    );
                }
            }
        }
    }

    #[test]
    fn round_trip_preserves_enabled_set() {
        let mut grid = demo_grid();
        grid.set_enabled(Instrument::Strings, false);
        grid.set_enabled(Instrument::Drums, false);

        let imported = import_sequence(&export_json(&grid, 120.0)).unwrap();
        assert!(!imported.grid.is_enabled(Instrument::Strings));
        assert!(!imported.grid.is_enabled(Instrument::Drums));
        assert!(imported.grid.is_enabled(Instrument::Piano));
    }

    #[test]
    fn import_requires_tempo_and_instruments() {
        assert!(matches!(
            import_sequence("{\"instruments\":{}}"),
            Err(ImportError::Malformed(_))
        ));
        assert!(matches!(
            import_sequence("{\"tempo\":120}"),
            Err(ImportError::Malformed(_))
        ));
        assert!(matches!(
            import_sequence("not json at all"),
            Err(ImportError::Malformed(_))
        ));
        assert!(matches!(
            import_sequence("{\"tempo\":0,\"instruments\":{}}"),
            Err(ImportError::InvalidTempo(_))
        ));
    }

    #[test]
    fn import_defaults_steps_when_sizes_are_missing() {
        let imported = import_sequence("{\"tempo\":120,\"instruments\":{}}").unwrap();
        assert_eq!(imported.grid.steps(), 32);

        let with_bars =
            import_sequence("{\"tempo\":120,\"bars\":4,\"instruments\":{}}").unwrap();
        assert_eq!(with_bars.grid.steps(), 16);

        let with_total =
            import_sequence("{\"tempo\":120,\"totalSteps\":12,\"instruments\":{}}").unwrap();
        assert_eq!(with_total.grid.steps(), 12);
    }

    #[test]
    fn import_skips_out_of_range_rows_and_steps() {
        let json = r#"{
            "tempo": 120,
            "totalSteps": 8,
            "instruments": {
                "piano": [
                    {"noteIndex": 0, "notes": [
                        {"step": 2, "note": 0, "frequency": 261.63, "duration": 0.125},
                        {"step": 99, "note": 0, "frequency": 261.63, "duration": 0.125}
                    ]},
                    {"noteIndex": 42, "notes": [
                        {"step": 1, "note": 42, "frequency": 440.0, "duration": 0.125}
                    ]}
                ]
            }
        }"#;
        let imported = import_sequence(json).unwrap();
        assert!(imported.grid.get(Instrument::Piano, 0, 2));
        let active: usize = (0..8)
            .map(|s| imported.grid.active_cells(s).count())
            .sum();
        assert_eq!(active, 1, "out-of-range entries must be dropped");
    }

    #[test]
    fn camel_case_field_names_on_the_wire() {
        let json = export_json(&demo_grid(), 120.0);
        assert!(json.contains("\"totalSteps\""));
        assert!(json.contains("\"noteIndex\""));
        assert!(json.contains("\"enabledInstruments\""));
        assert!(json.contains("\"drums\""));
    }
}
