//! Application state and input handling. The TUI is the "external
//! collaborator" of the engine: it mutates the shared grid, drives
//! play/stop/tempo/volume, and receives the per-step callback.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;

use steplab::engine::{render_offline, AudioSession, DEFAULT_TEMPO, DEFAULT_VOLUME};
use steplab::io::{export_json, import_sequence, write_wav_file};
use steplab::sequencing::{SequenceGrid, STEPS_PER_BAR};
use steplab::voices::{Instrument, ROWS_PER_INSTRUMENT};
use steplab::DEFAULT_SAMPLE_RATE;

use crate::ui;

/// Sentinel for "no step is playing".
pub const NO_STEP: usize = usize::MAX;

const MIN_TEMPO: f32 = 40.0;
const MAX_TEMPO: f32 = 240.0;
const MAX_BARS: usize = 16;

pub struct App {
    session: Option<AudioSession>,
    pub grid: Arc<Mutex<SequenceGrid>>,
    pub tempo: f32,
    pub volume: u8,
    pub instrument: usize,
    pub cursor_row: usize,
    pub cursor_step: usize,
    pub playing_step: Arc<AtomicUsize>,
    pub status: String,
    should_quit: bool,
}

impl App {
    pub fn new(load_path: Option<&str>) -> Result<Self> {
        // A missing audio backend leaves the editor fully usable; playback
        // and preview become no-ops until a session can be started.
        let session = match AudioSession::start() {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!("audio unavailable, running inert: {err}");
                None
            }
        };

        let grid = session
            .as_ref()
            .map(|s| s.grid())
            .unwrap_or_else(|| Arc::new(Mutex::new(SequenceGrid::default())));

        let playing_step = Arc::new(AtomicUsize::new(NO_STEP));
        if let Some(session) = &session {
            let highlight = Arc::clone(&playing_step);
            session.on_step(move |step| highlight.store(step, Ordering::Relaxed));
        }

        let mut app = Self {
            session,
            grid,
            tempo: DEFAULT_TEMPO,
            volume: DEFAULT_VOLUME,
            instrument: 0,
            cursor_row: 0,
            cursor_step: 0,
            playing_step,
            status: String::new(),
            should_quit: false,
        };

        if let Some(path) = load_path {
            app.import_file(Path::new(path));
        }
        Ok(app)
    }

    pub fn audio_available(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_playing())
    }

    pub fn current_instrument(&self) -> Instrument {
        Instrument::ALL[self.instrument]
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| ui::render(frame, self))?;

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.stop();
                self.should_quit = true;
            }
            KeyCode::Char(' ') => self.toggle_playback(),
            KeyCode::Tab => self.instrument = (self.instrument + 1) % Instrument::ALL.len(),
            KeyCode::BackTab => {
                self.instrument =
                    (self.instrument + Instrument::ALL.len() - 1) % Instrument::ALL.len()
            }
            KeyCode::Up => self.cursor_row = self.cursor_row.saturating_sub(1),
            KeyCode::Down => {
                self.cursor_row = (self.cursor_row + 1).min(ROWS_PER_INSTRUMENT - 1)
            }
            KeyCode::Left => self.cursor_step = self.cursor_step.saturating_sub(1),
            KeyCode::Right => {
                let steps = self.grid.lock().unwrap().steps();
                self.cursor_step = (self.cursor_step + 1).min(steps - 1);
            }
            KeyCode::Enter | KeyCode::Char('x') => self.toggle_cell(),
            KeyCode::Char('e') => self.toggle_instrument_enabled(),
            KeyCode::Char('c') => {
                self.grid.lock().unwrap().clear();
                self.status = "cleared".into();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_tempo(self.tempo + 5.0),
            KeyCode::Char('-') => self.set_tempo(self.tempo - 5.0),
            KeyCode::Char(']') => self.set_volume(self.volume.saturating_add(5)),
            KeyCode::Char('[') => self.set_volume(self.volume.saturating_sub(5)),
            KeyCode::Char('.') => self.set_bars(1),
            KeyCode::Char(',') => self.set_bars(-1),
            KeyCode::Char('s') => self.save_json(),
            KeyCode::Char('w') => self.save_wav(),
            _ => {}
        }
    }

    fn toggle_playback(&mut self) {
        if self.is_playing() {
            self.stop();
            return;
        }
        if self.session.is_none() {
            // a failed backend is retried on the next user gesture
            self.try_start_audio();
        }
        if let Some(session) = &mut self.session {
            session.play();
            self.status = "playing".into();
        } else {
            self.status = "audio unavailable".into();
        }
    }

    fn try_start_audio(&mut self) {
        let snapshot = self.grid.lock().unwrap().clone();
        match AudioSession::with_grid(snapshot) {
            Ok(session) => {
                self.grid = session.grid();
                let highlight = Arc::clone(&self.playing_step);
                session.on_step(move |step| highlight.store(step, Ordering::Relaxed));
                session.set_tempo(self.tempo);
                session.set_volume(self.volume);
                self.session = Some(session);
                self.status = "audio started".into();
            }
            Err(err) => {
                tracing::warn!("audio still unavailable: {err}");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(session) = &mut self.session {
            session.stop();
        }
        self.playing_step.store(NO_STEP, Ordering::Relaxed);
        self.status = "stopped".into();
    }

    fn toggle_cell(&mut self) {
        let instrument = self.current_instrument();
        let activated = self
            .grid
            .lock()
            .unwrap()
            .toggle(instrument, self.cursor_row, self.cursor_step);

        // audition only when the cell turns on
        if activated {
            if let Some(session) = &self.session {
                session.preview(instrument, self.cursor_row);
            }
        }
    }

    fn toggle_instrument_enabled(&mut self) {
        let instrument = self.current_instrument();
        let mut grid = self.grid.lock().unwrap();
        let enabled = !grid.is_enabled(instrument);
        grid.set_enabled(instrument, enabled);
        drop(grid);
        self.status = format!(
            "{} {}",
            instrument.name(),
            if enabled { "enabled" } else { "muted" }
        );
    }

    fn set_tempo(&mut self, tempo: f32) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        if let Some(session) = &self.session {
            session.set_tempo(self.tempo);
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        if let Some(session) = &self.session {
            session.set_volume(self.volume);
        }
    }

    fn set_bars(&mut self, delta: isize) {
        let mut grid = self.grid.lock().unwrap();
        let bars = grid.bars().saturating_add_signed(delta).clamp(1, MAX_BARS);
        grid.resize(bars * STEPS_PER_BAR);
        self.cursor_step = self.cursor_step.min(grid.steps() - 1);
    }

    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn save_json(&mut self) {
        let json = {
            let grid = self.grid.lock().unwrap();
            export_json(&grid, self.tempo)
        };
        let path = format!("steplab-{}.json", Self::timestamp());
        self.status = match std::fs::write(&path, json) {
            Ok(()) => format!("saved {path}"),
            Err(err) => format!("save failed: {err}"),
        };
    }

    fn save_wav(&mut self) {
        let sample_rate = self
            .session
            .as_ref()
            .map_or(DEFAULT_SAMPLE_RATE, |s| s.sample_rate());
        let rendered = {
            let grid = self.grid.lock().unwrap();
            render_offline(&grid, self.tempo, sample_rate)
        };
        self.status = match rendered {
            Ok(buffer) => {
                let path = format!("steplab-{}.wav", Self::timestamp());
                match write_wav_file(&buffer, Path::new(&path)) {
                    Ok(()) => format!("rendered {path}"),
                    Err(err) => format!("wav export failed: {err}"),
                }
            }
            Err(err) => format!("render failed: {err}"),
        };
    }

    fn import_file(&mut self, path: &Path) {
        let loaded = std::fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|json| import_sequence(&json).map_err(|err| err.to_string()));

        match loaded {
            Ok(imported) => {
                self.set_tempo(imported.tempo);
                *self.grid.lock().unwrap() = imported.grid;
                self.cursor_step = 0;
                self.status = format!("loaded {}", path.display());
            }
            Err(err) => {
                // the existing grid is left exactly as it was
                self.status = format!("import failed: {err}");
            }
        }
    }
}
