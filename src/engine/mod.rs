//! Engine runtime: the audio clock, the lookahead scheduler, the realtime
//! mixer, the offline renderer, and the [`AudioSession`] that owns them.

pub mod clock;
pub mod mixer;
pub mod offline;
pub mod scheduler;

pub use clock::AudioClock;
pub use mixer::{Mixer, MixerCommand, ScheduledVoice, COMMAND_QUEUE_SIZE, MAX_ACTIVE_VOICES};
pub use offline::{render_offline, RenderError, OFFLINE_MASTER_GAIN, RENDER_TAIL_SECS};
pub use scheduler::{
    LookaheadScheduler, ScheduledStep, DEFAULT_TEMPO, DEFAULT_VOLUME, LOOKAHEAD_INTERVAL,
    SCHEDULE_AHEAD_SECS,
};

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Producer, RingBuffer};

use crate::sequencing::SequenceGrid;
use crate::voices::{Instrument, Voice, PREVIEW_DURATION};

/// Reasons the audio backend could not be brought up. All of these leave
/// the caller free to retry on the next user gesture.
#[derive(Debug)]
pub enum EngineError {
    NoOutputDevice,
    OutputConfig(cpal::DefaultStreamConfigError),
    UnsupportedSampleFormat(cpal::SampleFormat),
    BuildStream(cpal::BuildStreamError),
    PlayStream(cpal::PlayStreamError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoOutputDevice => write!(f, "no default audio output device"),
            EngineError::OutputConfig(err) => write!(f, "no usable output config: {err}"),
            EngineError::UnsupportedSampleFormat(format) => {
                write!(f, "unsupported sample format {format:?} (need f32)")
            }
            EngineError::BuildStream(err) => write!(f, "failed to build output stream: {err}"),
            EngineError::PlayStream(err) => write!(f, "failed to start output stream: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::NoOutputDevice => None,
            EngineError::OutputConfig(err) => Some(err),
            EngineError::UnsupportedSampleFormat(_) => None,
            EngineError::BuildStream(err) => Some(err),
            EngineError::PlayStream(err) => Some(err),
        }
    }
}

pub type StepCallback = Box<dyn FnMut(usize) + Send + 'static>;

struct Transport {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A live playback session.
///
/// Owns the cpal stream, the shared grid, the scheduler state and the
/// transport thread, with an explicit lifecycle: construction acquires the
/// audio backend, `Drop` cancels the transport and releases the stream.
/// There is no ambient global; create one per sequencer.
pub struct AudioSession {
    grid: Arc<Mutex<SequenceGrid>>,
    scheduler: Arc<Mutex<LookaheadScheduler>>,
    clock: AudioClock,
    commands: Arc<Mutex<Producer<MixerCommand>>>,
    step_callback: Arc<Mutex<Option<StepCallback>>>,
    transport: Option<Transport>,
    _stream: cpal::Stream,
}

impl AudioSession {
    /// Start a session with a fresh default grid.
    pub fn start() -> Result<Self, EngineError> {
        Self::with_grid(SequenceGrid::default())
    }

    /// Start a session around an existing grid (e.g. an imported one).
    pub fn with_grid(grid: SequenceGrid) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(EngineError::OutputConfig)?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(EngineError::UnsupportedSampleFormat(config.sample_format()));
        }

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let clock = AudioClock::new(sample_rate);
        let (tx, rx) = RingBuffer::new(COMMAND_QUEUE_SIZE);
        let mut mixer = Mixer::new(rx, clock.clone());

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _| mixer.render(data, channels),
                |err| tracing::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(EngineError::BuildStream)?;
        stream.play().map_err(EngineError::PlayStream)?;

        tracing::info!(sample_rate, channels, "audio session started");

        Ok(Self {
            grid: Arc::new(Mutex::new(grid)),
            scheduler: Arc::new(Mutex::new(LookaheadScheduler::new())),
            clock,
            commands: Arc::new(Mutex::new(tx)),
            step_callback: Arc::new(Mutex::new(None)),
            transport: None,
            _stream: stream,
        })
    }

    /// The shared grid. The UI mutates it directly; the transport reads it
    /// fresh on every tick.
    pub fn grid(&self) -> Arc<Mutex<SequenceGrid>> {
        Arc::clone(&self.grid)
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.lock().unwrap().is_playing()
    }

    pub fn tempo(&self) -> f32 {
        self.scheduler.lock().unwrap().tempo()
    }

    pub fn set_tempo(&self, tempo: f32) {
        self.scheduler.lock().unwrap().set_tempo(tempo);
    }

    pub fn volume(&self) -> u8 {
        self.scheduler.lock().unwrap().volume()
    }

    pub fn set_volume(&self, volume: u8) {
        self.scheduler.lock().unwrap().set_volume(volume);
    }

    /// Register the per-step callback, invoked once per dispatched step
    /// while playing. It runs on the transport thread and must not block.
    pub fn on_step(&self, callback: impl FnMut(usize) + Send + 'static) {
        *self.step_callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// Begin playback from step 0. No-op while already playing.
    pub fn play(&mut self) {
        {
            let mut scheduler = self.scheduler.lock().unwrap();
            if scheduler.is_playing() {
                return;
            }
            scheduler.play(self.clock.now());
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = TransportCtx {
            cancel: Arc::clone(&cancel),
            grid: Arc::clone(&self.grid),
            scheduler: Arc::clone(&self.scheduler),
            clock: self.clock.clone(),
            commands: Arc::clone(&self.commands),
            step_callback: Arc::clone(&self.step_callback),
        };

        match thread::Builder::new()
            .name("steplab-transport".into())
            .spawn(move || transport_loop(ctx))
        {
            Ok(handle) => {
                self.transport = Some(Transport {
                    cancel,
                    thread: handle,
                });
            }
            Err(err) => {
                tracing::error!("could not spawn transport thread: {err}");
                self.scheduler.lock().unwrap().stop();
            }
        }
    }

    /// Stop playback and rewind. Idempotent; cancels the pending transport
    /// tick but never voices already handed to the mixer; those are short
    /// one-shot events and run to completion.
    pub fn stop(&mut self) {
        self.scheduler.lock().unwrap().stop();
        if let Some(transport) = self.transport.take() {
            transport.cancel.store(true, Ordering::Relaxed);
            let _ = transport.thread.join();
        }
    }

    /// Immediately audition one cell's sound (used when a cell is toggled
    /// on). Plays for a fixed short duration at the session volume.
    pub fn preview(&self, instrument: Instrument, row: usize) {
        let gain = self.scheduler.lock().unwrap().gain();
        let voice = Voice::build(
            instrument,
            row,
            PREVIEW_DURATION,
            self.sample_rate() as f32,
            self.clock.frames() as u32,
        );
        let _ = self
            .commands
            .lock()
            .unwrap()
            .push(MixerCommand::Schedule(ScheduledVoice {
                start_frame: 0, // in the past: starts on the next block
                gain,
                voice,
            }));
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TransportCtx {
    cancel: Arc<AtomicBool>,
    grid: Arc<Mutex<SequenceGrid>>,
    scheduler: Arc<Mutex<LookaheadScheduler>>,
    clock: AudioClock,
    commands: Arc<Mutex<Producer<MixerCommand>>>,
    step_callback: Arc<Mutex<Option<StepCallback>>>,
}

/// The transport loop: wake up, drain the schedule-ahead window, dispatch
/// voices stamped with audio-clock frames, notify the UI, sleep. Wake-up
/// jitter here cannot move a note (times come from the scheduler's
/// arithmetic), it only eats into the 100 ms safety margin.
fn transport_loop(ctx: TransportCtx) {
    let sample_rate = ctx.clock.sample_rate() as f32;

    while !ctx.cancel.load(Ordering::Relaxed) {
        let now = ctx.clock.now();
        let steps = ctx.grid.lock().unwrap().steps();

        let (due, interval, gain) = {
            let mut scheduler = ctx.scheduler.lock().unwrap();
            (
                scheduler.drain_window(now, steps),
                scheduler.step_interval(),
                scheduler.gain(),
            )
        };

        for scheduled in due {
            // read the grid fresh for every step so live edits land
            let cells: Vec<(Instrument, usize)> = ctx
                .grid
                .lock()
                .unwrap()
                .active_cells(scheduled.step)
                .collect();

            if !cells.is_empty() {
                let start_frame = ctx.clock.time_to_frame(scheduled.time);
                let mut commands = ctx.commands.lock().unwrap();
                for (instrument, row) in cells {
                    let seed = offline::voice_seed(instrument, row, scheduled.step)
                        ^ start_frame as u32;
                    let voice =
                        Voice::build(instrument, row, interval as f32, sample_rate, seed);
                    let _ = commands.push(MixerCommand::Schedule(ScheduledVoice {
                        start_frame,
                        gain,
                        voice,
                    }));
                }
            }

            if let Some(callback) = ctx.step_callback.lock().unwrap().as_mut() {
                callback(scheduled.step);
            }
        }

        thread::sleep(LOOKAHEAD_INTERVAL);
    }
}
