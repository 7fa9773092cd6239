use std::time::Duration;

use crate::sequencing::step_seconds;

/*
Lookahead Scheduling
====================

A timer that fires every N milliseconds cannot place notes: the host
wakes it up late, sometimes very late, and a note started "whenever the
timer fired" audibly drags. The classic fix is two horizons:

  wake-up interval (25 ms)   How often the transport thread looks at the
                             sequence. Jitter here is harmless.

  schedule-ahead (100 ms)    How far into the future notes are handed to
                             the mixer on each look. Must comfortably
                             exceed the worst wake-up jitter.

On every look, the scheduler drains all steps whose ideal start time falls
inside [now, now + 100ms) and stamps each with that ideal time, computed
by accumulating exact step intervals on the audio clock, never by reading
the timer. A late wake-up therefore shrinks the safety margin but moves no
note: timing error goes into scheduling latency, not into the music.

  now            now+0.1s
   │   drained     │
───┼───●─────●─────┼────●────────→ audio-clock time
       step n      │    step n+2 (next look's problem)
             step n+1

The drain itself is a pure state transition on (current_step,
next_note_time), kept free of timers and channels so it can be unit
tested exhaustively.
*/

/// How often the transport thread re-checks for due steps.
pub const LOOKAHEAD_INTERVAL: Duration = Duration::from_millis(25);

/// How far into the future steps are dispatched on each check, in seconds.
pub const SCHEDULE_AHEAD_SECS: f64 = 0.1;

pub const DEFAULT_TEMPO: f32 = 120.0;
pub const DEFAULT_VOLUME: u8 = 70;

/// One step due for dispatch: which step, and the exact audio-clock time
/// its voices must start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledStep {
    pub step: usize,
    pub time: f64,
}

/// Playback state machine. `Stopped` ⇄ `Playing`, with all timing state
/// owned here and nowhere else.
pub struct LookaheadScheduler {
    tempo: f32,
    volume: u8,
    playing: bool,
    current_step: usize,
    next_note_time: f64,
}

impl LookaheadScheduler {
    pub fn new() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            volume: DEFAULT_VOLUME,
            playing: false,
            current_step: 0,
            next_note_time: 0.0,
        }
    }

    /// Start playing from step 0 with the first note due immediately.
    /// No-op when already playing.
    pub fn play(&mut self, now: f64) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.current_step = 0;
        self.next_note_time = now;
    }

    /// Stop and rewind. Idempotent.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current_step = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Set the tempo in BPM. Takes effect from the next scheduled note;
    /// anything already drained keeps its original timestamp. Non-positive
    /// values are rejected.
    pub fn set_tempo(&mut self, tempo: f32) {
        if tempo > 0.0 {
            self.tempo = tempo;
        } else {
            tracing::warn!(tempo, "ignoring non-positive tempo");
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Master volume 0..=100; values above 100 clamp.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    /// Linear master gain derived from the volume.
    pub fn gain(&self) -> f32 {
        self.volume as f32 / 100.0
    }

    /// Seconds between steps at the current tempo.
    pub fn step_interval(&self) -> f64 {
        step_seconds(self.tempo)
    }

    /// Drain every step due in `[now, now + SCHEDULE_AHEAD_SECS)`.
    ///
    /// Pure with respect to timers: the only inputs are the audio-clock
    /// `now` and the live step count, read fresh so a concurrent grid
    /// resize is honored on the next wraparound. The tempo is re-read per
    /// iteration, which is what makes mid-drain tempo changes apply to the
    /// *next* note only.
    pub fn drain_window(&mut self, now: f64, steps: usize) -> Vec<ScheduledStep> {
        let mut due = Vec::new();
        if !self.playing || steps == 0 {
            return due;
        }

        let horizon = now + SCHEDULE_AHEAD_SECS;
        while self.next_note_time < horizon {
            due.push(ScheduledStep {
                step: self.current_step,
                time: self.next_note_time,
            });
            self.next_note_time += self.step_interval();
            self.current_step = (self.current_step + 1) % steps;
        }
        due
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new()
    }
}
