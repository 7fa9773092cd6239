use rtrb::Consumer;

use super::clock::AudioClock;
use crate::voices::Voice;

/// Hard cap on simultaneously sounding voices. The pools are reserved up
/// front so the audio callback never allocates.
pub const MAX_ACTIVE_VOICES: usize = 64;

/// Capacity of the command ring buffer between the control side and the
/// audio callback.
pub const COMMAND_QUEUE_SIZE: usize = 256;

/// A voice stamped with the absolute frame it must start on. The gain is
/// baked in at schedule time: volume changes never reach events already
/// handed over.
pub struct ScheduledVoice {
    pub start_frame: u64,
    pub gain: f32,
    pub voice: Voice,
}

pub enum MixerCommand {
    Schedule(ScheduledVoice),
}

/// The audio-callback side of the engine.
///
/// Owns the frame counter behind the [`AudioClock`] and a small pool of
/// sounding voices. Commands are drained at the top of every block; voices
/// whose start frame falls inside the block begin mid-block on exactly
/// that frame.
pub struct Mixer {
    rx: Consumer<MixerCommand>,
    clock: AudioClock,
    frames: u64,
    active: Vec<ScheduledVoice>,
}

impl Mixer {
    pub fn new(rx: Consumer<MixerCommand>, clock: AudioClock) -> Self {
        Self {
            rx,
            clock,
            frames: 0,
            active: Vec::with_capacity(MAX_ACTIVE_VOICES),
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.rx.pop() {
            match cmd {
                MixerCommand::Schedule(voice) => {
                    if self.active.len() < MAX_ACTIVE_VOICES {
                        self.active.push(voice);
                    }
                    // over the cap: the voice is dropped; one missing
                    // sixteenth beats a reallocation in the callback
                }
            }
        }
    }

    /// Render one interleaved output block of `data.len() / channels`
    /// frames. The same mono mix goes to every channel.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        self.drain_commands();

        let frames = data.len() / channels.max(1);
        for i in 0..frames {
            let frame = self.frames + i as u64;
            let mut mixed = 0.0f32;
            for sv in &mut self.active {
                if frame >= sv.start_frame && !sv.voice.is_finished() {
                    mixed += sv.voice.next_sample() * sv.gain;
                }
            }

            let base = i * channels;
            for ch in 0..channels {
                data[base + ch] = mixed;
            }
        }

        self.active.retain(|sv| !sv.voice.is_finished());

        self.frames += frames as u64;
        self.clock.advance(frames as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voices::Instrument;
    use rtrb::RingBuffer;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn mixer_pair() -> (rtrb::Producer<MixerCommand>, Mixer) {
        let (tx, rx) = RingBuffer::new(COMMAND_QUEUE_SIZE);
        let clock = AudioClock::new(SAMPLE_RATE as u32);
        (tx, Mixer::new(rx, clock))
    }

    fn schedule(
        tx: &mut rtrb::Producer<MixerCommand>,
        instrument: Instrument,
        start_frame: u64,
    ) {
        let voice = Voice::build(instrument, 0, 0.05, SAMPLE_RATE, 1);
        let _ = tx.push(MixerCommand::Schedule(ScheduledVoice {
            start_frame,
            gain: 1.0,
            voice,
        }));
    }

    #[test]
    fn silence_until_start_frame() {
        let (mut tx, mut mixer) = mixer_pair();
        schedule(&mut tx, Instrument::Synth, 100);

        let mut block = vec![0.0f32; 256 * 2];
        mixer.render(&mut block, 2);

        let frames: Vec<f32> = block.chunks(2).map(|c| c[0]).collect();
        assert!(frames[..100].iter().all(|&s| s == 0.0));
        assert!(frames[100..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn channels_carry_the_same_mix() {
        let (mut tx, mut mixer) = mixer_pair();
        schedule(&mut tx, Instrument::Bass, 0);

        let mut block = vec![0.0f32; 128 * 2];
        mixer.render(&mut block, 2);
        for frame in block.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn finished_voices_are_reclaimed() {
        let (mut tx, mut mixer) = mixer_pair();
        schedule(&mut tx, Instrument::Piano, 0);

        // 0.05 s voice = 2205 frames; render past it
        let mut block = vec![0.0f32; 4096];
        mixer.render(&mut block, 1);
        assert!(mixer.active.is_empty());
        assert_eq!(mixer.frames, 4096);
    }

    #[test]
    fn clock_tracks_rendered_frames() {
        let (_tx, mut mixer) = mixer_pair();
        let clock = mixer.clock.clone();
        let mut block = vec![0.0f32; 512 * 2];
        mixer.render(&mut block, 2);
        mixer.render(&mut block, 2);
        assert_eq!(clock.frames(), 1024);
    }

    #[test]
    fn late_voice_starts_immediately() {
        let (mut tx, mut mixer) = mixer_pair();
        let mut block = vec![0.0f32; 1024];
        mixer.render(&mut block, 1); // clock now at frame 1024

        schedule(&mut tx, Instrument::Synth, 500); // already in the past
        mixer.render(&mut block, 1);
        assert!(block.iter().any(|&s| s != 0.0));
    }
}
