//! Low-level DSP primitives used by the voice generators.
//!
//! These components are allocation-free after construction and safe to
//! embed directly inside voice structs. They intentionally stay focused on
//! the signal-processing math so the voice layer can handle orchestration.

/// Fixed-length delay line for the pluck feedback loop.
pub mod delay;
/// One-shot rise/decay envelope generator.
pub mod envelope;
/// State-variable filter with lowpass/bandpass/highpass responses.
pub mod filter;
/// Oscillator waveforms and the white-noise source.
pub mod oscillator;

pub use envelope::EnvelopeStage;
pub use filter::FilterMode;
pub use oscillator::Waveform;
