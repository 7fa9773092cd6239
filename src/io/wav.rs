use std::error::Error;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use super::AudioBuffer;

/// Failures while encoding or writing the WAV container.
#[derive(Debug)]
pub struct WavError(hound::Error);

impl fmt::Display for WavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wav encoding failed: {}", self.0)
    }
}

impl Error for WavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<hound::Error> for WavError {
    fn from(err: hound::Error) -> Self {
        WavError(err)
    }
}

fn spec_for(buffer: &AudioBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Clamp to [-1, 1] and scale to the 16-bit range.
#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 0x7FFF as f32) as i16
}

fn write_into<W>(buffer: &AudioBuffer, writer: &mut hound::WavWriter<W>) -> Result<(), WavError>
where
    W: std::io::Write + std::io::Seek,
{
    for frame in 0..buffer.frames() {
        for channel in 0..buffer.channels() {
            writer.write_sample(to_i16(buffer.channel(channel)[frame]))?;
        }
    }
    Ok(())
}

/// Encode the buffer as 16-bit PCM RIFF/WAVE in memory.
pub fn wav_bytes(buffer: &AudioBuffer) -> Result<Vec<u8>, WavError> {
    let mut bytes = Vec::new();
    {
        let cursor = Cursor::new(&mut bytes);
        let mut writer = hound::WavWriter::new(cursor, spec_for(buffer))?;
        write_into(buffer, &mut writer)?;
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Encode straight to a file on disk.
pub fn write_wav_file(buffer: &AudioBuffer, path: &Path) -> Result<(), WavError> {
    let mut writer = hound::WavWriter::create(path, spec_for(buffer))?;
    write_into(buffer, &mut writer)?;
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
    }

    #[test]
    fn header_fields_are_byte_exact() {
        let frames = 1_000usize;
        let buffer = AudioBuffer::stereo(frames, 44_100);
        let bytes = wav_bytes(&buffer).unwrap();

        let data_size = (frames * 2 * 2) as u32;
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 4), 36 + data_size); // ChunkSize
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(&bytes, 16), 16); // PCM fmt chunk
        assert_eq!(read_u16(&bytes, 20), 1); // PCM
        assert_eq!(read_u16(&bytes, 22), 2); // NumChannels
        assert_eq!(read_u32(&bytes, 24), 44_100); // SampleRate
        assert_eq!(read_u32(&bytes, 28), 44_100 * 2 * 2); // ByteRate
        assert_eq!(read_u16(&bytes, 32), 4); // BlockAlign
        assert_eq!(read_u16(&bytes, 34), 16); // BitsPerSample
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40), data_size); // Subchunk2Size
        assert_eq!(bytes.len(), 44 + data_size as usize);
    }

    #[test]
    fn samples_are_clamped_and_scaled() {
        let mut buffer = AudioBuffer::stereo(2, 44_100);
        {
            let (left, right) = buffer.stereo_pair_mut();
            left[0] = 2.0; // clips high
            right[0] = -2.0; // clips low
            left[1] = 0.5;
            right[1] = 0.0;
        }
        let bytes = wav_bytes(&buffer).unwrap();

        let sample = |i: usize| i16::from_le_bytes(bytes[44 + 2 * i..46 + 2 * i].try_into().unwrap());
        assert_eq!(sample(0), 0x7FFF); // left frame 0
        assert_eq!(sample(1), -0x7FFF); // right frame 0
        assert_eq!(sample(2), (0.5 * 0x7FFF as f32) as i16);
        assert_eq!(sample(3), 0);
    }
}
