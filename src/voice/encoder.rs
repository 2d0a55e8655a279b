//! Chunk encoding: downmix, resample to 16 kHz, PCM-16 WAV

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Sample rate the transcription backend expects
pub const SAMPLE_RATE: u32 = 16000;

/// Hex digits of the chunk digest kept as its id
const CHUNK_ID_LEN: usize = 12;

/// RMS energy of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Average interleaved channels down to mono
#[must_use]
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 | 1 => interleaved.to_vec(),
        2 => interleaved
            .chunks_exact(2)
            .map(|pair| f32::midpoint(pair[0], pair[1]))
            .collect(),
        n => interleaved
            .chunks_exact(usize::from(n))
            .map(|frame| frame.iter().sum::<f32>() / f32::from(n))
            .collect(),
    }
}

/// Resample mono audio
///
/// The final partial block is zero-padded and the output trimmed to the
/// expected length.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected = (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
    let mut output = Vec::with_capacity(expected + chunk_size);

    let block_len = resampler.input_frames_next();
    for chunk in samples.chunks(block_len) {
        let mut block = chunk.to_vec();
        block.resize(block_len, 0.0);

        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    // Flush the resampler's internal delay
    let delay = resampler.output_delay();
    while output.len() < delay + expected {
        let tail = resampler
            .process(&[vec![0.0; block_len]], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        if tail[0].is_empty() {
            break;
        }
        output.extend_from_slice(&tail[0]);
    }

    let end = (delay + expected).min(output.len());
    Ok(output[delay.min(end)..end].to_vec())
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// A finished recording, ready for transcription
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono samples at [`SAMPLE_RATE`]
    pub samples: Vec<f32>,
    /// Always [`SAMPLE_RATE`]
    pub sample_rate: u32,
    /// PCM-16 WAV encoding of `samples`
    pub wav: Vec<u8>,
    /// RMS energy of the whole chunk
    pub rms: f32,
    /// Digest prefix used to identify the chunk in logs
    pub id: String,
}

impl AudioChunk {
    /// Resample and encode captured mono audio
    ///
    /// # Errors
    ///
    /// Returns error if resampling or encoding fails
    pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Self> {
        let samples = resample(samples, sample_rate, SAMPLE_RATE)?;
        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;

        let digest = hex::encode(Sha256::digest(&wav));
        let id = digest[..CHUNK_ID_LEN].to_string();

        Ok(Self {
            rms: rms(&samples),
            samples,
            sample_rate: SAMPLE_RATE,
            wav,
            id,
        })
    }

    /// Playback length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        let silence = vec![0.0f32; 100];
        assert!(rms(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms(&loud) > 0.4);

        assert!(rms(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);

        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_length() {
        let input = vec![0.1f32; 48000];
        let output = resample(&input, 48000, SAMPLE_RATE).unwrap();
        assert_eq!(output.len(), 16000);

        let same = resample(&input[..100], SAMPLE_RATE, SAMPLE_RATE).unwrap();
        assert_eq!(same.len(), 100);
    }

    #[test]
    fn test_wav_header() {
        let wav = samples_to_wav(&[0.0; 160], SAMPLE_RATE).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + 320);
    }

    #[test]
    fn test_chunk_encode() {
        let samples: Vec<f32> = (0..32000).map(|i| if i % 2 == 0 { 0.2 } else { -0.2 }).collect();
        let chunk = AudioChunk::encode(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(chunk.sample_rate, SAMPLE_RATE);
        assert_eq!(chunk.id.len(), CHUNK_ID_LEN);
        assert!((chunk.rms - 0.2).abs() < 1e-3);
        assert_eq!(chunk.duration(), Duration::from_secs(2));
    }
}
