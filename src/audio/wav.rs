//! WAV file ingestion for the demo binary and tests.
//!
//! Reads 16-bit PCM WAV, downmixes stereo to mono, and resamples to the
//! engine rate when needed.

use std::path::Path;
use thiserror::Error;

use crate::defaults::SAMPLE_RATE;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("Failed to open WAV file: {0}")]
    Open(String),

    #[error("Unsupported WAV format: {0}")]
    Format(String),

    #[error("Failed to read WAV samples: {0}")]
    Read(String),
}

/// Reads a WAV file as mono 16-bit PCM at the engine sample rate.
pub fn read_mono_16k(path: &Path) -> Result<Vec<i16>, WavError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| WavError::Open(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(WavError::Format(format!(
            "expected 16-bit PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.channels == 0 || spec.channels > 2 {
        return Err(WavError::Format(format!(
            "expected mono or stereo, got {} channels",
            spec.channels
        )));
    }

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WavError::Read(e.to_string()))?;

    let mono = if spec.channels == 2 {
        raw.chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect()
    } else {
        raw
    };

    if spec.sample_rate == SAMPLE_RATE {
        Ok(mono)
    } else {
        Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
    }
}

/// Linear-interpolation resampler. Adequate for speech-band audio; anything
/// better belongs upstream of the engine.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let a = samples[idx] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}
