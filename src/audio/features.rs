//! Frame buffering and log-mel feature extraction.
//!
//! Each fixed-size PCM frame becomes one feature vector: pre-emphasis,
//! Hann window, FFT, Slaney-style mel filterbank, log10 compression.
//! The extractor carries one sample of pre-emphasis memory across frames
//! so a stream of frames is analyzed as continuous audio.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::defaults;

/// Floor applied before the log to avoid log(0).
const LOG_FLOOR: f32 = 1e-10;

/// Slaney mel scale: linear below 1kHz, logarithmic above.
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = 15.0;
const LOG_STEP: f32 = 0.068751777; // ln(6.4) / 27

/// Convert frequency in Hz to mel (Slaney formula).
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / LOG_STEP
    }
}

/// Convert mel to frequency in Hz (Slaney formula).
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * ((mel - MIN_LOG_MEL) * LOG_STEP).exp()
    }
}

/// Feature extraction parameters, fixed by the model file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureConfig {
    /// Number of mel bins (the feature dimension).
    pub n_mels: usize,
    /// Analysis window size in samples; equals the engine frame length.
    pub fft_size: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Pre-emphasis coefficient.
    pub pre_emphasis: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mels: 64,
            fft_size: defaults::FRAME_LENGTH as usize,
            sample_rate: defaults::SAMPLE_RATE,
            pre_emphasis: defaults::PRE_EMPHASIS,
        }
    }
}

/// Triangular mel filterbank over FFT magnitude bins.
pub struct MelFilterbank {
    /// One filter per mel bin, each over `fft_size / 2 + 1` frequency bins.
    filters: Vec<Vec<f32>>,
    /// Center frequency of each mel bin in Hz.
    centers_hz: Vec<f32>,
}

impl MelFilterbank {
    pub fn new(n_mels: usize, fft_size: usize, sample_rate: u32) -> Self {
        let n_freqs = fft_size / 2 + 1;
        let f_max = (sample_rate / 2) as f32;

        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(f_max);

        // n_mels + 2 edge points for triangular filters
        let mel_points: Vec<f32> = (0..=n_mels + 1)
            .map(|i| mel_min + (i as f32) * (mel_max - mel_min) / ((n_mels + 1) as f32))
            .collect();
        let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();
        let bin_points: Vec<usize> = hz_points
            .iter()
            .map(|&hz| ((fft_size as f32 + 1.0) * hz / (sample_rate as f32)).floor() as usize)
            .collect();

        let mut filters = vec![vec![0.0f32; n_freqs]; n_mels];
        for m in 0..n_mels {
            let start = bin_points[m];
            let center = bin_points[m + 1];
            let end = bin_points[m + 2];

            for k in start..center {
                if k < n_freqs && center > start {
                    filters[m][k] = (k - start) as f32 / (center - start) as f32;
                }
            }
            for k in center..end {
                if k < n_freqs && end > center {
                    filters[m][k] = (end - k) as f32 / (end - center) as f32;
                }
            }
        }

        let centers_hz = hz_points[1..=n_mels].to_vec();

        Self {
            filters,
            centers_hz,
        }
    }

    /// Applies the filterbank to a power spectrum.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .iter()
                    .zip(power.iter())
                    .map(|(&f, &p)| f * p)
                    .sum::<f32>()
            })
            .collect()
    }

    /// Center frequency of a mel bin in Hz.
    pub fn center_hz(&self, bin: usize) -> f32 {
        self.centers_hz[bin]
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }
}

/// Streaming feature extractor: one PCM frame in, one log-mel vector out.
pub struct FeatureExtractor {
    config: FeatureConfig,
    hann: Vec<f32>,
    filterbank: MelFilterbank,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Last raw sample of the previous frame, for pre-emphasis continuity.
    prev_sample: f32,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let hann: Vec<f32> = (0..config.fft_size)
            .map(|n| {
                0.5 * (1.0 - (2.0 * PI * n as f32 / (config.fft_size - 1) as f32).cos())
            })
            .collect();
        let filterbank = MelFilterbank::new(config.n_mels, config.fft_size, config.sample_rate);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let scratch = vec![Complex::new(0.0f32, 0.0f32); fft.get_inplace_scratch_len()];

        Self {
            config,
            hann,
            filterbank,
            fft,
            scratch,
            prev_sample: 0.0,
        }
    }

    /// The feature dimension (number of mel bins).
    pub fn n_features(&self) -> usize {
        self.config.n_mels
    }

    /// The filterbank, for callers that need bin geometry.
    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    /// Extracts one log-mel feature vector from exactly one frame of PCM.
    ///
    /// The caller (the session) validates frame length before this runs.
    pub fn extract(&mut self, pcm: &[i16]) -> Vec<f32> {
        debug_assert_eq!(pcm.len(), self.config.fft_size);

        // normalize to [-1, 1] and apply pre-emphasis with carry-over
        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(self.config.fft_size);
        let mut prev = self.prev_sample;
        for (n, &s) in pcm.iter().enumerate() {
            let x = s as f32 / 32768.0;
            let y = x - self.config.pre_emphasis * prev;
            prev = x;
            buffer.push(Complex::new(y * self.hann[n], 0.0));
        }
        self.prev_sample = prev;

        self.fft.process_with_scratch(&mut buffer, &mut self.scratch);

        let n_freqs = self.config.fft_size / 2 + 1;
        let power: Vec<f32> = buffer
            .iter()
            .take(n_freqs)
            .map(|c| c.re * c.re + c.im * c.im)
            .collect();

        self.filterbank
            .apply(&power)
            .into_iter()
            .map(|e| e.max(LOG_FLOOR).log10())
            .collect()
    }

    /// Clears cross-frame state (pre-emphasis memory).
    pub fn reset(&mut self) {
        self.prev_sample = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FeatureConfig {
        FeatureConfig::default()
    }

    /// One frame of a sine at `hz`, starting at sample offset `phase_start`.
    fn sine_frame(hz: f32, amplitude: f32, len: usize, phase_start: usize) -> Vec<i16> {
        (0..len)
            .map(|n| {
                let t = (phase_start + n) as f32 / defaults::SAMPLE_RATE as f32;
                (amplitude * (2.0 * PI * hz * t).sin() * 32767.0) as i16
            })
            .collect()
    }

    #[test]
    fn mel_scale_roundtrip() {
        for hz in [0.0f32, 100.0, 500.0, 1000.0, 2000.0, 4000.0, 7999.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((hz - back).abs() < 0.5, "roundtrip failed for {} Hz", hz);
        }
    }

    #[test]
    fn mel_scale_linear_below_1khz() {
        assert!((hz_to_mel(500.0) - 7.5).abs() < 0.1);
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 0.1);
    }

    #[test]
    fn hann_window_endpoints() {
        let extractor = FeatureExtractor::new(test_config());
        assert!(extractor.hann[0].abs() < 1e-6);
        assert!(extractor.hann[extractor.hann.len() - 1].abs() < 1e-6);
        let center = extractor.hann.len() / 2;
        assert!((extractor.hann[center] - 1.0).abs() < 0.01);
    }

    #[test]
    fn filterbank_shape_and_nonnegative() {
        let config = test_config();
        let fb = MelFilterbank::new(config.n_mels, config.fft_size, config.sample_rate);
        assert_eq!(fb.n_mels(), config.n_mels);
        for filter in &fb.filters {
            assert_eq!(filter.len(), config.fft_size / 2 + 1);
            assert!(filter.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn filterbank_centers_increase() {
        let config = test_config();
        let fb = MelFilterbank::new(config.n_mels, config.fft_size, config.sample_rate);
        for m in 1..config.n_mels {
            assert!(fb.center_hz(m) > fb.center_hz(m - 1));
        }
    }

    #[test]
    fn silence_yields_floor_features() {
        let config = test_config();
        let mut extractor = FeatureExtractor::new(config);
        let frame = vec![0i16; config.fft_size];
        let features = extractor.extract(&frame);
        assert_eq!(features.len(), extractor.n_features());
        assert_eq!(extractor.n_features(), config.n_mels);
        for &v in &features {
            assert!((v - LOG_FLOOR.log10()).abs() < 1e-3);
        }
    }

    #[test]
    fn tone_peaks_in_its_mel_bin() {
        let config = test_config();
        let mut extractor = FeatureExtractor::new(config);
        let fb = MelFilterbank::new(config.n_mels, config.fft_size, config.sample_rate);

        // pick a mid-range bin and synthesize a tone at its center
        let bin = 24;
        let hz = fb.center_hz(bin);
        let frame = sine_frame(hz, 0.5, config.fft_size, 0);
        let features = extractor.extract(&frame);

        let peak = features
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!(
            (peak as i64 - bin as i64).abs() <= 1,
            "tone at {} Hz peaked in bin {} (expected near {})",
            hz,
            peak,
            bin
        );
    }

    #[test]
    fn features_are_finite() {
        let config = test_config();
        let mut extractor = FeatureExtractor::new(config);
        let frame = sine_frame(440.0, 0.9, config.fft_size, 0);
        let features = extractor.extract(&frame);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn reset_clears_pre_emphasis_memory() {
        let config = test_config();
        let mut extractor = FeatureExtractor::new(config);

        let frame = sine_frame(1000.0, 0.5, config.fft_size, 0);
        let first = extractor.extract(&frame);
        extractor.reset();
        let again = extractor.extract(&frame);
        assert_eq!(first, again);
    }
}
