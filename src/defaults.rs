//! Default engine constants.
//!
//! Shared across the session, decoder, and demo binary so the numbers
//! live in exactly one place.

/// Audio sample rate accepted by the engine, in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational cost.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of samples per audio frame passed to `process`.
///
/// 512 samples at 16kHz is 32ms of audio, short enough for real-time
/// partial transcripts and long enough for one spectral analysis window.
pub const FRAME_LENGTH: u32 = 512;

/// Default endpoint duration in seconds.
///
/// A speech endpoint is declared after this much trailing non-speech
/// following an utterance.
pub const ENDPOINT_DURATION_SEC: f32 = 1.0;

/// Default number of hypotheses retained by the beam decoder.
///
/// Bounds per-frame work; larger beams trade latency for accuracy.
pub const BEAM_WIDTH: usize = 8;

/// Default language-model weight applied to word log-probabilities.
pub const LM_WEIGHT: f32 = 1.0;

/// Hypotheses scoring more than this far below the frame's best (in
/// natural-log probability) are dropped even when the beam has room.
pub const PRUNE_MARGIN: f64 = 20.0;

/// Pre-emphasis coefficient applied before spectral analysis.
pub const PRE_EMPHASIS: f32 = 0.97;

/// Silence posterior (linear probability) above which a frame counts as
/// non-speech for endpoint tracking.
pub const SILENCE_POSTERIOR: f32 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_is_32ms() {
        let ms = FRAME_LENGTH * 1000 / SAMPLE_RATE;
        assert_eq!(ms, 32);
    }

    #[test]
    fn endpoint_default_is_positive() {
        assert!(ENDPOINT_DURATION_SEC > 0.0);
    }
}
