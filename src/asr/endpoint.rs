//! Endpoint detection: trailing-silence tracking over frame decisions.
//!
//! The detector consumes one speech/non-speech decision per frame and
//! fires once per utterance when enough silence has accumulated after
//! speech. It re-arms as soon as speech resumes, and [`reset`] re-arms
//! it explicitly after a flush.
//!
//! [`reset`]: EndpointDetector::reset

/// Silence-run endpoint detector.
#[derive(Debug)]
pub struct EndpointDetector {
    /// Frames of trailing silence required; `None` disables detection.
    threshold_frames: Option<u32>,
    silence_run: u32,
    seen_speech: bool,
    fired: bool,
}

impl EndpointDetector {
    /// `duration_sec = None` disables detection entirely; `observe` then
    /// always returns false.
    pub fn new(duration_sec: Option<f32>, frame_sec: f32) -> Self {
        let threshold_frames =
            duration_sec.map(|d| ((d / frame_sec).ceil() as u32).max(1));
        Self {
            threshold_frames,
            silence_run: 0,
            seen_speech: false,
            fired: false,
        }
    }

    /// Consumes one frame decision; true when this frame completes an
    /// endpoint.
    pub fn observe(&mut self, is_speech: bool) -> bool {
        let Some(threshold) = self.threshold_frames else {
            return false;
        };

        if is_speech {
            self.seen_speech = true;
            self.silence_run = 0;
            self.fired = false;
            return false;
        }

        self.silence_run = self.silence_run.saturating_add(1);
        if self.seen_speech && !self.fired && self.silence_run >= threshold {
            self.fired = true;
            return true;
        }
        false
    }

    /// Clears all tracking, as after a flush.
    pub fn reset(&mut self) {
        self.silence_run = 0;
        self.seen_speech = false;
        self.fired = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold_frames.is_some()
    }
}
