//! Session lifecycle: builder, streaming transcription, teardown.
//!
//! A [`Caracal`] session is created through [`CaracalBuilder`], consumes
//! audio one fixed-size frame at a time through [`process`], and is
//! closed with [`flush`] or discarded with [`delete`]. Sessions are
//! single-owner; `&mut self` on the streaming calls enforces the
//! one-caller-at-a-time contract at compile time.
//!
//! [`process`]: Caracal::process
//! [`flush`]: Caracal::flush
//! [`delete`]: Caracal::delete

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::activation::{AccessValidator, OfflineValidator};
use crate::asr::decoder::{DecoderConfig, StreamingDecoder};
use crate::asr::endpoint::EndpointDetector;
use crate::asr::punctuation::punctuate;
use crate::asr::scorer::{AcousticScorer, LinearScorer};
use crate::audio::features::{FeatureConfig, FeatureExtractor};
use crate::config::{Device, EngineConfig};
use crate::defaults;
use crate::error::{CaracalError, ErrorKind, Result};
use crate::model::{Model, ModelError};

/// One result from `process` or `flush`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaracalTranscript {
    /// New transcript text. Concatenating every `transcript` from a
    /// stream of `process` calls plus the closing `flush` yields the
    /// full utterance text.
    pub transcript: String,
    /// True when this frame completed an endpoint: the speaker finished
    /// an utterance and trailing silence crossed the configured
    /// duration. Always false from `flush` and when detection is
    /// disabled.
    pub is_endpoint: bool,
}

/// Builds a [`Caracal`] session.
pub struct CaracalBuilder {
    config: EngineConfig,
    validator: Box<dyn AccessValidator>,
    scorer: Option<Box<dyn AcousticScorer>>,
    decoder_config: DecoderConfig,
}

impl Default for CaracalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaracalBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            validator: Box::new(OfflineValidator),
            scorer: None,
            decoder_config: DecoderConfig::default(),
        }
    }

    /// Starts from a loaded configuration instead of defaults.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.config.access_key = access_key.into();
        self
    }

    pub fn model_path(mut self, model_path: impl AsRef<Path>) -> Self {
        self.config.model_path = model_path.as_ref().to_path_buf();
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.config.device = device;
        self
    }

    /// Trailing-silence duration that declares an endpoint, in seconds.
    /// Must be positive and finite.
    pub fn endpoint_duration_sec(mut self, seconds: f32) -> Self {
        self.config.endpoint_duration_sec = Some(seconds);
        self
    }

    /// Disables endpoint detection; `is_endpoint` is then always false.
    pub fn without_endpoint_detection(mut self) -> Self {
        self.config.endpoint_duration_sec = None;
        self
    }

    pub fn enable_automatic_punctuation(mut self, enable: bool) -> Self {
        self.config.enable_automatic_punctuation = enable;
        self
    }

    /// Number of hypotheses the decoder retains per frame.
    pub fn beam_width(mut self, beam_width: usize) -> Self {
        self.decoder_config.beam_width = beam_width;
        self
    }

    /// Replaces the access key validator. Mostly for tests and for
    /// callers with their own licensing backend.
    pub fn validator(mut self, validator: impl AccessValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Replaces the acoustic scorer. The scorer's symbol count must
    /// match the model's.
    pub fn scorer(mut self, scorer: Box<dyn AcousticScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Validates options, authorizes the key, loads the model, and
    /// returns a ready session.
    pub fn init(self) -> Result<Caracal> {
        let fail = |kind: ErrorKind, cause: String| {
            CaracalError::with_stack(kind, "Initialization failed", vec![cause])
        };

        if self.config.access_key.is_empty() {
            return Err(fail(
                ErrorKind::InvalidArgument,
                "access key must not be empty".to_string(),
            ));
        }
        if let Some(seconds) = self.config.endpoint_duration_sec {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(fail(
                    ErrorKind::InvalidArgument,
                    format!("endpoint duration must be positive, got {}", seconds),
                ));
            }
        }
        if self.decoder_config.beam_width == 0 {
            return Err(fail(
                ErrorKind::InvalidArgument,
                "beam width must be at least 1".to_string(),
            ));
        }
        if !self.config.model_path.is_file() {
            return Err(fail(
                ErrorKind::Io,
                format!(
                    "couldn't find model file at '{}'",
                    self.config.model_path.display()
                ),
            ));
        }

        self.validator.authorize(&self.config.access_key)?;

        let model = Model::load(&self.config.model_path).map_err(|e| {
            let kind = match e {
                ModelError::Read(_) => ErrorKind::Io,
                ModelError::Parse(_) | ModelError::Invalid(_) => ErrorKind::InvalidArgument,
            };
            fail(kind, e.to_string())
        })?;
        let model = Arc::new(model);

        let scorer = match self.scorer {
            Some(scorer) => scorer,
            None => Box::new(LinearScorer::new(model.clone())),
        };
        if scorer.n_symbols() != model.n_symbols() {
            return Err(fail(
                ErrorKind::InvalidArgument,
                format!(
                    "scorer produces {} symbols, model expects {}",
                    scorer.n_symbols(),
                    model.n_symbols()
                ),
            ));
        }

        let features = FeatureExtractor::new(FeatureConfig {
            n_mels: model.n_mels,
            fft_size: model.frame_length as usize,
            sample_rate: model.sample_rate,
            pre_emphasis: defaults::PRE_EMPHASIS,
        });
        let frame_sec = model.frame_length as f32 / model.sample_rate as f32;
        let endpoint = EndpointDetector::new(self.config.endpoint_duration_sec, frame_sec);
        let decoder = StreamingDecoder::new(model.clone(), self.decoder_config);

        info!(
            model = %model.name,
            device = %self.config.device,
            sample_rate = model.sample_rate,
            frame_length = model.frame_length,
            endpoint_enabled = endpoint.is_enabled(),
            punctuation = self.config.enable_automatic_punctuation,
            "session created"
        );

        let sample_rate = model.sample_rate;
        let frame_length = model.frame_length;
        Ok(Caracal {
            engine: Some(EngineCore {
                model,
                features,
                scorer,
                decoder,
                endpoint,
                punctuate: self.config.enable_automatic_punctuation,
                pending: Vec::new(),
                emitted_any: false,
            }),
            sample_rate,
            frame_length,
        })
    }
}

struct EngineCore {
    model: Arc<Model>,
    features: FeatureExtractor,
    scorer: Box<dyn AcousticScorer>,
    decoder: StreamingDecoder,
    endpoint: EndpointDetector,
    punctuate: bool,
    /// Stable words withheld from partials while punctuation is on.
    pending: Vec<usize>,
    /// Whether any word has been emitted since the last flush; controls
    /// the joining space on increments.
    emitted_any: bool,
}

impl EngineCore {
    fn render_increment(&mut self, words: &[usize]) -> String {
        let mut out = String::new();
        for &word in words {
            if self.emitted_any {
                out.push(' ');
            }
            out.push_str(self.model.word(word));
            self.emitted_any = true;
        }
        out
    }
}

/// A streaming speech-to-text session.
pub struct Caracal {
    engine: Option<EngineCore>,
    sample_rate: u32,
    frame_length: u32,
}

// hand-written: the boxed scorer in EngineCore has no Debug
impl fmt::Debug for Caracal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caracal")
            .field("sample_rate", &self.sample_rate)
            .field("frame_length", &self.frame_length)
            .field("deleted", &self.engine.is_none())
            .finish()
    }
}

impl Caracal {
    pub fn builder() -> CaracalBuilder {
        CaracalBuilder::new()
    }

    /// Consumes exactly one frame of 16-bit PCM and returns any newly
    /// stable transcript text.
    ///
    /// A frame of the wrong length is rejected without touching session
    /// state; the stream may continue with correctly sized frames.
    pub fn process(&mut self, pcm: &[i16]) -> Result<CaracalTranscript> {
        let frame_length = self.frame_length as usize;
        let engine = self.engine.as_mut().ok_or_else(invalid_state)?;

        if pcm.len() != frame_length {
            return Err(CaracalError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "expected a frame of {} samples, got {}",
                    frame_length,
                    pcm.len()
                ),
            ));
        }

        let features = engine.features.extract(pcm);
        let log_posteriors = engine.scorer.score(&features).map_err(|e| {
            CaracalError::with_stack(
                ErrorKind::Runtime,
                "Processing failed",
                vec![e.to_string()],
            )
        })?;

        let silence_ln = log_posteriors[engine.model.silence_id()];
        let is_speech = silence_ln < defaults::SILENCE_POSTERIOR.ln();

        let stable = engine.decoder.step(&log_posteriors);
        let is_endpoint = engine.endpoint.observe(is_speech);
        if is_endpoint {
            debug!("endpoint detected");
        }

        let transcript = if engine.punctuate {
            engine.pending.extend_from_slice(&stable);
            String::new()
        } else {
            engine.render_increment(&stable)
        };

        Ok(CaracalTranscript {
            transcript,
            is_endpoint,
        })
    }

    /// Finalizes the current utterance and resets for the next one.
    ///
    /// Returns the remaining transcript text: with punctuation enabled
    /// this is the whole punctuated utterance, otherwise the words not
    /// yet reported by `process`.
    pub fn flush(&mut self) -> Result<CaracalTranscript> {
        let engine = self.engine.as_mut().ok_or_else(invalid_state)?;

        let tail = engine.decoder.finalize();
        let transcript = if engine.punctuate {
            let mut words = std::mem::take(&mut engine.pending);
            words.extend(tail);
            if words.is_empty() {
                String::new()
            } else {
                let raw: Vec<&str> = words.iter().map(|&w| engine.model.word(w)).collect();
                punctuate(&raw.join(" "))
            }
        } else {
            engine.render_increment(&tail)
        };

        engine.features.reset();
        engine.endpoint.reset();
        engine.emitted_any = false;

        Ok(CaracalTranscript {
            transcript,
            is_endpoint: false,
        })
    }

    /// Releases engine resources. Further `process` or `flush` calls
    /// fail with `INVALID_STATE`; calling `delete` again is a no-op, and
    /// the metadata accessors keep working.
    pub fn delete(&mut self) {
        self.engine = None;
    }

    /// Audio sample rate the session accepts, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples `process` expects per frame.
    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    /// Engine version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

fn invalid_state() -> CaracalError {
    CaracalError::new(
        ErrorKind::InvalidState,
        "session has been deleted",
    )
}
