//! Acoustic scoring: feature vectors to phone log-posteriors.
//!
//! [`AcousticScorer`] is the seam between feature extraction and the
//! decoder. [`LinearScorer`] evaluates the model's affine layer;
//! [`ScriptedScorer`] replays pre-computed posteriors for deterministic
//! tests.

use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use crate::model::Model;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Maps one feature vector to natural-log posteriors over the model's
/// output symbols (phones + blank).
pub trait AcousticScorer: Send {
    /// Scores one frame of features. The returned vector has
    /// `n_symbols()` entries and sums to 1 in probability space.
    fn score(&mut self, features: &[f32]) -> Result<Vec<f32>, ScorerError>;

    /// Number of output symbols.
    fn n_symbols(&self) -> usize;
}

/// Affine layer + log-softmax over the model's acoustic weights.
pub struct LinearScorer {
    model: Arc<Model>,
}

impl LinearScorer {
    pub fn new(model: Arc<Model>) -> Self {
        Self { model }
    }
}

impl AcousticScorer for LinearScorer {
    fn score(&mut self, features: &[f32]) -> Result<Vec<f32>, ScorerError> {
        if features.len() != self.model.n_mels {
            return Err(ScorerError::DimensionMismatch {
                expected: self.model.n_mels,
                actual: features.len(),
            });
        }

        let acoustic = &self.model.acoustic;
        let logits: Vec<f32> = acoustic
            .weights
            .iter()
            .zip(acoustic.bias.iter())
            .map(|(row, &b)| {
                row.iter()
                    .zip(features.iter())
                    .map(|(&w, &f)| w * f)
                    .sum::<f32>()
                    + b
            })
            .collect();

        Ok(log_softmax(&logits))
    }

    fn n_symbols(&self) -> usize {
        self.model.n_symbols()
    }
}

/// Numerically stable log-softmax.
fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum: f32 = logits
        .iter()
        .map(|&l| (l - max).exp())
        .sum::<f32>()
        .ln();
    logits.iter().map(|&l| l - max - log_sum).collect()
}

/// Builds log-posteriors with probability `p` on `symbol` and the rest
/// spread uniformly. Shared by tests and the scripted scorer.
pub fn peaked_ln(n_symbols: usize, symbol: usize, p: f32) -> Vec<f32> {
    let rest = ((1.0 - p) / (n_symbols - 1) as f32).max(1e-12);
    (0..n_symbols)
        .map(|i| if i == symbol { p.ln() } else { rest.ln() })
        .collect()
}

/// Replays scripted posterior frames; ignores the features entirely.
///
/// When the script runs out it returns silence-peaked posteriors, so a
/// session keeps behaving like trailing silence.
pub struct ScriptedScorer {
    n_symbols: usize,
    silence_id: usize,
    frames: VecDeque<Vec<f32>>,
}

impl ScriptedScorer {
    pub fn new(n_symbols: usize, silence_id: usize) -> Self {
        Self {
            n_symbols,
            silence_id,
            frames: VecDeque::new(),
        }
    }

    /// Queues one frame peaked on `symbol`.
    pub fn push_symbol(&mut self, symbol: usize) {
        self.frames.push_back(peaked_ln(self.n_symbols, symbol, 0.95));
    }

    /// Queues `count` frames peaked on `symbol`.
    pub fn push_symbol_frames(&mut self, symbol: usize, count: usize) {
        for _ in 0..count {
            self.push_symbol(symbol);
        }
    }

    /// Queues an explicit posterior row.
    pub fn push_raw(&mut self, log_posteriors: Vec<f32>) {
        self.frames.push_back(log_posteriors);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl AcousticScorer for ScriptedScorer {
    fn score(&mut self, _features: &[f32]) -> Result<Vec<f32>, ScorerError> {
        Ok(self
            .frames
            .pop_front()
            .unwrap_or_else(|| peaked_ln(self.n_symbols, self.silence_id, 0.95)))
    }

    fn n_symbols(&self) -> usize {
        self.n_symbols
    }
}
