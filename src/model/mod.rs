//! Model parameter file.
//!
//! The single persisted artifact the engine reads: feature geometry, phone
//! inventory, acoustic affine weights, pronunciation lexicon, and an n-gram
//! language model, stored as JSON. [`ModelFile`] is the on-disk schema;
//! [`Model`] is the compiled, id-resolved form the decoder runs against.
//!
//! The file is read once at session creation and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Schema version this build understands.
pub const FORMAT_VERSION: u32 = 1;

/// Log10 probability assigned to words the unigram table does not cover.
const UNSEEN_LOG10: f32 = -99.0;

const LN_10: f32 = std::f32::consts::LN_10;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Feature extraction geometry carried by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureParams {
    /// Number of mel bins; the acoustic weight columns must match.
    pub n_mels: usize,
}

/// Acoustic affine layer: `logits = weights · features + bias`.
///
/// One row per output symbol; the phone inventory first, blank last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcousticParams {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// One pronunciation: a word and its phone sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LexiconEntry {
    pub word: String,
    pub phones: Vec<String>,
}

/// N-gram language model over lexicon words, log10 probabilities.
///
/// Bigram keys are `"previous next"`; lookup falls back to unigrams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageModel {
    pub weight: f32,
    pub unigrams: HashMap<String, f32>,
    #[serde(default)]
    pub bigrams: HashMap<String, f32>,
}

/// On-disk model schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelFile {
    pub name: String,
    pub format_version: u32,
    pub sample_rate: u32,
    pub frame_length: u32,
    pub features: FeatureParams,
    pub phones: Vec<String>,
    pub silence_phone: String,
    pub acoustic: AcousticParams,
    pub lexicon: Vec<LexiconEntry>,
    pub lm: LanguageModel,
}

impl ModelFile {
    /// Writes the model as pretty JSON. Used by model tooling and fixtures.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Compiled model: names resolved to ids, tables ready for the decoder.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub sample_rate: u32,
    pub frame_length: u32,
    pub n_mels: usize,

    phones: Vec<String>,
    silence_id: usize,

    words: Vec<String>,
    pronunciations: Vec<Vec<usize>>,

    pub acoustic: AcousticParams,

    lm_weight: f32,
    unigrams_ln: Vec<f32>,
    bigrams_ln: HashMap<(usize, usize), f32>,
}

impl Model {
    /// Loads and compiles a model from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = fs::read_to_string(path)?;
        let file: ModelFile = serde_json::from_str(&contents)?;
        Self::compile(file)
    }

    /// Validates and compiles an in-memory model file.
    pub fn compile(file: ModelFile) -> Result<Self, ModelError> {
        let invalid = |msg: String| ModelError::Invalid(msg);

        if file.format_version != FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format version {} (expected {})",
                file.format_version, FORMAT_VERSION
            )));
        }
        if file.sample_rate == 0 || file.frame_length == 0 {
            return Err(invalid("sample rate and frame length must be positive".into()));
        }
        if file.features.n_mels == 0 {
            return Err(invalid("feature dimension must be positive".into()));
        }
        if file.phones.is_empty() {
            return Err(invalid("phone inventory is empty".into()));
        }

        let mut phone_ids: HashMap<&str, usize> = HashMap::new();
        for (i, p) in file.phones.iter().enumerate() {
            if phone_ids.insert(p.as_str(), i).is_some() {
                return Err(invalid(format!("duplicate phone '{}'", p)));
            }
        }
        let silence_id = *phone_ids
            .get(file.silence_phone.as_str())
            .ok_or_else(|| invalid(format!("silence phone '{}' not in inventory", file.silence_phone)))?;

        // phones first, blank last
        let n_symbols = file.phones.len() + 1;
        if file.acoustic.weights.len() != n_symbols {
            return Err(invalid(format!(
                "acoustic weights have {} rows, expected {} (phones + blank)",
                file.acoustic.weights.len(),
                n_symbols
            )));
        }
        if file.acoustic.bias.len() != n_symbols {
            return Err(invalid(format!(
                "acoustic bias has {} entries, expected {}",
                file.acoustic.bias.len(),
                n_symbols
            )));
        }
        for (i, row) in file.acoustic.weights.iter().enumerate() {
            if row.len() != file.features.n_mels {
                return Err(invalid(format!(
                    "acoustic weight row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    file.features.n_mels
                )));
            }
        }

        if file.lexicon.is_empty() {
            return Err(invalid("lexicon is empty".into()));
        }
        let mut words = Vec::with_capacity(file.lexicon.len());
        let mut word_ids: HashMap<&str, usize> = HashMap::new();
        let mut pronunciations = Vec::with_capacity(file.lexicon.len());
        for entry in &file.lexicon {
            if entry.phones.is_empty() {
                return Err(invalid(format!("word '{}' has an empty pronunciation", entry.word)));
            }
            if word_ids.insert(entry.word.as_str(), words.len()).is_some() {
                return Err(invalid(format!("duplicate lexicon word '{}'", entry.word)));
            }
            let mut ids = Vec::with_capacity(entry.phones.len());
            for p in &entry.phones {
                let &id = phone_ids.get(p.as_str()).ok_or_else(|| {
                    invalid(format!("word '{}' uses unknown phone '{}'", entry.word, p))
                })?;
                if id == silence_id {
                    return Err(invalid(format!(
                        "word '{}' uses the silence phone in its pronunciation",
                        entry.word
                    )));
                }
                ids.push(id);
            }
            words.push(entry.word.clone());
            pronunciations.push(ids);
        }

        if !file.lm.weight.is_finite() || file.lm.weight < 0.0 {
            return Err(invalid("language model weight must be finite and non-negative".into()));
        }
        let unigrams_ln: Vec<f32> = words
            .iter()
            .map(|w| file.lm.unigrams.get(w).copied().unwrap_or(UNSEEN_LOG10) * LN_10)
            .collect();
        let mut bigrams_ln = HashMap::new();
        for (key, &log10p) in &file.lm.bigrams {
            let mut parts = key.split_whitespace();
            let (prev, next) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), None) => (a, b),
                _ => {
                    return Err(invalid(format!(
                        "bigram key '{}' is not of the form 'previous next'",
                        key
                    )));
                }
            };
            let &prev_id = word_ids
                .get(prev)
                .ok_or_else(|| invalid(format!("bigram references unknown word '{}'", prev)))?;
            let &next_id = word_ids
                .get(next)
                .ok_or_else(|| invalid(format!("bigram references unknown word '{}'", next)))?;
            bigrams_ln.insert((prev_id, next_id), log10p * LN_10);
        }

        Ok(Self {
            name: file.name,
            sample_rate: file.sample_rate,
            frame_length: file.frame_length,
            n_mels: file.features.n_mels,
            phones: file.phones,
            silence_id,
            words,
            pronunciations,
            acoustic: file.acoustic,
            lm_weight: file.lm.weight,
            unigrams_ln,
            bigrams_ln,
        })
    }

    /// Number of acoustic output symbols (phones + blank).
    pub fn n_symbols(&self) -> usize {
        self.phones.len() + 1
    }

    /// The blank symbol id (always last).
    pub fn blank_id(&self) -> usize {
        self.phones.len()
    }

    /// The silence phone id.
    pub fn silence_id(&self) -> usize {
        self.silence_id
    }

    pub fn phone_name(&self, id: usize) -> &str {
        &self.phones[id]
    }

    pub fn phone_id(&self, name: &str) -> Option<usize> {
        self.phones.iter().position(|p| p == name)
    }

    pub fn n_words(&self) -> usize {
        self.words.len()
    }

    pub fn word(&self, id: usize) -> &str {
        &self.words[id]
    }

    pub fn word_id(&self, word: &str) -> Option<usize> {
        self.words.iter().position(|w| w == word)
    }

    pub fn pronunciation(&self, word_id: usize) -> &[usize] {
        &self.pronunciations[word_id]
    }

    /// Language model weight applied by the decoder.
    pub fn lm_weight(&self) -> f32 {
        self.lm_weight
    }

    /// Natural-log word probability given the previous word (bigram with
    /// unigram fallback). `prev = None` means utterance start.
    pub fn lm_ln_prob(&self, prev: Option<usize>, next: usize) -> f32 {
        if let Some(p) = prev {
            if let Some(&lp) = self.bigrams_ln.get(&(p, next)) {
                return lp;
            }
        }
        self.unigrams_ln[next]
    }
}
