//! Frame-synchronous beam decoder over the pronunciation trie.
//!
//! Each hypothesis tracks the words it has not yet committed, its
//! position in the trie, and the last acoustic symbol, so repeated
//! frames of one phone collapse into a single trie step and a repeated
//! phone across a boundary requires an intervening blank.
//!
//! Words become stable once every beam hypothesis agrees on them; stable
//! words are handed to the caller exactly once and dropped from the
//! hypotheses, which keeps the beams short on long streams.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::defaults;
use crate::model::Model;

use super::lexicon::Lexicon;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Maximum hypotheses retained per frame.
    pub beam_width: usize,
    /// Score margin below the frame's best hypothesis beyond which
    /// hypotheses are dropped regardless of beam room.
    pub prune_margin: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_width: defaults::BEAM_WIDTH,
            prune_margin: defaults::PRUNE_MARGIN,
        }
    }
}

#[derive(Debug, Clone)]
struct Hypothesis {
    /// Recognized words not yet reported as stable.
    words: Vec<usize>,
    /// Current trie node; the root between words.
    node: usize,
    /// Last acoustic symbol consumed (phone, silence, or blank).
    last: usize,
    /// Combined acoustic + weighted language-model score, natural log.
    score: f64,
    /// Accumulated language-model score alone, used as a tie-break.
    lm_score: f64,
}

impl Hypothesis {
    fn start(blank: usize) -> Self {
        Self {
            words: Vec::new(),
            node: Lexicon::ROOT,
            last: blank,
            score: 0.0,
            lm_score: 0.0,
        }
    }
}

pub struct StreamingDecoder {
    model: Arc<Model>,
    lexicon: Lexicon,
    config: DecoderConfig,
    beam: Vec<Hypothesis>,
    /// Last stabilized word, kept as bigram context across the
    /// stable-prefix boundary.
    context: Option<usize>,
}

impl StreamingDecoder {
    pub fn new(model: Arc<Model>, config: DecoderConfig) -> Self {
        let lexicon = Lexicon::build(&model);
        let blank = model.blank_id();
        Self {
            model,
            lexicon,
            config,
            beam: vec![Hypothesis::start(blank)],
            context: None,
        }
    }

    /// Advances all hypotheses by one frame of log-posteriors and returns
    /// the words that became stable on this frame, in order.
    pub fn step(&mut self, log_posteriors: &[f32]) -> Vec<usize> {
        debug_assert_eq!(log_posteriors.len(), self.model.n_symbols());

        let blank = self.model.blank_id();
        let silence = self.model.silence_id();
        let lm_weight = self.model.lm_weight() as f64;

        let mut next: HashMap<(Vec<usize>, usize, usize), Hypothesis> = HashMap::new();
        let mut push = |hyp: Hypothesis| {
            let key = (hyp.words.clone(), hyp.node, hyp.last);
            match next.entry(key) {
                Entry::Occupied(mut slot) => {
                    let kept = slot.get_mut();
                    if (hyp.score, hyp.lm_score) > (kept.score, kept.lm_score) {
                        *kept = hyp;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(hyp);
                }
            }
        };

        for hyp in &self.beam {
            // hold with blank
            push(Hypothesis {
                last: blank,
                score: hyp.score + log_posteriors[blank] as f64,
                ..hyp.clone()
            });

            // hold on the last phone (same symbol, no trie movement)
            if hyp.last != blank {
                push(Hypothesis {
                    score: hyp.score + log_posteriors[hyp.last] as f64,
                    ..hyp.clone()
                });
            }

            // silence between words
            if hyp.node == Lexicon::ROOT && hyp.last != silence {
                push(Hypothesis {
                    last: silence,
                    score: hyp.score + log_posteriors[silence] as f64,
                    ..hyp.clone()
                });
            }

            // advance one phone edge in the trie
            for &(phone, child) in self.lexicon.children(hyp.node) {
                // a repeated phone needs an intervening blank
                if phone == hyp.last {
                    continue;
                }
                let advanced = hyp.score + log_posteriors[phone] as f64;

                // continue toward a longer word, if one exists
                if self.lexicon.has_children(child) {
                    push(Hypothesis {
                        words: hyp.words.clone(),
                        node: child,
                        last: phone,
                        score: advanced,
                        lm_score: hyp.lm_score,
                    });
                }

                // emit every word whose pronunciation ends at the child
                for &word in self.lexicon.words_at(child) {
                    let prev = hyp.words.last().copied().or(self.context);
                    let lm = self.model.lm_ln_prob(prev, word) as f64;
                    let mut words = hyp.words.clone();
                    words.push(word);
                    push(Hypothesis {
                        words,
                        node: Lexicon::ROOT,
                        last: phone,
                        score: advanced + lm_weight * lm,
                        lm_score: hyp.lm_score + lm,
                    });
                }
            }
        }

        let mut beam: Vec<Hypothesis> = next.into_values().collect();
        beam.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.lm_score
                        .partial_cmp(&a.lm_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.words.cmp(&b.words))
                .then_with(|| a.node.cmp(&b.node))
                .then_with(|| a.last.cmp(&b.last))
        });
        beam.truncate(self.config.beam_width);
        if let Some(best) = beam.first() {
            let floor = best.score - self.config.prune_margin;
            beam.retain(|h| h.score >= floor);
        }
        self.beam = beam;

        self.stabilize()
    }

    /// Drains the word prefix shared by every hypothesis.
    fn stabilize(&mut self) -> Vec<usize> {
        let mut shared = match self.beam.first() {
            Some(best) => best.words.len(),
            None => return Vec::new(),
        };
        for hyp in &self.beam[1..] {
            let agree = hyp
                .words
                .iter()
                .zip(&self.beam[0].words)
                .take_while(|(a, b)| a == b)
                .count();
            shared = shared.min(agree.min(hyp.words.len()));
            if shared == 0 {
                return Vec::new();
            }
        }

        let stable: Vec<usize> = self.beam[0].words[..shared].to_vec();
        for hyp in &mut self.beam {
            hyp.words.drain(..shared);
        }
        self.context = stable.last().copied();
        stable
    }

    /// Commits the best hypothesis, returns its not-yet-stable words, and
    /// resets to an empty utterance.
    pub fn finalize(&mut self) -> Vec<usize> {
        let words = self
            .beam
            .first()
            .map(|h| h.words.clone())
            .unwrap_or_default();
        self.reset();
        words
    }

    /// Drops all hypotheses and context, as after a flush.
    pub fn reset(&mut self) {
        let blank = self.model.blank_id();
        self.beam = vec![Hypothesis::start(blank)];
        self.context = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::scorer::peaked_ln;
    use crate::model::{
        AcousticParams, FeatureParams, LanguageModel, LexiconEntry, Model, ModelFile,
        FORMAT_VERSION,
    };
    use std::collections::HashMap;

    /// Phones a, b, sil (ids 0, 1, 2); blank id 3. Words "ab" and "ba".
    fn tiny_model() -> Arc<Model> {
        let phones = vec!["a".to_string(), "b".to_string(), "sil".to_string()];
        let n_symbols = phones.len() + 1;
        let file = ModelFile {
            name: "decoder-test".to_string(),
            format_version: FORMAT_VERSION,
            sample_rate: 16000,
            frame_length: 512,
            features: FeatureParams { n_mels: 4 },
            phones,
            silence_phone: "sil".to_string(),
            acoustic: AcousticParams {
                weights: vec![vec![0.0; 4]; n_symbols],
                bias: vec![0.0; n_symbols],
            },
            lexicon: vec![
                LexiconEntry {
                    word: "ab".to_string(),
                    phones: vec!["a".to_string(), "b".to_string()],
                },
                LexiconEntry {
                    word: "ba".to_string(),
                    phones: vec!["b".to_string(), "a".to_string()],
                },
            ],
            lm: LanguageModel {
                weight: 1.0,
                unigrams: HashMap::from([("ab".to_string(), -0.3), ("ba".to_string(), -0.3)]),
                bigrams: HashMap::new(),
            },
        };
        Arc::new(Model::compile(file).unwrap())
    }

    fn feed(decoder: &mut StreamingDecoder, model: &Model, symbols: &[usize]) -> Vec<usize> {
        let mut stable = Vec::new();
        for &s in symbols {
            stable.extend(decoder.step(&peaked_ln(model.n_symbols(), s, 0.95)));
        }
        stable
    }

    #[test]
    fn decodes_single_word() {
        let model = tiny_model();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        // a a b b
        feed(&mut decoder, &model, &[0, 0, 1, 1]);
        let words = decoder.finalize();
        assert_eq!(words, vec![model.word_id("ab").unwrap()]);
    }

    #[test]
    fn repeated_phone_needs_blank() {
        let model = tiny_model();
        let blank = model.blank_id();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        // "ab" then "ba": boundary b-b separated by a blank frame
        let mut words = feed(&mut decoder, &model, &[0, 0, 1, 1, blank, 1, 1, 0, 0]);
        words.extend(decoder.finalize());
        assert_eq!(
            words,
            vec![model.word_id("ab").unwrap(), model.word_id("ba").unwrap()]
        );
    }

    #[test]
    fn silence_between_words() {
        let model = tiny_model();
        let sil = model.silence_id();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        let mut words = feed(&mut decoder, &model, &[0, 0, 1, 1, sil, sil, sil, 1, 1, 0, 0]);
        words.extend(decoder.finalize());
        assert_eq!(
            words,
            vec![model.word_id("ab").unwrap(), model.word_id("ba").unwrap()]
        );
    }

    #[test]
    fn stabilizes_completed_word_during_next() {
        let model = tiny_model();
        let sil = model.silence_id();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        // first word plus enough following context for rivals to prune out
        let stable = feed(
            &mut decoder,
            &model,
            &[0, 0, 0, 1, 1, 1, sil, sil, sil, sil, sil, sil, 1, 1, 1, 0, 0, 0],
        );
        assert!(stable.contains(&model.word_id("ab").unwrap()));

        // stable words are reported exactly once
        let rest = decoder.finalize();
        let mut all = stable;
        all.extend(rest);
        assert_eq!(
            all,
            vec![model.word_id("ab").unwrap(), model.word_id("ba").unwrap()]
        );
    }

    #[test]
    fn leading_silence_is_not_a_word() {
        let model = tiny_model();
        let sil = model.silence_id();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        feed(&mut decoder, &model, &[sil, sil, sil, sil]);
        assert!(decoder.finalize().is_empty());
    }

    #[test]
    fn finalize_resets_for_next_utterance() {
        let model = tiny_model();
        let mut decoder = StreamingDecoder::new(model.clone(), DecoderConfig::default());

        feed(&mut decoder, &model, &[0, 0, 1, 1]);
        assert_eq!(decoder.finalize(), vec![model.word_id("ab").unwrap()]);

        // same audio again decodes the same way after the reset
        feed(&mut decoder, &model, &[0, 0, 1, 1]);
        assert_eq!(decoder.finalize(), vec![model.word_id("ab").unwrap()]);
    }

    #[test]
    fn beam_is_bounded() {
        let model = tiny_model();
        let config = DecoderConfig {
            beam_width: 2,
            ..DecoderConfig::default()
        };
        let mut decoder = StreamingDecoder::new(model.clone(), config);
        feed(&mut decoder, &model, &[0, 1, 0, 1, 0, 1]);
        assert!(decoder.beam.len() <= 2);
    }

    #[test]
    fn deterministic_across_runs() {
        let model = tiny_model();
        let sil = model.silence_id();
        let symbols = [0, 0, 1, 1, sil, sil, 1, 1, 0, 0];

        let mut first = StreamingDecoder::new(model.clone(), DecoderConfig::default());
        let mut second = StreamingDecoder::new(model.clone(), DecoderConfig::default());
        let a = feed(&mut first, &model, &symbols);
        let b = feed(&mut second, &model, &symbols);
        assert_eq!(a, b);
        assert_eq!(first.finalize(), second.finalize());
    }
}
