//! Synthetic model and audio generation for demos and tests.
//!
//! Builds a small English model whose phones are the 26 letters, each
//! tied to its own mel band, together with audio synthesis that renders
//! a word sequence as a train of pure tones at those bands' center
//! frequencies. Recognition over this pair is deterministic, which makes
//! full audio-to-transcript runs assertable without shipping a trained
//! model.

use std::collections::HashMap;

use crate::audio::features::MelFilterbank;
use crate::defaults;
use crate::model::{
    AcousticParams, FeatureParams, LanguageModel, LexiconEntry, ModelFile, FORMAT_VERSION,
};

/// The utterance used by the demo and the end-to-end tests.
pub const REFERENCE_TRANSCRIPT: &str =
    "mr quilter is the apostle of the middle classes and we are glad to welcome his gospel";

/// [`REFERENCE_TRANSCRIPT`] after the punctuation pass.
pub const REFERENCE_PUNCTUATED: &str =
    "Mr. Quilter is the apostle of the middle classes and we are glad to welcome his gospel.";

/// Frames of audio synthesized per phone.
pub const FRAMES_PER_PHONE: usize = 3;

const N_MELS: usize = 64;
/// Mel band of the first letter; letters sit two bands apart so their
/// triangular filters never overlap.
const FIRST_BAND: usize = 6;
const BAND_STRIDE: usize = 2;

const TONE_AMPLITUDE: f32 = 0.3;
/// Acoustic weight a phone places on its own mel band.
const BAND_GAIN: f32 = 6.0;
/// Silence scores through its bias alone, so it wins exactly when every
/// band is near the log floor.
const SILENCE_BIAS: f32 = -20.0;
/// Blank is never the acoustic winner; held phones cover repetition.
const BLANK_BIAS: f32 = -40.0;

/// A key the offline validator accepts.
pub fn access_key() -> String {
    "CARACALFIXTUREKEY0123456789ABCDEF".to_string()
}

fn letter_index(c: char) -> usize {
    (c as u8 - b'a') as usize
}

fn letter_band(c: char) -> usize {
    FIRST_BAND + BAND_STRIDE * letter_index(c)
}

/// A word's phone sequence: its letters with consecutive duplicates
/// collapsed ("middle" becomes m-i-d-l-e).
fn pronunciation(word: &str) -> Vec<String> {
    let mut phones: Vec<String> = Vec::new();
    for c in word.chars() {
        let p = c.to_string();
        if phones.last() != Some(&p) {
            phones.push(p);
        }
    }
    phones
}

/// Builds the full model file: letter phones, reference-utterance
/// lexicon, and a bigram language model over the reference word order.
pub fn model_file() -> ModelFile {
    let mut phones: Vec<String> = (b'a'..=b'z').map(|c| (c as char).to_string()).collect();
    phones.push("sil".to_string());
    let silence_id = phones.len() - 1;
    let n_symbols = phones.len() + 1;

    let mut weights = vec![vec![0.0f32; N_MELS]; n_symbols];
    let mut bias = vec![0.0f32; n_symbols];
    for c in b'a'..=b'z' {
        let c = c as char;
        weights[letter_index(c)][letter_band(c)] = BAND_GAIN;
    }
    bias[silence_id] = SILENCE_BIAS;
    bias[n_symbols - 1] = BLANK_BIAS;

    let mut words: Vec<&str> = Vec::new();
    for word in REFERENCE_TRANSCRIPT.split_whitespace() {
        if !words.contains(&word) {
            words.push(word);
        }
    }

    let lexicon: Vec<LexiconEntry> = words
        .iter()
        .map(|&word| LexiconEntry {
            word: word.to_string(),
            phones: pronunciation(word),
        })
        .collect();

    let unigrams: HashMap<String, f32> =
        words.iter().map(|&w| (w.to_string(), -1.2)).collect();
    let mut bigrams: HashMap<String, f32> = HashMap::new();
    let sequence: Vec<&str> = REFERENCE_TRANSCRIPT.split_whitespace().collect();
    for pair in sequence.windows(2) {
        bigrams.insert(format!("{} {}", pair[0], pair[1]), -0.2);
    }

    ModelFile {
        name: "caracal-fixture-en".to_string(),
        format_version: FORMAT_VERSION,
        sample_rate: defaults::SAMPLE_RATE,
        frame_length: defaults::FRAME_LENGTH,
        features: FeatureParams { n_mels: N_MELS },
        phones,
        silence_phone: "sil".to_string(),
        acoustic: AcousticParams { weights, bias },
        lexicon,
        lm: LanguageModel {
            weight: 1.0,
            unigrams,
            bigrams,
        },
    }
}

/// Renders a word sequence as tone audio, with optional silence padding,
/// as whole frames of 16kHz PCM.
pub fn synthesize(text: &str, leading_silence_frames: usize, trailing_silence_frames: usize) -> Vec<i16> {
    let frame = defaults::FRAME_LENGTH as usize;
    let filterbank = MelFilterbank::new(N_MELS, frame, defaults::SAMPLE_RATE);

    let mut pcm: Vec<i16> = vec![0; leading_silence_frames * frame];

    for word in text.split_whitespace() {
        for phone in pronunciation(word) {
            let c = phone.chars().next().unwrap_or('a');
            let hz = filterbank.center_hz(letter_band(c));
            let samples = FRAMES_PER_PHONE * frame;
            for n in 0..samples {
                let t = n as f32 / defaults::SAMPLE_RATE as f32;
                let v = TONE_AMPLITUDE
                    * (2.0 * std::f32::consts::PI * hz * t).sin();
                pcm.push((v * 32767.0) as i16);
            }
        }
    }

    pcm.extend(std::iter::repeat(0i16).take(trailing_silence_frames * frame));
    pcm
}
