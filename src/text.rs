//! Transcript text utilities: normalization and word error rate.

/// Lowercases text and strips punctuation, returning the word sequence.
///
/// Apostrophes inside words are kept ("don't" stays one word); everything
/// else that is not alphanumeric is treated as a separator.
pub fn normalize_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(|raw| {
            let word: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .flat_map(|c| c.to_lowercase())
                .collect();
            if word.is_empty() { None } else { Some(word) }
        })
        .collect()
}

/// Word-level edit distance (insertions, deletions, substitutions).
pub fn word_edit_distance(reference: &[String], hypothesis: &[String]) -> usize {
    let m = reference.len();
    let n = hypothesis.len();

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if reference[i - 1] == hypothesis[j - 1] {
                0
            } else {
                1
            };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Word error rate of a hypothesis against a reference transcript.
///
/// Both sides are normalized (lowercased, punctuation stripped) before
/// comparison. The distance is divided by the reference word count; an
/// empty reference yields 0.0 for an empty hypothesis and 1.0 otherwise.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let ref_words = normalize_words(reference);
    let hyp_words = normalize_words(hypothesis);

    if ref_words.is_empty() {
        return if hyp_words.is_empty() { 0.0 } else { 1.0 };
    }

    word_edit_distance(&ref_words, &hyp_words) as f64 / ref_words.len() as f64
}
