//! Rule-based automatic punctuation and casing.
//!
//! Runs over finalized text only, never over streaming partials. The
//! pass is idempotent so already-punctuated text survives a second
//! application unchanged.

/// Title abbreviations rendered with a trailing period.
const TITLES: &[(&str, &str)] = &[
    ("mr", "Mr."),
    ("mrs", "Mrs."),
    ("ms", "Ms."),
    ("dr", "Dr."),
];

fn sentence_terminal(token: &str) -> bool {
    matches!(token.chars().last(), Some('.' | '?' | '!'))
}

fn capitalize(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut done = false;
    for c in token.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn title_for(token: &str) -> Option<&'static str> {
    let bare = token.trim_end_matches('.').to_lowercase();
    TITLES
        .iter()
        .find(|&&(raw, _)| raw == bare)
        .map(|&(_, rendered)| rendered)
}

/// Punctuates and cases finalized transcript text.
///
/// Sentence starts and the word after a title abbreviation are
/// capitalized, standalone "i" becomes "I", titles get their period, and
/// the text is closed with a terminal period when it lacks one.
pub fn punctuate(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return String::new();
    }

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut capitalize_next = true;

    for token in tokens {
        let rendered = if let Some(title) = title_for(token) {
            capitalize_next = true;
            title.to_string()
        } else if token.eq_ignore_ascii_case("i") {
            capitalize_next = false;
            "I".to_string()
        } else if capitalize_next {
            capitalize_next = false;
            capitalize(token)
        } else {
            token.to_string()
        };

        if title_for(&rendered).is_none() && sentence_terminal(&rendered) {
            capitalize_next = true;
        }
        out.push(rendered);
    }

    let mut result = out.join(" ");
    if !sentence_terminal(&result) {
        result.push('.');
    }
    result
}
