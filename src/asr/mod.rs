//! The recognition core: acoustic scoring, lexicon, streaming decoder,
//! endpoint detection, and punctuation.

pub mod decoder;
pub mod endpoint;
pub mod lexicon;
pub mod punctuation;
pub mod scorer;
