//! caracal - streaming speech-to-text engine
//!
//! Frame-by-frame transcription with incremental partial results,
//! endpoint detection, and optional automatic punctuation.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod activation;
pub mod asr;
pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod fixture;
pub mod model;
pub mod session;
pub mod text;

// Session lifecycle
pub use session::{Caracal, CaracalBuilder, CaracalTranscript};

// Error handling
pub use error::{CaracalError, ErrorKind, Result};

// Config
pub use config::{Device, EngineConfig};

// Seams for custom scorers and licensing backends
pub use activation::{AccessValidator, ActivationError};
pub use asr::scorer::AcousticScorer;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.0+abc1234"` when a git hash is available, `"0.3.0"`
/// otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
