//! Command-line interface for caracal
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Device;

/// Streaming speech-to-text engine
#[derive(Parser, Debug)]
#[command(name = "caracal", version, about = "Streaming speech-to-text engine")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a WAV file frame by frame
    Transcribe {
        /// 16-bit PCM WAV file to transcribe
        wav: PathBuf,

        /// Access key (or set CARACAL_ACCESS_KEY)
        #[arg(long, env = "CARACAL_ACCESS_KEY", value_name = "KEY")]
        access_key: Option<String>,

        /// Path to the model parameter file
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Compute device: best, cpu[:threads], or gpu[:index]
        #[arg(long, value_name = "DEVICE")]
        device: Option<Device>,

        /// Endpoint duration in seconds
        #[arg(long, value_name = "SECONDS")]
        endpoint_duration: Option<f32>,

        /// Disable endpoint detection
        #[arg(long, conflicts_with = "endpoint_duration")]
        no_endpoint: bool,

        /// Run the automatic punctuation pass
        #[arg(long)]
        punctuation: bool,

        /// Reference transcript; prints the word error rate against it
        #[arg(long, value_name = "TEXT")]
        reference: Option<String>,
    },

    /// Print engine metadata
    Info,

    /// Write the synthetic demo model and a matching sample WAV
    Fixture {
        /// Output directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_transcribe_minimal() {
        let cli = Cli::try_parse_from(["caracal", "transcribe", "audio.wav"]).unwrap();
        match cli.command {
            Commands::Transcribe {
                wav,
                model,
                device,
                endpoint_duration,
                no_endpoint,
                punctuation,
                reference,
                ..
            } => {
                assert_eq!(wav, PathBuf::from("audio.wav"));
                assert!(model.is_none());
                assert!(device.is_none());
                assert!(endpoint_duration.is_none());
                assert!(!no_endpoint);
                assert!(!punctuation);
                assert!(reference.is_none());
            }
            _ => panic!("Expected Transcribe command"),
        }
    }

    #[test]
    fn parse_transcribe_with_options() {
        let cli = Cli::try_parse_from([
            "caracal",
            "transcribe",
            "audio.wav",
            "--access-key",
            "abcdefghijklmnopqrstuvwx",
            "--model",
            "/models/en.json",
            "--device",
            "cpu:4",
            "--endpoint-duration",
            "0.5",
            "--punctuation",
        ])
        .unwrap();
        match cli.command {
            Commands::Transcribe {
                access_key,
                model,
                device,
                endpoint_duration,
                punctuation,
                ..
            } => {
                assert_eq!(access_key.as_deref(), Some("abcdefghijklmnopqrstuvwx"));
                assert_eq!(model, Some(PathBuf::from("/models/en.json")));
                assert_eq!(device, Some(Device::Cpu { threads: Some(4) }));
                assert_eq!(endpoint_duration, Some(0.5));
                assert!(punctuation);
            }
            _ => panic!("Expected Transcribe command"),
        }
    }

    #[test]
    fn endpoint_flags_conflict() {
        let result = Cli::try_parse_from([
            "caracal",
            "transcribe",
            "audio.wav",
            "--endpoint-duration",
            "1.0",
            "--no-endpoint",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_device_is_rejected() {
        let result =
            Cli::try_parse_from(["caracal", "transcribe", "audio.wav", "--device", "tpu"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_info() {
        let cli = Cli::try_parse_from(["caracal", "info"]).unwrap();
        assert!(matches!(cli.command, Commands::Info));
    }

    #[test]
    fn parse_fixture_with_output() {
        let cli =
            Cli::try_parse_from(["caracal", "fixture", "--output", "/tmp/demo"]).unwrap();
        match cli.command {
            Commands::Fixture { output } => assert_eq!(output, PathBuf::from("/tmp/demo")),
            _ => panic!("Expected Fixture command"),
        }
    }

    #[test]
    fn parse_verbose_levels() {
        let cli = Cli::try_parse_from(["caracal", "-vv", "info"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn parse_global_config() {
        let cli =
            Cli::try_parse_from(["caracal", "info", "--config", "/etc/caracal.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/caracal.toml")));
    }

    #[test]
    fn transcribe_requires_wav() {
        let result = Cli::try_parse_from(["caracal", "transcribe"]);
        assert!(result.is_err());
    }
}
