use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use caracal::audio::wav;
use caracal::cli::{Cli, Commands};
use caracal::config::{Device, EngineConfig};
use caracal::{defaults, fixture, text, Caracal, CaracalBuilder};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Transcribe {
            wav,
            access_key,
            model,
            device,
            endpoint_duration,
            no_endpoint,
            punctuation,
            reference,
        } => run_transcribe(TranscribeArgs {
            config_path: cli.config,
            wav,
            access_key,
            model,
            device,
            endpoint_duration,
            no_endpoint,
            punctuation,
            reference,
        }),
        Commands::Info => run_info(),
        Commands::Fixture { output } => run_fixture(&output),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("caracal={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct TranscribeArgs {
    config_path: Option<PathBuf>,
    wav: PathBuf,
    access_key: Option<String>,
    model: Option<PathBuf>,
    device: Option<Device>,
    endpoint_duration: Option<f32>,
    no_endpoint: bool,
    punctuation: bool,
    reference: Option<String>,
}

/// Stream a WAV file through a session, printing partials as they
/// stabilize.
fn run_transcribe(args: TranscribeArgs) -> Result<()> {
    let mut config = match &args.config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from '{}'", path.display()))?,
        None => EngineConfig::default(),
    };

    // CLI flags win over the configuration file
    if let Some(key) = args.access_key {
        config.access_key = key;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if let Some(device) = args.device {
        config.device = device;
    }
    if args.no_endpoint {
        config.endpoint_duration_sec = None;
    } else if let Some(seconds) = args.endpoint_duration {
        config.endpoint_duration_sec = Some(seconds);
    }
    if args.punctuation {
        config.enable_automatic_punctuation = true;
    }

    let mut session = CaracalBuilder::from_config(config).init()?;
    let samples = wav::read_mono_16k(&args.wav)
        .with_context(|| format!("reading '{}'", args.wav.display()))?;

    let transcript = transcribe_stream(&mut session, &samples, &mut |piece| {
        print!("{}", piece);
        std::io::stdout().flush().ok();
    })?;
    println!();

    if let Some(reference) = args.reference {
        println!("WER: {:.3}", text::word_error_rate(&reference, &transcript));
    }

    Ok(())
}

/// Streams samples through the session one frame at a time, finalizing
/// the utterance at every endpoint and once more at end of input.
/// Returns the accumulated transcript; `emit` receives each piece of
/// output as it becomes available.
fn transcribe_stream(
    session: &mut Caracal,
    samples: &[i16],
    emit: &mut dyn FnMut(&str),
) -> caracal::Result<String> {
    let frame_length = session.frame_length() as usize;
    let mut transcript = String::new();
    for frame in samples.chunks_exact(frame_length) {
        let out = session.process(frame)?;
        if !out.transcript.is_empty() {
            emit(&out.transcript);
            transcript.push_str(&out.transcript);
        }
        if out.is_endpoint {
            tracing::info!("endpoint detected");
            let finalized = session.flush()?;
            if !finalized.transcript.is_empty() {
                emit(&finalized.transcript);
                transcript.push_str(&finalized.transcript);
            }
            emit("\n");
            transcript.push(' ');
        }
    }
    let tail = session.flush()?;
    if !tail.transcript.is_empty() {
        emit(&tail.transcript);
        transcript.push_str(&tail.transcript);
    }
    Ok(transcript)
}

fn run_info() -> Result<()> {
    println!("caracal {}", caracal::version_string());
    println!("  sample rate:  {} Hz", defaults::SAMPLE_RATE);
    println!("  frame length: {} samples", defaults::FRAME_LENGTH);
    Ok(())
}

/// Write the synthetic demo model and a WAV of the reference utterance.
fn run_fixture(output: &Path) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("creating '{}'", output.display()))?;

    let model_path = output.join("caracal-fixture-en.json");
    fixture::model_file().save(&model_path)?;

    let wav_path = output.join("sample.wav");
    let pcm = fixture::synthesize(fixture::REFERENCE_TRANSCRIPT, 5, 40);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: defaults::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav_path, spec)?;
    for sample in pcm {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    println!("Wrote {}", model_path.display());
    println!("Wrote {}", wav_path.display());
    println!();
    println!("Try:");
    println!(
        "  caracal transcribe {} --model {} --access-key {}",
        wav_path.display(),
        model_path.display(),
        fixture::access_key()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caracal::asr::scorer::ScriptedScorer;

    #[test]
    fn stream_finalizes_the_utterance_at_its_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        fixture::model_file().save(&model_path).unwrap();

        // "we", then enough trailing silence to cross the endpoint
        let mut scorer = ScriptedScorer::new(28, 26);
        for c in ['w', 'e'] {
            scorer.push_symbol_frames((c as u8 - b'a') as usize, 3);
        }
        scorer.push_symbol_frames(26, 10);

        let mut session = CaracalBuilder::new()
            .access_key(fixture::access_key())
            .model_path(&model_path)
            .scorer(Box::new(scorer))
            .endpoint_duration_sec(0.096)
            .init()
            .unwrap();

        let samples = vec![0i16; 16 * defaults::FRAME_LENGTH as usize];
        let mut pieces: Vec<String> = Vec::new();
        let transcript = transcribe_stream(&mut session, &samples, &mut |piece| {
            pieces.push(piece.to_string());
        })
        .unwrap();

        // the whole word is emitted when the endpoint fires, before the
        // input runs out
        let newline = pieces.iter().position(|p| p == "\n").unwrap();
        assert_eq!(pieces[..newline].concat(), "we");
        assert_eq!(transcript.trim(), "we");
    }
}
