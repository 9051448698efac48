//! germanizer - Automated German Dubbing Workflow
//!
//! Downloads a video, transcribes and translates its speech, re-voices it
//! with a TTS model timed to the original segments and remuxes the result.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use germanizer::adjust::{Adjustment, DurationAdjuster};
use germanizer::cli::{Args, Commands};
use germanizer::config::{Config, TtsModelKind};
use germanizer::error::GermanizerError;
use germanizer::scratch::ScratchDir;
use germanizer::segment::SegmentGenerator;
use germanizer::text::split_into_chunks;
use germanizer::tts::{SpeechModelFactory, SynthesisConfig, Synthesizer};
use germanizer::workflow::{DubOptions, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("germanizer.toml").exists() {
                info!("Found germanizer.toml in current directory, loading...");
                Config::from_file("germanizer.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Dub {
            url,
            source_lang,
            model,
            voice,
            max_workers,
            output_dir,
            keep_scratch,
        } => {
            apply_voice_overrides(&mut config, model.as_deref(), voice)?;
            let options = DubOptions {
                source_language: source_lang,
                output_dir,
                max_workers: max_workers.unwrap_or(config.batch.max_workers),
                keep_scratch: keep_scratch || config.scratch.keep,
            };

            let workflow = Workflow::new(config).await?;
            let outcome = workflow.dub(&url, &options).await?;

            println!("Dubbed video: {}", outcome.video.display());
            if !outcome.skipped.is_empty() {
                println!(
                    "{} of {} segments could not be synthesized and are silent:",
                    outcome.skipped.len(),
                    outcome.segments
                );
                for segment in &outcome.skipped {
                    println!("  #{} at {:.2}s: {}", segment.index, segment.start, segment.reason);
                }
            }
        }
        Commands::Speak {
            text,
            output,
            target_duration,
            model,
            voice,
        } => {
            apply_voice_overrides(&mut config, model.as_deref(), voice)?;
            let scratch = ScratchDir::new(&config.scratch.dir)?;

            let speech_model = SpeechModelFactory::load(&config.tts).await?;
            let synthesizer = Synthesizer::new(
                speech_model,
                SynthesisConfig::from_tts_config(&config.tts),
                scratch.clone(),
            )?
            .with_chunk_chars(config.tts.legacy_chunk_chars);
            let adjuster = DurationAdjuster::new(scratch, config.tts.output_sample_rate);
            let generator = SegmentGenerator::new(synthesizer, adjuster);

            let artifact = match target_duration {
                Some(target) => generator.generate(&text, target).await?,
                None => generator.generate_untimed(&text).await?,
            };

            move_file(&artifact.path, &output)?;
            println!("{} ({:.2}s)", output.display(), artifact.duration);
        }
        Commands::Adjust { input, target, output } => {
            if !input.exists() {
                return Err(GermanizerError::FileNotFound(input.display().to_string()).into());
            }
            let scratch = ScratchDir::new(&config.scratch.dir)?;
            let adjuster = DurationAdjuster::new(scratch, config.tts.output_sample_rate);

            let adjustment = tokio::task::spawn_blocking(move || adjuster.adjust(&input, target)).await??;
            std::fs::copy(adjustment.path(), &output)?;

            match &adjustment {
                Adjustment::Unchanged { duration, .. } => {
                    println!("Already fits: {:.2}s <= {:.2}s, copied unchanged", duration, target);
                }
                Adjustment::SpedUp { speed_factor, duration, .. } => {
                    println!("Sped up x{:.3} to {:.2}s", speed_factor, duration);
                }
            }
        }
        Commands::Chunks { text, max_chars } => {
            for (i, chunk) in split_into_chunks(&text, max_chars).iter().enumerate() {
                println!("{:>3} [{:>4} chars] {}", i + 1, chunk.chars().count(), chunk);
            }
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn apply_voice_overrides(config: &mut Config, model: Option<&str>, voice: Option<String>) -> Result<()> {
    if let Some(model) = model {
        config.tts.model = TtsModelKind::parse(model)?;
    }
    if voice.is_some() {
        config.tts.voice = voice;
    }
    Ok(())
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".germanizer").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "germanizer.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized (log dir: {})", log_dir.display());
    Ok(())
}
