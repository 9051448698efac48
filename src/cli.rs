use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a video into German: download, transcribe, translate, synthesize, remux
    Dub {
        /// Video URL
        #[arg(short, long)]
        url: String,

        /// Spoken language of the source video
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Speech model (xtts or legacy)
        #[arg(short, long)]
        model: Option<String>,

        /// Reference .wav to clone, or a preset speaker name
        #[arg(long)]
        voice: Option<String>,

        /// Segments synthesized concurrently
        #[arg(long)]
        max_workers: Option<usize>,

        /// Output directory for the dubbed video
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Keep intermediate files
        #[arg(long)]
        keep_scratch: bool,
    },

    /// Synthesize one text into a WAV file
    Speak {
        /// Text to speak
        #[arg(short, long)]
        text: String,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Speed the speech up to fit this many seconds
        #[arg(long)]
        target_duration: Option<f64>,

        /// Speech model (xtts or legacy)
        #[arg(short, long)]
        model: Option<String>,

        /// Reference .wav to clone, or a preset speaker name
        #[arg(long)]
        voice: Option<String>,
    },

    /// Speed up a WAV file so it fits a target duration
    Adjust {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Target duration in seconds
        #[arg(short, long)]
        target: f64,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show how a text is split into synthesis chunks
    Chunks {
        /// Text to split
        #[arg(short, long)]
        text: String,

        /// Character budget per chunk
        #[arg(long, default_value_t = 250)]
        max_chars: usize,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file path
        #[arg(short, long, default_value = "germanizer.toml")]
        output: PathBuf,
    },
}
