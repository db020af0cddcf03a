use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::backend::ServiceSet;
use crate::error::{RdError, RdResult};
use crate::model::{
    DubRequest, DEFAULT_MAX_SPAN_LEN, DEFAULT_MAX_WORDS_PER_LINE, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::orchestrator::RedubEngine;

/// Global flag indicating that a shutdown signal has been received.
static SHUTDOWN_FLAG: std::sync::OnceLock<Arc<AtomicBool>> = std::sync::OnceLock::new();

/// Coordinates graceful Ctrl+C shutdown. A raised flag stops the pipeline at
/// the next segment boundary; nothing is interrupted mid-segment.
pub struct ShutdownController;

impl ShutdownController {
    /// Install the Ctrl+C signal handler. Errors are non-fatal; callers may
    /// log and continue without graceful shutdown.
    pub fn install() -> RdResult<()> {
        let flag = Self::flag();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("shutdown signal received (Ctrl+C)");
        })
        .map_err(|e| RdError::Io(std::io::Error::other(format!("ctrlc handler: {e}"))))?;
        Ok(())
    }

    #[must_use]
    pub fn is_shutting_down() -> bool {
        Self::flag().load(Ordering::SeqCst)
    }

    /// The shared flag the signal handler raises and the engine polls
    /// between segments.
    #[must_use]
    pub fn flag() -> Arc<AtomicBool> {
        Arc::clone(SHUTDOWN_FLAG.get_or_init(|| Arc::new(AtomicBool::new(false))))
    }

    /// The exit code the binary should use when exiting due to a signal.
    #[must_use]
    pub const fn signal_exit_code() -> i32 {
        130 // Convention: 128 + SIGINT(2)
    }
}

#[derive(Debug, Parser)]
#[command(name = "redub")]
#[command(about = "Audio re-dubbing pipeline: diarize, translate, resynthesize, reassemble")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Re-dub one audio/video file into the target language.
    Dub(Box<DubArgs>),
    /// List supported target languages and their codes.
    Languages,
    /// Report availability of every collaborator backend.
    Backends,
}

#[derive(Debug, Args)]
pub struct DubArgs {
    /// Input audio/video file.
    #[arg(long)]
    pub input: PathBuf,

    /// Target language name (free text, fuzzily matched).
    #[arg(long)]
    pub language: String,

    /// Final dubbed audio track.
    #[arg(long, default_value = "dubbed_audio.wav")]
    pub output: PathBuf,

    /// Also write an SRT subtitle file.
    #[arg(long)]
    pub subtitles: bool,

    /// Subtitle file path (defaults to the output path with .srt).
    #[arg(long)]
    pub subtitle_path: Option<PathBuf>,

    /// Scratch directory for intermediate artifacts.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Keep per-segment scratch audio after the run.
    #[arg(long)]
    pub keep_scratch: bool,

    /// Per-collaborator timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Minimum cosine similarity for a word alignment.
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f32,

    /// Longest target span one source unit may claim.
    #[arg(long, default_value_t = DEFAULT_MAX_SPAN_LEN)]
    pub max_span_len: usize,

    /// Words per subtitle line.
    #[arg(long, default_value_t = DEFAULT_MAX_WORDS_PER_LINE)]
    pub max_words_per_line: usize,
}

impl DubArgs {
    #[must_use]
    pub fn to_request(&self) -> DubRequest {
        DubRequest {
            input: self.input.clone(),
            target_language: self.language.clone(),
            output_path: self.output.clone(),
            emit_subtitles: self.subtitles || self.subtitle_path.is_some(),
            subtitle_path: self.subtitle_path.clone(),
            scratch_dir: self.scratch_dir.clone(),
            keep_scratch: self.keep_scratch,
            timeout_ms: self.timeout_ms,
            similarity_threshold: self.similarity_threshold,
            max_span_len: self.max_span_len,
            max_words_per_line: self.max_words_per_line,
        }
    }
}

pub fn run(cli: Cli) -> RdResult<()> {
    match cli.command {
        Command::Dub(args) => {
            let request = args.to_request();
            let engine =
                RedubEngine::new(ServiceSet::external()).with_shutdown_flag(ShutdownController::flag());
            let report = engine.run(&request)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Languages => {
            let entries: Vec<_> = crate::lang::LANGUAGES
                .iter()
                .map(|(name, code)| json!({ "name": name, "code": code }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "languages": entries }))?
            );
            Ok(())
        }
        Command::Backends => {
            let report = ServiceSet::external().availability();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
