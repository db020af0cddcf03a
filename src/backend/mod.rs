use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RdResult;
use crate::model::{
    ProsodyTarget, SpeakerDetection, TextAnalysis, Transcript, WordFeature,
};

pub mod analysis;
pub mod features;
pub mod parler;
pub mod pyannote;
pub mod sbert;
pub mod whisper_words;

pub use analysis::AnalysisBackend;
pub use features::ProsodyFeatureBackend;
pub use parler::ParlerBackend;
pub use pyannote::PyannoteBackend;
pub use sbert::SbertBackend;
pub use whisper_words::WhisperWordsBackend;

const DEFAULT_PYTHON_BIN: &str = "python3";

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Speaker diarization: audio path to raw detection tuples.
pub trait Diarizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn diarize(
        &self,
        audio: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<Vec<SpeakerDetection>>;
}

/// Transcription with word-level timestamps.
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn transcribe(&self, audio: &Path, work_dir: &Path, timeout: Duration)
        -> RdResult<Transcript>;
}

/// Translation plus sentiment and emotion labels for one segment's text.
pub trait TextAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn analyze(
        &self,
        text: &str,
        language_code: &str,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<TextAnalysis>;
}

/// Per-word acoustic feature extraction from a segment's audio.
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn extract(
        &self,
        audio: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<Vec<WordFeature>>;
}

/// Sentence/word embeddings for alignment scoring. Loaded-once model state
/// belongs behind the implementor; callers hold one instance per run.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn embed(&self, texts: &[String]) -> RdResult<Vec<Vec<f32>>>;
}

/// What one slot of speech should sound like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSpec {
    pub text: String,
    pub language_code: String,
    pub sentiment: String,
    pub emotion: String,
    pub speaker_id: String,
    /// Original slot length; a hint, not a guarantee (reconciliation fixes
    /// overruns afterwards).
    pub approx_secs: f64,
    pub targets: Vec<ProsodyTarget>,
}

/// Speech synthesis: spec to a WAV on disk.
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn synthesize(
        &self,
        spec: &SynthesisSpec,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<PathBuf>;
}

// ---------------------------------------------------------------------------
// Service set
// ---------------------------------------------------------------------------

/// Every collaborator the pipeline consumes, injectable as one bundle so
/// tests can swap in deterministic stubs.
pub struct ServiceSet {
    pub diarizer: Box<dyn Diarizer>,
    pub transcriber: Box<dyn Transcriber>,
    pub analyzer: Box<dyn TextAnalyzer>,
    pub features: Box<dyn FeatureExtractor>,
    pub embedder: Box<dyn Embedder>,
    pub synthesizer: Box<dyn Synthesizer>,
}

impl ServiceSet {
    /// The production wiring: every collaborator backed by its external
    /// python adapter.
    #[must_use]
    pub fn external() -> Self {
        Self {
            diarizer: Box::new(PyannoteBackend),
            transcriber: Box::new(WhisperWordsBackend),
            analyzer: Box::new(AnalysisBackend),
            features: Box::new(ProsodyFeatureBackend),
            embedder: Box::new(SbertBackend),
            synthesizer: Box::new(ParlerBackend),
        }
    }

    #[must_use]
    pub fn availability(&self) -> ServicesReport {
        ServicesReport {
            services: vec![
                ServiceEntry {
                    name: self.diarizer.name().to_owned(),
                    role: "diarization".to_owned(),
                    available: self.diarizer.is_available(),
                },
                ServiceEntry {
                    name: self.transcriber.name().to_owned(),
                    role: "transcription".to_owned(),
                    available: self.transcriber.is_available(),
                },
                ServiceEntry {
                    name: self.analyzer.name().to_owned(),
                    role: "text-analysis".to_owned(),
                    available: self.analyzer.is_available(),
                },
                ServiceEntry {
                    name: self.features.name().to_owned(),
                    role: "prosodic-features".to_owned(),
                    available: self.features.is_available(),
                },
                ServiceEntry {
                    name: self.embedder.name().to_owned(),
                    role: "embeddings".to_owned(),
                    available: self.embedder.is_available(),
                },
                ServiceEntry {
                    name: self.synthesizer.name().to_owned(),
                    role: "synthesis".to_owned(),
                    available: self.synthesizer.is_available(),
                },
            ],
        }
    }
}

/// One row of the `redub backends` diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub role: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesReport {
    pub services: Vec<ServiceEntry>,
}

// ---------------------------------------------------------------------------
// Shared adapter plumbing
// ---------------------------------------------------------------------------

pub(crate) fn python_bin() -> String {
    std::env::var("REDUB_PYTHON_BIN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PYTHON_BIN.to_owned())
}

/// Script location for an adapter: env override first, then the tree-local
/// default under `scripts/`.
pub(crate) fn script_path(env_key: &str, default_rel: &str) -> PathBuf {
    if let Ok(value) = std::env::var(env_key) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join(default_rel)
}

pub(crate) fn backend_timeout(request_timeout_ms: Option<u64>) -> Duration {
    if let Some(ms) = request_timeout_ms {
        return Duration::from_millis(ms);
    }
    crate::audio::duration_from_env("REDUB_BACKEND_TIMEOUT_MS", Duration::from_secs(600))
}

pub(crate) fn script_available(env_key: &str, default_rel: &str) -> bool {
    script_path(env_key, default_rel).exists() && crate::process::command_exists(&python_bin())
}
