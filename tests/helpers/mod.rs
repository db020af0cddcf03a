#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use redub::backend::{
    Diarizer, Embedder, FeatureExtractor, SynthesisSpec, Synthesizer, TextAnalyzer, Transcriber,
};
use redub::error::{RdError, RdResult};
use redub::model::{SpeakerDetection, TextAnalysis, Transcript, TranscriptWord, WordFeature};

/// True when both ffmpeg and ffprobe are on PATH. Engine tests do real audio
/// work even with stub services, so they skip without these.
pub fn ffmpeg_available() -> bool {
    redub::process::command_exists("ffmpeg") && redub::process::command_exists("ffprobe")
}

/// Write a silent 16 kHz mono WAV to use as the run input.
pub fn make_input_wav(dir: &Path, seconds: f64) -> PathBuf {
    let path = dir.join("input.wav");
    redub::audio::silence_wav(seconds, &path).expect("write input wav");
    path
}

/// Transcript with word timings derived from evenly spaced slots.
pub fn transcript_of(words: &[(&str, f64, f64)]) -> Transcript {
    Transcript {
        text: words
            .iter()
            .map(|(w, _, _)| *w)
            .collect::<Vec<_>>()
            .join(" "),
        words: words
            .iter()
            .map(|(w, start, end)| TranscriptWord {
                word: (*w).to_owned(),
                start: *start,
                end: *end,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Deterministic stub services
// ---------------------------------------------------------------------------

pub struct StubDiarizer {
    pub detections: Vec<SpeakerDetection>,
}

impl Diarizer for StubDiarizer {
    fn name(&self) -> &'static str {
        "stub-diarizer"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn diarize(
        &self,
        _audio: &Path,
        _work_dir: &Path,
        _timeout: Duration,
    ) -> RdResult<Vec<SpeakerDetection>> {
        Ok(self.detections.clone())
    }
}

pub struct StubTranscriber {
    pub transcript: Transcript,
}

impl Transcriber for StubTranscriber {
    fn name(&self) -> &'static str {
        "stub-transcriber"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn transcribe(
        &self,
        _audio: &Path,
        _work_dir: &Path,
        _timeout: Duration,
    ) -> RdResult<Transcript> {
        Ok(self.transcript.clone())
    }
}

pub struct StubAnalyzer {
    pub translated_text: String,
}

impl TextAnalyzer for StubAnalyzer {
    fn name(&self) -> &'static str {
        "stub-analyzer"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn analyze(
        &self,
        _text: &str,
        _language_code: &str,
        _work_dir: &Path,
        _timeout: Duration,
    ) -> RdResult<TextAnalysis> {
        Ok(TextAnalysis {
            sentiment: "neutral".to_owned(),
            emotion: "calm".to_owned(),
            translated_text: self.translated_text.clone(),
        })
    }
}

pub struct StubFeatures {
    pub features: Vec<WordFeature>,
    pub fail: bool,
}

impl FeatureExtractor for StubFeatures {
    fn name(&self) -> &'static str {
        "stub-features"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn extract(
        &self,
        _audio: &Path,
        _work_dir: &Path,
        _timeout: Duration,
    ) -> RdResult<Vec<WordFeature>> {
        if self.fail {
            return Err(RdError::BackendUnavailable(
                "stub feature extractor forced failure".to_owned(),
            ));
        }
        Ok(self.features.clone())
    }
}

/// Lookup-table embedder. Unknown texts embed to the zero vector, which
/// scores 0.0 against everything and so never clears the threshold.
pub struct TableEmbedder {
    pub table: HashMap<String, Vec<f32>>,
    pub dim: usize,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, &[f32])]) -> Self {
        let dim = entries.first().map_or(2, |(_, v)| v.len());
        Self {
            table: entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.to_vec()))
                .collect(),
            dim,
        }
    }
}

impl Embedder for TableEmbedder {
    fn name(&self) -> &'static str {
        "table-embedder"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn embed(&self, texts: &[String]) -> RdResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                self.table
                    .get(&text.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dim])
            })
            .collect())
    }
}

/// Synthesizer that emits silence scaled from the requested slot length.
/// `scale` above 1.0 forces the reconciliation path to compress.
pub struct SilenceSynth {
    pub scale: f64,
    pub fail: bool,
}

impl Synthesizer for SilenceSynth {
    fn name(&self) -> &'static str {
        "silence-synth"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn synthesize(
        &self,
        spec: &SynthesisSpec,
        work_dir: &Path,
        _timeout: Duration,
    ) -> RdResult<PathBuf> {
        if self.fail {
            return Err(RdError::BackendUnavailable(
                "stub synthesizer forced failure".to_owned(),
            ));
        }
        let path = work_dir.join("synth.wav");
        redub::audio::silence_wav(spec.approx_secs * self.scale, &path)?;
        Ok(path)
    }
}
