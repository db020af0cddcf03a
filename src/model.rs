use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RdError, RdResult};

/// Tolerance in seconds for partition coverage checks.
pub const COVERAGE_EPSILON: f64 = 1e-6;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_SPAN_LEN: usize = 4;
pub const DEFAULT_MAX_WORDS_PER_LINE: usize = 6;
pub const DEFAULT_STRESS_DURATION_SECS: f64 = 0.2;

// ---------------------------------------------------------------------------
// Time intervals
// ---------------------------------------------------------------------------

/// A half-open interval `[start, end)` in seconds on the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> RdResult<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(RdError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn start_ms(&self) -> u64 {
        secs_to_ms(self.start)
    }

    #[must_use]
    pub fn end_ms(&self) -> u64 {
        secs_to_ms(self.end)
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.end_ms().saturating_sub(self.start_ms())
    }
}

/// Rounds half-up; negative inputs clamp to zero.
#[must_use]
pub fn secs_to_ms(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

// ---------------------------------------------------------------------------
// Diarization output
// ---------------------------------------------------------------------------

/// One raw diarization detection: who spoke when. Detections arrive unsorted
/// and may overlap across speakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerDetection {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// All detections for one speaker label, ordered by start. Detections are
/// never merged; each keeps its own sub-interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub speaker_id: String,
    pub segments: Vec<TimeInterval>,
}

// ---------------------------------------------------------------------------
// Timeline partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentKind {
    Speech { speaker_id: String },
    Pause,
}

impl SegmentKind {
    #[must_use]
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Pause)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSegment {
    #[serde(flatten)]
    pub kind: SegmentKind,
    pub interval: TimeInterval,
}

/// A complete, ordered cover of `[0, total_duration)` by speech and pause
/// segments. The reassembler depends on this invariant: no gap, no overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub total_duration: f64,
    pub segments: Vec<PartitionSegment>,
}

impl Partition {
    /// Checks exact coverage of `[0, total_duration)` within
    /// [`COVERAGE_EPSILON`]: segments sorted, contiguous, first starts at 0,
    /// last ends at the total duration.
    pub fn validate(&self) -> RdResult<()> {
        if self.segments.is_empty() {
            if self.total_duration.abs() <= COVERAGE_EPSILON {
                return Ok(());
            }
            return Err(RdError::PartitionInvariant(format!(
                "no segments cover duration {:.6}s",
                self.total_duration
            )));
        }

        let first = &self.segments[0];
        if first.interval.start.abs() > COVERAGE_EPSILON {
            return Err(RdError::PartitionInvariant(format!(
                "first segment starts at {:.6}s, expected 0",
                first.interval.start
            )));
        }

        for pair in self.segments.windows(2) {
            let gap = pair[1].interval.start - pair[0].interval.end;
            if gap.abs() > COVERAGE_EPSILON {
                let word = if gap > 0.0 { "gap" } else { "overlap" };
                return Err(RdError::PartitionInvariant(format!(
                    "{word} of {:.6}s between segment ending at {:.6}s and segment starting at {:.6}s",
                    gap.abs(),
                    pair[0].interval.end,
                    pair[1].interval.start
                )));
            }
        }

        let last_end = self.segments[self.segments.len() - 1].interval.end;
        if (last_end - self.total_duration).abs() > COVERAGE_EPSILON {
            return Err(RdError::PartitionInvariant(format!(
                "last segment ends at {:.6}s, expected {:.6}s",
                last_end, self.total_duration
            )));
        }

        Ok(())
    }

    /// Distinct speaker labels in order of first appearance.
    #[must_use]
    pub fn speakers(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for segment in &self.segments {
            if let SegmentKind::Speech { speaker_id } = &segment.kind {
                if !out.iter().any(|s| s == speaker_id) {
                    out.push(speaker_id.clone());
                }
            }
        }
        out
    }

    /// Total speech seconds attributed to each speaker, in first-appearance
    /// order.
    #[must_use]
    pub fn speaker_durations(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Vec::new();
        for segment in &self.segments {
            if let SegmentKind::Speech { speaker_id } = &segment.kind {
                match out.iter_mut().find(|(s, _)| s == speaker_id) {
                    Some((_, total)) => *total += segment.interval.duration(),
                    None => out.push((speaker_id.clone(), segment.interval.duration())),
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Word alignment
// ---------------------------------------------------------------------------

/// One source word aligned to a contiguous span of target tokens.
/// `target_start..target_end` indexes into the target token list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordAlignment {
    pub source: String,
    pub target_tokens: Vec<String>,
    pub target_start: usize,
    pub target_end: usize,
    pub similarity: f32,
}

/// Alignments in source order. No target index appears in two alignments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSet {
    pub alignments: Vec<WordAlignment>,
}

impl AlignmentSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alignments.len()
    }
}

// ---------------------------------------------------------------------------
// Prosody
// ---------------------------------------------------------------------------

/// Per-word prosodic measurements extracted from the source audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFeature {
    pub word: String,
    pub pitch_shift: i32,
    pub loudness_shift: f64,
    pub start: f64,
    pub end: f64,
}

/// Synthesis directives for one target word. Misses during mapping get the
/// neutral default rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProsodyTarget {
    pub text: String,
    pub pitch_shift: i32,
    pub gain: f64,
    pub speed: f64,
    pub stress: bool,
}

impl ProsodyTarget {
    #[must_use]
    pub fn neutral(text: String) -> Self {
        Self {
            text,
            pitch_shift: 0,
            gain: 0.0,
            speed: 1.0,
            stress: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transcription and text analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub words: Vec<TranscriptWord>,
}

/// Translation plus sentiment/emotion labels for one speech segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub sentiment: String,
    pub emotion: String,
    pub translated_text: String,
}

// ---------------------------------------------------------------------------
// Reassembly
// ---------------------------------------------------------------------------

/// A finished audio piece waiting for reassembly, keyed by its original
/// timeline position. Consumed exactly once by the reassembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSegment {
    pub start_ms: u64,
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Requests, events, reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DubRequest {
    pub input: PathBuf,
    pub target_language: String,
    pub output_path: PathBuf,
    pub emit_subtitles: bool,
    pub subtitle_path: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub keep_scratch: bool,
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_span_len")]
    pub max_span_len: usize,
    #[serde(default = "default_max_words_per_line")]
    pub max_words_per_line: usize,
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_max_span_len() -> usize {
    DEFAULT_MAX_SPAN_LEN
}

fn default_max_words_per_line() -> usize {
    DEFAULT_MAX_WORDS_PER_LINE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ingest,
    Extract,
    Clean,
    Diarize,
    Partition,
    Transcribe,
    Analyze,
    Align,
    Prosody,
    Synthesize,
    Reconcile,
    Assemble,
    Subtitle,
    Report,
}

impl PipelineStage {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Extract => "extract",
            Self::Clean => "clean",
            Self::Diarize => "diarize",
            Self::Partition => "partition",
            Self::Transcribe => "transcribe",
            Self::Analyze => "analyze",
            Self::Align => "align",
            Self::Prosody => "prosody",
            Self::Synthesize => "synthesize",
            Self::Reconcile => "reconcile",
            Self::Assemble => "assemble",
            Self::Subtitle => "subtitle",
            Self::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub ts_rfc3339: String,
    pub stage: String,
    pub code: String,
    pub message: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at_rfc3339: String,
    pub finished_at_rfc3339: String,
    pub input_path: String,
    pub language_code: String,
    pub final_audio_path: String,
    pub subtitle_path: Option<String>,
    pub final_track_sha256: Option<String>,
    pub speaker_count: usize,
    pub speech_segments: usize,
    pub pause_segments: usize,
    pub events: Vec<RunEvent>,
    pub warnings: Vec<String>,
}
