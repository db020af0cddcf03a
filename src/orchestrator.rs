use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::align::{align_words, AlignerConfig};
use crate::audio;
use crate::backend::{ServiceSet, SynthesisSpec};
use crate::error::{RdError, RdResult};
use crate::lang;
use crate::model::{
    DubRequest, OutputSegment, Partition, PipelineStage, ProsodyTarget, RunEvent, RunReport,
    SegmentKind, SpeakerTurn, TimeInterval,
};
use crate::prosody::map_prosody_default;
use crate::segment::{build_partition, build_turns, refine_pauses, PauseGate};
use crate::subtitle::build_subtitles;
use crate::timing::reconcile_segment;

/// Sequenced event sink for one run.
struct EventRecorder {
    seq: u64,
    events: Vec<RunEvent>,
}

impl EventRecorder {
    fn new() -> Self {
        Self {
            seq: 0,
            events: Vec::new(),
        }
    }

    fn push(&mut self, stage: PipelineStage, code: &str, message: &str, payload: Value) {
        self.seq += 1;
        self.events.push(RunEvent {
            seq: self.seq,
            ts_rfc3339: Utc::now().to_rfc3339(),
            stage: stage.label().to_owned(),
            code: code.to_owned(),
            message: message.to_owned(),
            payload,
        });
    }
}

/// The re-dubbing pipeline: one sequential batch per input file. Collaborator
/// services are injected so tests can run against deterministic stubs.
pub struct RedubEngine {
    services: ServiceSet,
    shutdown: Option<Arc<AtomicBool>>,
}

impl RedubEngine {
    #[must_use]
    pub fn new(services: ServiceSet) -> Self {
        Self {
            services,
            shutdown: None,
        }
    }

    /// Installs a flag polled between segments. A raised flag aborts the run
    /// at the next inter-segment checkpoint; a segment's sub-pipeline is
    /// never interrupted midway.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn run(&self, request: &DubRequest) -> RdResult<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now().to_rfc3339();
        let mut recorder = EventRecorder::new();
        let mut warnings: Vec<String> = Vec::new();

        // Input errors fail before any processing.
        audio::check_input(&request.input)?;
        let language_code = lang::resolve_language_code(&request.target_language)?;
        if request.max_span_len == 0 {
            return Err(RdError::InvalidRequest(
                "max span length must be at least 1".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&request.similarity_threshold) {
            return Err(RdError::InvalidRequest(format!(
                "similarity threshold must be within [0, 1], got {}",
                request.similarity_threshold
            )));
        }
        if request.max_words_per_line == 0 {
            return Err(RdError::InvalidRequest(
                "words per subtitle line must be at least 1".to_owned(),
            ));
        }

        let scratch = match &request.scratch_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from(".redub").join("runs").join(&run_id),
        };
        fs::create_dir_all(&scratch)?;

        tracing::info!(run_id, input = %request.input.display(), language_code, "starting run");
        recorder.push(
            PipelineStage::Ingest,
            "ingest.ok",
            "input accepted",
            json!({
                "input": request.input.display().to_string(),
                "language_code": language_code,
            }),
        );

        let timeout = crate::backend::backend_timeout(request.timeout_ms);
        let result = self.run_stages(
            request,
            language_code,
            &scratch,
            timeout,
            &mut recorder,
            &mut warnings,
        );

        let (final_audio_path, subtitle_path, sha256, partition) = match result {
            Ok(parts) => parts,
            Err(err) => {
                recorder.push(
                    PipelineStage::Report,
                    "run.error",
                    &err.to_string(),
                    json!({ "error_code": err.error_code() }),
                );
                let report = RunReport {
                    run_id,
                    started_at_rfc3339: started_at,
                    finished_at_rfc3339: Utc::now().to_rfc3339(),
                    input_path: request.input.display().to_string(),
                    language_code: language_code.to_owned(),
                    final_audio_path: String::new(),
                    subtitle_path: None,
                    final_track_sha256: None,
                    speaker_count: 0,
                    speech_segments: 0,
                    pause_segments: 0,
                    events: recorder.events,
                    warnings,
                };
                let _ = persist_report(&scratch, &report);
                return Err(err);
            }
        };

        let speech_segments = partition
            .segments
            .iter()
            .filter(|s| !s.kind.is_pause())
            .count();
        let pause_segments = partition.segments.len() - speech_segments;

        let report = RunReport {
            run_id: run_id.clone(),
            started_at_rfc3339: started_at,
            finished_at_rfc3339: Utc::now().to_rfc3339(),
            input_path: request.input.display().to_string(),
            language_code: language_code.to_owned(),
            final_audio_path: final_audio_path.display().to_string(),
            subtitle_path: subtitle_path.map(|p| p.display().to_string()),
            final_track_sha256: sha256,
            speaker_count: partition.speakers().len(),
            speech_segments,
            pause_segments,
            events: recorder.events,
            warnings,
        };
        persist_report(&scratch, &report)?;

        if !request.keep_scratch {
            remove_segment_artifacts(&scratch);
        }

        tracing::info!(run_id, output = %final_audio_path.display(), "run finished");
        Ok(report)
    }

    #[allow(clippy::too_many_lines)]
    fn run_stages(
        &self,
        request: &DubRequest,
        language_code: &str,
        scratch: &Path,
        timeout: Duration,
        recorder: &mut EventRecorder,
        warnings: &mut Vec<String>,
    ) -> RdResult<(PathBuf, Option<PathBuf>, Option<String>, Partition)> {
        let extracted = audio::extract_audio(&request.input, scratch)?;
        recorder.push(
            PipelineStage::Extract,
            "extract.ok",
            "audio track extracted",
            json!({ "path": extracted.display().to_string() }),
        );

        let cleaned = audio::clean_audio(&extracted, scratch)?;
        recorder.push(
            PipelineStage::Clean,
            "clean.ok",
            "audio denoised",
            json!({ "path": cleaned.display().to_string() }),
        );

        let total_duration = audio::probe_duration_seconds(&cleaned).ok_or_else(|| {
            RdError::InvalidRequest(format!(
                "could not determine duration of {}",
                cleaned.display()
            ))
        })?;

        let detections = self.services.diarizer.diarize(&cleaned, scratch, timeout)?;
        recorder.push(
            PipelineStage::Diarize,
            "diarize.ok",
            "speaker detections received",
            json!({ "detections": detections.len(), "total_duration": total_duration }),
        );

        let raw_partition = build_partition(&detections, total_duration)?;
        let probe_dir = scratch.join("probe");
        fs::create_dir_all(&probe_dir)?;
        let probe = |start: f64, end: f64| -> Option<f64> {
            let window = probe_dir.join("pause_window.wav");
            audio::slice_segment(&cleaned, start, end - start, &window).ok()?;
            audio::mean_volume_db(&window)
        };
        let partition = refine_pauses(raw_partition, PauseGate::default(), Some(&probe))?;
        let turns = build_turns(&detections)?;
        persist_partition(scratch, &partition, &turns)?;
        recorder.push(
            PipelineStage::Partition,
            "partition.ok",
            "timeline partitioned",
            json!({
                "segments": partition.segments.len(),
                "speakers": partition.speakers(),
            }),
        );

        let mut outputs: Vec<OutputSegment> = Vec::new();
        let mut subtitle_lines: Vec<(TimeInterval, String)> = Vec::new();

        for (index, segment) in partition.segments.iter().enumerate() {
            self.checkpoint()?;

            let interval = segment.interval;
            match &segment.kind {
                SegmentKind::Pause => {
                    let path = scratch.join(format!(
                        "pause_{}_{}.wav",
                        interval.start_ms(),
                        interval.end_ms()
                    ));
                    audio::silence_wav(interval.duration(), &path)?;
                    outputs.push(OutputSegment {
                        start_ms: interval.start_ms(),
                        path,
                    });
                }
                SegmentKind::Speech { speaker_id } => {
                    let produced = self.process_speech_segment(
                        request,
                        language_code,
                        scratch,
                        &cleaned,
                        speaker_id,
                        interval,
                        timeout,
                        recorder,
                        warnings,
                        &mut subtitle_lines,
                    )?;
                    outputs.push(produced);
                }
            }
            tracing::debug!(index, total = partition.segments.len(), "segment done");
        }

        // Reassembly: ascending original position, stable on ties.
        outputs.sort_by_key(|segment| segment.start_ms);
        let paths: Vec<PathBuf> = outputs.iter().map(|s| s.path.clone()).collect();
        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        audio::concat_wavs(&paths, scratch, &request.output_path)?;
        let sha256 = hash_file(&request.output_path).ok();
        recorder.push(
            PipelineStage::Assemble,
            "assemble.ok",
            "final track written",
            json!({
                "path": request.output_path.display().to_string(),
                "segments": paths.len(),
            }),
        );

        let subtitle_path = if request.emit_subtitles {
            let path = request
                .subtitle_path
                .clone()
                .unwrap_or_else(|| request.output_path.with_extension("srt"));
            let srt = build_subtitles(&subtitle_lines, request.max_words_per_line);
            fs::write(&path, srt)?;
            recorder.push(
                PipelineStage::Subtitle,
                "subtitle.ok",
                "subtitles written",
                json!({ "path": path.display().to_string() }),
            );
            Some(path)
        } else {
            None
        };

        Ok((request.output_path.clone(), subtitle_path, sha256, partition))
    }

    #[allow(clippy::too_many_arguments)]
    fn process_speech_segment(
        &self,
        request: &DubRequest,
        language_code: &str,
        scratch: &Path,
        cleaned: &Path,
        speaker_id: &str,
        interval: TimeInterval,
        timeout: Duration,
        recorder: &mut EventRecorder,
        warnings: &mut Vec<String>,
        subtitle_lines: &mut Vec<(TimeInterval, String)>,
    ) -> RdResult<OutputSegment> {
        let slot_tag = format!("{}_{}_{}", speaker_id, interval.start_ms(), interval.end_ms());
        let seg_dir = scratch.join(format!("seg_{}", interval.start_ms()));
        fs::create_dir_all(&seg_dir)?;

        let clip = scratch.join(format!("{slot_tag}.wav"));
        audio::slice_segment(cleaned, interval.start, interval.duration(), &clip)?;

        let transcript = self
            .services
            .transcriber
            .transcribe(&clip, &seg_dir, timeout)?;
        recorder.push(
            PipelineStage::Transcribe,
            "transcribe.ok",
            "segment transcribed",
            json!({ "slot": slot_tag, "words": transcript.words.len() }),
        );

        // Nothing was said in this slot; hold it open with silence instead of
        // synthesizing an empty sentence.
        if transcript.text.trim().is_empty() {
            warnings.push(format!("slot {slot_tag}: empty transcript, emitting silence"));
            let path = seg_dir.join("empty_slot.wav");
            audio::silence_wav(interval.duration(), &path)?;
            return Ok(OutputSegment {
                start_ms: interval.start_ms(),
                path,
            });
        }

        let analysis =
            self.services
                .analyzer
                .analyze(&transcript.text, language_code, &seg_dir, timeout)?;
        recorder.push(
            PipelineStage::Analyze,
            "analyze.ok",
            "segment analyzed",
            json!({
                "slot": slot_tag,
                "sentiment": analysis.sentiment,
                "emotion": analysis.emotion,
            }),
        );

        let source_units: Vec<String> =
            transcript.words.iter().map(|w| w.word.clone()).collect();
        let alignment = align_words(
            &source_units,
            &analysis.translated_text,
            AlignerConfig {
                similarity_threshold: request.similarity_threshold,
                max_span_len: request.max_span_len,
            },
            self.services.embedder.as_ref(),
        )?;
        recorder.push(
            PipelineStage::Align,
            "align.ok",
            "words aligned",
            json!({ "slot": slot_tag, "alignments": alignment.len() }),
        );

        let features = match self.services.features.extract(&clip, &seg_dir, timeout) {
            Ok(features) => features,
            Err(err) => {
                // Feature misses degrade to neutral prosody, never abort.
                warnings.push(format!("slot {slot_tag}: feature extraction failed: {err}"));
                Vec::new()
            }
        };
        let targets: Vec<ProsodyTarget> =
            map_prosody_default(&alignment, &features, &analysis.translated_text);
        recorder.push(
            PipelineStage::Prosody,
            "prosody.ok",
            "prosody mapped",
            json!({ "slot": slot_tag, "targets": targets.len() }),
        );

        let spec = SynthesisSpec {
            text: analysis.translated_text.clone(),
            language_code: language_code.to_owned(),
            sentiment: analysis.sentiment.clone(),
            emotion: analysis.emotion.clone(),
            speaker_id: speaker_id.to_owned(),
            approx_secs: interval.duration(),
            targets,
        };
        let synthesized = self.services.synthesizer.synthesize(&spec, &seg_dir, timeout)?;
        recorder.push(
            PipelineStage::Synthesize,
            "synthesize.ok",
            "segment synthesized",
            json!({ "slot": slot_tag, "path": synthesized.display().to_string() }),
        );

        let fitted = seg_dir.join("fitted.wav");
        let final_clip = reconcile_segment(&synthesized, interval.duration(), &fitted)?;
        recorder.push(
            PipelineStage::Reconcile,
            "reconcile.ok",
            "segment fitted to slot",
            json!({
                "slot": slot_tag,
                "compressed": final_clip == fitted,
            }),
        );

        subtitle_lines.push((interval, analysis.translated_text));
        Ok(OutputSegment {
            start_ms: interval.start_ms(),
            path: final_clip,
        })
    }

    fn checkpoint(&self) -> RdResult<()> {
        if let Some(flag) = &self.shutdown {
            if flag.load(Ordering::SeqCst) {
                return Err(RdError::Cancelled(
                    "shutdown requested; stopping at segment boundary".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

fn persist_partition(
    scratch: &Path,
    partition: &Partition,
    turns: &[SpeakerTurn],
) -> RdResult<()> {
    let payload = json!({
        "total_duration": partition.total_duration,
        "segments": partition.segments,
        "speaker_turns": turns,
        "speaker_durations": partition
            .speaker_durations()
            .into_iter()
            .map(|(speaker, secs)| json!({ "speaker": speaker, "seconds": secs }))
            .collect::<Vec<_>>(),
    });
    fs::write(
        scratch.join("speaker_partition.json"),
        serde_json::to_vec_pretty(&payload)?,
    )?;
    Ok(())
}

fn persist_report(scratch: &Path, report: &RunReport) -> RdResult<()> {
    fs::write(
        scratch.join("run_report.json"),
        serde_json::to_vec_pretty(report)?,
    )?;
    Ok(())
}

fn hash_file(path: &Path) -> RdResult<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Drops everything in the scratch dir except the replay/inspection JSON
/// artifacts. Best effort; a failed unlink is not worth failing the run.
fn remove_segment_artifacts(scratch: &Path) {
    let Ok(entries) = fs::read_dir(scratch) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let keep = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".json"));
        if keep {
            continue;
        }
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = result {
            tracing::warn!(path = %path.display(), error = %err, "scratch cleanup failed");
        }
    }
}
