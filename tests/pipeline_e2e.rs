//! End-to-end engine runs with deterministic stub services.
//!
//! The collaborator backends are replaced by the stubs in tests/helpers, but
//! ffmpeg still does the real audio work (extraction, slicing, silence,
//! concatenation), so every test here skips when it is not on PATH.

mod helpers;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::tempdir;

use helpers::{
    ffmpeg_available, make_input_wav, transcript_of, SilenceSynth, StubAnalyzer, StubDiarizer,
    StubFeatures, StubTranscriber, TableEmbedder,
};
use redub::backend::ServiceSet;
use redub::model::{
    DubRequest, RunReport, SpeakerDetection, Transcript, WordFeature, DEFAULT_MAX_SPAN_LEN,
    DEFAULT_MAX_WORDS_PER_LINE, DEFAULT_SIMILARITY_THRESHOLD,
};
use redub::{RdError, RedubEngine};

fn detections_two_speakers() -> Vec<SpeakerDetection> {
    vec![
        SpeakerDetection {
            start: 0.5,
            end: 2.5,
            speaker: "SPEAKER_00".to_owned(),
        },
        SpeakerDetection {
            start: 3.5,
            end: 5.5,
            speaker: "SPEAKER_01".to_owned(),
        },
    ]
}

fn stub_services(synth_scale: f64) -> ServiceSet {
    ServiceSet {
        diarizer: Box::new(StubDiarizer {
            detections: detections_two_speakers(),
        }),
        transcriber: Box::new(StubTranscriber {
            transcript: transcript_of(&[("hello", 0.2, 0.6), ("world", 0.7, 1.4)]),
        }),
        analyzer: Box::new(StubAnalyzer {
            translated_text: "namaste duniya".to_owned(),
        }),
        features: Box::new(StubFeatures {
            features: vec![
                WordFeature {
                    word: "hello".to_owned(),
                    pitch_shift: 2,
                    loudness_shift: 1.5,
                    start: 0.2,
                    end: 0.6,
                },
                WordFeature {
                    word: "world".to_owned(),
                    pitch_shift: -1,
                    loudness_shift: 0.5,
                    start: 0.7,
                    end: 1.4,
                },
            ],
            fail: false,
        }),
        embedder: Box::new(TableEmbedder::new(&[
            ("hello", &[1.0, 0.0]),
            ("world", &[0.0, 1.0]),
            ("namaste", &[1.0, 0.0]),
            ("duniya", &[0.0, 1.0]),
        ])),
        synthesizer: Box::new(SilenceSynth {
            scale: synth_scale,
            fail: false,
        }),
    }
}

fn request(input: PathBuf, dir: &Path) -> DubRequest {
    DubRequest {
        input,
        target_language: "hindi".to_owned(),
        output_path: dir.join("out").join("dubbed.wav"),
        emit_subtitles: false,
        subtitle_path: None,
        scratch_dir: Some(dir.join("scratch")),
        keep_scratch: false,
        timeout_ms: Some(30_000),
        similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        max_span_len: DEFAULT_MAX_SPAN_LEN,
        max_words_per_line: DEFAULT_MAX_WORDS_PER_LINE,
    }
}

fn event_codes(report: &RunReport) -> Vec<&str> {
    report.events.iter().map(|e| e.code.as_str()).collect()
}

#[test]
fn full_run_produces_report_and_track() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    let engine = RedubEngine::new(stub_services(0.5));
    let report = engine.run(&req).expect("run succeeds");

    assert_eq!(report.language_code, "hi");
    assert_eq!(report.speaker_count, 2);
    assert_eq!(report.speech_segments, 2);
    assert_eq!(report.pause_segments, 3);
    assert!(report.final_track_sha256.is_some());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert!(req.output_path.exists());
    let final_secs = redub::audio::probe_duration_seconds(&req.output_path).unwrap();
    assert!(final_secs > 0.0);

    // Event sequence numbers are strictly increasing and the stages appear
    // in pipeline order.
    let seqs: Vec<u64> = report.events.iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    let codes = event_codes(&report);
    assert_eq!(codes[0], "ingest.ok");
    let pos = |code: &str| codes.iter().position(|c| *c == code).unwrap();
    assert!(pos("extract.ok") < pos("clean.ok"));
    assert!(pos("clean.ok") < pos("diarize.ok"));
    assert!(pos("diarize.ok") < pos("partition.ok"));
    assert!(pos("partition.ok") < pos("assemble.ok"));
    assert_eq!(codes.iter().filter(|c| **c == "transcribe.ok").count(), 2);
    assert_eq!(codes.iter().filter(|c| **c == "synthesize.ok").count(), 2);
    assert_eq!(codes.iter().filter(|c| **c == "reconcile.ok").count(), 2);
}

#[test]
fn scratch_cleanup_keeps_json_artifacts() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    RedubEngine::new(stub_services(0.5))
        .run(&req)
        .expect("run succeeds");

    let scratch = req.scratch_dir.clone().unwrap();
    assert!(scratch.join("run_report.json").exists());
    assert!(scratch.join("speaker_partition.json").exists());
    for entry in fs::read_dir(&scratch).unwrap().flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        assert!(
            name.ends_with(".json"),
            "unexpected leftover in scratch: {name}"
        );
    }
}

#[test]
fn keep_scratch_retains_segment_audio() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let mut req = request(input, dir.path());
    req.keep_scratch = true;

    RedubEngine::new(stub_services(0.5))
        .run(&req)
        .expect("run succeeds");

    let scratch = req.scratch_dir.clone().unwrap();
    let has_wav = fs::read_dir(&scratch)
        .unwrap()
        .flatten()
        .any(|e| e.file_name().to_string_lossy().ends_with(".wav"));
    assert!(has_wav, "expected intermediate WAVs under scratch");
}

#[test]
fn long_synthesis_is_compressed_into_slot() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    // Synthesized clips run 1.5x the slot, so reconciliation must compress
    // each speech segment back to roughly its slot length.
    let report = RedubEngine::new(stub_services(1.5))
        .run(&req)
        .expect("run succeeds");
    let compressed: Vec<_> = report
        .events
        .iter()
        .filter(|e| e.code == "reconcile.ok")
        .map(|e| e.payload["compressed"].as_bool().unwrap())
        .collect();
    assert_eq!(compressed, vec![true, true]);

    let final_secs = redub::audio::probe_duration_seconds(&req.output_path).unwrap();
    assert!(
        (final_secs - 6.0).abs() < 0.25,
        "expected ~6s final track, got {final_secs}"
    );
}

#[test]
fn subtitles_are_written_alongside_output() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let mut req = request(input, dir.path());
    req.emit_subtitles = true;

    let report = RedubEngine::new(stub_services(0.5))
        .run(&req)
        .expect("run succeeds");

    let srt_path = report.subtitle_path.clone().expect("subtitle path set");
    let srt = fs::read_to_string(&srt_path).unwrap();
    assert!(srt.starts_with("1\n"));
    assert!(srt.contains("namaste duniya"));
    // First speech slot starts at 0.5s on the original timeline.
    assert!(srt.contains("00:00:00,500 --> "));
}

#[test]
fn empty_transcript_slot_degrades_to_silence() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    let mut services = stub_services(0.5);
    services.transcriber = Box::new(StubTranscriber {
        transcript: Transcript::default(),
    });
    let report = RedubEngine::new(services).run(&req).expect("run succeeds");

    assert_eq!(report.speech_segments, 2);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("empty transcript"));
    assert!(req.output_path.exists());
    // No synthesis happened for either slot.
    assert!(!event_codes(&report).contains(&"synthesize.ok"));
}

#[test]
fn feature_extraction_failure_is_nonfatal() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    let mut services = stub_services(0.5);
    services.features = Box::new(StubFeatures {
        features: Vec::new(),
        fail: true,
    });
    let report = RedubEngine::new(services).run(&req).expect("run succeeds");

    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("feature extraction failed"));
    assert!(req.output_path.exists());
}

#[test]
fn synthesizer_failure_aborts_and_persists_report() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    let mut services = stub_services(0.5);
    services.synthesizer = Box::new(SilenceSynth {
        scale: 1.0,
        fail: true,
    });
    let err = RedubEngine::new(services).run(&req).unwrap_err();
    assert!(matches!(err, RdError::BackendUnavailable(_)));

    let scratch = req.scratch_dir.clone().unwrap();
    let raw = fs::read_to_string(scratch.join("run_report.json")).unwrap();
    let report: RunReport = serde_json::from_str(&raw).unwrap();
    let error_event = report
        .events
        .iter()
        .find(|e| e.code == "run.error")
        .expect("error event recorded");
    assert_eq!(
        error_event.payload["error_code"].as_str(),
        Some("RD-BACKEND-UNAVAILABLE")
    );
    assert!(report.final_audio_path.is_empty());
}

#[test]
fn raised_shutdown_flag_cancels_at_segment_boundary() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempdir().unwrap();
    let input = make_input_wav(dir.path(), 6.0);
    let req = request(input, dir.path());

    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::SeqCst);
    let err = RedubEngine::new(stub_services(0.5))
        .with_shutdown_flag(Arc::clone(&flag))
        .run(&req)
        .unwrap_err();
    assert!(matches!(err, RdError::Cancelled(_)));
    assert!(!req.output_path.exists());
}
