use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RdError, RdResult};
use crate::model::Transcript;
use crate::process::run_command_with_timeout;

use super::{python_bin, script_available, script_path, Transcriber};

const SCRIPT_ENV: &str = "REDUB_WHISPER_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/whisper_words.py";

/// Word-timestamped transcription through the whisper helper script. Output
/// JSON: `{"text": ..., "words": [{"word", "start", "end"}, ...]}`.
pub struct WhisperWordsBackend;

impl Transcriber for WhisperWordsBackend {
    fn name(&self) -> &'static str {
        "whisper-words"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn transcribe(
        &self,
        audio: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<Transcript> {
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "whisper script missing at {}",
                script.display()
            )));
        }

        let output = work_dir.join("transcript.json");
        let args = vec![
            script.display().to_string(),
            "--audio".to_owned(),
            audio.display().to_string(),
            "--output".to_owned(),
            output.display().to_string(),
        ];
        run_command_with_timeout(&python_bin(), &args, Some(work_dir), Some(timeout))?;

        if !output.exists() {
            return Err(RdError::MissingArtifact(output));
        }
        parse_transcript(&fs::read_to_string(&output)?)
    }
}

fn parse_transcript(raw: &str) -> RdResult<Transcript> {
    let transcript: Transcript = serde_json::from_str(raw)?;
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transcript_with_word_timestamps() {
        let raw = r#"{
            "text": "namaste duniya",
            "words": [
                {"word": "namaste", "start": 0.1, "end": 0.7},
                {"word": "duniya", "start": 0.8, "end": 1.3}
            ]
        }"#;
        let transcript = parse_transcript(raw).expect("parse");
        assert_eq!(transcript.text, "namaste duniya");
        assert_eq!(transcript.words.len(), 2);
        assert_eq!(transcript.words[1].word, "duniya");
        assert_eq!(transcript.words[1].end, 1.3);
    }

    #[test]
    fn empty_words_list_is_valid() {
        let transcript = parse_transcript(r#"{"text": "", "words": []}"#).expect("parse");
        assert!(transcript.text.is_empty());
        assert!(transcript.words.is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_transcript("null").is_err());
        assert!(parse_transcript(r#"{"words": "not a list"}"#).is_err());
    }

    #[test]
    fn missing_script_reports_unavailable() {
        std::env::set_var(SCRIPT_ENV, "/nonexistent/whisper_words.py");
        assert!(!WhisperWordsBackend.is_available());

        let dir = tempfile::tempdir().expect("tempdir");
        let err = WhisperWordsBackend
            .transcribe(Path::new("a.wav"), dir.path(), Duration::from_secs(1))
            .expect_err("should fail");
        assert!(matches!(err, RdError::BackendUnavailable(_)));
        std::env::remove_var(SCRIPT_ENV);
    }
}
