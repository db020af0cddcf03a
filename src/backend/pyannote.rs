use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RdError, RdResult};
use crate::model::SpeakerDetection;
use crate::process::run_command_with_timeout;

use super::{python_bin, script_available, script_path, Diarizer};

const SCRIPT_ENV: &str = "REDUB_PYANNOTE_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/pyannote_diarize.py";

/// Speaker diarization through the pyannote helper script. The script reads
/// one audio path and writes a JSON array of `{start, end, speaker}` tuples.
pub struct PyannoteBackend;

impl Diarizer for PyannoteBackend {
    fn name(&self) -> &'static str {
        "pyannote"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn diarize(
        &self,
        audio: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<Vec<SpeakerDetection>> {
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "pyannote script missing at {}",
                script.display()
            )));
        }

        let output = work_dir.join("detections.json");
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
        parse_detections(&fs::read_to_string(&output)?)
    }
}

fn parse_detections(raw: &str) -> RdResult<Vec<SpeakerDetection>> {
    let detections: Vec<SpeakerDetection> = serde_json::from_str(raw)?;
    Ok(detections)
}
