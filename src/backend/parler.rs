use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RdError, RdResult};
use crate::process::run_command_with_timeout;

use super::{python_bin, script_available, script_path, SynthesisSpec, Synthesizer};

const SCRIPT_ENV: &str = "REDUB_PARLER_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/parler_synthesize.py";

/// Speech synthesis through the Parler helper script. The whole
/// [`SynthesisSpec`] is serialized as the request file; the script is
/// expected to write the WAV named in `--output`. A run that exits cleanly
/// but leaves no WAV is a missing-artifact failure, fatal for the pipeline.
pub struct ParlerBackend;

impl Synthesizer for ParlerBackend {
    fn name(&self) -> &'static str {
        "parler"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn synthesize(
        &self,
        spec: &SynthesisSpec,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<PathBuf> {
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "parler script missing at {}",
                script.display()
            )));
        }

        let request_path = work_dir.join("synthesis_request.json");
        let output = work_dir.join("synthesized.wav");
        fs::write(&request_path, serde_json::to_vec_pretty(spec)?)?;

        let args = vec![
            script.display().to_string(),
            "--request".to_owned(),
            request_path.display().to_string(),
            "--output".to_owned(),
            output.display().to_string(),
        ];
        run_command_with_timeout(&python_bin(), &args, Some(work_dir), Some(timeout))?;

        if !output.exists() {
            return Err(RdError::MissingArtifact(output));
        }
        Ok(output)
    }
}
