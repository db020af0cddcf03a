use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RdError, RdResult};
use crate::model::WordFeature;
use crate::process::run_command_with_timeout;
use crate::prosody::parse_feature_table;

use super::{python_bin, script_available, script_path, FeatureExtractor};

const SCRIPT_ENV: &str = "REDUB_PROSODY_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/prosody_features.py";

/// Per-word pitch and loudness measurement through the praat helper script.
/// Malformed feature entries in the output are skipped, not fatal.
pub struct ProsodyFeatureBackend;

impl FeatureExtractor for ProsodyFeatureBackend {
    fn name(&self) -> &'static str {
        "prosody-features"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn extract(
        &self,
        audio: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<Vec<WordFeature>> {
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "prosody script missing at {}",
                script.display()
            )));
        }

        let output = work_dir.join("features.json");
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
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
        Ok(parse_feature_table(&raw))
    }
}
