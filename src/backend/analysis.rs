use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::error::{RdError, RdResult};
use crate::model::TextAnalysis;
use crate::process::run_command_with_timeout;

use super::{python_bin, script_available, script_path, TextAnalyzer};

const SCRIPT_ENV: &str = "REDUB_ANALYSIS_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/text_analysis.py";

/// Combined translation, sentiment, and emotion analysis through one helper
/// script. The request is passed as a JSON file so segment text never needs
/// shell quoting.
pub struct AnalysisBackend;

impl TextAnalyzer for AnalysisBackend {
    fn name(&self) -> &'static str {
        "text-analysis"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn analyze(
        &self,
        text: &str,
        language_code: &str,
        work_dir: &Path,
        timeout: Duration,
    ) -> RdResult<TextAnalysis> {
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "analysis script missing at {}",
                script.display()
            )));
        }

        let request_path = work_dir.join("analysis_request.json");
        let output = work_dir.join("analysis.json");
        let request = json!({
            "text": text,
            "target_language": language_code,
        });
        fs::write(&request_path, serde_json::to_vec_pretty(&request)?)?;

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
        parse_analysis(&fs::read_to_string(&output)?)
    }
}

fn parse_analysis(raw: &str) -> RdResult<TextAnalysis> {
    let analysis: TextAnalysis = serde_json::from_str(raw)?;
    Ok(analysis)
}
