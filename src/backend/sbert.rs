use std::fs;

use serde::Deserialize;
use serde_json::json;

use crate::error::{RdError, RdResult};
use crate::process::run_command_with_timeout;

use super::{python_bin, script_available, script_path, Embedder};

const SCRIPT_ENV: &str = "REDUB_SBERT_SCRIPT";
const SCRIPT_DEFAULT: &str = "scripts/sbert_embed.py";

/// Sentence embeddings through the sentence-transformers helper script. One
/// process launch per batch; callers batch target tokens in a single call to
/// amortize model load.
pub struct SbertBackend;

#[derive(Debug, Deserialize)]
struct EmbeddingsPayload {
    embeddings: Vec<Vec<f32>>,
}

impl Embedder for SbertBackend {
    fn name(&self) -> &'static str {
        "sbert"
    }

    fn is_available(&self) -> bool {
        script_available(SCRIPT_ENV, SCRIPT_DEFAULT)
    }

    fn embed(&self, texts: &[String]) -> RdResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let script = script_path(SCRIPT_ENV, SCRIPT_DEFAULT);
        if !script.exists() {
            return Err(RdError::BackendUnavailable(format!(
                "sbert script missing at {}",
                script.display()
            )));
        }

        let work_dir = tempfile::tempdir()?;
        let request_path = work_dir.path().join("embed_request.json");
        let output = work_dir.path().join("embeddings.json");
        fs::write(
            &request_path,
            serde_json::to_vec(&json!({ "texts": texts }))?,
        )?;

        let args = vec![
            script.display().to_string(),
            "--request".to_owned(),
            request_path.display().to_string(),
            "--output".to_owned(),
            output.display().to_string(),
        ];
        run_command_with_timeout(
            &python_bin(),
            &args,
            Some(work_dir.path()),
            Some(super::backend_timeout(None)),
        )?;

        if !output.exists() {
            return Err(RdError::MissingArtifact(output));
        }
        let parsed = parse_embeddings(&fs::read_to_string(&output)?)?;
        if parsed.len() != texts.len() {
            return Err(RdError::BackendUnavailable(format!(
                "sbert returned {} embeddings for {} texts",
                parsed.len(),
                texts.len()
            )));
        }
        Ok(parsed)
    }
}

fn parse_embeddings(raw: &str) -> RdResult<Vec<Vec<f32>>> {
    let payload: EmbeddingsPayload = serde_json::from_str(raw)?;
    Ok(payload.embeddings)
}
