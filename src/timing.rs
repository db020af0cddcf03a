use std::path::{Path, PathBuf};

use crate::audio;
use crate::error::{RdError, RdResult};

/// Uniform speed increase needed to fit a synthesized clip into its slot.
/// `None` means the clip already fits (or the slot is degenerate) and plays
/// untouched; short output is simply shorter than the slot.
#[must_use]
pub fn speed_factor(synthesized_secs: f64, slot_secs: f64) -> Option<f64> {
    if slot_secs > 0.0 && synthesized_secs > slot_secs {
        Some(synthesized_secs / slot_secs)
    } else {
        None
    }
}

/// Fits a synthesized clip to its original slot. Overlong clips are
/// time-compressed into `output`; fitting clips pass through untouched. A
/// missing synthesis artifact is fatal for the run.
pub fn reconcile_segment(
    synthesized: &Path,
    slot_secs: f64,
    output: &Path,
) -> RdResult<PathBuf> {
    if !synthesized.exists() {
        return Err(RdError::MissingArtifact(synthesized.to_path_buf()));
    }

    let synthesized_secs = audio::probe_duration_seconds(synthesized)
        .ok_or_else(|| RdError::MissingArtifact(synthesized.to_path_buf()))?;

    match speed_factor(synthesized_secs, slot_secs) {
        Some(factor) => {
            tracing::debug!(
                synthesized_secs,
                slot_secs,
                factor,
                "compressing synthesized clip to fit slot"
            );
            audio::time_compress(synthesized, factor, output)?;
            Ok(output.to_path_buf())
        }
        None => Ok(synthesized.to_path_buf()),
    }
}
