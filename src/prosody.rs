use std::collections::HashMap;

use serde_json::Value;

use crate::model::{AlignmentSet, ProsodyTarget, WordFeature, DEFAULT_STRESS_DURATION_SECS};

/// Lowercases and strips non-alphanumeric edges for lookup. The original
/// token is preserved for synthesis; only the key is normalized.
#[must_use]
pub fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Parses a per-word feature table out of collaborator JSON, one entry per
/// element. Malformed entries are skipped with a warning; the rest of the
/// batch still parses.
#[must_use]
pub fn parse_feature_table(raw: &Value) -> Vec<WordFeature> {
    let Some(entries) = raw.as_array() else {
        tracing::warn!("feature table is not an array; treating as empty");
        return Vec::new();
    };

    let mut features = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<WordFeature>(entry.clone()) {
            Ok(feature) if feature.start.is_finite() && feature.end.is_finite() => {
                features.push(feature);
            }
            Ok(_) => {
                tracing::warn!(index, "skipping feature entry with non-finite timing");
            }
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed feature entry");
            }
        }
    }
    features
}

/// Maps source-word acoustic features onto the translated sentence through
/// the alignment set. Every whitespace-delimited target word yields exactly
/// one [`ProsodyTarget`], in order; lookup misses get the neutral default.
#[must_use]
pub fn map_prosody(
    alignments: &AlignmentSet,
    features: &[WordFeature],
    translated_sentence: &str,
    stress_duration_threshold: f64,
) -> Vec<ProsodyTarget> {
    // target token -> source word; every token of a multi-token span maps to
    // the span's source unit, first mapping wins.
    let mut token_to_source: HashMap<String, &str> = HashMap::new();
    for alignment in &alignments.alignments {
        for token in &alignment.target_tokens {
            token_to_source
                .entry(normalize_word(token))
                .or_insert(alignment.source.as_str());
        }
    }

    let mut feature_by_word: HashMap<String, &WordFeature> = HashMap::new();
    for feature in features {
        feature_by_word
            .entry(normalize_word(&feature.word))
            .or_insert(feature);
    }

    translated_sentence
        .split_whitespace()
        .map(|token| {
            let key = normalize_word(token);
            let feature = token_to_source
                .get(&key)
                .and_then(|source| feature_by_word.get(&normalize_word(source)));
            match feature {
                Some(feature) => ProsodyTarget {
                    text: token.to_owned(),
                    pitch_shift: feature.pitch_shift,
                    gain: feature.loudness_shift,
                    speed: 1.0,
                    stress: feature.end - feature.start > stress_duration_threshold,
                },
                None => ProsodyTarget::neutral(token.to_owned()),
            }
        })
        .collect()
}

/// [`map_prosody`] with the default stress threshold.
#[must_use]
pub fn map_prosody_default(
    alignments: &AlignmentSet,
    features: &[WordFeature],
    translated_sentence: &str,
) -> Vec<ProsodyTarget> {
    map_prosody(
        alignments,
        features,
        translated_sentence,
        DEFAULT_STRESS_DURATION_SECS,
    )
}
