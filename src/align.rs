use crate::backend::Embedder;
use crate::error::RdResult;
use crate::model::{AlignmentSet, WordAlignment, DEFAULT_MAX_SPAN_LEN, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Debug, Clone, Copy)]
pub struct AlignerConfig {
    pub similarity_threshold: f32,
    pub max_span_len: usize,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_span_len: DEFAULT_MAX_SPAN_LEN,
        }
    }
}

/// Aligns each source unit to the best non-overlapping span of target
/// tokens, greedily in source order with no backtracking.
///
/// Candidate spans are enumerated shortest first, then by ascending start,
/// and only a strictly better cosine score displaces the current best, so
/// ties resolve to the first-encountered candidate and reruns on identical
/// inputs are byte-identical. A unit whose best score is below the
/// threshold produces no record.
///
/// Source units and target tokens each go to the embedder as one batch
/// (external embedders pay a model load per call). If the source batch
/// fails, units are retried one at a time so a single bad unit degrades to
/// a skip instead of losing the whole segment's alignments.
pub fn align_words(
    source_units: &[String],
    target_sentence: &str,
    config: AlignerConfig,
    embedder: &dyn Embedder,
) -> RdResult<AlignmentSet> {
    let target_tokens: Vec<String> = target_sentence
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    if source_units.is_empty() || target_tokens.is_empty() {
        return Ok(AlignmentSet::default());
    }

    let target_embeddings = match embedder.embed(&target_tokens) {
        Ok(embeddings) => embeddings,
        Err(err) => {
            tracing::warn!(error = %err, "target embedding failed; emitting no alignments");
            return Ok(AlignmentSet::default());
        }
    };

    let unit_embeddings = embed_source_units(source_units, embedder);

    let mut consumed = vec![false; target_tokens.len()];
    let mut alignments: Vec<WordAlignment> = Vec::new();

    for (unit, unit_embedding) in source_units.iter().zip(unit_embeddings) {
        let Some(unit_embedding) = unit_embedding else {
            continue;
        };

        let mut best: Option<(usize, usize, f32)> = None;
        for span_len in 1..=config.max_span_len.min(target_tokens.len()) {
            for start in 0..=target_tokens.len() - span_len {
                let end = start + span_len;
                if consumed[start..end].iter().any(|used| *used) {
                    continue;
                }
                let span_embedding = mean_embedding(&target_embeddings[start..end]);
                let score = cosine_similarity(&unit_embedding, &span_embedding);
                if best.is_none_or(|(_, _, prev)| score > prev) {
                    best = Some((start, end, score));
                }
            }
        }

        let Some((start, end, score)) = best else {
            continue;
        };
        if score < config.similarity_threshold {
            continue;
        }

        for used in &mut consumed[start..end] {
            *used = true;
        }
        alignments.push(WordAlignment {
            source: unit.clone(),
            target_tokens: target_tokens[start..end].to_vec(),
            target_start: start,
            target_end: end,
            similarity: score,
        });
    }

    Ok(AlignmentSet { alignments })
}

/// One embedding per source unit, `None` where embedding failed. The whole
/// batch goes out in a single call; a batch failure falls back to per-unit
/// calls so only the offending units are skipped.
fn embed_source_units(source_units: &[String], embedder: &dyn Embedder) -> Vec<Option<Vec<f32>>> {
    match embedder.embed(source_units) {
        Ok(embeddings) if embeddings.len() == source_units.len() => {
            embeddings.into_iter().map(Some).collect()
        }
        Ok(embeddings) => {
            tracing::warn!(
                expected = source_units.len(),
                got = embeddings.len(),
                "embedder returned wrong batch size for source units; skipping all"
            );
            vec![None; source_units.len()]
        }
        Err(err) => {
            tracing::warn!(error = %err, "batch source embedding failed; retrying per unit");
            source_units
                .iter()
                .map(|unit| match embedder.embed(std::slice::from_ref(unit)) {
                    Ok(mut embeddings) if !embeddings.is_empty() => Some(embeddings.remove(0)),
                    Ok(_) => {
                        tracing::warn!(unit, "embedder returned nothing for unit; skipping");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(unit, error = %err, "unit embedding failed; skipping");
                        None
                    }
                })
                .collect()
        }
    }
}

fn mean_embedding(embeddings: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0_f32; first.len()];
    for embedding in embeddings {
        for (slot, value) in mean.iter_mut().zip(embedding) {
            *slot += value;
        }
    }
    let count = embeddings.len() as f32;
    for slot in &mut mean {
        *slot /= count;
    }
    mean
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
