use crate::error::RdResult;
use crate::model::{
    Partition, PartitionSegment, SegmentKind, SpeakerDetection, SpeakerTurn, TimeInterval,
};

/// Pause refinement policy: a candidate pause must be at least this long and
/// quieter than this ceiling to stand on its own.
#[derive(Debug, Clone, Copy)]
pub struct PauseGate {
    pub min_pause_secs: f64,
    pub silence_ceiling_db: f64,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self {
            min_pause_secs: 0.3,
            silence_ceiling_db: -35.0,
        }
    }
}

/// Groups detections by speaker label without merging; each detection keeps
/// its own sub-interval, ordered by start. Turn order follows first
/// appearance in time.
pub fn build_turns(detections: &[SpeakerDetection]) -> RdResult<Vec<SpeakerTurn>> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut turns: Vec<SpeakerTurn> = Vec::new();
    for detection in &sorted {
        let interval = TimeInterval::new(detection.start, detection.end)?;
        match turns.iter_mut().find(|t| t.speaker_id == detection.speaker) {
            Some(turn) => turn.segments.push(interval),
            None => turns.push(SpeakerTurn {
                speaker_id: detection.speaker.clone(),
                segments: vec![interval],
            }),
        }
    }
    Ok(turns)
}

/// Builds the full partition of `[0, total_duration)` from raw detections:
/// speech segments in global time order, pauses filling every gap, a trailing
/// pause up to the total duration. Zero-length gaps produce no pause.
///
/// Cross-speaker overlaps are clipped against the running `prev_end` so the
/// no-overlap invariant holds; a detection fully shadowed by earlier speech
/// contributes no segment of its own.
pub fn build_partition(
    detections: &[SpeakerDetection],
    total_duration: f64,
) -> RdResult<Partition> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut segments: Vec<PartitionSegment> = Vec::new();
    let mut prev_end = 0.0_f64;

    for detection in &sorted {
        TimeInterval::new(detection.start, detection.end)?;
        let start = detection.start.max(prev_end);
        let end = detection.end.min(total_duration);
        if end <= start {
            prev_end = prev_end.max(detection.end.min(total_duration));
            continue;
        }

        if start > prev_end {
            segments.push(PartitionSegment {
                kind: SegmentKind::Pause,
                interval: TimeInterval::new(prev_end, start)?,
            });
        }

        segments.push(PartitionSegment {
            kind: SegmentKind::Speech {
                speaker_id: detection.speaker.clone(),
            },
            interval: TimeInterval::new(start, end)?,
        });
        prev_end = end;
    }

    if prev_end < total_duration {
        segments.push(PartitionSegment {
            kind: SegmentKind::Pause,
            interval: TimeInterval::new(prev_end, total_duration)?,
        });
    }

    let partition = Partition {
        total_duration,
        segments,
    };
    partition.validate()?;
    Ok(partition)
}

/// Applies the hybrid pause gate. A candidate pause failing the minimum
/// duration or the measured-energy check is absorbed into the preceding
/// speech segment (or the following one at the head of the timeline), never
/// dropped: dropping would break the coverage invariant. Accepted pauses are
/// never merged with each other.
///
/// `probe` measures mean loudness in dBFS over a window of the source track;
/// `None` (probe unsupplied or measurement failed) skips the energy check.
pub fn refine_pauses(
    partition: Partition,
    gate: PauseGate,
    probe: Option<&dyn Fn(f64, f64) -> Option<f64>>,
) -> RdResult<Partition> {
    let total_duration = partition.total_duration;
    let mut refined: Vec<PartitionSegment> = Vec::new();
    let mut head_pause_rejected = false;

    for segment in partition.segments {
        let keep = match &segment.kind {
            SegmentKind::Speech { .. } => true,
            SegmentKind::Pause => pause_stands(&segment, gate, probe),
        };

        if keep {
            refined.push(segment);
            continue;
        }

        tracing::debug!(
            start = segment.interval.start,
            end = segment.interval.end,
            "absorbing rejected pause into a neighboring segment"
        );
        match refined.last_mut() {
            Some(prev) => {
                prev.interval = TimeInterval::new(prev.interval.start, segment.interval.end)?;
            }
            // Head-of-timeline pause: nothing precedes, so the segment that
            // follows grows backwards over it after the walk.
            None => {
                head_pause_rejected = true;
                refined.push(segment);
            }
        }
    }

    if head_pause_rejected && refined.len() >= 2 {
        let start = refined[0].interval.start;
        refined.remove(0);
        refined[0].interval = TimeInterval::new(start, refined[0].interval.end)?;
    }

    let partition = Partition {
        total_duration,
        segments: refined,
    };
    partition.validate()?;
    Ok(partition)
}

fn pause_stands(
    segment: &PartitionSegment,
    gate: PauseGate,
    probe: Option<&dyn Fn(f64, f64) -> Option<f64>>,
) -> bool {
    if segment.interval.duration() < gate.min_pause_secs {
        return false;
    }
    if let Some(probe) = probe {
        if let Some(db) = probe(segment.interval.start, segment.interval.end) {
            return db < gate.silence_ceiling_db;
        }
    }
    true
}
