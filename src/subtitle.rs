use crate::model::TimeInterval;

/// One subtitle block on the original timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Chunks one translated sentence into word groups of at most `max_words`,
/// distributing the segment's original time budget proportionally by word
/// count. The final chunk is snapped to the segment's end so rounding drift
/// never leaks past the segment boundary.
#[must_use]
pub fn chunk_sentence(
    translated: &str,
    interval: TimeInterval,
    max_words: usize,
) -> Vec<SubtitleCue> {
    let words: Vec<&str> = translated.split_whitespace().collect();
    if words.is_empty() || max_words == 0 {
        return Vec::new();
    }

    let chunks: Vec<&[&str]> = words.chunks(max_words).collect();
    let total_words = words.len() as f64;
    let budget = interval.duration();

    let mut cues = Vec::with_capacity(chunks.len());
    let mut cursor = interval.start;
    for (index, chunk) in chunks.iter().enumerate() {
        let is_last = index == chunks.len() - 1;
        let end = if is_last {
            interval.end
        } else {
            cursor + budget * chunk.len() as f64 / total_words
        };
        cues.push(SubtitleCue {
            start_secs: cursor,
            end_secs: end,
            text: chunk.join(" "),
        });
        cursor = end;
    }
    cues
}

/// Renders cues as sequential SRT blocks, indexed from 1.
#[must_use]
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (index, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(cue.start_secs),
            format_timestamp(cue.end_secs),
            cue.text
        ));
    }
    out
}

/// Builds the whole subtitle file for a run: one chunked cue list per speech
/// segment, ordered by segment start.
#[must_use]
pub fn build_subtitles(segments: &[(TimeInterval, String)], max_words: usize) -> String {
    let mut ordered: Vec<&(TimeInterval, String)> = segments.iter().collect();
    ordered.sort_by(|a, b| a.0.start.total_cmp(&b.0.start));

    let mut cues = Vec::new();
    for (interval, sentence) in ordered {
        cues.extend(chunk_sentence(sentence, *interval, max_words));
    }
    render_srt(&cues)
}

/// `HH:MM:SS,mmm`, hours unbounded by the 24h clock.
#[must_use]
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = crate::model::secs_to_ms(secs);
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let seconds = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02},{ms:03}")
}
