use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RdError, RdResult};
use crate::process::run_command_with_timeout;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Lowpass cutoff used after denoising, just under Nyquist for 16 kHz audio.
const LOWPASS_CUTOFF_HZ: u32 = 7_200;

pub fn check_input(path: &Path) -> RdResult<()> {
    if !path.exists() {
        return Err(RdError::InvalidRequest(format!(
            "input file does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(RdError::InvalidRequest(format!(
            "input path is not a file: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Demuxes the audio stream of any container into a 16 kHz mono PCM WAV.
/// Inputs without an audio stream fail with the ffmpeg error surfaced.
pub fn extract_audio(input: &Path, work_dir: &Path) -> RdResult<PathBuf> {
    let output = work_dir.join("extracted_audio.wav");
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-vn".to_owned(),
        "-ar".to_owned(),
        TARGET_SAMPLE_RATE.to_string(),
        "-ac".to_owned(),
        "1".to_owned(),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(output)
}

/// Spectral denoise plus lowpass, writing `cleaned_audio.wav` next to the
/// extracted track.
pub fn clean_audio(input: &Path, work_dir: &Path) -> RdResult<PathBuf> {
    let output = work_dir.join("cleaned_audio.wav");
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-af".to_owned(),
        format!("afftdn,lowpass=f={LOWPASS_CUTOFF_HZ}"),
        "-ar".to_owned(),
        TARGET_SAMPLE_RATE.to_string(),
        "-ac".to_owned(),
        "1".to_owned(),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(output)
}

/// Cuts `[start, start + duration)` seconds out of the cleaned track into its
/// own WAV at `output`.
pub fn slice_segment(input: &Path, start: f64, duration: f64, output: &Path) -> RdResult<()> {
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-ss".to_owned(),
        format!("{start:.3}"),
        "-t".to_owned(),
        format!("{duration:.3}"),
        "-i".to_owned(),
        input.display().to_string(),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(())
}

/// Generates a silent WAV of the given duration (pause slots in the output
/// timeline).
pub fn silence_wav(duration: f64, output: &Path) -> RdResult<()> {
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "lavfi".to_owned(),
        "-i".to_owned(),
        format!("anullsrc=r={TARGET_SAMPLE_RATE}:cl=mono"),
        "-t".to_owned(),
        format!("{duration:.3}"),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(())
}

/// Compresses a clip in time by `factor` (> 1.0) using resample-based
/// playback-rate adjustment. Pitch rises with the factor; there is no pitch
/// correction.
pub fn time_compress(input: &Path, factor: f64, output: &Path) -> RdResult<()> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(RdError::InvalidRequest(format!(
            "time compression factor must be positive and finite, got {factor}"
        )));
    }
    let rate = (f64::from(TARGET_SAMPLE_RATE) * factor).round() as u32;
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-af".to_owned(),
        format!("asetrate={rate},aresample={TARGET_SAMPLE_RATE}"),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(())
}

/// Concatenates WAVs in the given order with the concat demuxer. The caller
/// is responsible for ordering.
pub fn concat_wavs(inputs: &[PathBuf], work_dir: &Path, output: &Path) -> RdResult<()> {
    if inputs.is_empty() {
        return Err(RdError::InvalidRequest(
            "nothing to concatenate: no segments produced output".to_owned(),
        ));
    }

    let list_path = work_dir.join("concat_list.txt");
    let mut list = String::new();
    for input in inputs {
        let escaped = input.display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    fs::write(&list_path, list)?;

    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "concat".to_owned(),
        "-safe".to_owned(),
        "0".to_owned(),
        "-i".to_owned(),
        list_path.display().to_string(),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(())
}

pub fn probe_duration_seconds(input: &Path) -> Option<f64> {
    probe_duration_seconds_with_timeout(input, ffprobe_timeout())
}

pub fn probe_duration_seconds_with_timeout(input: &Path, timeout: Duration) -> Option<f64> {
    let args = vec![
        "-v".to_owned(),
        "error".to_owned(),
        "-show_entries".to_owned(),
        "format=duration".to_owned(),
        "-of".to_owned(),
        "default=nokey=1:noprint_wrappers=1".to_owned(),
        input.display().to_string(),
    ];

    let output = run_command_with_timeout("ffprobe", &args, None, Some(timeout)).ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let secs = stdout.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs)
}

/// Mean loudness of a clip in dBFS via the `volumedetect` filter. `None`
/// when ffmpeg fails or the stats line is absent.
pub fn mean_volume_db(input: &Path) -> Option<f64> {
    let args = vec![
        "-hide_banner".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-af".to_owned(),
        "volumedetect".to_owned(),
        "-f".to_owned(),
        "null".to_owned(),
        "-".to_owned(),
    ];
    let output = run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout())).ok()?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    parse_mean_volume(&stderr)
}

fn parse_mean_volume(stderr: &str) -> Option<f64> {
    for line in stderr.lines() {
        if let Some(rest) = line.split("mean_volume:").nth(1) {
            let value = rest.trim().trim_end_matches("dB").trim();
            if let Ok(db) = value.parse::<f64>() {
                if db.is_finite() {
                    return Some(db);
                }
            }
        }
    }
    None
}

fn ffmpeg_timeout() -> Duration {
    duration_from_env("REDUB_FFMPEG_TIMEOUT_MS", Duration::from_secs(180))
}

fn ffprobe_timeout() -> Duration {
    duration_from_env("REDUB_FFPROBE_TIMEOUT_MS", Duration::from_secs(10))
}

pub(crate) fn duration_from_env(key: &str, fallback: Duration) -> Duration {
    let Some(raw) = std::env::var(key).ok() else {
        return fallback;
    };
    let Ok(parsed) = raw.parse::<u64>() else {
        return fallback;
    };
    Duration::from_millis(parsed)
}
