use super::MICROS_PER_SEC;
use anyhow::anyhow;
use ez_ffmpeg::{FfmpegContext, Input, Output};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

const MICROS_PER_MIN: f64 = 60.0 * MICROS_PER_SEC;
const MILLIS_PER_MIN: f64 = 60_000.0;
const MICROS_PER_MILLI: i64 = 1_000;

#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("start_min and end_min must be numbers")]
    NotFinite,

    #[error("start_min and end_min cannot be negative")]
    Negative,

    #[error("Start time must be before end time (start {start_min} min, end {end_min} min)")]
    Empty { start_min: f64, end_min: f64 },
}

/// A validated sub-range of a clip, in microseconds on whole-millisecond boundaries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrimRange {
    start_us: i64,
    end_us: i64,
}

impl TrimRange {
    /// Build the effective range from request offsets in minutes.
    ///
    /// Offsets are rounded to the millisecond. `end_min` past the end of the
    /// clip is clamped to `duration_secs`. A range that is empty or inverted
    /// after clamping is rejected.
    pub fn resolve(start_min: f64, end_min: f64, duration_secs: f64) -> Result<Self, RangeError> {
        if !start_min.is_finite() || !end_min.is_finite() {
            return Err(RangeError::NotFinite);
        }
        if start_min < 0.0 || end_min < 0.0 {
            return Err(RangeError::Negative);
        }

        let start_ms = (start_min * MILLIS_PER_MIN).round() as i64;
        let requested_end_ms = (end_min * MILLIS_PER_MIN).round() as i64;
        let duration_ms = (duration_secs.max(0.0) * 1_000.0).round() as i64;

        let start_us = start_ms * MICROS_PER_MILLI;
        let end_us = requested_end_ms.min(duration_ms) * MICROS_PER_MILLI;

        if start_us >= end_us {
            return Err(RangeError::Empty {
                start_min,
                end_min: end_us as f64 / MICROS_PER_MIN,
            });
        }

        Ok(Self { start_us, end_us })
    }

    pub fn start_us(&self) -> i64 {
        self.start_us
    }

    pub fn end_us(&self) -> i64 {
        self.end_us
    }

    pub fn len_us(&self) -> i64 {
        self.end_us - self.start_us
    }

    pub fn start_min(&self) -> f64 {
        self.start_us as f64 / MICROS_PER_MIN
    }

    pub fn end_min(&self) -> f64 {
        self.end_us as f64 / MICROS_PER_MIN
    }
}

/// Output name for a trim of `id` over `range`; the same inputs always map to the same file.
pub fn trimmed_filename(id: &str, range: &TrimRange) -> String {
    format!(
        "{id}_{}_{}.mp4",
        range.start_us() / MICROS_PER_MILLI,
        range.end_us() / MICROS_PER_MILLI
    )
}

/// Private in-progress sibling of `output`, distinct for every call
fn unique_part_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    output.with_file_name(name)
}

#[derive(Clone, Debug)]
pub struct Codecs {
    pub video: String,
    pub audio: String,
}

/// Re-encode `range` of `input` into `output` as MP4.
///
/// Output goes to a `.part` sibling unique to this call and is renamed
/// when FFmpeg finishes. Concurrent trims to the same name never share
/// a partial file, and a failed trim never leaves a playable-looking one.
pub fn trim(input: &Path, output: &Path, range: &TrimRange, codecs: &Codecs) -> anyhow::Result<()> {
    let input_str = input
        .to_str()
        .ok_or_else(|| anyhow!("Input path is not valid UTF-8: {}", input.display()))?;
    let part_path = unique_part_path(output);
    let part_str = part_path
        .to_str()
        .ok_or_else(|| anyhow!("Output path is not valid UTF-8: {}", output.display()))?;

    debug!(
        ?input,
        ?output,
        start_us = range.start_us(),
        end_us = range.end_us(),
        video_codec = %codecs.video,
        audio_codec = %codecs.audio,
        "Trimming clip"
    );

    let input = Input::from(input_str)
        .set_start_time_us(range.start_us())
        .set_recording_time_us(range.len_us());
    let output_spec = Output::from(part_str)
        .set_format("mp4")
        .set_video_codec(codecs.video.as_str())
        .set_audio_codec(codecs.audio.as_str());

    let result = FfmpegContext::builder()
        .input(input)
        .output(output_spec)
        .build()
        .and_then(|context| context.start())
        .and_then(|scheduler| scheduler.wait())
        .map_err(anyhow::Error::from)
        .and_then(|()| Ok(std::fs::rename(&part_path, output)?));

    match result {
        Ok(()) => {
            info!(?output, "Trim completed");
            Ok(())
        }
        Err(error) => {
            error!(?error, ?output, "Trim failed");
            _ = std::fs::remove_file(&part_path);
            Err(error)
        }
    }
}
