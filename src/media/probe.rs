use super::MICROS_PER_SEC;
use anyhow::anyhow;
use ffmpeg_next::{Rational, codec, format, media};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Metadata read once from an uploaded file
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoInfo {
    /// Seconds
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

fn is_rational_valid(r: Rational) -> bool {
    r.numerator() > 0 && r.denominator() > 0
}

fn rational_to_f64(r: Rational) -> f64 {
    f64::from(r.numerator()) / f64::from(r.denominator())
}

/// avg_frame_rate first, r_frame_rate as fallback
fn frame_rate(stream: &ffmpeg_next::Stream) -> Option<Rational> {
    let avg_fps = stream.avg_frame_rate();
    if is_rational_valid(avg_fps) {
        return Some(avg_fps);
    }

    let r_fps = stream.rate();
    debug!(
        "avg_frame_rate {}/{} invalid, trying r_frame_rate {}/{}",
        avg_fps.numerator(),
        avg_fps.denominator(),
        r_fps.numerator(),
        r_fps.denominator()
    );
    is_rational_valid(r_fps).then_some(r_fps)
}

/// Container duration, or the video stream's own when the container has none
fn duration_secs(container_us: i64, stream: &ffmpeg_next::Stream) -> Option<f64> {
    if container_us > 0 {
        return Some(container_us as f64 / MICROS_PER_SEC);
    }

    let time_base = stream.time_base();
    if stream.duration() > 0 && is_rational_valid(time_base) {
        return Some(stream.duration() as f64 * rational_to_f64(time_base));
    }

    None
}

/// Read duration, frame rate and resolution of the first video stream
pub fn probe(path: &Path) -> anyhow::Result<VideoInfo> {
    let input_context = format::input(path)?;
    let stream = input_context
        .streams()
        .best(media::Type::Video)
        .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;

    let fps = frame_rate(&stream)
        .map(rational_to_f64)
        .ok_or_else(|| anyhow!("Unable to determine a valid frame rate"))?;

    let decoder = codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;

    let duration = duration_secs(input_context.duration(), &stream)
        .ok_or_else(|| anyhow!("Unable to determine the clip duration"))?;

    let info = VideoInfo {
        duration,
        fps,
        width: decoder.width(),
        height: decoder.height(),
    };
    debug!(?path, ?info, "Probed video");

    Ok(info)
}
