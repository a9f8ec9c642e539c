//! ffmpeg argument lists for every request the compositors issue.
//!
//! Builders are pure so the exact requests can be inspected and tested
//! without an engine.

use clipweave_common::config::CompositionDefaults;

/// Encoder choices for generated clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub empty_color: String,
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from(&CompositionDefaults::default())
    }
}

impl From<&CompositionDefaults> for EncodeSettings {
    fn from(defaults: &CompositionDefaults) -> Self {
        Self {
            empty_color: defaults.empty_color.clone(),
            video_codec: defaults.video_codec.clone(),
            pixel_format: defaults.pixel_format.clone(),
            audio_codec: defaults.audio_codec.clone(),
        }
    }
}

/// Milliseconds as an ffmpeg duration in seconds (`1500` -> `"1.5"`).
pub fn secs_arg(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Solid-color clip of `duration_ms`.
pub fn color_clip(
    encode: &EncodeSettings,
    duration_ms: u64,
    width: u32,
    height: u32,
    output: &str,
) -> Vec<String> {
    let secs = secs_arg(duration_ms);
    let source = format!(
        "color=c={}:s={width}x{height}:d={secs}",
        encode.empty_color
    );
    owned(&[
        "-f", "lavfi", "-i", &source, "-c:v", &encode.video_codec, "-t", &secs, output,
    ])
}

/// Copy the video of `input` and add a silent audio stream.
pub fn attach_silent_audio(
    encode: &EncodeSettings,
    input: &str,
    duration_ms: u64,
    output: &str,
) -> Vec<String> {
    let secs = secs_arg(duration_ms);
    owned(&[
        "-i", input, "-f", "lavfi", "-i", "anullsrc", "-c:v", "copy", "-c:a", &encode.audio_codec,
        "-t", &secs, output,
    ])
}

/// Rescale a still to exactly `width x height` as a single JPEG frame.
pub fn scale_still(input: &str, width: u32, height: u32, output: &str) -> Vec<String> {
    let filter = format!("scale={width}:{height}");
    owned(&[
        "-i", input, "-vf", &filter, "-c:v", "mjpeg", "-pix_fmt", "yuvj420p", "-frames:v", "1",
        output,
    ])
}

/// Hold a still for `duration_ms` at `framerate`.
pub fn slideshow_clip(
    encode: &EncodeSettings,
    input: &str,
    duration_ms: u64,
    framerate: u32,
    output: &str,
) -> Vec<String> {
    let secs = secs_arg(duration_ms);
    let input_rate = format!("1/{secs}");
    let framerate = framerate.to_string();
    owned(&[
        "-loop", "1", "-framerate", &input_rate, "-i", input, "-c:v", &encode.video_codec,
        "-pix_fmt", &encode.pixel_format, "-r", &framerate, "-t", &secs, output,
    ])
}

/// Body of a concat demuxer list.
pub fn concat_list(files: &[String]) -> String {
    files
        .iter()
        .map(|name| format!("file {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join the clips named in `list` without re-encoding.
pub fn concat_clips(list: &str, total_ms: u64, framerate: u32, output: &str) -> Vec<String> {
    let secs = secs_arg(total_ms);
    let framerate = framerate.to_string();
    owned(&[
        "-f", "concat", "-safe", "0", "-i", list, "-c", "copy", "-r", &framerate, "-t", &secs,
        output,
    ])
}

/// Silent audio track of `duration_ms`.
pub fn silent_track(duration_ms: u64, output: &str) -> Vec<String> {
    let secs = secs_arg(duration_ms);
    owned(&["-f", "lavfi", "-i", "anullsrc", "-t", &secs, output])
}

/// Filter fragment trimming input `input_index` to `trim_ms` and delaying
/// both channels by `delay_ms`, labelled `[delayed<label_index>]`.
pub fn delay_trim_fragment(input_index: usize, trim_ms: u64, delay_ms: u64, label_index: usize) -> String {
    format!(
        "[{input_index}:a]atrim=0:{},adelay={delay_ms}|{delay_ms}[delayed{label_index}]",
        secs_arg(trim_ms)
    )
}

/// Fragment mixing the base track with `clip_count` delayed clips into `[a]`.
pub fn mix_fragment(clip_count: usize) -> String {
    let delayed: String = (0..clip_count).map(|i| format!("[delayed{i}]")).collect();
    format!(
        "[0:a]{delayed}amix=inputs={}:duration=longest[a]",
        clip_count + 1
    )
}

/// Mix `inputs` (base track first) through `filter` into `output`.
pub fn mix_tracks(inputs: &[String], filter: &str, total_ms: u64, output: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(inputs.len() * 2 + 7);
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.clone());
    }
    args.extend(owned(&[
        "-filter_complex",
        filter,
        "-map",
        "[a]",
        "-t",
        &secs_arg(total_ms),
        output,
    ]));
    args
}
