//! ffmpeg-backed frame source and sink.
//!
//! Both sides exchange packed `rgb24` frames with an ffmpeg child process
//! over a pipe. Stream properties come from `ffprobe`.

use std::collections::HashMap;
use std::fmt;
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::str::FromStr;
use std::thread::JoinHandle;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use steadyframe_common::error::{StabError, StabResult};
use steadyframe_model::{FrameSize, Rotation};

use crate::media::{apply_rotation, FrameSink, FrameSource, VideoInfo};

/// Check whether a binary is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[derive(Debug, Deserialize)]
struct StreamListing {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<StreamSideData>,
}

#[derive(Debug, Deserialize)]
struct StreamSideData {
    rotation: Option<f64>,
}

impl StreamEntry {
    /// Clockwise degrees needed to display the stream upright.
    ///
    /// The legacy `rotate` tag is clockwise; the display matrix rotation is
    /// counter-clockwise.
    fn rotation_degrees(&self) -> i64 {
        if let Some(tag) = self.tags.get("rotate").and_then(|v| v.trim().parse::<i64>().ok()) {
            return tag;
        }
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .map(|ccw| -(ccw.round() as i64))
            .unwrap_or(0)
    }
}

/// Decoded (pre-rotation) size plus the reported stream properties.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub decoded_size: FrameSize,
    pub info: VideoInfo,
}

/// Turn `ffprobe -of json` output into stream properties.
pub fn parse_stream_metadata(json: &str) -> StabResult<VideoMetadata> {
    let output: StreamListing = serde_json::from_str(json)?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| StabError::input("no video stream found"))?;

    let decoded_size = FrameSize::new(stream.width.unwrap_or(0), stream.height.unwrap_or(0));
    if decoded_size.validate().is_err() {
        return Err(StabError::input(format!(
            "video stream has no usable dimensions ({decoded_size})"
        )));
    }

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_frame_rate(rate))
        .ok_or_else(|| StabError::input("video stream has no usable frame rate"))?;

    let rotation = Rotation::from_degrees(stream.rotation_degrees());
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok());

    Ok(VideoMetadata {
        decoded_size,
        info: VideoInfo {
            size: decoded_size.rotated(rotation),
            fps,
            frame_count,
            rotation,
        },
    })
}

/// Read the properties of the first video stream of a media file.
pub fn read_video_metadata(path: &Path) -> StabResult<VideoMetadata> {
    if !path.exists() {
        return Err(StabError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames:stream_tags=rotate:stream_side_data=rotation",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| StabError::media(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(StabError::media(format!(
            "ffprobe failed on {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let meta = parse_stream_metadata(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(
        path = %path.display(),
        size = %meta.info.size,
        fps = meta.info.fps,
        rotation = meta.info.rotation.degrees(),
        frames = ?meta.info.frame_count,
        "Read video metadata"
    );
    Ok(meta)
}

/// Drain a child's stderr on a thread so a full pipe never blocks it.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    }))
}

fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    task.map(|t| {
        t.join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
    })
    .unwrap_or_default()
}

/// Decodes a video file through `ffmpeg` into rgb24 frames.
///
/// Autorotation is disabled and the reported rotation is applied here, so
/// [`VideoInfo::size`] is the post-rotation size.
pub struct FfmpegSource {
    path: PathBuf,
    decoded_size: FrameSize,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
    frames_read: u64,
}

impl FfmpegSource {
    pub fn open(path: impl Into<PathBuf>) -> StabResult<Self> {
        let path = path.into();
        let meta = read_video_metadata(&path)?;
        let mut source = Self {
            path,
            decoded_size: meta.decoded_size,
            info: meta.info,
            child: None,
            stdout: None,
            stderr_task: None,
            frames_read: 0,
        };
        source.spawn()?;
        Ok(source)
    }

    fn spawn(&mut self) -> StabResult<()> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(&self.path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StabError::media(format!("Failed to start ffmpeg decoder: {e}")))?;

        tracing::debug!(pid = child.id(), path = %self.path.display(), "ffmpeg decoder started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StabError::media("Failed to capture ffmpeg stdout"))?;
        self.stderr_task = drain_stderr(&mut child);
        self.stdout = Some(BufReader::new(stdout));
        self.child = Some(child);
        self.frames_read = 0;
        Ok(())
    }

    /// Reap the decoder. A failed exit before any frame was read is an error.
    fn finish_decoder(&mut self) -> StabResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| StabError::media(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take());

        if !status.success() && self.frames_read == 0 {
            return Err(StabError::media(format!(
                "ffmpeg failed to decode {} (status {}): {}",
                self.path.display(),
                status,
                stderr.trim()
            )));
        }
        if !status.success() {
            tracing::warn!(
                status = %status,
                frames = self.frames_read,
                stderr = stderr.trim(),
                "ffmpeg decoder exited early"
            );
        }
        Ok(())
    }

    fn kill(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = join_stderr(self.stderr_task.take());
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> StabResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buffer = vec![0u8; self.decoded_size.byte_len(3)];
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::UnexpectedEof => {
                self.finish_decoder()?;
                return Ok(None);
            }
            Err(e) => {
                return Err(StabError::media(format!(
                    "Failed reading frame {} from ffmpeg: {e}",
                    self.frames_read
                )))
            }
        }

        let frame = RgbImage::from_raw(self.decoded_size.width, self.decoded_size.height, buffer)
            .ok_or_else(|| StabError::media("decoded frame has the wrong length"))?;
        self.frames_read += 1;
        Ok(Some(apply_rotation(frame, self.info.rotation)))
    }

    fn rewind(&mut self) -> StabResult<()> {
        self.kill();
        self.spawn()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Video codec for the encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    #[default]
    H264,
    H265,
    Mjpeg,
}

impl OutputCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputCodec::H264 => "h264",
            OutputCodec::H265 => "h265",
            OutputCodec::Mjpeg => "mjpeg",
        }
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputCodec {
    type Err = StabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "x264" | "avc" => Ok(OutputCodec::H264),
            "h265" | "x265" | "hevc" => Ok(OutputCodec::H265),
            "mjpeg" | "mjpg" => Ok(OutputCodec::Mjpeg),
            other => Err(StabError::config(format!(
                "unknown codec `{other}` (expected h264, h265, or mjpeg)"
            ))),
        }
    }
}

/// Encoder settings for [`FfmpegSink`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub codec: OutputCodec,
    /// Constant rate factor for h264/h265. Lower is better quality.
    pub crf: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: OutputCodec::H264,
            crf: 20,
        }
    }
}

fn codec_args(options: &EncodeOptions) -> Vec<String> {
    let crf = options.crf.min(51).to_string();
    // yuv420p needs even dimensions
    let even = "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string();
    match options.codec {
        OutputCodec::H264 => vec![
            "-vf".to_string(),
            even,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            crf,
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ],
        OutputCodec::H265 => vec![
            "-vf".to_string(),
            even,
            "-c:v".to_string(),
            "libx265".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            crf,
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-tag:v".to_string(),
            "hvc1".to_string(),
        ],
        OutputCodec::Mjpeg => vec![
            "-c:v".to_string(),
            "mjpeg".to_string(),
            "-q:v".to_string(),
            "3".to_string(),
            "-pix_fmt".to_string(),
            "yuvj420p".to_string(),
        ],
    }
}

/// Full ffmpeg argument list for encoding raw rgb24 frames from stdin.
pub fn encoder_args(output: &Path, size: FrameSize, fps: f64, options: &EncodeOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        size.to_string(),
        "-r".to_string(),
        format!("{fps}"),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
    ];
    args.extend(codec_args(options));
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Encodes rgb24 frames to a video file through `ffmpeg`.
pub struct FfmpegSink {
    output: PathBuf,
    size: FrameSize,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn create(
        output: impl Into<PathBuf>,
        size: FrameSize,
        fps: f64,
        options: EncodeOptions,
    ) -> StabResult<Self> {
        size.validate()?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(StabError::config(format!("output fps must be positive, got {fps}")));
        }
        let output = output.into();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = encoder_args(&output, size, fps, &options);
        tracing::debug!(args = ?args, "Running ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StabError::media(format!("Failed to start ffmpeg encoder: {e}")))?;

        tracing::info!(
            pid = child.id(),
            output = %output.display(),
            codec = %options.codec,
            size = %size,
            fps,
            "ffmpeg encoder started"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StabError::media("Failed to capture ffmpeg stdin"))?;
        let stderr_task = drain_stderr(&mut child);

        Ok(Self {
            output,
            size,
            child: Some(child),
            stdin: Some(BufWriter::new(stdin)),
            stderr_task,
            frames_written: 0,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> StabResult<()> {
        if frame.dimensions() != (self.size.width, self.size.height) {
            return Err(StabError::invariant(format!(
                "frame is {}x{}, encoder expects {}",
                frame.width(),
                frame.height(),
                self.size
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StabError::invariant("write after finish"))?;
        stdin.write_all(frame.as_raw()).map_err(|e| {
            StabError::media(format!(
                "Failed writing frame {} to ffmpeg: {e}",
                self.frames_written
            ))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> StabResult<()> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child
            .wait()
            .map_err(|e| StabError::media(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take());

        if !status.success() {
            return Err(StabError::media(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr.trim()
            )));
        }
        flushed.map_err(|e| StabError::media(format!("Failed flushing ffmpeg input: {e}")))?;

        tracing::info!(
            output = %self.output.display(),
            frames = self.frames_written,
            "ffmpeg encoder finished"
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            tracing::warn!(error = %err, "ffmpeg encoder did not finish cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.001);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_metadata_with_display_matrix() {
        let json = r#"{
            "streams": [{
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30/1",
                "r_frame_rate": "30/1",
                "nb_frames": "300",
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }]
        }"#;
        let meta = parse_stream_metadata(json).unwrap();
        assert_eq!(meta.decoded_size, FrameSize::new(1920, 1080));
        assert_eq!(meta.info.rotation, Rotation::Cw90);
        assert_eq!(meta.info.size, FrameSize::new(1080, 1920));
        assert_eq!(meta.info.frame_count, Some(300));
        assert_eq!(meta.info.fps, 30.0);
    }

    #[test]
    fn test_parse_metadata_with_rotate_tag() {
        let json = r#"{"streams": [{"width": 640, "height": 480, "avg_frame_rate": "0/0",
            "r_frame_rate": "25/1", "tags": {"rotate": "180"}}]}"#;
        let meta = parse_stream_metadata(json).unwrap();
        assert_eq!(meta.info.rotation, Rotation::Cw180);
        assert_eq!(meta.info.size, FrameSize::new(640, 480));
        assert_eq!(meta.info.fps, 25.0);
        assert_eq!(meta.info.frame_count, None);
    }

    #[test]
    fn test_parse_metadata_without_stream() {
        let err = parse_stream_metadata(r#"{"streams": []}"#).unwrap_err();
        assert!(matches!(err, StabError::Input { .. }));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_video_metadata(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, StabError::FileNotFound { .. }));
    }

    #[test]
    fn test_encoder_args_layout() {
        let args = encoder_args(
            Path::new("out.avi"),
            FrameSize::new(320, 240),
            29.97,
            &EncodeOptions {
                codec: OutputCodec::Mjpeg,
                crf: 20,
            },
        );
        let joined = args.join(" ");
        assert!(joined.contains("-s 320x240"));
        assert!(joined.contains("-r 29.97"));
        assert!(joined.contains("-c:v mjpeg"));
        assert_eq!(args.last().map(String::as_str), Some("out.avi"));
    }

    #[test]
    fn test_codec_parsing() {
        assert_eq!("HEVC".parse::<OutputCodec>().unwrap(), OutputCodec::H265);
        assert_eq!("mjpg".parse::<OutputCodec>().unwrap(), OutputCodec::Mjpeg);
        assert!("vp9".parse::<OutputCodec>().is_err());
    }
}
