//! Decode backends.
//!
//! Both backends drive the system `ffmpeg` binary, but with different
//! strategies. [`StreamBackend`] is the primary: one persistent child
//! process emits raw RGBA frames over a pipe, which makes sequential
//! decode frame-accurate and cheap. It requires a complete probe
//! (dimensions, frame rate, duration). [`ExtractBackend`] is the
//! fallback: one invocation per frame with an input-side seek. Slower,
//! but it accepts containers the streaming probe rejects (unknown
//! durations, odd frame-rate metadata) by defaulting what it cannot
//! measure.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::OnceLock;

use dashmap::DashMap;
use tracing::{debug, warn};

use strata_core::{EngineError, EngineResult, Surface};

/// Maximum video dimension on either axis (8K).
pub const MAX_VIDEO_DIMENSION: u32 = 8192;
/// Maximum source file size (4 GiB).
pub const MAX_VIDEO_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Which decode strategy a source ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Persistent streaming pipe decoder (primary).
    Stream,
    /// Per-frame extraction decoder (fallback).
    Extract,
}

/// Probed stream properties shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration: f64,
    pub total_frames: i32,
    pub has_alpha: bool,
}

/// A decode strategy bound to one open source.
pub trait DecodeBackend: Send {
    fn kind(&self) -> BackendKind;
    fn info(&self) -> &StreamInfo;
    /// Decode the next frame as an RGBA surface. Ok(None) signals end
    /// of stream.
    fn decode_next(&mut self) -> EngineResult<Option<Surface>>;
    /// Reposition the decode cursor. The next `decode_next` yields the
    /// frame at (or just before) this time.
    fn seek_to_time(&mut self, seconds: f64) -> EngineResult<()>;
}

/// Whether `ffmpeg` is runnable on this system.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Raw ffprobe results; fields the container did not report stay None.
#[derive(Debug, Clone)]
struct ProbeInfo {
    width: u32,
    height: u32,
    frame_rate: Option<f64>,
    duration: Option<f64>,
    nb_frames: Option<i64>,
    pix_fmt: Option<String>,
}

fn probe_cache() -> &'static DashMap<PathBuf, ProbeInfo> {
    static CACHE: OnceLock<DashMap<PathBuf, ProbeInfo>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Reject traversal attempts, missing files and oversized sources
/// before any decoder touches them.
fn validate_source(path: &Path) -> EngineResult<()> {
    if path.to_string_lossy().contains("..") {
        return Err(EngineError::InvalidArgument(format!(
            "path traversal rejected: {}",
            path.display()
        )));
    }
    let meta = std::fs::metadata(path)
        .map_err(|e| EngineError::asset(format!("video file inaccessible: {}", e), path))?;
    if meta.len() > MAX_VIDEO_FILE_SIZE {
        return Err(EngineError::asset(
            format!("video file exceeds the {} byte limit", MAX_VIDEO_FILE_SIZE),
            path,
        ));
    }
    Ok(())
}

/// Run ffprobe and parse out the first video stream's properties.
fn probe(path: &Path) -> EngineResult<ProbeInfo> {
    if let Some(cached) = probe_cache().get(path) {
        return Ok(cached.value().clone());
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| EngineError::Decode(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(EngineError::Decode(format!(
            "ffprobe rejected {}",
            path.display()
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| EngineError::Decode(format!("failed to parse ffprobe output: {}", e)))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| EngineError::Decode("no streams found in source".into()))?;
    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| EngineError::Decode("no video stream found".into()))?;

    let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
    let height = video_stream["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 || width > MAX_VIDEO_DIMENSION || height > MAX_VIDEO_DIMENSION {
        return Err(EngineError::Decode(format!(
            "video dimensions {}x{} out of range",
            width, height
        )));
    }

    let frame_rate = video_stream["r_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .or_else(|| {
            video_stream["avg_frame_rate"]
                .as_str()
                .and_then(parse_frame_rate)
        });

    let duration = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .filter(|d| *d > 0.0);

    let nb_frames = video_stream["nb_frames"]
        .as_str()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n > 0);

    let info = ProbeInfo {
        width,
        height,
        frame_rate,
        duration,
        nb_frames,
        pix_fmt: video_stream["pix_fmt"].as_str().map(str::to_string),
    };
    probe_cache().insert(path.to_path_buf(), info.clone());
    Ok(info)
}

/// Parse a frame rate fraction like "30/1" or "24000/1001".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        rate.parse().ok()?
    };
    (value > 0.0 && value.is_finite()).then_some(value)
}

/// Pixel formats that carry a real alpha channel.
fn pix_fmt_has_alpha(pix_fmt: Option<&str>) -> bool {
    let Some(fmt) = pix_fmt else {
        return false;
    };
    const ALPHA_PREFIXES: &[&str] = &["rgba", "bgra", "argb", "abgr", "yuva", "gbrap", "ya"];
    ALPHA_PREFIXES.iter().any(|p| fmt.starts_with(p))
}

fn spawn_stream_process(path: &Path, seek_seconds: f64) -> EngineResult<Child> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-v").arg("error");
    if seek_seconds > 0.0 {
        cmd.arg("-ss").arg(format!("{:.6}", seek_seconds));
    }
    cmd.arg("-i")
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    cmd.spawn()
        .map_err(|e| EngineError::Decode(format!("failed to spawn ffmpeg: {}", e)))
}

/// Primary backend: persistent streaming decode over a pipe.
pub struct StreamBackend {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    stdout: ChildStdout,
    end_of_stream: bool,
}

impl StreamBackend {
    pub fn open(path: &Path) -> EngineResult<Self> {
        validate_source(path)?;
        let probe = probe(path)?;

        // Streaming decode paces itself off the container timeline, so
        // a partial probe is a rejection here, not a default.
        let frame_rate = probe.frame_rate.ok_or_else(|| {
            EngineError::Decode("stream backend requires a probed frame rate".into())
        })?;
        let duration = probe
            .duration
            .ok_or_else(|| EngineError::Decode("stream backend requires a probed duration".into()))?;
        let total_frames = probe
            .nb_frames
            .unwrap_or((duration * frame_rate).round() as i64)
            .clamp(0, i32::MAX as i64) as i32;
        if total_frames == 0 {
            return Err(EngineError::Decode("source reports zero frames".into()));
        }

        let mut child = spawn_stream_process(path, 0.0)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Decode("ffmpeg stdout unavailable".into()))?;

        debug!(
            path = %path.display(),
            width = probe.width,
            height = probe.height,
            frame_rate,
            "stream backend opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info: StreamInfo {
                width: probe.width,
                height: probe.height,
                frame_rate,
                duration,
                total_frames,
                has_alpha: pix_fmt_has_alpha(probe.pix_fmt.as_deref()),
            },
            child,
            stdout,
            end_of_stream: false,
        })
    }

    fn frame_byte_size(&self) -> usize {
        (self.info.width as usize) * (self.info.height as usize) * 4
    }

    fn respawn(&mut self, seek_seconds: f64) -> EngineResult<()> {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let mut child = spawn_stream_process(&self.path, seek_seconds)?;
        self.stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Decode("ffmpeg stdout unavailable".into()))?;
        self.child = child;
        self.end_of_stream = false;
        Ok(())
    }
}

impl DecodeBackend for StreamBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn decode_next(&mut self) -> EngineResult<Option<Surface>> {
        if self.end_of_stream {
            return Ok(None);
        }

        let mut surface = Surface::new(self.info.width, self.info.height);
        debug_assert_eq!(surface.data.len(), self.frame_byte_size());

        match self.stdout.read_exact(&mut surface.data) {
            Ok(()) => Ok(Some(surface)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.end_of_stream = true;
                let _ = self.child.wait();
                Ok(None)
            }
            Err(e) => Err(EngineError::Decode(format!("stream read failed: {}", e))),
        }
    }

    fn seek_to_time(&mut self, seconds: f64) -> EngineResult<()> {
        self.respawn(seconds.max(0.0))
    }
}

impl Drop for StreamBackend {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Fallback backend: one ffmpeg run per frame with an input seek.
pub struct ExtractBackend {
    path: PathBuf,
    info: StreamInfo,
    /// Next frame index the cursor will decode.
    cursor: i64,
    end_of_stream: bool,
}

impl ExtractBackend {
    pub fn open(path: &Path) -> EngineResult<Self> {
        validate_source(path)?;
        let probe = probe(path)?;

        // Tolerate partial probes: default the frame rate, derive what
        // can be derived, and let end-of-stream discovery happen at
        // decode time.
        let frame_rate = probe.frame_rate.unwrap_or(25.0);
        let duration = probe.duration.unwrap_or(0.0);
        let total_frames = probe
            .nb_frames
            .unwrap_or((duration * frame_rate).round() as i64)
            .clamp(0, i32::MAX as i64) as i32;

        debug!(
            path = %path.display(),
            width = probe.width,
            height = probe.height,
            frame_rate,
            "extract backend opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info: StreamInfo {
                width: probe.width,
                height: probe.height,
                frame_rate,
                duration,
                total_frames,
                has_alpha: pix_fmt_has_alpha(probe.pix_fmt.as_deref()),
            },
            cursor: 0,
            end_of_stream: false,
        })
    }

    fn extract_at(&self, seconds: f64) -> EngineResult<Option<Surface>> {
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.6}", seconds.max(0.0)))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| EngineError::Decode(format!("failed to run ffmpeg: {}", e)))?;

        let expected = (self.info.width as usize) * (self.info.height as usize) * 4;
        if !output.status.success() || output.stdout.len() < expected {
            // Past the end of the container, or a frame the codec
            // could not deliver: both read as end of stream.
            return Ok(None);
        }

        let mut surface = Surface::new(self.info.width, self.info.height);
        surface.data.copy_from_slice(&output.stdout[..expected]);
        Ok(Some(surface))
    }
}

impl DecodeBackend for ExtractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Extract
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn decode_next(&mut self) -> EngineResult<Option<Surface>> {
        if self.end_of_stream {
            return Ok(None);
        }
        if self.info.total_frames > 0 && self.cursor >= self.info.total_frames as i64 {
            self.end_of_stream = true;
            return Ok(None);
        }

        let seconds = self.cursor as f64 / self.info.frame_rate;
        match self.extract_at(seconds)? {
            Some(surface) => {
                self.cursor += 1;
                Ok(Some(surface))
            }
            None => {
                self.end_of_stream = true;
                Ok(None)
            }
        }
    }

    fn seek_to_time(&mut self, seconds: f64) -> EngineResult<()> {
        self.cursor = (seconds.max(0.0) * self.info.frame_rate).round() as i64;
        self.end_of_stream = false;
        Ok(())
    }
}

/// One deferred backend-open attempt.
pub(crate) type OpenAttempt = Box<dyn FnOnce() -> EngineResult<Box<dyn DecodeBackend>>>;

/// Run the open attempts in order and return the first backend that
/// accepts the source, remembering which strategy it was. Later
/// attempts only run when earlier ones reject.
pub(crate) fn open_first_available(
    attempts: Vec<(BackendKind, OpenAttempt)>,
) -> EngineResult<(Box<dyn DecodeBackend>, BackendKind)> {
    let mut errors = Vec::new();
    for (kind, attempt) in attempts {
        match attempt() {
            Ok(backend) => return Ok((backend, kind)),
            Err(e) => {
                warn!(?kind, "decode backend rejected source: {e}");
                errors.push(format!("{:?}: {}", kind, e));
            }
        }
    }
    Err(EngineError::Decode(format!(
        "no decode backend accepted the source ({})",
        errors.join("; ")
    )))
}
