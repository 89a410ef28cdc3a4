//! Per-video decode pipeline and frame pacing.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use strata_core::{EngineResult, Surface};

use super::backend::{
    open_first_available, BackendKind, DecodeBackend, ExtractBackend, OpenAttempt, StreamBackend,
    StreamInfo,
};

/// One loaded video: its decode backend, pacing clock and the most
/// recently decoded frame.
///
/// Each source owns an independent virtual clock. Updates accumulate
/// elapsed wall time and decode one frame per elapsed frame interval
/// (several in one call when the caller stalled) so playback stays
/// frame-accurate under variable call cadence. Only the last decoded
/// frame is ever visible.
pub struct VideoSource {
    backend: Box<dyn DecodeBackend>,
    backend_kind: BackendKind,
    info: StreamInfo,
    playing: bool,
    looping: bool,
    alpha_passthrough: bool,
    end_of_stream: bool,
    current_frame: i32,
    current_time: f64,
    frame_duration: f64,
    accumulated: f64,
    last_tick: Instant,
    frame: Option<Surface>,
}

impl VideoSource {
    /// Open a source file: primary streaming backend first, the
    /// extraction fallback when it rejects.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let stream_path = path.to_path_buf();
        let extract_path = path.to_path_buf();
        let attempts: Vec<(BackendKind, OpenAttempt)> = vec![
            (
                BackendKind::Stream,
                Box::new(move || {
                    StreamBackend::open(&stream_path).map(|b| Box::new(b) as Box<dyn DecodeBackend>)
                }),
            ),
            (
                BackendKind::Extract,
                Box::new(move || {
                    ExtractBackend::open(&extract_path)
                        .map(|b| Box::new(b) as Box<dyn DecodeBackend>)
                }),
            ),
        ];

        let (backend, kind) = open_first_available(attempts)?;
        info!(
            path = %path.display(),
            backend = ?kind,
            width = backend.info().width,
            height = backend.info().height,
            frame_rate = backend.info().frame_rate,
            "video loaded"
        );
        Ok(Self::from_backend(backend, kind))
    }

    /// Wrap an already-open backend. Decodes the first frame so the
    /// video is visible before `play`, then auto-plays with looping on,
    /// the broadcast default.
    pub fn from_backend(backend: Box<dyn DecodeBackend>, kind: BackendKind) -> Self {
        let info = *backend.info();
        let frame_duration = if info.frame_rate > 0.0 {
            1.0 / info.frame_rate
        } else {
            0.04
        };

        let mut source = Self {
            backend,
            backend_kind: kind,
            info,
            playing: false,
            looping: true,
            alpha_passthrough: true,
            end_of_stream: false,
            current_frame: 0,
            current_time: 0.0,
            frame_duration,
            accumulated: 0.0,
            last_tick: Instant::now(),
            frame: None,
        };

        source.decode_one();
        source.current_frame = 0;
        source.current_time = 0.0;
        source.playing = true;
        source
    }

    /// Advance the clock by measured wall time and decode as many
    /// frames as fell due.
    pub fn update(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        self.advance(elapsed)
    }

    /// Advance the virtual clock by `elapsed` seconds. Returns whether
    /// any frame was decoded.
    pub fn advance(&mut self, elapsed: f64) -> bool {
        if !self.playing {
            return false;
        }

        self.accumulated += elapsed;
        if self.accumulated < self.frame_duration {
            return false;
        }

        let mut decoded = false;
        while self.accumulated >= self.frame_duration && !self.end_of_stream {
            self.accumulated -= self.frame_duration;

            match self.backend.decode_next() {
                Ok(Some(surface)) => {
                    self.store_frame(surface);
                    self.current_frame += 1;
                    self.current_time = if self.info.frame_rate > 0.0 {
                        self.current_frame as f64 / self.info.frame_rate
                    } else {
                        0.0
                    };
                    decoded = true;
                }
                Ok(None) => {
                    self.end_of_stream = true;
                    if self.looping {
                        self.seek_to_frame_internal(0);
                        self.playing = true;
                        self.end_of_stream = false;
                    } else {
                        self.playing = false;
                    }
                    break;
                }
                Err(e) => {
                    warn!("video decode failed: {e}");
                    break;
                }
            }
        }

        decoded
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.accumulated = 0.0;
        self.last_tick = Instant::now();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop playback and rewind to the first frame, which is decoded
    /// immediately so the visible frame resets too.
    pub fn stop(&mut self) {
        self.playing = false;
        self.seek_to_frame_internal(0);
    }

    /// Seek to a frame index, clamped to the valid range. Exactly one
    /// frame is decoded at the new position so the visible frame
    /// updates regardless of play state.
    pub fn seek_to_frame(&mut self, frame: i32) {
        self.seek_to_frame_internal(frame);
    }

    pub fn seek_to_time(&mut self, seconds: f64) {
        if self.info.frame_rate > 0.0 {
            self.seek_to_frame((seconds * self.info.frame_rate) as i32);
        }
    }

    fn seek_to_frame_internal(&mut self, frame: i32) {
        let max_frame = if self.info.total_frames > 0 {
            self.info.total_frames - 1
        } else {
            0
        };
        let frame = frame.clamp(0, max_frame);
        let target_time = if self.info.frame_rate > 0.0 {
            frame as f64 / self.info.frame_rate
        } else {
            0.0
        };

        if let Err(e) = self.backend.seek_to_time(target_time) {
            warn!("video seek failed: {e}");
            return;
        }
        self.end_of_stream = false;
        self.decode_one();
        self.current_frame = frame;
        self.current_time = target_time;
    }

    fn decode_one(&mut self) -> bool {
        match self.backend.decode_next() {
            Ok(Some(surface)) => {
                self.store_frame(surface);
                true
            }
            Ok(None) => {
                self.end_of_stream = true;
                false
            }
            Err(e) => {
                warn!("video decode failed: {e}");
                false
            }
        }
    }

    /// Keep the decoded frame, forcing alpha opaque when the source has
    /// no real alpha channel or passthrough is disabled.
    fn store_frame(&mut self, mut surface: Surface) {
        if !self.alpha_passthrough || !self.info.has_alpha {
            for px in surface.data.chunks_exact_mut(4) {
                px[3] = 0xFF;
            }
        }
        self.frame = Some(surface);
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_alpha(&mut self, passthrough: bool) {
        self.alpha_passthrough = passthrough;
    }

    /// The most recently decoded frame.
    pub fn frame(&self) -> Option<&Surface> {
        self.frame.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_frame(&self) -> i32 {
        self.current_frame
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_frames(&self) -> i32 {
        self.info.total_frames
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    pub fn duration(&self) -> f64 {
        self.info.duration
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }
}
