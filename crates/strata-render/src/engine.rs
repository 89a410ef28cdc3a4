//! The engine context: one long-lived object owning the layer table,
//! the compositor pipeline, the video registry, the frame publisher and
//! the share channels. Constructed once by the process; no file-scope
//! state.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use strata_core::{EngineConfig, InitStatus, Surface};
use strata_layers::{LayerKind, LayerRecord, LayerStore, MaskIndex, MaskMode};

use crate::dispatch::{RenderContext, RenderDispatcher};
use crate::masking::{ClipShape, MaskStrategy, MaskingEngine};
use crate::publisher::{FrameLease, FramePublisher};
use crate::raster::StencilMode;
use crate::share::{NullTransport, ShareInputs, ShareTransport, SharedTextureSink};
use crate::textures::TextureCache;
use crate::video::VideoManager;

/// Phases of the frame cycle.
///
/// `begin_frame` moves Idle to FrameBegun, `render` to Rendered,
/// `end_frame` (stats) to Presented, and `present` (share publish) back
/// to Idle. Out-of-order calls are soft failures: logged, nothing
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    FrameBegun,
    Rendered,
    Presented,
}

/// Reports whether the rendering device has been removed. The real
/// device lives outside the engine; the default probe never fails.
pub trait DeviceProbe: Send {
    fn is_removed(&self) -> bool;
}

struct AlwaysHealthy;

impl DeviceProbe for AlwaysHealthy {
    fn is_removed(&self) -> bool {
        false
    }
}

/// Default global-transport timeline length, frames.
const DEFAULT_TOTAL_FRAMES: i32 = 250;

pub struct Engine {
    initialized: bool,
    last_error: InitStatus,
    phase: RenderPhase,

    width: u32,
    height: u32,
    target_fps: f64,

    store: Mutex<LayerStore>,
    canvas: Surface,
    masking: MaskingEngine,
    dispatch: RenderDispatcher,
    textures: TextureCache,
    videos: VideoManager,
    publisher: Option<Arc<FramePublisher>>,

    transport: Box<dyn ShareTransport>,
    inputs: ShareInputs,
    output: Option<Box<dyn SharedTextureSink>>,

    device: Box<dyn DeviceProbe>,
    device_lost: bool,

    show_bounds: bool,
    edge_smoothing: f32,

    playing: bool,
    current_frame: i32,
    total_frames: i32,

    frame_number: i64,
    fps: f64,
    frame_time_ms: f64,
    dropped_frames: i32,
    last_frame_instant: Option<Instant>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            initialized: false,
            last_error: InitStatus::Ok,
            phase: RenderPhase::Idle,
            width: 0,
            height: 0,
            target_fps: 50.0,
            store: Mutex::new(LayerStore::new()),
            canvas: Surface::new(0, 0),
            masking: MaskingEngine::new(0, 0),
            dispatch: RenderDispatcher::new(),
            textures: TextureCache::new(),
            videos: VideoManager::new(),
            publisher: None,
            transport: Box::new(NullTransport),
            inputs: ShareInputs::new(),
            output: None,
            device: Box::new(AlwaysHealthy),
            device_lost: false,
            show_bounds: false,
            edge_smoothing: 0.0,
            playing: false,
            current_frame: 0,
            total_frames: DEFAULT_TOTAL_FRAMES,
            frame_number: 0,
            fps: 0.0,
            frame_time_ms: 0.0,
            dropped_frames: 0,
            last_frame_instant: None,
        }
    }

    /// Replace the texture-share transport. Takes effect for future
    /// connections; typically called before `initialize`.
    pub fn with_transport(mut self, transport: Box<dyn ShareTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the device probe; typically called before `initialize`.
    pub fn with_device_probe(mut self, probe: Box<dyn DeviceProbe>) -> Self {
        self.device = probe;
        self
    }

    /// Build an engine from a config file's settings. The engine still
    /// needs `initialize` with the configured dimensions.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut engine = Self::new();
        engine.edge_smoothing = config.quality.edge_smoothing;
        engine.show_bounds = config.quality.show_bounds;
        engine
    }

    // ---- Lifecycle -------------------------------------------------

    pub fn initialize(&mut self, width: u32, height: u32, target_fps: f64) -> InitStatus {
        if self.initialized {
            self.last_error = InitStatus::AlreadyInitialized;
            return InitStatus::AlreadyInitialized;
        }

        if self.device.is_removed() {
            self.last_error = InitStatus::DeviceCreateFailed;
            return InitStatus::DeviceCreateFailed;
        }

        if width == 0 || height == 0 || width > 16384 || height > 16384 {
            self.last_error = InitStatus::RenderTargetFailed;
            return InitStatus::RenderTargetFailed;
        }

        let publisher = match FramePublisher::new(width, height) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                warn!("frame buffer creation failed: {e}");
                self.last_error = InitStatus::FrameBufferFailed;
                return InitStatus::FrameBufferFailed;
            }
        };

        self.width = width;
        self.height = height;
        self.target_fps = if target_fps > 0.0 { target_fps } else { 50.0 };
        self.canvas = Surface::new(width, height);
        self.masking = MaskingEngine::new(width, height);
        self.publisher = Some(publisher);
        self.store.lock().clear();

        self.phase = RenderPhase::Idle;
        self.frame_number = 0;
        self.dropped_frames = 0;
        self.last_frame_instant = Some(Instant::now());
        self.initialized = true;
        self.last_error = InitStatus::Ok;
        info!(width, height, target_fps, "engine initialized");
        InitStatus::Ok
    }

    /// Tear down in fixed order: share output, videos, share inputs,
    /// cached textures and text caches, then the target surfaces.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.output = None;
        self.videos.shutdown();
        self.inputs.disconnect_all();
        self.textures.clear();
        self.dispatch.text_mut().rebuild();
        self.publisher = None;
        self.canvas = Surface::new(0, 0);
        self.masking = MaskingEngine::new(0, 0);
        self.store.lock().clear();
        self.device_lost = false;
        self.initialized = false;
        self.phase = RenderPhase::Idle;
        info!("engine shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_error(&self) -> InitStatus {
        self.last_error
    }

    // ---- Frame cycle -----------------------------------------------

    /// Start a frame: device check (sticky once lost), share-input
    /// refresh, video clock fan-out.
    pub fn begin_frame(&mut self) {
        if !self.initialized || self.device_lost {
            return;
        }
        if self.phase != RenderPhase::Idle && self.phase != RenderPhase::Presented {
            warn!(phase = ?self.phase, "begin_frame out of order, ignored");
            return;
        }

        if self.device.is_removed() {
            self.device_lost = true;
            warn!("render device removed; rendering disabled until reinitialization");
            return;
        }

        self.inputs.refresh_all();
        self.videos.update_all();
        self.phase = RenderPhase::FrameBegun;
    }

    /// Composite the snapshot and publish the finished frame.
    pub fn render(&mut self) {
        if !self.initialized || self.device_lost {
            return;
        }
        if self.phase != RenderPhase::FrameBegun {
            warn!(phase = ?self.phase, "render out of order, ignored");
            return;
        }

        // Copy the table under its lock; all raster work happens on the
        // snapshot with the lock released.
        let snapshot = self.store.lock().snapshot();
        let mask_index = MaskIndex::build(&snapshot);

        self.canvas.clear();

        let ctx = RenderContext {
            canvas_width: self.width as f32,
            canvas_height: self.height as f32,
            textures: &self.textures,
            videos: &self.videos,
            inputs: &self.inputs,
            edge_smoothing: self.edge_smoothing,
        };

        for layer in &snapshot {
            if !layer.active {
                continue;
            }

            match layer.kind {
                LayerKind::Group => continue,
                LayerKind::Mask => {
                    // Masks draw only as a debug preview.
                    if self.show_bounds {
                        RenderDispatcher::render_quad(
                            &mut self.canvas,
                            &ctx,
                            layer,
                            StencilMode::Disabled,
                        );
                        RenderDispatcher::render_bounds(&mut self.canvas, layer);
                    }
                    continue;
                }
                _ => {}
            }

            match mask_index.mask_for(layer.id).map(|i| &snapshot[i]) {
                Some(mask_layer) => match MaskingEngine::strategy_for(layer.kind) {
                    MaskStrategy::Geometry => {
                        let clip = ClipShape::from_mask_layer(mask_layer);
                        self.dispatch.render_text(
                            &mut self.canvas,
                            &ctx,
                            layer,
                            Some((&clip, mask_layer.mask.mode)),
                        );
                    }
                    MaskStrategy::Stencil => {
                        self.masking.stencil_mut().clear();
                        RenderDispatcher::render_mask_to_stencil(
                            &mut self.canvas,
                            &ctx,
                            mask_layer,
                            StencilMode::WriteMask(self.masking.stencil_mut()),
                        );
                        let pass_inside = mask_layer.mask.mode == MaskMode::Inner;
                        self.dispatch.render_layer(
                            &mut self.canvas,
                            &ctx,
                            layer,
                            StencilMode::Test {
                                plane: self.masking.stencil(),
                                pass_inside,
                            },
                        );
                    }
                },
                None => {
                    self.dispatch
                        .render_layer(&mut self.canvas, &ctx, layer, StencilMode::Disabled);
                }
            }

            if self.show_bounds {
                RenderDispatcher::render_bounds(&mut self.canvas, layer);
            }
        }

        if let Some(publisher) = &self.publisher {
            publisher.write(&self.canvas.data, self.canvas.stride(), self.frame_number);
        }
        self.phase = RenderPhase::Rendered;
    }

    /// Close the frame: fps/frame-time/dropped-frame stats and the
    /// frame-number advance.
    pub fn end_frame(&mut self) {
        if !self.initialized {
            return;
        }
        if self.phase != RenderPhase::Rendered {
            warn!(phase = ?self.phase, "end_frame out of order, ignored");
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.last_frame_instant {
            let elapsed = now.duration_since(last).as_secs_f64();
            self.record_frame_end(elapsed);
        }
        self.last_frame_instant = Some(now);
        self.frame_number += 1;
        self.phase = RenderPhase::Presented;
    }

    /// Publish through the share-output channel, if enabled.
    pub fn present(&mut self) {
        if !self.initialized || self.device_lost {
            return;
        }
        if self.phase != RenderPhase::Presented {
            warn!(phase = ?self.phase, "present out of order, ignored");
            return;
        }

        if let Some(output) = &mut self.output {
            output.publish(&self.canvas, self.frame_number);
        }
        self.phase = RenderPhase::Idle;
    }

    /// Fold one frame's elapsed time into the running stats. A frame
    /// counts as dropped only past a 1.5x tolerance of the target
    /// interval; then every whole missed interval counts.
    fn record_frame_end(&mut self, elapsed: f64) {
        self.frame_time_ms = elapsed * 1000.0;
        self.fps = if elapsed > 1e-6 { 1.0 / elapsed } else { 0.0 };

        let target_interval = 1.0 / self.target_fps;
        if elapsed > target_interval * 1.5 {
            let dropped = (elapsed / target_interval) as i32 - 1;
            if dropped > 0 {
                self.dropped_frames += dropped;
            }
        }
    }

    // ---- Layer table -----------------------------------------------

    pub fn set_layer_count(&self, count: i32) {
        self.store.lock().set_count(count);
    }

    pub fn update_layer(&self, index: i32, record: &LayerRecord) {
        self.store.lock().update(index, record);
    }

    pub fn layer(&self, index: i32) -> Option<LayerRecord> {
        self.store.lock().get(index)
    }

    pub fn clear_layers(&self) {
        self.store.lock().clear();
    }

    // ---- Frame buffer ----------------------------------------------

    /// Lock the published frame for reading. While the lease is held,
    /// writes drop after their bounded wait instead of blocking.
    pub fn lock_frame_buffer(&self) -> Option<FrameLease<'_>> {
        self.publisher.as_deref().map(|p| p.lock())
    }

    /// A shareable handle to the publish region, for readers running on
    /// their own thread while the engine keeps rendering.
    pub fn frame_publisher(&self) -> Option<Arc<FramePublisher>> {
        self.publisher.clone()
    }

    pub fn frame_number(&self) -> i64 {
        self.frame_number
    }

    // ---- Global transport ------------------------------------------

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn seek_to_frame(&mut self, frame: i32) {
        if !self.initialized || self.total_frames <= 0 {
            return;
        }
        self.current_frame = frame.clamp(0, self.total_frames - 1);
    }

    pub fn seek_to_time(&mut self, seconds: f32) {
        if !self.initialized {
            return;
        }
        self.seek_to_frame((seconds as f64 * self.target_fps) as i32);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_frame(&self) -> i32 {
        self.current_frame
    }

    // ---- Stats -----------------------------------------------------

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }

    pub fn dropped_frames(&self) -> i32 {
        self.dropped_frames
    }

    // ---- Texture share ---------------------------------------------

    pub fn enable_share_output(&mut self, name: &str) -> bool {
        if !self.initialized || name.is_empty() {
            return false;
        }
        if self.output.is_some() {
            return true;
        }
        match self.transport.create_sender(name) {
            Some(sink) => {
                info!(%name, "share output enabled");
                self.output = Some(sink);
                true
            }
            None => false,
        }
    }

    pub fn disable_share_output(&mut self) {
        self.output = None;
    }

    pub fn is_share_output_enabled(&self) -> bool {
        self.output.is_some()
    }

    pub fn shared_sender_count(&self) -> usize {
        self.transport.sender_names().len()
    }

    pub fn shared_sender_name(&self, index: usize) -> Option<String> {
        self.transport.sender_names().get(index).cloned()
    }

    pub fn connect_shared_input(&mut self, sender_name: &str) -> i32 {
        if !self.initialized {
            return -1;
        }
        self.inputs.connect(self.transport.as_ref(), sender_name)
    }

    pub fn disconnect_shared_input(&mut self, id: i32) {
        self.inputs.disconnect(id);
    }

    // ---- Image textures --------------------------------------------

    pub fn load_texture(&mut self, path: &str) -> i32 {
        if !self.initialized {
            return -1;
        }
        self.textures.load(path)
    }

    pub fn unload_texture(&mut self, id: i32) {
        self.textures.unload(id);
    }

    // ---- Per-video controls ----------------------------------------

    pub fn load_video(&mut self, path: &str) -> i32 {
        if !self.initialized {
            warn!("load_video before initialize");
            return 0;
        }
        self.videos.load(path)
    }

    pub fn unload_video(&mut self, id: i32) {
        self.videos.unload(id);
    }

    pub fn play_video(&mut self, id: i32) {
        if let Some(source) = self.videos.get_mut(id) {
            source.play();
        }
    }

    pub fn pause_video(&mut self, id: i32) {
        if let Some(source) = self.videos.get_mut(id) {
            source.pause();
        }
    }

    pub fn stop_video(&mut self, id: i32) {
        if let Some(source) = self.videos.get_mut(id) {
            source.stop();
        }
    }

    pub fn seek_video(&mut self, id: i32, frame: i32) {
        if let Some(source) = self.videos.get_mut(id) {
            source.seek_to_frame(frame);
        }
    }

    pub fn seek_video_time(&mut self, id: i32, seconds: f64) {
        if let Some(source) = self.videos.get_mut(id) {
            source.seek_to_time(seconds);
        }
    }

    pub fn is_video_playing(&self, id: i32) -> bool {
        self.videos.get(id).map(|s| s.is_playing()).unwrap_or(false)
    }

    pub fn video_frame(&self, id: i32) -> i32 {
        self.videos.get(id).map(|s| s.current_frame()).unwrap_or(0)
    }

    pub fn video_total_frames(&self, id: i32) -> i32 {
        self.videos.get(id).map(|s| s.total_frames()).unwrap_or(0)
    }

    pub fn set_video_loop(&mut self, id: i32, looping: bool) {
        if let Some(source) = self.videos.get_mut(id) {
            source.set_loop(looping);
        }
    }

    pub fn set_video_alpha(&mut self, id: i32, passthrough: bool) {
        if let Some(source) = self.videos.get_mut(id) {
            source.set_alpha(passthrough);
        }
    }

    /// Access the video registry; hosts use this to register
    /// custom-opened sources.
    pub fn videos_mut(&mut self) -> &mut VideoManager {
        &mut self.videos
    }

    // ---- Fonts -----------------------------------------------------

    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        path: &std::path::Path,
    ) -> bool {
        match self.dispatch.text_mut().load_font(family, bold, italic, path) {
            Ok(()) => true,
            Err(e) => {
                warn!("font load failed: {e}");
                false
            }
        }
    }

    // ---- Debug -----------------------------------------------------

    pub fn set_show_bounds(&mut self, show: bool) {
        self.show_bounds = show;
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    pub fn set_edge_smoothing(&mut self, width: f32) {
        self.edge_smoothing = width.max(0.0);
    }

    pub fn edge_smoothing(&self) -> f32 {
        self.edge_smoothing
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
