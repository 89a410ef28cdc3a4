//! The registry of loaded videos.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use super::source::VideoSource;

/// Maximum simultaneously loaded videos.
pub const MAX_LOADED_VIDEOS: usize = 32;

/// Owns every active [`VideoSource`], hands out positive ids, and fans
/// the per-tick update across them. Id 0 is the invalid sentinel
/// returned on any load failure.
pub struct VideoManager {
    sources: HashMap<i32, VideoSource>,
    next_id: i32,
}

impl VideoManager {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            next_id: 1,
        }
    }

    /// Load a video file. Returns its id, or 0 when the cap is reached
    /// or no backend accepts the source.
    pub fn load(&mut self, path: &str) -> i32 {
        if self.sources.len() >= MAX_LOADED_VIDEOS {
            warn!("video limit reached ({MAX_LOADED_VIDEOS} sources)");
            return 0;
        }

        match VideoSource::load(Path::new(path)) {
            Ok(source) => self.register(source),
            Err(e) => {
                warn!(%path, "video load failed: {e}");
                0
            }
        }
    }

    /// Register an already-opened source; used by hosts that construct
    /// their own backends and by tests.
    pub fn register(&mut self, source: VideoSource) -> i32 {
        if self.sources.len() >= MAX_LOADED_VIDEOS {
            warn!("video limit reached ({MAX_LOADED_VIDEOS} sources)");
            return 0;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.next_id <= 0 {
            self.next_id = 1;
        }
        self.sources.insert(id, source);
        info!(id, total = self.sources.len(), "video registered");
        id
    }

    pub fn unload(&mut self, id: i32) {
        self.sources.remove(&id);
    }

    pub fn get(&self, id: i32) -> Option<&VideoSource> {
        self.sources.get(&id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut VideoSource> {
        self.sources.get_mut(&id)
    }

    /// Advance every source's clock once. Sources update sequentially;
    /// a slow decode delays the whole tick; there is no
    /// background decode thread.
    pub fn update_all(&mut self) {
        for source in self.sources.values_mut() {
            source.update();
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Stop and release every source.
    pub fn shutdown(&mut self) {
        self.sources.clear();
    }
}

impl Default for VideoManager {
    fn default() -> Self {
        Self::new()
    }
}
