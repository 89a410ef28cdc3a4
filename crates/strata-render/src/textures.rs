//! Image loading and the texture cache.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use strata_core::{EngineError, EngineResult, Surface};

/// Maximum texture dimension on either axis. 8192x8192 RGBA is 256 MB
/// uncompressed, the ceiling for broadcast stills.
const MAX_TEXTURE_DIMENSION: u32 = 8192;

struct TextureEntry {
    surface: Surface,
    path: String,
}

/// Loaded image textures, keyed by positive id. Loading the same path
/// twice returns the existing id.
pub struct TextureCache {
    textures: HashMap<i32, TextureEntry>,
    next_id: i32,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            next_id: 1,
        }
    }

    /// Decode an image file into the cache and return its id, or -1 on
    /// any failure. Paths containing `..` are rejected.
    pub fn load(&mut self, path: &str) -> i32 {
        match self.try_load(path) {
            Ok(id) => id,
            Err(e) => {
                warn!("texture load failed: {e}");
                -1
            }
        }
    }

    fn try_load(&mut self, path: &str) -> EngineResult<i32> {
        if path.is_empty() {
            return Err(EngineError::InvalidArgument("empty texture path".into()));
        }
        if path.contains("..") {
            return Err(EngineError::InvalidArgument(format!(
                "path traversal rejected: {path}"
            )));
        }

        if let Some((&id, _)) = self.textures.iter().find(|(_, e)| e.path == path) {
            return Ok(id);
        }

        let surface = load_image(Path::new(path))?;
        if surface.width > MAX_TEXTURE_DIMENSION
            || surface.height > MAX_TEXTURE_DIMENSION
            || surface.width == 0
            || surface.height == 0
        {
            return Err(EngineError::asset(
                format!(
                    "texture dimensions {}x{} out of range",
                    surface.width, surface.height
                ),
                path,
            ));
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.next_id <= 0 {
            self.next_id = 1;
        }
        info!(id, %path, width = surface.width, height = surface.height, "texture loaded");
        self.textures.insert(
            id,
            TextureEntry {
                surface,
                path: path.to_string(),
            },
        );
        Ok(id)
    }

    pub fn unload(&mut self, id: i32) {
        self.textures.remove(&id);
    }

    pub fn get(&self, id: i32) -> Option<&Surface> {
        self.textures.get(&id).map(|e| &e.surface)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    /// Insert an already-decoded surface; used by hosts that feed
    /// textures directly and by tests.
    pub fn insert_surface(&mut self, surface: Surface) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        if self.next_id <= 0 {
            self.next_id = 1;
        }
        self.textures.insert(
            id,
            TextureEntry {
                surface,
                path: String::new(),
            },
        );
        id
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an image file into an RGBA surface.
pub fn load_image(path: &Path) -> EngineResult<Surface> {
    let img = image::open(path).map_err(|e| {
        EngineError::asset(format!("failed to load image '{}': {}", path.display(), e), path)
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut surface = Surface::new(width, height);
    surface.data = rgba.into_raw();
    Ok(surface)
}
