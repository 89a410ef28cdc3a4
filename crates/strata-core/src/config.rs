use serde::{Deserialize, Serialize};

/// Output surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            target_fps: 50.0,
        }
    }
}

/// Rendering quality settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QualityConfig {
    /// Shader-style edge smoothing width for quad draws; 0 disables.
    pub edge_smoothing: f32,
    /// Draw debug bounding boxes and anchor crosses.
    pub show_bounds: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            edge_smoothing: 0.0,
            show_bounds: false,
        }
    }
}

/// Resource limits. These bound worst-case memory, not typical use.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum texture/video dimension on either axis.
    pub max_dimension: u32,
    /// Maximum video source file size in bytes.
    pub max_video_file_size: u64,
    /// Maximum concurrently loaded videos.
    pub max_videos: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            max_video_file_size: 4 * 1024 * 1024 * 1024,
            max_videos: 32,
        }
    }
}

/// Engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl EngineConfig {
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
