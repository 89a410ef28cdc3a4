//! # strata-render
//!
//! The Strata rendering engine. Drives the per-frame compositing
//! pipeline over the layer table: render dispatch, shape/text masking,
//! paced video decode, and the bounded-wait frame-buffer publish.

pub mod dispatch;
pub mod engine;
pub mod masking;
pub mod publisher;
pub mod raster;
pub mod share;
pub mod text;
pub mod textures;
pub mod video;

pub use engine::{DeviceProbe, Engine, RenderPhase};
pub use masking::{ClipShape, MaskingEngine, StencilPlane};
pub use publisher::{FrameLease, FramePublisher};
pub use share::{NullTransport, ShareTransport, SharedTextureSink, SharedTextureSource};
pub use text::TextRenderer;
pub use textures::TextureCache;
pub use video::{BackendKind, VideoManager, VideoSource};
