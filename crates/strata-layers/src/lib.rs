//! # strata-layers
//!
//! The layer data model for the Strata compositor: the fixed-layout
//! binary [`LayerRecord`] exchanged with external callers, the rich
//! internal [`Layer`] representation the renderer works with, the
//! fixed-capacity [`LayerStore`], and the per-frame [`MaskIndex`].

pub mod layer;
pub mod mask;
pub mod record;
pub mod store;

pub use layer::{
    Appearance, Layer, LayerKind, MaskMode, MaskSettings, SourceKind, TextAlign, TextAntialias,
    TextStyle, Transform, UvTransform,
};
pub use mask::MaskIndex;
pub use record::{LayerRecord, MAX_FONT_NAME, MAX_LAYERS, MAX_PATH, MAX_TEXT};
pub use store::LayerStore;
