//! Per-layer-type draw routines.

use tracing::warn;

use strata_core::math::Mat4;
use strata_core::{Color, EngineError, Surface};
use strata_layers::{Layer, LayerKind, MaskMode, SourceKind};

use crate::masking::ClipShape;
use crate::raster::{draw_ellipse, draw_quad, fill_rect, stroke_rect, QuadDraw, StencilMode};
use crate::share::ShareInputs;
use crate::text::TextRenderer;
use crate::textures::TextureCache;
use crate::video::VideoManager;

/// Everything a draw routine needs to resolve sources and place
/// geometry for one frame.
pub struct RenderContext<'a> {
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub textures: &'a TextureCache,
    pub videos: &'a VideoManager,
    pub inputs: &'a ShareInputs,
    pub edge_smoothing: f32,
}

/// Dispatches layers to their type-specific draw routine.
pub struct RenderDispatcher {
    text: TextRenderer,
}

impl RenderDispatcher {
    pub fn new() -> Self {
        Self {
            text: TextRenderer::new(),
        }
    }

    pub fn text_mut(&mut self) -> &mut TextRenderer {
        &mut self.text
    }

    /// Draw one layer. Mask and Group layers never render as visible
    /// content here; callers decide about debug previews.
    pub fn render_layer(
        &mut self,
        canvas: &mut Surface,
        ctx: &RenderContext<'_>,
        layer: &Layer,
        stencil: StencilMode<'_>,
    ) {
        if !layer.active {
            return;
        }
        match layer.kind {
            LayerKind::Text => self.render_text(canvas, ctx, layer, None),
            LayerKind::Circle => Self::render_circle(canvas, layer, stencil),
            LayerKind::Mask | LayerKind::Group => {}
            _ => Self::render_quad(canvas, ctx, layer, stencil),
        }
    }

    /// Draw a text layer, optionally clipped by a mask shape. On the
    /// target-lost signal the text caches are released and rebuilt; the
    /// draw is skipped this frame and recovers on the next.
    pub fn render_text(
        &mut self,
        canvas: &mut Surface,
        _ctx: &RenderContext<'_>,
        layer: &Layer,
        clip: Option<(&ClipShape, MaskMode)>,
    ) {
        let t = &layer.transform;
        let rect = (
            t.pos_x - t.size_x * 0.5,
            t.pos_y - t.size_y * 0.5,
            t.size_x,
            t.size_y,
        );
        let color = layer
            .appearance
            .color
            .fill_tint(layer.appearance.opacity)
            .to_rgba8();

        match self
            .text
            .draw(canvas, rect, &layer.text, &layer.text_style, color, clip)
        {
            Ok(()) => {}
            Err(EngineError::TargetLost) => {
                warn!(layer = layer.id, "text target lost, rebuilding caches");
                self.text.rebuild();
            }
            Err(e) => warn!(layer = layer.id, "text draw failed: {e}"),
        }
    }

    /// Rectangle/Image/Video path: resolve the source texture and draw
    /// a transformed unit quad.
    pub fn render_quad(
        canvas: &mut Surface,
        ctx: &RenderContext<'_>,
        layer: &Layer,
        stencil: StencilMode<'_>,
    ) {
        let texture = Self::resolve_source(ctx, layer);
        let wvp = Self::world_transform(ctx, layer);
        let draw = QuadDraw {
            tint: layer.appearance.color.quad_tint(layer.appearance.opacity),
            texture,
            uv: layer.uv,
            edge_smoothing: ctx.edge_smoothing,
        };
        draw_quad(canvas, &wvp, &draw, stencil);
    }

    /// Record a mask's footprint in the stencil plane: its bounding
    /// rectangle at full opacity, color writes disabled. Circle-kind
    /// masks are approximated by their bounding box on this path.
    pub fn render_mask_to_stencil(
        canvas: &mut Surface,
        ctx: &RenderContext<'_>,
        mask: &Layer,
        stencil: StencilMode<'_>,
    ) {
        let wvp = Self::world_transform(ctx, mask);
        let draw = QuadDraw {
            tint: Color::WHITE,
            texture: None,
            uv: mask.uv,
            edge_smoothing: 0.0,
        };
        draw_quad(canvas, &wvp, &draw, stencil);
    }

    fn render_circle(canvas: &mut Surface, layer: &Layer, stencil: StencilMode<'_>) {
        let t = &layer.transform;
        let radius = t.size_x.min(t.size_y) * 0.5;
        let color = layer.appearance.color.fill_tint(layer.appearance.opacity);
        draw_ellipse(canvas, t.pos_x, t.pos_y, radius, radius, color, stencil);
    }

    /// Debug overlay: green bounding rectangle plus a red cross at the
    /// anchor point.
    pub fn render_bounds(canvas: &mut Surface, layer: &Layer) {
        let t = &layer.transform;
        let left = t.pos_x - t.size_x * 0.5;
        let top = t.pos_y - t.size_y * 0.5;
        stroke_rect(
            canvas,
            left,
            top,
            t.size_x,
            t.size_y,
            2.0,
            Color::rgba(0.0, 1.0, 0.0, 0.8),
        );

        let anchor_x = t.pos_x + (t.anchor_x - 0.5) * t.size_x;
        let anchor_y = t.pos_y + (t.anchor_y - 0.5) * t.size_y;
        let cross = 8.0;
        let red = Color::rgba(1.0, 0.0, 0.0, 1.0);
        fill_rect(canvas, anchor_x - cross, anchor_y - 1.0, cross * 2.0, 2.0, red);
        fill_rect(canvas, anchor_x - 1.0, anchor_y - cross, 2.0, cross * 2.0, red);
    }

    /// World transform for a quad layer: scale to the layer size,
    /// rotate about the anchor offset through the X/Y/Z rotations,
    /// translate to the canvas-centered (Y-flipped) position, project
    /// orthographically.
    pub fn world_transform(ctx: &RenderContext<'_>, layer: &Layer) -> Mat4 {
        let t = &layer.transform;
        let anchor_offset_x = (t.anchor_x - 0.5) * t.size_x;
        let anchor_offset_y = (t.anchor_y - 0.5) * t.size_y;

        let scale = Mat4::scaling(t.size_x, t.size_y, 1.0);
        let to_anchor = Mat4::translation(-anchor_offset_x, anchor_offset_y, 0.0);
        let rot_z = Mat4::rotation_z(t.rot_z);
        let rot_y = Mat4::rotation_y(t.rot_y);
        let rot_x = Mat4::rotation_x(t.rot_x);
        let from_anchor = Mat4::translation(anchor_offset_x, -anchor_offset_y, 0.0);
        let translation = Mat4::translation(
            t.pos_x - ctx.canvas_width * 0.5,
            -(t.pos_y - ctx.canvas_height * 0.5),
            0.0,
        );
        let projection = Mat4::orthographic(ctx.canvas_width, ctx.canvas_height);

        projection
            .mul(&translation)
            .mul(&from_anchor)
            .mul(&rot_x)
            .mul(&rot_y)
            .mul(&rot_z)
            .mul(&to_anchor)
            .mul(&scale)
    }

    /// Resolve a layer's source texture by source kind.
    fn resolve_source<'a>(ctx: &RenderContext<'a>, layer: &Layer) -> Option<&'a Surface> {
        match layer.source {
            SourceKind::Image if layer.texture_id > 0 => ctx.textures.get(layer.texture_id),
            SourceKind::SharedInput if layer.shared_input_id > 0 => {
                ctx.inputs.texture(layer.shared_input_id)
            }
            SourceKind::Video if layer.texture_id > 0 => {
                ctx.videos.get(layer.texture_id).and_then(|s| s.frame())
            }
            _ => None,
        }
    }
}

impl Default for RenderDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_layers::Layer;

    fn ctx<'a>(
        textures: &'a TextureCache,
        videos: &'a VideoManager,
        inputs: &'a ShareInputs,
    ) -> RenderContext<'a> {
        RenderContext {
            canvas_width: 64.0,
            canvas_height: 64.0,
            textures,
            videos,
            inputs,
            edge_smoothing: 0.0,
        }
    }

    fn full_canvas_rect() -> Layer {
        let mut layer = Layer::new(1);
        layer.active = true;
        layer.kind = LayerKind::Rectangle;
        layer.transform.pos_x = 32.0;
        layer.transform.pos_y = 32.0;
        layer.transform.size_x = 64.0;
        layer.transform.size_y = 64.0;
        layer
    }

    #[test]
    fn test_solid_rectangle_renders() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.appearance.color = Color::RED;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        assert_eq!(canvas.get_pixel(32, 32), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_inactive_layer_skipped() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.active = false;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        assert_eq!(canvas.get_pixel(32, 32), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_mask_and_group_never_render() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        for kind in [LayerKind::Mask, LayerKind::Group] {
            let mut layer = full_canvas_rect();
            layer.kind = kind;
            dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        }
        assert!(canvas.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_image_layer_samples_cache() {
        let mut textures = TextureCache::new();
        let id = textures.insert_surface(Surface::solid(8, 8, &Color::BLUE));
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.kind = LayerKind::Image;
        layer.source = SourceKind::Image;
        layer.texture_id = id;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        assert_eq!(canvas.get_pixel(32, 32), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_missing_texture_falls_back_to_tint() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.kind = LayerKind::Image;
        layer.source = SourceKind::Image;
        layer.texture_id = 999; // never loaded
        layer.appearance.color = Color::GREEN;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        // A missing texture renders as the untextured tint, not a fault.
        assert_eq!(canvas.get_pixel(32, 32), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_circle_uses_min_axis_radius() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.kind = LayerKind::Circle;
        layer.transform.size_x = 40.0;
        layer.transform.size_y = 20.0; // radius = 10
        layer.appearance.color = Color::WHITE;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);

        assert_eq!(canvas.get_pixel(32, 32), Some([255, 255, 255, 255]));
        // 15px out along x: inside the wide axis but outside radius 10.
        assert_eq!(canvas.get_pixel(47, 32), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_opacity_scales_quad_alpha() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        let mut layer = full_canvas_rect();
        layer.appearance.color = Color::WHITE;
        layer.appearance.opacity = 0.5;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);
        let px = canvas.get_pixel(32, 32).unwrap();
        assert!(px[3] > 100 && px[3] < 150);
    }

    #[test]
    fn test_world_transform_rotation_changes_coverage() {
        let textures = TextureCache::new();
        let videos = VideoManager::new();
        let inputs = ShareInputs::new();
        let ctx = ctx(&textures, &videos, &inputs);

        let mut canvas = Surface::new(64, 64);
        let mut dispatcher = RenderDispatcher::new();
        // A thin bar through the center, rotated 90 degrees: what was
        // horizontal coverage becomes vertical.
        let mut layer = full_canvas_rect();
        layer.transform.size_x = 60.0;
        layer.transform.size_y = 4.0;
        layer.transform.rot_z = 90.0;
        layer.appearance.color = Color::WHITE;
        dispatcher.render_layer(&mut canvas, &ctx, &layer, StencilMode::Disabled);

        assert_eq!(canvas.get_pixel(32, 10), Some([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(10, 32), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_bounds_overlay_draws_outline() {
        let mut canvas = Surface::new(64, 64);
        let mut layer = full_canvas_rect();
        layer.transform.pos_x = 32.0;
        layer.transform.pos_y = 32.0;
        layer.transform.size_x = 20.0;
        layer.transform.size_y = 20.0;
        RenderDispatcher::render_bounds(&mut canvas, &layer);
        // Top edge of the bounding box is green-ish.
        let px = canvas.get_pixel(32, 22).unwrap();
        assert!(px[1] > 150);
        // Anchor cross at the center is red.
        let center = canvas.get_pixel(32, 32).unwrap();
        assert!(center[0] > 200);
    }
}
