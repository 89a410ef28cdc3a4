//! The two masking strategies.
//!
//! Raster targets (rectangle/image/video/circle) clip through a
//! canvas-sized stencil plane: the mask's bounding rectangle is written
//! as stencil value 1 with color writes disabled, then the target draws
//! under a pass-where-equal (Inner) or pass-where-not-equal (Outer)
//! test. Circular masks are approximated by their bounding box on this
//! path.
//!
//! Text targets clip through exact geometry: a rectangle or ellipse
//! coverage function, inverted for Outer mode (the equivalent of a
//! full-canvas figure with an opposite-winding hole). This is the only
//! path with exact circular clipping.

use strata_layers::{Layer, LayerKind, MaskMode};

/// Auxiliary per-pixel plane used to restrict raster draws.
#[derive(Debug, Clone)]
pub struct StencilPlane {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl StencilPlane {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset the whole plane to 0.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Write the reference value 1 at a pixel. No-op out of bounds.
    pub fn write(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            self.data[(y as usize) * (self.width as usize) + (x as usize)] = 1;
        }
    }

    /// Stencil value at a pixel; 0 outside the plane.
    pub fn value(&self, x: u32, y: u32) -> u8 {
        if x < self.width && y < self.height {
            self.data[(y as usize) * (self.width as usize) + (x as usize)]
        } else {
            0
        }
    }

    /// Whether a draw passes the test at this pixel.
    /// `pass_inside` = true is the Inner test (stencil == 1),
    /// false the Outer test (stencil != 1).
    pub fn test(&self, x: u32, y: u32, pass_inside: bool) -> bool {
        (self.value(x, y) == 1) == pass_inside
    }
}

/// Clip geometry for the text masking path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipShape {
    Rect {
        center_x: f32,
        center_y: f32,
        half_w: f32,
        half_h: f32,
    },
    Ellipse {
        center_x: f32,
        center_y: f32,
        radius_x: f32,
        radius_y: f32,
    },
}

impl ClipShape {
    /// Build the clip geometry for a mask layer: Circle-kind masks clip
    /// as ellipses, every other kind as its rectangle.
    pub fn from_mask_layer(mask: &Layer) -> Self {
        let t = &mask.transform;
        if mask.kind == LayerKind::Circle {
            ClipShape::Ellipse {
                center_x: t.pos_x,
                center_y: t.pos_y,
                radius_x: t.size_x * 0.5,
                radius_y: t.size_y * 0.5,
            }
        } else {
            ClipShape::Rect {
                center_x: t.pos_x,
                center_y: t.pos_y,
                half_w: t.size_x * 0.5,
                half_h: t.size_y * 0.5,
            }
        }
    }

    /// Antialiased coverage of this clip at a pixel center, in [0, 1].
    /// Inner mode covers the shape interior; Outer mode the inverted
    /// region.
    pub fn coverage(&self, x: f32, y: f32, mode: MaskMode) -> f32 {
        let inside = match self {
            ClipShape::Rect {
                center_x,
                center_y,
                half_w,
                half_h,
            } => {
                // Signed distance to the rect boundary; positive inside.
                let dx = half_w - (x - center_x).abs();
                let dy = half_h - (y - center_y).abs();
                dx.min(dy)
            }
            ClipShape::Ellipse {
                center_x,
                center_y,
                radius_x,
                radius_y,
            } => {
                if *radius_x <= 0.0 || *radius_y <= 0.0 {
                    return match mode {
                        MaskMode::Inner => 0.0,
                        MaskMode::Outer => 1.0,
                    };
                }
                let nx = (x - center_x) / radius_x;
                let ny = (y - center_y) / radius_y;
                // Approximate signed distance in pixels from the
                // normalized radial distance.
                (1.0 - (nx * nx + ny * ny).sqrt()) * radius_x.min(*radius_y)
            }
        };

        // Half-pixel antialiased edge.
        let coverage = (inside + 0.5).clamp(0.0, 1.0);
        match mode {
            MaskMode::Inner => coverage,
            MaskMode::Outer => 1.0 - coverage,
        }
    }
}

/// Strategy selection for a masked target layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStrategy {
    /// Exact geometry clipping (text targets).
    Geometry,
    /// Stencil-plane clipping with bounding-box mask shapes
    /// (all raster targets).
    Stencil,
}

/// Owns the per-frame stencil plane and picks the masking strategy.
pub struct MaskingEngine {
    stencil: StencilPlane,
}

impl MaskingEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            stencil: StencilPlane::new(width, height),
        }
    }

    pub fn strategy_for(kind: LayerKind) -> MaskStrategy {
        match kind {
            LayerKind::Text => MaskStrategy::Geometry,
            _ => MaskStrategy::Stencil,
        }
    }

    pub fn stencil(&self) -> &StencilPlane {
        &self.stencil
    }

    pub fn stencil_mut(&mut self) -> &mut StencilPlane {
        &mut self.stencil
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stencil_write_and_test() {
        let mut plane = StencilPlane::new(8, 8);
        plane.write(3, 3);
        assert_eq!(plane.value(3, 3), 1);
        assert_eq!(plane.value(0, 0), 0);
        assert!(plane.test(3, 3, true));
        assert!(!plane.test(3, 3, false));
        assert!(!plane.test(0, 0, true));
        assert!(plane.test(0, 0, false));
        plane.clear();
        assert_eq!(plane.value(3, 3), 0);
    }

    #[test]
    fn test_stencil_out_of_bounds() {
        let mut plane = StencilPlane::new(4, 4);
        plane.write(100, 100);
        assert_eq!(plane.value(100, 100), 0);
        // Outside the plane counts as "not 1": the Outer test passes.
        assert!(plane.test(100, 100, false));
    }

    #[test]
    fn test_rect_coverage_inner_outer() {
        let clip = ClipShape::Rect {
            center_x: 50.0,
            center_y: 50.0,
            half_w: 10.0,
            half_h: 10.0,
        };
        assert!(clip.coverage(50.0, 50.0, MaskMode::Inner) > 0.99);
        assert!(clip.coverage(80.0, 50.0, MaskMode::Inner) < 0.01);
        assert!(clip.coverage(50.0, 50.0, MaskMode::Outer) < 0.01);
        assert!(clip.coverage(80.0, 50.0, MaskMode::Outer) > 0.99);
    }

    #[test]
    fn test_ellipse_coverage() {
        let clip = ClipShape::Ellipse {
            center_x: 0.0,
            center_y: 0.0,
            radius_x: 20.0,
            radius_y: 10.0,
        };
        assert!(clip.coverage(0.0, 0.0, MaskMode::Inner) > 0.99);
        // On the long axis just inside vs well outside.
        assert!(clip.coverage(18.0, 0.0, MaskMode::Inner) > 0.9);
        assert!(clip.coverage(30.0, 0.0, MaskMode::Inner) < 0.01);
        // The rect corner of the bounding box is outside the ellipse.
        assert!(clip.coverage(18.0, 9.0, MaskMode::Inner) < 0.1);
    }

    #[test]
    fn test_degenerate_ellipse() {
        let clip = ClipShape::Ellipse {
            center_x: 0.0,
            center_y: 0.0,
            radius_x: 0.0,
            radius_y: 10.0,
        };
        assert_eq!(clip.coverage(0.0, 0.0, MaskMode::Inner), 0.0);
        assert_eq!(clip.coverage(0.0, 0.0, MaskMode::Outer), 1.0);
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            MaskingEngine::strategy_for(LayerKind::Text),
            MaskStrategy::Geometry
        );
        for kind in [
            LayerKind::Rectangle,
            LayerKind::Circle,
            LayerKind::Image,
            LayerKind::Video,
        ] {
            assert_eq!(MaskingEngine::strategy_for(kind), MaskStrategy::Stencil);
        }
    }
}
