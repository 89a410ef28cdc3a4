//! Software rasterization of transformed quads and ellipses.
//!
//! Quads are drawn by projecting the unit quad's corners through the
//! layer's world-view-projection matrix and inverse-mapping each canvas
//! pixel back to quad UV space through a homography. That one path
//! covers translated, scaled and X/Y/Z-rotated layers uniformly.

use rayon::prelude::*;

use strata_core::math::{
    apply_homography, homography_from_points, invert_3x3, project_quad_corners, smoothstep, Mat4,
};
use strata_core::{blend_rgba8, Color, Surface};
use strata_layers::UvTransform;

use crate::masking::StencilPlane;

/// Stencil participation of a draw call.
pub enum StencilMode<'a> {
    /// Normal rendering, no stencil involvement.
    Disabled,
    /// Write stencil value 1 where the shape covers, with color writes
    /// disabled. Used to record a mask's bounding rectangle.
    WriteMask(&'a mut StencilPlane),
    /// Render only where the stencil test passes: `pass_inside` = true
    /// requires stencil == 1 (Inner), false requires stencil != 1
    /// (Outer).
    Test {
        plane: &'a StencilPlane,
        pass_inside: bool,
    },
}

/// Pixel source and modulation for one quad draw.
pub struct QuadDraw<'a> {
    /// rgb premodulated by opacity, alpha = opacity.
    pub tint: Color,
    pub texture: Option<&'a Surface>,
    pub uv: UvTransform,
    /// Edge antialiasing width; 0 disables the falloff.
    pub edge_smoothing: f32,
}

/// Rasterize the unit quad under `wvp` into the canvas.
pub fn draw_quad(canvas: &mut Surface, wvp: &Mat4, draw: &QuadDraw<'_>, stencil: StencilMode<'_>) {
    let canvas_w = canvas.width as f32;
    let canvas_h = canvas.height as f32;
    if canvas_w <= 0.0 || canvas_h <= 0.0 {
        return;
    }

    let corners = project_quad_corners(wvp, canvas_w, canvas_h);

    // UV corners in TL, TR, BR, BL order; v grows downward.
    let uv_corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let Some(forward) = homography_from_points(uv_corners, corners) else {
        return; // degenerate quad (zero size)
    };
    let Some(inverse) = invert_3x3(forward) else {
        return;
    };

    // Clipped integer bounding box of the projected corners.
    let (min_x, min_y, max_x, max_y) = corner_bounds(&corners);
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil() as i64).clamp(0, canvas.width as i64) as u32;
    let y1 = (max_y.ceil() as i64).clamp(0, canvas.height as i64) as u32;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    // Pixel footprint in UV space, for the edge-smoothing falloff.
    let edge_a = ((corners[1][0] - corners[0][0]).powi(2)
        + (corners[1][1] - corners[0][1]).powi(2))
    .sqrt();
    let edge_b = ((corners[3][0] - corners[0][0]).powi(2)
        + (corners[3][1] - corners[0][1]).powi(2))
    .sqrt();
    let footprint = 1.0 / (edge_a.min(edge_b).max(1.0) as f32);

    let sample = |u: f32, v: f32| -> [u8; 4] {
        let mut rgba = match draw.texture {
            Some(texture) => {
                let (su, sv) = transform_uv(u, v, &draw.uv);
                let px = su.clamp(0.0, 1.0) * (texture.width.max(1) - 1) as f32;
                let py = sv.clamp(0.0, 1.0) * (texture.height.max(1) - 1) as f32;
                draw.tint.modulate_rgba8(texture.sample_bilinear(px, py))
            }
            None => draw.tint.to_rgba8(),
        };

        if draw.edge_smoothing > 0.0 {
            let edge = u.min(1.0 - u).min(v).min(1.0 - v);
            let falloff = smoothstep(0.0, footprint * draw.edge_smoothing, edge);
            rgba[3] = (rgba[3] as f32 * falloff) as u8;
        }
        rgba
    };

    match stencil {
        StencilMode::WriteMask(plane) => {
            for y in y0..y1 {
                for x in x0..x1 {
                    if inverse_uv(&inverse, x, y).is_some() {
                        plane.write(x, y);
                    }
                }
            }
        }
        StencilMode::Disabled => {
            fill_rows(canvas, (x0, y0, x1, y1), |x, y, dst| {
                if let Some((u, v)) = inverse_uv(&inverse, x, y) {
                    blend_rgba8(dst, sample(u, v));
                }
            });
        }
        StencilMode::Test { plane, pass_inside } => {
            fill_rows(canvas, (x0, y0, x1, y1), |x, y, dst| {
                if !plane.test(x, y, pass_inside) {
                    return;
                }
                if let Some((u, v)) = inverse_uv(&inverse, x, y) {
                    blend_rgba8(dst, sample(u, v));
                }
            });
        }
    }
}

/// Rasterize a filled, edge-antialiased ellipse.
pub fn draw_ellipse(
    canvas: &mut Surface,
    center_x: f32,
    center_y: f32,
    radius_x: f32,
    radius_y: f32,
    color: Color,
    stencil: StencilMode<'_>,
) {
    if radius_x <= 0.0 || radius_y <= 0.0 {
        return;
    }

    let x0 = (center_x - radius_x - 1.0).floor().max(0.0) as u32;
    let y0 = (center_y - radius_y - 1.0).floor().max(0.0) as u32;
    let x1 = ((center_x + radius_x + 1.0).ceil() as i64).clamp(0, canvas.width as i64) as u32;
    let y1 = ((center_y + radius_y + 1.0).ceil() as i64).clamp(0, canvas.height as i64) as u32;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let rgba = color.to_rgba8();
    let min_radius = radius_x.min(radius_y);

    let coverage_at = |x: u32, y: u32| -> f32 {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        let nx = (px - center_x) / radius_x;
        let ny = (py - center_y) / radius_y;
        // Signed distance approximation in pixels, antialiased over a
        // one-pixel band.
        let dist = (1.0 - (nx * nx + ny * ny).sqrt()) * min_radius;
        (dist + 0.5).clamp(0.0, 1.0)
    };

    match stencil {
        StencilMode::WriteMask(plane) => {
            for y in y0..y1 {
                for x in x0..x1 {
                    if coverage_at(x, y) > 0.5 {
                        plane.write(x, y);
                    }
                }
            }
        }
        StencilMode::Disabled => {
            fill_rows(canvas, (x0, y0, x1, y1), |x, y, dst| {
                let coverage = coverage_at(x, y);
                if coverage > 0.0 {
                    let mut px = rgba;
                    px[3] = (px[3] as f32 * coverage) as u8;
                    blend_rgba8(dst, px);
                }
            });
        }
        StencilMode::Test { plane, pass_inside } => {
            fill_rows(canvas, (x0, y0, x1, y1), |x, y, dst| {
                if !plane.test(x, y, pass_inside) {
                    return;
                }
                let coverage = coverage_at(x, y);
                if coverage > 0.0 {
                    let mut px = rgba;
                    px[3] = (px[3] as f32 * coverage) as u8;
                    blend_rgba8(dst, px);
                }
            });
        }
    }
}

/// Axis-aligned filled rectangle; used by the debug overlay.
pub fn fill_rect(canvas: &mut Surface, left: f32, top: f32, width: f32, height: f32, color: Color) {
    let rgba = color.to_rgba8();
    let x0 = left.floor().max(0.0) as u32;
    let y0 = top.floor().max(0.0) as u32;
    let x1 = ((left + width).ceil() as i64).clamp(0, canvas.width as i64) as u32;
    let y1 = ((top + height).ceil() as i64).clamp(0, canvas.height as i64) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.blend_pixel(x, y, rgba);
        }
    }
}

/// Axis-aligned rectangle outline; used by the debug overlay.
pub fn stroke_rect(
    canvas: &mut Surface,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    thickness: f32,
    color: Color,
) {
    fill_rect(canvas, left, top, width, thickness, color);
    fill_rect(canvas, left, top + height - thickness, width, thickness, color);
    fill_rect(canvas, left, top, thickness, height, color);
    fill_rect(canvas, left + width - thickness, top, thickness, height, color);
}

fn corner_bounds(corners: &[[f64; 2]; 4]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in corners {
        min_x = min_x.min(c[0]);
        min_y = min_y.min(c[1]);
        max_x = max_x.max(c[0]);
        max_y = max_y.max(c[1]);
    }
    (min_x, min_y, max_x, max_y)
}

/// Inverse-map a pixel center to quad UV space; None when the pixel
/// falls outside the quad.
fn inverse_uv(inverse: &[f64; 9], x: u32, y: u32) -> Option<(f32, f32)> {
    let (u, v) = apply_homography(inverse, x as f64 + 0.5, y as f64 + 0.5)?;
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
        return None;
    }
    Some((u as f32, v as f32))
}

/// Apply the UV sub-rect and rotation to quad-space coordinates.
fn transform_uv(u: f32, v: f32, uv: &UvTransform) -> (f32, f32) {
    // A zeroed record carries scale 0; treat it as the identity so
    // untouched layers sample the full texture.
    if uv.is_identity() || uv.scale_x == 0.0 || uv.scale_y == 0.0 {
        return (u, v);
    }

    let (mut u, mut v) = (u, v);
    if uv.rotation != 0.0 {
        let r = uv.rotation.to_radians();
        let (s, c) = r.sin_cos();
        let du = u - 0.5;
        let dv = v - 0.5;
        u = 0.5 + du * c - dv * s;
        v = 0.5 + du * s + dv * c;
    }
    (uv.offset_x + u * uv.scale_x, uv.offset_y + v * uv.scale_y)
}

/// Run `f` over every pixel of the clipped bounding box, row-parallel.
fn fill_rows<F>(canvas: &mut Surface, bbox: (u32, u32, u32, u32), f: F)
where
    F: Fn(u32, u32, &mut [u8]) + Sync,
{
    let (x0, y0, x1, y1) = bbox;
    let stride = canvas.stride();
    let band = &mut canvas.data[(y0 as usize) * stride..(y1 as usize) * stride];

    band.par_chunks_mut(stride).enumerate().for_each(|(i, row)| {
        let y = y0 + i as u32;
        for x in x0..x1 {
            let offset = (x as usize) * 4;
            f(x, y, &mut row[offset..offset + 4]);
        }
    });
}
