//! Text rendering.
//!
//! fontdue rasterizes glyphs; this module owns font selection, the
//! parameter-keyed format cache, line layout (alignment, line height,
//! letter spacing), the Smooth/Sharp antialias modes, and clip-shape
//! masking for text targets.

use std::collections::HashMap;
use std::path::Path;

use fontdue::{Font, FontSettings};
use tracing::{debug, warn};

use strata_core::{EngineError, EngineResult, Surface};
use strata_layers::{MaskMode, TextAlign, TextAntialias, TextStyle};

use crate::masking::ClipShape;

/// Key for the cached text format. The cache is a single slot, rebuilt
/// whenever the tuple changes; broadcast scenes overwhelmingly reuse
/// one style per frame, so one slot captures nearly every hit.
#[derive(Debug, Clone, PartialEq)]
struct FormatKey {
    family: String,
    size: f32,
    bold: bool,
    italic: bool,
    alignment: TextAlign,
    line_height: f32,
}

impl FormatKey {
    fn of(style: &TextStyle) -> Self {
        Self {
            family: style.family.clone(),
            size: style.size,
            bold: style.bold,
            italic: style.italic,
            alignment: style.alignment,
            line_height: style.line_height,
        }
    }
}

/// Resolved, reusable layout parameters for one text style.
#[derive(Debug, Clone)]
struct TextFormat {
    key: FormatKey,
    /// Registry key of the font face that will rasterize the text.
    font_key: String,
    /// Pixel distance between line baselines.
    line_spacing: f32,
    /// Baseline offset from the line top.
    ascent: f32,
}

/// Measurements for a single laid-out line.
#[derive(Debug, Clone)]
struct LayoutLine {
    text: String,
    width: f32,
}

pub struct TextRenderer {
    fonts: HashMap<String, Font>,
    cached_format: Option<TextFormat>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            cached_format: None,
        }
    }

    /// Register a font face for a family. Bold/italic faces register as
    /// separate variants of the same family.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        path: &Path,
    ) -> EngineResult<()> {
        let data = std::fs::read(path)
            .map_err(|e| EngineError::asset(format!("failed to read font file: {}", e), path))?;
        let font = Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            EngineError::asset(format!("failed to parse font '{}': {}", family, e), path)
        })?;
        self.fonts.insert(font_key(family, bold, italic), font);
        // A new face may change what the cached format resolves to.
        self.cached_format = None;
        Ok(())
    }

    /// Whether any font face is registered.
    pub fn has_fonts(&self) -> bool {
        !self.fonts.is_empty()
    }

    /// Release cached formats and derived state. Called on the
    /// target-recreate signal and during shutdown; registered fonts
    /// survive, everything derived is rebuilt lazily.
    pub fn rebuild(&mut self) {
        self.cached_format = None;
    }

    /// Draw `text` into the layout rect centered at the layer position.
    ///
    /// `color` is the final straight-alpha fill (tint already applied).
    /// `clip` restricts coverage to a mask shape in Inner/Outer mode.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        canvas: &mut Surface,
        rect: (f32, f32, f32, f32),
        text: &str,
        style: &TextStyle,
        color: [u8; 4],
        clip: Option<(&ClipShape, MaskMode)>,
    ) -> EngineResult<()> {
        if text.is_empty() {
            return Ok(());
        }

        let Some(font_key) = self.resolve_font_key(style) else {
            warn!(family = %style.family, "no font registered for text layer, skipping draw");
            return Ok(());
        };

        let format = self.format_for(style, font_key)?;
        let font = &self.fonts[&format.font_key];
        let (left, top, width, height) = rect;

        match layout_lines(font, text, style, width) {
            Ok(lines) => {
                let total_height =
                    format.line_spacing * (lines.len().saturating_sub(1)) as f32 + format.ascent;
                // Paragraph alignment is fixed center: the block is
                // vertically centered in the layout rect.
                let mut baseline = top + (height - total_height) * 0.5 + format.ascent;

                for line in &lines {
                    let line_left = match style.alignment {
                        TextAlign::Left => left,
                        TextAlign::Center => left + (width - line.width) * 0.5,
                        TextAlign::Right => left + width - line.width,
                    };
                    draw_line(
                        canvas, font, &line.text, style, color, line_left, baseline, clip,
                    );
                    baseline += format.line_spacing;
                }
            }
            Err(e) => {
                // Simple bounded fallback: first line only, from the
                // rect origin, no alignment or spacing refinements.
                debug!("text layout failed ({e}), using simple bounded draw");
                let first_line = text.lines().next().unwrap_or(text);
                let baseline = top + height * 0.5 + format.ascent * 0.5;
                draw_line(
                    canvas, font, first_line, style, color, left, baseline, clip,
                );
            }
        }

        Ok(())
    }

    /// Look up or rebuild the single-slot cached format.
    fn format_for(&mut self, style: &TextStyle, font_key: String) -> EngineResult<TextFormat> {
        let key = FormatKey::of(style);
        if let Some(cached) = &self.cached_format {
            if cached.key == key && cached.font_key == font_key {
                return Ok(cached.clone());
            }
        }

        let size = if style.size > 0.0 { style.size } else { 48.0 };
        let font = self
            .fonts
            .get(&font_key)
            .ok_or_else(|| EngineError::Render(format!("font '{}' disappeared", font_key)))?;

        let (ascent, natural_line) = match font.horizontal_line_metrics(size) {
            Some(m) => (m.ascent, m.new_line_size),
            None => (size * 0.8, size * 1.2),
        };
        let line_spacing = if style.line_height > 0.0 {
            size * style.line_height
        } else {
            natural_line
        };

        let format = TextFormat {
            key,
            font_key,
            line_spacing,
            ascent,
        };
        debug!(
            family = %style.family,
            size, "rebuilt cached text format"
        );
        self.cached_format = Some(format.clone());
        Ok(format)
    }

    /// Pick the best registered face for a style: exact variant first,
    /// then progressively plainer faces of the same family.
    fn resolve_font_key(&self, style: &TextStyle) -> Option<String> {
        let candidates = [
            font_key(&style.family, style.bold, style.italic),
            font_key(&style.family, style.bold, false),
            font_key(&style.family, false, style.italic),
            font_key(&style.family, false, false),
        ];
        for key in candidates {
            if self.fonts.contains_key(&key) {
                return Some(key);
            }
        }
        // Any face beats no text at all.
        self.fonts.keys().next().cloned()
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn font_key(family: &str, bold: bool, italic: bool) -> String {
    match (bold, italic) {
        (false, false) => family.to_string(),
        (true, false) => format!("{}/bold", family),
        (false, true) => format!("{}/italic", family),
        (true, true) => format!("{}/bold-italic", family),
    }
}

/// Split and measure the text into lines. Fails on a degenerate layout
/// rect, which sends the caller down the simple fallback path.
fn layout_lines(
    font: &Font,
    text: &str,
    style: &TextStyle,
    rect_width: f32,
) -> Result<Vec<LayoutLine>, EngineError> {
    if rect_width <= 0.0 || !rect_width.is_finite() {
        return Err(EngineError::TextLayout(format!(
            "layout rect width {} is unusable",
            rect_width
        )));
    }

    let size = if style.size > 0.0 { style.size } else { 48.0 };
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut width = 0.0f32;
        for ch in raw.chars() {
            let metrics = font.metrics(ch, size);
            width += metrics.advance_width + style.letter_spacing;
        }
        lines.push(LayoutLine {
            text: raw.to_string(),
            width,
        });
    }
    Ok(lines)
}

/// Rasterize one line at a baseline position.
#[allow(clippy::too_many_arguments)]
fn draw_line(
    canvas: &mut Surface,
    font: &Font,
    text: &str,
    style: &TextStyle,
    color: [u8; 4],
    left: f32,
    baseline: f32,
    clip: Option<(&ClipShape, MaskMode)>,
) {
    let size = if style.size > 0.0 { style.size } else { 48.0 };
    let mut cursor = left;

    for ch in text.chars() {
        let (metrics, bitmap) = font.rasterize(ch, size);
        let glyph_left = cursor + metrics.xmin as f32;
        let glyph_top = baseline - (metrics.height as i32 + metrics.ymin) as f32;

        for gy in 0..metrics.height {
            for gx in 0..metrics.width {
                let coverage = bitmap[gy * metrics.width + gx];
                if coverage == 0 {
                    continue;
                }

                let px = glyph_left + gx as f32;
                let py = glyph_top + gy as f32;
                if px < 0.0 || py < 0.0 {
                    continue;
                }

                let coverage = match style.antialias {
                    TextAntialias::Smooth => coverage as f32 / 255.0,
                    TextAntialias::Sharp => {
                        if coverage >= 128 {
                            1.0
                        } else {
                            continue;
                        }
                    }
                };

                let clip_coverage = match clip {
                    Some((shape, mode)) => shape.coverage(px + 0.5, py + 0.5, mode),
                    None => 1.0,
                };
                if clip_coverage <= 0.0 {
                    continue;
                }

                let alpha = color[3] as f32 / 255.0 * coverage * clip_coverage;
                if alpha <= 0.0 {
                    continue;
                }
                canvas.blend_pixel(
                    px as u32,
                    py as u32,
                    [color[0], color[1], color[2], (alpha * 255.0) as u8],
                );
            }
        }

        cursor += metrics.advance_width + style.letter_spacing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_layers::TextStyle;

    fn style(family: &str) -> TextStyle {
        TextStyle {
            family: family.to_string(),
            size: 24.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_draw_without_fonts_is_soft_noop() {
        let mut renderer = TextRenderer::new();
        let mut canvas = Surface::new(64, 64);
        let result = renderer.draw(
            &mut canvas,
            (0.0, 0.0, 64.0, 64.0),
            "Hello",
            &style("Missing"),
            [255, 255, 255, 255],
            None,
        );
        assert!(result.is_ok());
        // Nothing drawn.
        assert!(canvas.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_missing_font_fails() {
        let mut renderer = TextRenderer::new();
        let result = renderer.load_font("Nope", false, false, Path::new("/nonexistent/font.ttf"));
        assert!(result.is_err());
    }

    #[test]
    fn test_font_key_variants() {
        assert_eq!(font_key("Inter", false, false), "Inter");
        assert_eq!(font_key("Inter", true, false), "Inter/bold");
        assert_eq!(font_key("Inter", false, true), "Inter/italic");
        assert_eq!(font_key("Inter", true, true), "Inter/bold-italic");
    }

    #[test]
    fn test_rebuild_clears_cache() {
        let mut renderer = TextRenderer::new();
        renderer.cached_format = Some(TextFormat {
            key: FormatKey::of(&style("X")),
            font_key: "X".to_string(),
            line_spacing: 28.0,
            ascent: 20.0,
        });
        renderer.rebuild();
        assert!(renderer.cached_format.is_none());
    }

    #[test]
    fn test_format_key_changes_on_tuple_change() {
        let a = FormatKey::of(&style("A"));
        let mut s = style("A");
        s.line_height = 1.5;
        let b = FormatKey::of(&s);
        assert_ne!(a, b);
        // Letter spacing is a per-run property, not part of the format.
        let mut s2 = style("A");
        s2.letter_spacing = 3.0;
        assert_eq!(a, FormatKey::of(&s2));
    }
}
