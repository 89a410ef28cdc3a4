//! The rich in-engine layer representation.
//!
//! [`LayerRecord`] is a byte-layout contract; [`Layer`] is what the
//! renderer actually consumes. The enums here are total: unknown raw
//! values decode to a defined variant instead of failing, because a bad
//! layer must never abort a frame.

use strata_core::Color;

use crate::record::LayerRecord;

/// What a layer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Rectangle,
    Circle,
    Text,
    Image,
    Video,
    Mask,
    Group,
}

impl LayerKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => LayerKind::Circle,
            2 => LayerKind::Text,
            3 => LayerKind::Image,
            4 => LayerKind::Video,
            5 => LayerKind::Mask,
            6 => LayerKind::Group,
            _ => LayerKind::Rectangle,
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            LayerKind::Rectangle => 0,
            LayerKind::Circle => 1,
            LayerKind::Text => 2,
            LayerKind::Image => 3,
            LayerKind::Video => 4,
            LayerKind::Mask => 5,
            LayerKind::Group => 6,
        }
    }
}

/// Where a quad layer's pixels come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// No texture; the tint color fills the quad.
    Solid,
    /// A connected shared-texture input.
    SharedInput,
    /// A loaded image file.
    Image,
    /// A decoded video frame.
    Video,
}

impl SourceKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SourceKind::SharedInput,
            2 => SourceKind::Image,
            3 => SourceKind::Video,
            _ => SourceKind::Solid,
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            SourceKind::Solid => 0,
            SourceKind::SharedInput => 1,
            SourceKind::Image => 2,
            SourceKind::Video => 3,
        }
    }
}

/// Whether a mask shows the area inside or outside its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    Inner,
    Outer,
}

impl MaskMode {
    pub fn from_raw(raw: i32) -> Self {
        if raw == 1 {
            MaskMode::Outer
        } else {
            MaskMode::Inner
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            MaskMode::Inner => 0,
            MaskMode::Outer => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => TextAlign::Center,
            2 => TextAlign::Right,
            _ => TextAlign::Left,
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            TextAlign::Left => 0,
            TextAlign::Center => 1,
            TextAlign::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAntialias {
    /// Grayscale coverage antialiasing.
    Smooth,
    /// Hard-thresholded coverage (aliased).
    Sharp,
}

impl TextAntialias {
    pub fn from_raw(raw: i32) -> Self {
        if raw == 1 {
            TextAntialias::Sharp
        } else {
            TextAntialias::Smooth
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            TextAntialias::Smooth => 0,
            TextAntialias::Sharp => 1,
        }
    }
}

/// Spatial placement of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Center position in canvas pixels.
    pub pos_x: f32,
    pub pos_y: f32,
    /// Size in canvas pixels.
    pub size_x: f32,
    pub size_y: f32,
    /// Rotation around each axis, degrees.
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    /// Normalized anchor point, 0.5 = center.
    pub anchor_x: f32,
    pub anchor_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos_x: 0.0,
            pos_y: 0.0,
            size_x: 0.0,
            size_y: 0.0,
            rot_x: 0.0,
            rot_y: 0.0,
            rot_z: 0.0,
            anchor_x: 0.5,
            anchor_y: 0.5,
        }
    }
}

/// Opacity and tint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub opacity: f32,
    pub color: Color,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            color: Color::WHITE,
        }
    }
}

/// Sub-rect and rotation applied to texture coordinates before sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation about the sub-rect center, degrees.
    pub rotation: f32,
}

impl UvTransform {
    /// No offset, full-extent scale, no rotation.
    pub fn identity() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.offset_x == 0.0
            && self.offset_y == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.rotation == 0.0
    }
}

/// Font and paragraph settings for a text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub alignment: TextAlign,
    /// Line spacing as a multiple of font size; 0 = font default.
    pub line_height: f32,
    /// Extra advance per glyph, pixels.
    pub letter_spacing: f32,
    pub antialias: TextAntialias,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: String::new(),
            size: 48.0,
            bold: false,
            italic: false,
            alignment: TextAlign::Left,
            line_height: 0.0,
            letter_spacing: 0.0,
            antialias: TextAntialias::Smooth,
        }
    }
}

/// Mask mode plus the ids of the layers this mask clips.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaskSettings {
    pub mode: MaskMode,
    pub targets: Vec<i32>,
}

impl Default for MaskMode {
    fn default() -> Self {
        MaskMode::Inner
    }
}

/// One visual element, fully decoded from its boundary record.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: i32,
    pub active: bool,
    pub kind: LayerKind,
    pub transform: Transform,
    pub appearance: Appearance,
    pub source: SourceKind,
    pub texture_id: i32,
    pub shared_input_id: i32,
    pub uv: UvTransform,
    pub text: String,
    pub text_style: TextStyle,
    pub texture_path: String,
    pub mask: MaskSettings,
}

impl Layer {
    /// A default inactive rectangle.
    pub fn new(id: i32) -> Self {
        Self {
            id,
            active: false,
            kind: LayerKind::Rectangle,
            transform: Transform::default(),
            appearance: Appearance::default(),
            source: SourceKind::Solid,
            texture_id: 0,
            shared_input_id: 0,
            uv: UvTransform::identity(),
            text: String::new(),
            text_style: TextStyle::default(),
            texture_path: String::new(),
            mask: MaskSettings::default(),
        }
    }

    /// Encode back into the boundary layout.
    pub fn to_record(&self) -> LayerRecord {
        let mut r = LayerRecord::zeroed();
        r.id = self.id;
        r.active = self.active as i32;
        r.layer_type = self.kind.as_raw();
        r.pos_x = self.transform.pos_x;
        r.pos_y = self.transform.pos_y;
        r.size_x = self.transform.size_x;
        r.size_y = self.transform.size_y;
        r.rot_x = self.transform.rot_x;
        r.rot_y = self.transform.rot_y;
        r.rot_z = self.transform.rot_z;
        r.anchor_x = self.transform.anchor_x;
        r.anchor_y = self.transform.anchor_y;
        r.opacity = self.appearance.opacity;
        r.color_r = self.appearance.color.r;
        r.color_g = self.appearance.color.g;
        r.color_b = self.appearance.color.b;
        r.color_a = self.appearance.color.a;
        r.source_type = self.source.as_raw();
        r.texture_id = self.texture_id;
        r.shared_input_id = self.shared_input_id;
        r.tex_x = self.uv.offset_x;
        r.tex_y = self.uv.offset_y;
        r.tex_w = self.uv.scale_x;
        r.tex_h = self.uv.scale_y;
        r.tex_rot = self.uv.rotation;
        r.set_text(&self.text);
        r.set_font_family(&self.text_style.family);
        r.font_size = self.text_style.size;
        r.font_bold = self.text_style.bold as i32;
        r.font_italic = self.text_style.italic as i32;
        r.text_alignment = self.text_style.alignment.as_raw();
        r.line_height = self.text_style.line_height;
        r.letter_spacing = self.text_style.letter_spacing;
        r.text_antialias_mode = self.text_style.antialias.as_raw();
        r.set_path(&self.texture_path);
        r.mask_mode = self.mask.mode.as_raw();
        r.set_mask_targets(&self.mask.targets);
        r
    }
}

impl From<&LayerRecord> for Layer {
    fn from(r: &LayerRecord) -> Self {
        Self {
            id: r.id,
            active: r.active != 0,
            kind: LayerKind::from_raw(r.layer_type),
            transform: Transform {
                pos_x: r.pos_x,
                pos_y: r.pos_y,
                size_x: r.size_x,
                size_y: r.size_y,
                rot_x: r.rot_x,
                rot_y: r.rot_y,
                rot_z: r.rot_z,
                anchor_x: r.anchor_x,
                anchor_y: r.anchor_y,
            },
            appearance: Appearance {
                opacity: r.opacity,
                color: Color::rgba(r.color_r, r.color_g, r.color_b, r.color_a),
            },
            source: SourceKind::from_raw(r.source_type),
            texture_id: r.texture_id,
            shared_input_id: r.shared_input_id,
            uv: UvTransform {
                offset_x: r.tex_x,
                offset_y: r.tex_y,
                scale_x: r.tex_w,
                scale_y: r.tex_h,
                rotation: r.tex_rot,
            },
            text: r.text(),
            text_style: TextStyle {
                family: r.font_family_name(),
                size: r.font_size,
                bold: r.font_bold != 0,
                italic: r.font_italic != 0,
                alignment: TextAlign::from_raw(r.text_alignment),
                line_height: r.line_height,
                letter_spacing: r.letter_spacing,
                antialias: TextAntialias::from_raw(r.text_antialias_mode),
            },
            texture_path: r.path(),
            mask: MaskSettings {
                mode: MaskMode::from_raw(r.mask_mode),
                targets: r.mask_targets().to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_raw_round_trip() {
        for raw in 0..7 {
            assert_eq!(LayerKind::from_raw(raw).as_raw(), raw);
        }
        // Unknown values decode as Rectangle.
        assert_eq!(LayerKind::from_raw(99), LayerKind::Rectangle);
        assert_eq!(LayerKind::from_raw(-1), LayerKind::Rectangle);
    }

    #[test]
    fn test_record_round_trip() {
        let mut layer = Layer::new(12);
        layer.active = true;
        layer.kind = LayerKind::Text;
        layer.transform.pos_x = 960.0;
        layer.transform.pos_y = 540.0;
        layer.transform.size_x = 400.0;
        layer.transform.size_y = 120.0;
        layer.transform.rot_z = 45.0;
        layer.appearance.opacity = 0.75;
        layer.appearance.color = Color::rgba(0.2, 0.4, 0.6, 1.0);
        layer.text = "Lower Third".to_string();
        layer.text_style.family = "Arial".to_string();
        layer.text_style.alignment = TextAlign::Center;
        layer.text_style.letter_spacing = 1.5;
        layer.mask.mode = MaskMode::Outer;
        layer.mask.targets = vec![3, 7];

        let back = Layer::from(&layer.to_record());
        assert_eq!(back, layer);
    }

    #[test]
    fn test_uv_identity() {
        assert!(UvTransform::identity().is_identity());
        let mut uv = UvTransform::identity();
        uv.rotation = 10.0;
        assert!(!uv.is_identity());
    }
}
