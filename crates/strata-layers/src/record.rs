//! The fixed-layout binary layer record.
//!
//! External callers drive the engine with a packed, versioned byte
//! layout whose size and field offsets are part of the contract: hosts
//! marshal the same struct from their side and both ends verify the
//! layout at startup. The rich [`crate::Layer`] representation is used
//! everywhere else; translation happens only at this boundary.

use bytemuck::{Pod, Zeroable};

/// Maximum number of layers in the table.
pub const MAX_LAYERS: usize = 64;
/// Maximum UTF-16 code units in the text content field.
pub const MAX_TEXT: usize = 1024;
/// Maximum UTF-16 code units in the font family field.
pub const MAX_FONT_NAME: usize = 64;
/// Maximum bytes in the texture path field.
pub const MAX_PATH: usize = 260;

/// One layer as exchanged across the external boundary.
///
/// 2832 bytes, no padding. Text fields are NUL-terminated UTF-16; the
/// path field is NUL-terminated UTF-8.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LayerRecord {
    // Basic info
    pub id: i32,
    pub active: i32,
    pub layer_type: i32,

    // Transform
    pub pos_x: f32,
    pub pos_y: f32,
    pub size_x: f32,
    pub size_y: f32,
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,

    // Appearance
    pub opacity: f32,
    pub color_r: f32,
    pub color_g: f32,
    pub color_b: f32,
    pub color_a: f32,

    // Source
    pub source_type: i32,
    pub texture_id: i32,
    pub shared_input_id: i32,

    // Texture (UV) transform
    pub tex_x: f32,
    pub tex_y: f32,
    pub tex_w: f32,
    pub tex_h: f32,
    pub tex_rot: f32,
    pub texture_locked: i32,

    // Text properties
    pub text_content: [u16; MAX_TEXT],
    pub font_family: [u16; MAX_FONT_NAME],
    pub font_size: f32,
    pub font_bold: i32,
    pub font_italic: i32,
    pub text_alignment: i32,
    pub line_height: f32,
    pub letter_spacing: f32,
    pub text_antialias_mode: i32,

    // Path
    pub texture_path: [u8; MAX_PATH],

    // Mask properties
    pub mask_mode: i32,
    pub masked_layer_count: i32,
    pub masked_layer_ids: [i32; MAX_LAYERS],
}

// The layout is the contract; a drift here breaks every host.
const _: () = assert!(std::mem::size_of::<LayerRecord>() == 2832);
const _: () = assert!(std::mem::align_of::<LayerRecord>() == 4);

impl LayerRecord {
    /// Total struct size in bytes.
    pub const STRUCT_SIZE: usize = std::mem::size_of::<LayerRecord>();

    pub const fn offset_pos_x() -> usize {
        std::mem::offset_of!(LayerRecord, pos_x)
    }

    pub const fn offset_size_x() -> usize {
        std::mem::offset_of!(LayerRecord, size_x)
    }

    pub const fn offset_opacity() -> usize {
        std::mem::offset_of!(LayerRecord, opacity)
    }

    pub const fn offset_text_content() -> usize {
        std::mem::offset_of!(LayerRecord, text_content)
    }

    /// A zeroed record: inactive rectangle at the origin.
    pub fn zeroed() -> Self {
        Zeroable::zeroed()
    }

    /// Decode the NUL-terminated UTF-16 text content.
    pub fn text(&self) -> String {
        decode_utf16_field(&self.text_content)
    }

    /// Store text content, truncating to the field capacity (keeping one
    /// slot for the terminator).
    pub fn set_text(&mut self, text: &str) {
        encode_utf16_field(text, &mut self.text_content);
    }

    /// Decode the NUL-terminated UTF-16 font family name.
    pub fn font_family_name(&self) -> String {
        decode_utf16_field(&self.font_family)
    }

    pub fn set_font_family(&mut self, family: &str) {
        encode_utf16_field(family, &mut self.font_family);
    }

    /// Decode the NUL-terminated UTF-8 texture path.
    pub fn path(&self) -> String {
        let end = self
            .texture_path
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_PATH);
        String::from_utf8_lossy(&self.texture_path[..end]).into_owned()
    }

    pub fn set_path(&mut self, path: &str) {
        self.texture_path = [0u8; MAX_PATH];
        let bytes = path.as_bytes();
        let len = bytes.len().min(MAX_PATH - 1);
        self.texture_path[..len].copy_from_slice(&bytes[..len]);
    }

    /// The mask target ids, bounded by the declared count and the field
    /// capacity.
    pub fn mask_targets(&self) -> &[i32] {
        let count = self.masked_layer_count.clamp(0, MAX_LAYERS as i32) as usize;
        &self.masked_layer_ids[..count]
    }

    pub fn set_mask_targets(&mut self, targets: &[i32]) {
        self.masked_layer_ids = [0i32; MAX_LAYERS];
        let len = targets.len().min(MAX_LAYERS);
        self.masked_layer_ids[..len].copy_from_slice(&targets[..len]);
        self.masked_layer_count = len as i32;
    }

    /// View the record as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reinterpret a byte slice as a record. Returns None when the
    /// length or alignment does not match.
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        bytemuck::try_from_bytes(bytes).ok()
    }
}

impl Default for LayerRecord {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for LayerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRecord")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("layer_type", &self.layer_type)
            .field("pos", &(self.pos_x, self.pos_y))
            .field("size", &(self.size_x, self.size_y))
            .field("opacity", &self.opacity)
            .field("source_type", &self.source_type)
            .field("text", &self.text())
            .field("masked_layer_count", &self.masked_layer_count)
            .finish_non_exhaustive()
    }
}

fn decode_utf16_field(field: &[u16]) -> String {
    let end = field.iter().position(|&c| c == 0).unwrap_or(field.len());
    String::from_utf16_lossy(&field[..end])
}

fn encode_utf16_field(text: &str, field: &mut [u16]) {
    field.fill(0);
    let limit = field.len() - 1;
    for (slot, unit) in field[..limit].iter_mut().zip(text.encode_utf16()) {
        *slot = unit;
    }
}
