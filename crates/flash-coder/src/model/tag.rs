//! Top-level movie records.
//!
//! Each record is framed by a header holding its type code and body length.

use crate::model::action::Action;
use crate::model::datatypes::{Bounds, Color, ColorTransform, CoordTransform};
use crate::model::filter::Filter;
use crate::model::shape::ShapeWithStyle;

/// Record type codes.
pub mod codes {
    pub const END: u16 = 0;
    pub const SHOW_FRAME: u16 = 1;
    pub const DEFINE_SHAPE: u16 = 2;
    pub const SET_BACKGROUND_COLOR: u16 = 9;
    pub const DO_ACTION: u16 = 12;
    pub const DEFINE_BITS_LOSSLESS: u16 = 20;
    pub const DEFINE_SHAPE2: u16 = 22;
    pub const PROTECT: u16 = 24;
    pub const PLACE_OBJECT2: u16 = 26;
    pub const REMOVE_OBJECT2: u16 = 28;
    pub const DEFINE_SHAPE3: u16 = 32;
    pub const DEFINE_BITS_LOSSLESS2: u16 = 36;
    pub const DEFINE_SPRITE: u16 = 39;
    pub const FRAME_LABEL: u16 = 43;
    pub const EXPORT_ASSETS: u16 = 56;
    pub const DO_INIT_ACTION: u16 = 59;
    pub const SCRIPT_LIMITS: u16 = 65;
    pub const FILE_ATTRIBUTES: u16 = 69;
    pub const PLACE_OBJECT3: u16 = 70;
    pub const METADATA: u16 = 77;
    pub const DEFINE_SCENE_AND_FRAME_LABEL_DATA: u16 = 86;
}

/// Generation of a shape definition, which fixes its color and style
/// array layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeVersion {
    /// RGB colors, style arrays of at most 255 entries.
    V1,
    /// RGB colors, style arrays may escape to 16-bit counts.
    V2,
    /// RGBA colors, style arrays may escape to 16-bit counts.
    V3,
}

impl ShapeVersion {
    pub fn code(&self) -> u16 {
        match self {
            ShapeVersion::V1 => codes::DEFINE_SHAPE,
            ShapeVersion::V2 => codes::DEFINE_SHAPE2,
            ShapeVersion::V3 => codes::DEFINE_SHAPE3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineShape {
    pub version: ShapeVersion,
    pub id: u16,
    pub bounds: Bounds,
    pub shape: ShapeWithStyle,
}

/// Pixel layout of a lossless bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ImageFormat {
    /// 8-bit indices into a color table.
    Indexed = 3,
    /// 15-bit RGB (not valid with alpha).
    Rgb15 = 4,
    /// 32-bit pixels: padding/alpha then RGB.
    Rgb32 = 5,
}

impl ImageFormat {
    pub fn from_u8(v: u8) -> Option<ImageFormat> {
        match v {
            3 => Some(ImageFormat::Indexed),
            4 => Some(ImageFormat::Rgb15),
            5 => Some(ImageFormat::Rgb32),
            _ => None,
        }
    }
}

/// A zlib-compressed lossless bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineImage {
    /// True for the variant whose pixels carry alpha.
    pub alpha: bool,
    pub id: u16,
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    /// Number of color table entries minus one, for indexed images.
    pub table_size: Option<u8>,
    /// zlib-compressed color table and pixel data.
    pub data: Vec<u8>,
}

/// How PlaceObject changes the display list at its depth.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceObject {
    /// True for the PlaceObject3 layout.
    pub extended: bool,
    /// Modifies the object already at `depth`.
    pub is_move: bool,
    pub depth: u16,
    pub character: Option<u16>,
    pub class_name: Option<String>,
    pub transform: Option<CoordTransform>,
    pub color_transform: Option<ColorTransform>,
    pub ratio: Option<u16>,
    pub name: Option<String>,
    pub clip_depth: Option<u16>,
    pub filters: Option<Vec<Filter>>,
    pub blend_mode: Option<u8>,
    pub cache_as_bitmap: Option<u8>,
    pub visible: Option<u8>,
    pub background: Option<Color>,
    /// The character is a bitmap placed by class name.
    pub has_image: bool,
    pub clip_actions: Option<ClipActions>,
}

/// Event handlers attached to a placed sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipActions {
    /// Union of the events of all handlers.
    pub all_events: u32,
    pub handlers: Vec<ClipEventHandler>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipEventHandler {
    /// Event flags, most significant bit first: key up, key down, mouse up,
    /// mouse down, mouse move, unload, enter frame, load, drag over, roll
    /// out, roll over, release outside, release, press, initialize, data,
    /// then (from version 6) five reserved bits, construct, key press and
    /// drag out.
    pub events: u32,
    /// Key code, present only when the key press event is set.
    pub key_code: Option<u8>,
    pub actions: Vec<Action>,
}

impl ClipEventHandler {
    /// Key press flag in the 32-bit event layout.
    pub const KEY_PRESS: u32 = 0x0000_0200;
}

/// A named frame, optionally a named anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLabel {
    pub name: String,
    pub anchor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefineSprite {
    pub id: u16,
    pub frame_count: u16,
    /// Control records of the sprite's timeline, without the End record.
    pub tags: Vec<MovieTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneData {
    /// Scenes as (first frame, name).
    pub scenes: Vec<(u32, String)>,
    /// Frame labels as (frame, label).
    pub labels: Vec<(u32, String)>,
}

/// A top-level movie record.
#[derive(Debug, Clone, PartialEq)]
pub enum MovieTag {
    ShowFrame,
    DefineShape(DefineShape),
    SetBackgroundColor(Color),
    DoAction(Vec<Action>),
    DefineImage(DefineImage),
    /// Optional password hash.
    Protect(Option<String>),
    PlaceObject(PlaceObject),
    RemoveObject {
        depth: u16,
    },
    DefineSprite(DefineSprite),
    FrameLabel(FrameLabel),
    ExportAssets(Vec<(u16, String)>),
    DoInitAction {
        sprite_id: u16,
        actions: Vec<Action>,
    },
    ScriptLimits {
        max_recursion: u16,
        timeout_seconds: u16,
    },
    FileAttributes(u32),
    Metadata(String),
    SceneData(SceneData),
    /// A record without a registered decoder, kept verbatim.
    Unknown {
        code: u16,
        data: Vec<u8>,
        /// The record used the extended header form.
        extended: bool,
    },
}

impl MovieTag {
    /// Returns the record type code for wire encoding.
    pub fn code(&self) -> u16 {
        match self {
            MovieTag::ShowFrame => codes::SHOW_FRAME,
            MovieTag::DefineShape(shape) => shape.version.code(),
            MovieTag::SetBackgroundColor(_) => codes::SET_BACKGROUND_COLOR,
            MovieTag::DoAction(_) => codes::DO_ACTION,
            MovieTag::DefineImage(image) if image.alpha => codes::DEFINE_BITS_LOSSLESS2,
            MovieTag::DefineImage(_) => codes::DEFINE_BITS_LOSSLESS,
            MovieTag::Protect(_) => codes::PROTECT,
            MovieTag::PlaceObject(place) if place.extended => codes::PLACE_OBJECT3,
            MovieTag::PlaceObject(_) => codes::PLACE_OBJECT2,
            MovieTag::RemoveObject { .. } => codes::REMOVE_OBJECT2,
            MovieTag::DefineSprite(_) => codes::DEFINE_SPRITE,
            MovieTag::FrameLabel(_) => codes::FRAME_LABEL,
            MovieTag::ExportAssets(_) => codes::EXPORT_ASSETS,
            MovieTag::DoInitAction { .. } => codes::DO_INIT_ACTION,
            MovieTag::ScriptLimits { .. } => codes::SCRIPT_LIMITS,
            MovieTag::FileAttributes(_) => codes::FILE_ATTRIBUTES,
            MovieTag::Metadata(_) => codes::METADATA,
            MovieTag::SceneData(_) => codes::DEFINE_SCENE_AND_FRAME_LABEL_DATA,
            MovieTag::Unknown { code, .. } => *code,
        }
    }

    /// Returns the character id for records that define a character.
    pub fn character_id(&self) -> Option<u16> {
        match self {
            MovieTag::DefineShape(shape) => Some(shape.id),
            MovieTag::DefineImage(image) => Some(image.id),
            MovieTag::DefineSprite(sprite) => Some(sprite.id),
            _ => None,
        }
    }

    /// Returns true if the record must use the extended header even when
    /// its body is shorter than the escape value.
    pub fn requires_extended_header(&self) -> bool {
        match self {
            MovieTag::DefineImage(_) => true,
            MovieTag::Unknown { extended, .. } => *extended,
            _ => false,
        }
    }

    /// Returns true if the record may appear on a sprite's timeline.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            MovieTag::ShowFrame
                | MovieTag::PlaceObject(_)
                | MovieTag::RemoveObject { .. }
                | MovieTag::DoAction(_)
                | MovieTag::FrameLabel(_)
                | MovieTag::Unknown { .. }
        )
    }
}
