//! Media container (FLV) types.

/// A media file: header flags plus interleaved audio, video and script
/// tags.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvFile {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    /// Flag bits other than audio and video, kept as read.
    pub reserved_flags: u8,
    /// Bytes between the 9-byte header and the declared data offset.
    pub header_extra: Vec<u8>,
    /// Size field preceding the first tag, normally 0.
    pub first_previous_size: u32,
    pub tags: Vec<FlvTag>,
}

impl Default for FlvFile {
    fn default() -> Self {
        Self {
            version: 1,
            has_audio: false,
            has_video: false,
            reserved_flags: 0,
            header_extra: Vec::new(),
            first_previous_size: 0,
            tags: Vec::new(),
        }
    }
}

/// Media tag type codes.
pub mod tag_types {
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const SCRIPT: u8 = 18;
}

/// One tag of a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvTag {
    /// Milliseconds from the start of the file.
    pub timestamp: u32,
    /// 24-bit stream id, always 0 in practice.
    pub stream_id: u32,
    pub body: FlvBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlvBody {
    Audio(AudioData),
    Video(VideoData),
    Script(Vec<AmfValue>),
    /// A tag without a registered decoder, kept verbatim.
    Unknown { tag_type: u8, data: Vec<u8> },
}

impl FlvBody {
    pub fn tag_type(&self) -> u8 {
        match self {
            FlvBody::Audio(_) => tag_types::AUDIO,
            FlvBody::Video(_) => tag_types::VIDEO,
            FlvBody::Script(_) => tag_types::SCRIPT,
            FlvBody::Unknown { tag_type, .. } => *tag_type,
        }
    }
}

/// An audio packet. The codec payload is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    /// Sound format, 4 bits.
    pub format: u8,
    /// Sample rate code, 2 bits (5.5, 11, 22 or 44 kHz).
    pub rate: u8,
    pub sixteen_bit: bool,
    pub stereo: bool,
    pub data: Vec<u8>,
}

/// A video packet. The codec payload is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoData {
    /// Frame type, 4 bits (1 = key frame).
    pub frame_type: u8,
    /// Codec id, 4 bits.
    pub codec: u8,
    pub data: Vec<u8>,
}

/// A script data value.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    Bool(bool),
    String(String),
    Object(Vec<(String, AmfValue)>),
    Null,
    Undefined,
    /// Associative array; `count` is the length hint stored before the
    /// entries.
    EcmaArray {
        count: u32,
        entries: Vec<(String, AmfValue)>,
    },
    StrictArray(Vec<AmfValue>),
    Date {
        millis: f64,
        timezone: i16,
    },
    LongString(String),
}

impl AmfValue {
    pub fn marker(&self) -> u8 {
        match self {
            AmfValue::Number(_) => 0,
            AmfValue::Bool(_) => 1,
            AmfValue::String(_) => 2,
            AmfValue::Object(_) => 3,
            AmfValue::Null => 5,
            AmfValue::Undefined => 6,
            AmfValue::EcmaArray { .. } => 8,
            AmfValue::StrictArray(_) => 10,
            AmfValue::Date { .. } => 11,
            AmfValue::LongString(_) => 12,
        }
    }
}
