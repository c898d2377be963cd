//! A complete movie: header fields and the top-level record list.

use crate::codec::numeric::Fixed8;
use crate::model::datatypes::Bounds;
use crate::model::tag::MovieTag;

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub version: u8,
    /// The body after the 8-byte prefix is zlib-compressed.
    pub compressed: bool,
    /// Stage size in twips.
    pub frame_size: Bounds,
    /// Frames per second.
    pub frame_rate: Fixed8,
    pub frame_count: u16,
    /// Records in file order, without the terminating End record.
    pub tags: Vec<MovieTag>,
}

impl Movie {
    /// Creates an empty uncompressed movie with a 550x400 pixel stage at
    /// 12 frames per second.
    pub fn new(version: u8) -> Self {
        Self {
            version,
            compressed: false,
            frame_size: Bounds::new(0, 0, 11000, 8000),
            frame_rate: Fixed8(12 << 8),
            frame_count: 0,
            tags: Vec::new(),
        }
    }

    /// Returns the number of ShowFrame records on the main timeline.
    pub fn show_frames(&self) -> usize {
        self.tags.iter().filter(|tag| matches!(tag, MovieTag::ShowFrame)).count()
    }
}
