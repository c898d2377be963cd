//! Semantic validation for movies.
//!
//! Decoding only checks structure: every record consumes exactly its
//! declared length. The checks here need the whole record list and catch
//! movies that decode cleanly but that a player would reject or misread.

use rustc_hash::FxHashSet;

use crate::error::ValidationError;
use crate::limits::FILE_ATTRIBUTES_VERSION;
use crate::model::movie::Movie;
use crate::model::tag::{MovieTag, codes};

/// Validates a decoded or hand-built movie.
///
/// Checks that:
/// - no character id is defined twice, sprites included
/// - the header frame count matches the ShowFrame records, per timeline
/// - sprites hold only control records
/// - FileAttributes comes first from version 8 on
pub fn validate_movie(movie: &Movie) -> Result<(), ValidationError> {
    if movie.version >= FILE_ATTRIBUTES_VERSION
        && !matches!(movie.tags.first(), Some(MovieTag::FileAttributes(_)))
    {
        return Err(ValidationError::FileAttributesNotFirst { version: movie.version });
    }

    let mut ids = FxHashSet::default();
    for tag in &movie.tags {
        if let Some(id) = tag.character_id() {
            if !ids.insert(id) {
                return Err(ValidationError::DuplicateCharacter { id });
            }
        }
        if let MovieTag::DefineSprite(sprite) = tag {
            validate_timeline(&sprite.tags, sprite.frame_count)?;
        }
    }

    check_frame_count(&movie.tags, movie.frame_count)
}

fn validate_timeline(tags: &[MovieTag], frame_count: u16) -> Result<(), ValidationError> {
    for tag in tags {
        let nested_sprite = matches!(tag, MovieTag::Unknown { code: codes::DEFINE_SPRITE, .. });
        if !tag.is_control() || nested_sprite {
            return Err(ValidationError::NotAllowedInSprite { code: tag.code() });
        }
    }
    check_frame_count(tags, frame_count)
}

fn check_frame_count(tags: &[MovieTag], declared: u16) -> Result<(), ValidationError> {
    let actual = tags.iter().filter(|tag| matches!(tag, MovieTag::ShowFrame)).count();
    if actual != declared as usize {
        return Err(ValidationError::FrameCountMismatch {
            declared,
            actual: actual.min(u16::MAX as usize) as u16,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::datatypes::{Bounds, Color};
    use crate::model::shape::ShapeWithStyle;
    use crate::model::tag::{DefineShape, DefineSprite, PlaceObject, ShapeVersion};

    fn shape(id: u16) -> MovieTag {
        MovieTag::DefineShape(DefineShape {
            version: ShapeVersion::V1,
            id,
            bounds: Bounds::default(),
            shape: ShapeWithStyle::default(),
        })
    }

    fn movie(tags: Vec<MovieTag>, frame_count: u16) -> Movie {
        let mut movie = Movie::new(8);
        movie.frame_count = frame_count;
        movie.tags = std::iter::once(MovieTag::FileAttributes(0)).chain(tags).collect();
        movie
    }

    #[test]
    fn test_valid_movie() {
        let sprite = MovieTag::DefineSprite(DefineSprite {
            id: 2,
            frame_count: 1,
            tags: vec![
                MovieTag::PlaceObject(PlaceObject { depth: 1, character: Some(1), ..PlaceObject::default() }),
                MovieTag::ShowFrame,
            ],
        });
        let movie = movie(vec![MovieTag::SetBackgroundColor(Color::WHITE), shape(1), sprite, MovieTag::ShowFrame], 1);
        assert_eq!(validate_movie(&movie), Ok(()));
    }

    #[test]
    fn test_duplicate_character() {
        let movie = movie(vec![shape(1), shape(1), MovieTag::ShowFrame], 1);
        assert_eq!(validate_movie(&movie), Err(ValidationError::DuplicateCharacter { id: 1 }));
    }

    #[test]
    fn test_frame_count_mismatch() {
        let movie = movie(vec![MovieTag::ShowFrame, MovieTag::ShowFrame], 1);
        assert_eq!(
            validate_movie(&movie),
            Err(ValidationError::FrameCountMismatch { declared: 1, actual: 2 })
        );
    }

    #[test]
    fn test_definition_inside_sprite() {
        let sprite = MovieTag::DefineSprite(DefineSprite {
            id: 2,
            frame_count: 0,
            tags: vec![shape(3)],
        });
        let movie = movie(vec![sprite], 0);
        assert_eq!(
            validate_movie(&movie),
            Err(ValidationError::NotAllowedInSprite { code: codes::DEFINE_SHAPE })
        );
    }

    #[test]
    fn test_nested_sprite_rejected() {
        let sprite = MovieTag::DefineSprite(DefineSprite {
            id: 2,
            frame_count: 0,
            tags: vec![MovieTag::Unknown { code: codes::DEFINE_SPRITE, data: vec![3, 0, 0, 0, 0, 0], extended: false }],
        });
        let movie = movie(vec![sprite], 0);
        assert_eq!(
            validate_movie(&movie),
            Err(ValidationError::NotAllowedInSprite { code: codes::DEFINE_SPRITE })
        );
    }

    #[test]
    fn test_file_attributes_position() {
        let mut late = Movie::new(8);
        late.tags = vec![MovieTag::SetBackgroundColor(Color::BLACK), MovieTag::FileAttributes(0)];
        assert_eq!(validate_movie(&late), Err(ValidationError::FileAttributesNotFirst { version: 8 }));

        let mut old = Movie::new(7);
        old.tags = vec![MovieTag::SetBackgroundColor(Color::BLACK)];
        assert_eq!(validate_movie(&old), Ok(()));
    }
}
