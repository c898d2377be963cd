//! Data model types for movies and media files.
//!
//! - Geometry, colors and gradients
//! - Shapes, fill and line styles
//! - Filters
//! - Actions
//! - Movie records and the movie itself
//! - Media container tags

pub mod action;
pub mod datatypes;
pub mod filter;
pub mod media;
pub mod movie;
pub mod shape;
pub mod tag;

pub use action::{Action, BasicAction, DefineFunction, PushValue};
pub use datatypes::{
    Bounds, Color, ColorTransform, CoordTransform, Gradient, GradientRecord, Interpolation, Spread,
};
pub use filter::{
    BevelFilter, BlurFilter, ConvolutionFilter, DropShadowFilter, Filter, FilterMode,
    GlowFilter, GradientFilter,
};
pub use media::{AmfValue, AudioData, FlvBody, FlvFile, FlvTag, VideoData};
pub use movie::Movie;
pub use shape::{
    BitmapFillKind, Curve, FillStyle, Line, LineStyle, ShapeRecord, ShapeStyleChange,
    ShapeWithStyle,
};
pub use tag::{
    ClipActions, ClipEventHandler, DefineImage, DefineShape, DefineSprite, FrameLabel,
    ImageFormat, MovieTag, PlaceObject, SceneData, ShapeVersion,
};
