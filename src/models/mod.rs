//! Data model shared by the segmentation pipeline.

mod geometry;
mod layout;
mod page;
mod question;
mod text_line;

pub use geometry::Rect;
pub use layout::{ColumnBoundary, HorizontalGap, LayoutInfo, TextBlock};
pub use page::{PageImage, PixelFormat};
pub use question::{
    OptionBlock, OptionLabel, OptionMatch, OptionRegion, PatternKind, Question,
    QuestionBoundaryResult, QuestionStart, Subject,
};
pub use text_line::{reading_order, TextLine};
