//! PDF rendering modules for the report body
//!
//! This module handles all PDF-specific operations:
//! - Laying out text, tables and images onto generated pages
//! - Running the page-completion handler on every finished page
//! - Copying pages verbatim from attachment documents
//! - Measuring and encoding standard-font text

mod text;
mod writer;
mod xobject;

pub use text::{FontStyle, encode_win_ansi, text_width, unmappable_characters, wrap_text};
pub use writer::{PageWriter, save_document};
pub use xobject::{
    DecodedImage, ObjectCopier, decode_image, get_page_dimensions, get_page_rotation, import_page,
    source_page_ids, upright_to_user_matrix,
};

use crate::options::ReportOptions;
use crate::types::mm_to_pt;

/// Page size and margins of one page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    /// Geometry of a generated page
    pub fn from_options(options: &ReportOptions) -> Self {
        let (width, height) = options.paper_size.dimensions_pt();
        Self::with_margins(0.0, 0.0, width, height, options)
    }

    /// Geometry of an arbitrary page box with the report margins applied
    pub fn with_margins(
        origin_x: f32,
        origin_y: f32,
        width: f32,
        height: f32,
        options: &ReportOptions,
    ) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
            margin_top: mm_to_pt(options.margins.top_mm),
            margin_bottom: mm_to_pt(options.margins.bottom_mm),
            margin_left: mm_to_pt(options.margins.left_mm),
            margin_right: mm_to_pt(options.margins.right_mm),
        }
    }

    pub fn content_left(&self) -> f32 {
        self.origin_x + self.margin_left
    }

    pub fn content_right(&self) -> f32 {
        self.origin_x + self.width - self.margin_right
    }

    pub fn content_top(&self) -> f32 {
        self.origin_y + self.height - self.margin_top
    }

    pub fn content_bottom(&self) -> f32 {
        self.origin_y + self.margin_bottom
    }

    pub fn content_width(&self) -> f32 {
        self.content_right() - self.content_left()
    }

    pub fn content_height(&self) -> f32 {
        self.content_top() - self.content_bottom()
    }

    pub fn center_x(&self) -> f32 {
        self.origin_x + self.width / 2.0
    }
}

/// Horizontal alignment of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// One line of text at an absolute baseline position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: FontStyle,
    pub size: f32,
}

impl PlacedText {
    /// Position `text` between `left` and `right` according to `alignment`.
    pub fn aligned(
        text: impl Into<String>,
        alignment: Alignment,
        left: f32,
        right: f32,
        y: f32,
        style: FontStyle,
        size: f32,
    ) -> Self {
        let text = text.into();
        let width = text_width(&text, style, size);
        let x = match alignment {
            Alignment::Left => left,
            Alignment::Center => left + (right - left - width) / 2.0,
            Alignment::Right => right - width,
        };
        Self {
            text,
            x,
            y,
            style,
            size,
        }
    }
}

/// Callback run once for every completed page of a document.
///
/// `page_number` is 1-based within the document being written. The returned
/// text is drawn on top of the page's own content.
pub trait PageEventHandler: Send {
    fn on_page_complete(&self, page_number: usize, geometry: &PageGeometry) -> Vec<PlacedText>;
}
