use crate::constants::{HEADER_LINE_SPACING, UNDECORATED_PAGES};
use crate::options::ReportOptions;
use crate::render::{Alignment, FontStyle, PageEventHandler, PageGeometry, PlacedText};
use crate::types::{ReportRequest, mm_to_pt};

/// Running header and footer of the body document.
///
/// The contents page and the external cover banner are left clean. Every
/// later page gets the subject's name and identifier at the top left, the
/// case reference at the top right and the classification marker centered
/// in the footer.
#[derive(Debug, Clone)]
pub struct HeaderFooter {
    name_line: String,
    identity_line: String,
    case_reference_line: String,
    classification_marker: String,
    font_size: f32,
    header_offset: f32,
    footer_offset: f32,
}

impl HeaderFooter {
    pub fn new(request: &ReportRequest, options: &ReportOptions) -> Self {
        Self {
            name_line: format!("Name: {}", request.subject_name),
            identity_line: request.identity_line(),
            case_reference_line: format!("Case Reference: {}", request.case_reference),
            classification_marker: options.classification_marker.clone(),
            font_size: options.header_font_size_pt,
            header_offset: mm_to_pt(options.header_offset_mm),
            footer_offset: mm_to_pt(options.footer_offset_mm),
        }
    }
}

impl PageEventHandler for HeaderFooter {
    fn on_page_complete(&self, page_number: usize, geometry: &PageGeometry) -> Vec<PlacedText> {
        if page_number <= UNDECORATED_PAGES {
            return Vec::new();
        }

        let (left, right) = (geometry.content_left(), geometry.content_right());
        let size = self.font_size;
        let lower_line = geometry.content_top() + self.header_offset;
        let upper_line = lower_line + size * HEADER_LINE_SPACING;
        let footer_line = geometry.content_bottom() - self.footer_offset;

        let mut placed = vec![
            PlacedText::aligned(
                &self.name_line,
                Alignment::Left,
                left,
                right,
                upper_line,
                FontStyle::Bold,
                size,
            ),
            PlacedText::aligned(
                &self.case_reference_line,
                Alignment::Right,
                left,
                right,
                upper_line,
                FontStyle::Bold,
                size,
            ),
        ];
        if !self.identity_line.is_empty() {
            placed.push(PlacedText::aligned(
                &self.identity_line,
                Alignment::Left,
                left,
                right,
                lower_line,
                FontStyle::Regular,
                size,
            ));
        }
        placed.push(PlacedText::aligned(
            &self.classification_marker,
            Alignment::Center,
            left,
            right,
            footer_line,
            FontStyle::Bold,
            size,
        ));
        placed
    }
}
