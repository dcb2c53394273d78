//! Internal cover page
//!
//! The cover is a separate single-page document generated after the body,
//! because it prints the final page total. It is laid out by the same
//! `PageWriter` as the body, so names print with the same font encoding on
//! both.

use crate::constants::total_pages_line;
use crate::options::ReportOptions;
use crate::render::{Alignment, FontStyle, PageWriter, save_document};
use crate::types::{ReportError, ReportRequest, Result, format_date};
use chrono::NaiveDate;

/// Fraction of the content height above the first cover line
const COVER_TOP_OFFSET: f32 = 0.22;

/// Extra gap before the classification lines, in body lines
const CLASSIFICATION_GAP_LINES: f32 = 3.0;

/// One centered line of the cover page
#[derive(Debug, Clone, PartialEq)]
pub struct CoverLine {
    pub text: String,
    pub style: FontStyle,
    pub size: f32,
    /// Start of the trailing classification block
    pub classification: bool,
}

impl CoverLine {
    fn new(text: impl Into<String>, style: FontStyle, size: f32) -> Self {
        Self {
            text: text.into(),
            style,
            size,
            classification: false,
        }
    }
}

/// The cover's text, top to bottom.
pub fn cover_lines(
    request: &ReportRequest,
    options: &ReportOptions,
    generated_on: NaiveDate,
    printed_total: usize,
) -> Vec<CoverLine> {
    let size = options.heading_font_size_pt;
    let mut lines = vec![
        CoverLine::new(&options.report_title, FontStyle::Bold, options.title_font_size_pt),
        CoverLine::new(format!("Name: {}", request.subject_name), FontStyle::Regular, size),
    ];

    let identity = request.identity_line();
    if !identity.is_empty() {
        lines.push(CoverLine::new(identity, FontStyle::Regular, size));
    }

    lines.extend([
        CoverLine::new(
            format!("Case Reference: {}", request.case_reference),
            FontStyle::Regular,
            size,
        ),
        CoverLine::new(request.date_range_line(), FontStyle::Regular, size),
        CoverLine::new(
            format!("Report generation date: {}", format_date(generated_on)),
            FontStyle::Regular,
            size,
        ),
        CoverLine::new(total_pages_line(printed_total), FontStyle::Regular, size),
        CoverLine {
            classification: true,
            ..CoverLine::new(&options.internal_marker, FontStyle::Bold, size)
        },
        CoverLine::new(&options.classification_marker, FontStyle::Bold, size),
    ]);
    lines
}

/// Render the single cover page.
pub(crate) fn build_cover(
    request: &ReportRequest,
    options: &ReportOptions,
    generated_on: NaiveDate,
    printed_total: usize,
) -> Result<Vec<u8>> {
    let mut writer = PageWriter::new(options);
    writer.begin_page()?;
    writer.write_spacer(writer.geometry().content_height() * COVER_TOP_OFFSET)?;

    for line in cover_lines(request, options, generated_on, printed_total) {
        if line.classification {
            writer.write_spacer(line.size * options.line_spacing * CLASSIFICATION_GAP_LINES)?;
        }
        writer.write_line(&line.text, line.style, line.size, Alignment::Center)?;
        writer.write_spacer(line.size * 0.5)?;
    }

    if writer.page_count() != 1 {
        return Err(ReportError::Layout(
            "Cover text does not fit on one page".to_string(),
        ));
    }

    let mut document = writer.finish()?;
    save_document(&mut document)
}
