use crate::constants::HEADER_LINE_SPACING;
use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Page margins in millimetres. Headers and footers sit inside the top and
/// bottom margins.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PageMargins {
    pub top_mm: f32,
    pub bottom_mm: f32,
    pub left_mm: f32,
    pub right_mm: f32,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top_mm: 25.0,
            bottom_mm: 20.0,
            left_mm: 18.0,
            right_mm: 18.0,
        }
    }
}

impl PageMargins {
    /// Create uniform margins on all sides
    pub fn uniform(margin_mm: f32) -> Self {
        Self {
            top_mm: margin_mm,
            bottom_mm: margin_mm,
            left_mm: margin_mm,
            right_mm: margin_mm,
        }
    }
}

/// How image attachments are sized on their page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageScaling {
    /// Shrink images larger than the content area, keep smaller ones at 72 dpi
    #[default]
    ShrinkToFit,
    /// Scale every image up or down to fill the content area
    Fit,
}

/// Report layout configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReportOptions {
    pub paper_size: PaperSize,
    pub margins: PageMargins,

    // Typography
    pub body_font_size_pt: f32,
    pub table_font_size_pt: f32,
    pub heading_font_size_pt: f32,
    pub title_font_size_pt: f32,
    pub header_font_size_pt: f32,
    pub line_spacing: f32,

    // Running header and footer, measured from the content edge
    pub header_offset_mm: f32,
    pub footer_offset_mm: f32,

    // Fixed report text
    pub report_title: String,
    pub classification_marker: String,
    pub internal_marker: String,

    pub image_scaling: ImageScaling,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            margins: PageMargins::default(),
            body_font_size_pt: 10.0,
            table_font_size_pt: 9.0,
            heading_font_size_pt: 14.0,
            title_font_size_pt: 18.0,
            header_font_size_pt: 9.0,
            line_spacing: 1.3,
            header_offset_mm: 6.0,
            footer_offset_mm: 8.0,
            report_title: "SUBJECT ACCESS REQUEST REPORT".to_string(),
            classification_marker: "OFFICIAL-SENSITIVE".to_string(),
            internal_marker: "INTERNAL ONLY".to_string(),
            image_scaling: ImageScaling::ShrinkToFit,
        }
    }
}

impl ReportOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ReportError::Config(format!("Failed to parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReportError::Config(format!("Failed to serialize options: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        let (width_mm, height_mm) = self.paper_size.dimensions_mm();
        let m = &self.margins;
        let numbers = [
            ("paper width", width_mm),
            ("paper height", height_mm),
            ("top margin", m.top_mm),
            ("bottom margin", m.bottom_mm),
            ("left margin", m.left_mm),
            ("right margin", m.right_mm),
            ("body font size", self.body_font_size_pt),
            ("table font size", self.table_font_size_pt),
            ("heading font size", self.heading_font_size_pt),
            ("title font size", self.title_font_size_pt),
            ("header font size", self.header_font_size_pt),
            ("line spacing", self.line_spacing),
            ("header offset", self.header_offset_mm),
            ("footer offset", self.footer_offset_mm),
        ];
        if let Some((name, value)) = numbers.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ReportError::Config(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }

        if width_mm <= 0.0 || height_mm <= 0.0 {
            return Err(ReportError::Config(
                "Paper dimensions must be positive".to_string(),
            ));
        }

        if [m.top_mm, m.bottom_mm, m.left_mm, m.right_mm]
            .iter()
            .any(|v| *v < 0.0)
        {
            return Err(ReportError::Config("Margins cannot be negative".to_string()));
        }

        if m.left_mm + m.right_mm >= width_mm * 0.8 || m.top_mm + m.bottom_mm >= height_mm * 0.8 {
            return Err(ReportError::Config(format!(
                "Margins leave too little content area on a {}x{}mm page",
                width_mm, height_mm
            )));
        }

        let sizes = [
            ("body", self.body_font_size_pt),
            ("table", self.table_font_size_pt),
            ("heading", self.heading_font_size_pt),
            ("title", self.title_font_size_pt),
            ("header", self.header_font_size_pt),
        ];
        for (name, size) in sizes {
            if !(4.0..=72.0).contains(&size) {
                return Err(ReportError::Config(format!(
                    "{} font size must be between 4 and 72pt, got {}",
                    name, size
                )));
            }
        }

        if self.line_spacing < 1.0 {
            return Err(ReportError::Config(
                "Line spacing must be at least 1.0".to_string(),
            ));
        }

        if self.header_offset_mm < 0.0 || self.header_offset_mm >= m.top_mm {
            return Err(ReportError::Config(
                "Header offset must lie within the top margin".to_string(),
            ));
        }

        // Both header lines, ascenders included, sit inside the top margin
        let header_height =
            mm_to_pt(self.header_offset_mm) + 2.0 * self.header_font_size_pt * HEADER_LINE_SPACING;
        if header_height > mm_to_pt(m.top_mm) {
            return Err(ReportError::Config(format!(
                "Header needs {:.1}pt but the top margin is {:.1}pt",
                header_height,
                mm_to_pt(m.top_mm)
            )));
        }

        if self.footer_offset_mm < 0.0 || self.footer_offset_mm >= m.bottom_mm {
            return Err(ReportError::Config(
                "Footer offset must lie within the bottom margin".to_string(),
            ));
        }

        Ok(())
    }
}
