//! Fixed report wording and layout constants

/// Title of the contents page
pub const CONTENTS_TITLE: &str = "CONTENTS";

/// Sub-header printed above a service's attachments
pub const ATTACHMENTS_HEADING: &str = "Attachments";

/// Printed in place of a service section that has no content
pub const NO_DATA_HELD: &str = "No Data Held";

/// First line of the rear page
pub const END_OF_REPORT: &str = "End of Subject Access Request Report";

/// Pages at the start of the body that never carry a header or footer
/// (contents page and external cover banner).
pub const UNDECORATED_PAGES: usize = 2;

/// Pages the printed total adds on top of the body page count.
pub const PRINTED_TOTAL_EXTRA_PAGES: usize = 2;

/// Baseline distance between the two running header lines, in font sizes
pub const HEADER_LINE_SPACING: f32 = 1.2;

/// Bullet used on the contents page and for unordered list items
pub const BULLET: &str = "\u{2022}";

/// Indent per list nesting level, in points
pub const LIST_INDENT_PT: f32 = 14.0;

/// Inner padding of table cells, in points
pub const TABLE_CELL_PADDING_PT: f32 = 3.0;

/// Stroke width of table borders and rules, in points
pub const LINE_WIDTH_PT: f32 = 0.5;

/// Resource names of the standard fonts on every generated or decorated page
pub const REGULAR_FONT_NAME: &str = "SarF1";
pub const BOLD_FONT_NAME: &str = "SarF2";

/// Printed total for a body of `body_page_count` pages.
pub fn printed_total(body_page_count: usize) -> usize {
    body_page_count + PRINTED_TOTAL_EXTRA_PAGES
}

/// The "Total pages" line shared by the rear page and the cover.
pub fn total_pages_line(printed_total: usize) -> String {
    format!("Total pages: {}", printed_total)
}
