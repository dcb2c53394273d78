pub mod html;
pub mod render;
pub mod report;
mod constants;
mod header_footer;
mod io;
mod options;
mod source;
mod stats;
mod types;

pub use constants::{
    ATTACHMENTS_HEADING, CONTENTS_TITLE, END_OF_REPORT, NO_DATA_HELD, printed_total,
    total_pages_line,
};
pub use header_footer::HeaderFooter;
pub use io::{load_pdf, page_text, save_report};
pub use options::*;
pub use report::{CoverLine, ReportAssembler, cover_lines};
pub use source::*;
pub use stats::{AssemblyState, ReportSummary, SectionMetrics};
pub use types::*;
