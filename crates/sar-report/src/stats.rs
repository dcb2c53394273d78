use crate::constants::printed_total;
use crate::html::Block;
use crate::render::unmappable_characters;

/// What one service contributed to the body document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionMetrics {
    pub service_name: String,
    /// 1-based body page on which the section starts
    pub first_page: usize,
    pub pages: usize,
    pub blocks: usize,
    pub characters: usize,
    pub table_rows: usize,
    pub attachments: usize,
    pub attachment_pages: usize,
    pub no_data_held: bool,
    /// Characters printed as `?` because the standard fonts cannot show them
    pub unmappable_characters: usize,
}

impl SectionMetrics {
    pub fn new(service_name: impl Into<String>, first_page: usize) -> Self {
        Self {
            service_name: service_name.into(),
            first_page,
            ..Default::default()
        }
    }

    /// Count one laid-out block.
    pub fn record_block(&mut self, block: &Block) {
        self.blocks += 1;
        self.characters += block.text_len();
        if let Block::Table { rows } = block {
            self.table_rows += rows.len();
        }
        self.unmappable_characters += match block {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::ListItem { text, .. } => unmappable_characters(text),
            Block::Table { rows } => rows
                .iter()
                .flat_map(|row| row.cells.iter())
                .map(|cell| unmappable_characters(&cell.text))
                .sum(),
            Block::Rule => 0,
        };
    }

    /// Count a line printed outside the section's blocks.
    pub fn record_line(&mut self, text: &str) {
        self.unmappable_characters += unmappable_characters(text);
    }

    pub fn record_attachment(&mut self, pages_added: usize) {
        self.attachments += 1;
        self.attachment_pages += pages_added;
    }
}

/// Page accounting for a finished report
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportSummary {
    pub body_page_count: usize,
    pub final_page_count: usize,
    pub printed_total: usize,
    pub sections: Vec<SectionMetrics>,
    /// Characters printed as `?` across the report, identity lines counted once
    pub unmappable_characters: usize,
}

impl ReportSummary {
    pub fn new(body_page_count: usize, final_page_count: usize, sections: Vec<SectionMetrics>) -> Self {
        Self {
            body_page_count,
            final_page_count,
            printed_total: printed_total(body_page_count),
            unmappable_characters: sections.iter().map(|s| s.unmappable_characters).sum(),
            sections,
        }
    }
}

/// Counters threaded through one body build
#[derive(Debug, Default)]
pub struct AssemblyState {
    current: Option<SectionMetrics>,
    completed: Vec<SectionMetrics>,
}

impl AssemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting a new section, closing any open one on the page before.
    pub fn begin_section(&mut self, service_name: &str, first_page: usize) -> &mut SectionMetrics {
        self.close_section(first_page.saturating_sub(1));
        self.current
            .insert(SectionMetrics::new(service_name, first_page))
    }

    /// Close the open section given the body page count at its end.
    pub fn close_section(&mut self, page_count: usize) {
        if let Some(mut section) = self.current.take() {
            section.pages = (page_count + 1).saturating_sub(section.first_page);
            log::debug!(
                "Section '{}': {} page(s), {} block(s), {} attachment(s)",
                section.service_name,
                section.pages,
                section.blocks,
                section.attachments
            );
            self.completed.push(section);
        }
    }

    pub fn into_sections(self) -> Vec<SectionMetrics> {
        self.completed
    }
}
