//! Conversion of pre-rendered section HTML into layout blocks
//!
//! Section HTML is produced by upstream templates and uses a small, regular
//! subset of HTML: headings, paragraphs, lists and data tables. The event
//! reader is configured to tolerate HTML's unclosed void elements; anything
//! it still cannot tokenise is reported as an error rather than skipped.

use quick_xml::Reader;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (at byte {position})")]
pub struct HtmlError {
    pub position: u64,
    pub message: String,
}

/// One unit of section content, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    ListItem { depth: usize, marker: String, text: String },
    Table { rows: Vec<TableRow> },
    Rule,
}

impl Block {
    /// Characters of visible text carried by the block
    pub fn text_len(&self) -> usize {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::ListItem { text, .. } => text.chars().count(),
            Block::Table { rows } => rows
                .iter()
                .flat_map(|row| row.cells.iter())
                .map(|cell| cell.text.chars().count())
                .sum(),
            Block::Rule => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub text: String,
    pub header: bool,
}

/// Elements that never have content or an end tag
const VOID_ELEMENTS: [&[u8]; 12] = [
    b"br", b"hr", b"img", b"meta", b"link", b"input", b"col", b"wbr", b"area", b"base",
    b"source", b"param",
];

/// Elements whose content is not report text
const SKIPPED_ELEMENTS: [&[u8]; 5] = [b"head", b"style", b"script", b"title", b"noscript"];

/// Elements that end the running paragraph
const BLOCK_ELEMENTS: [&[u8]; 16] = [
    b"p", b"div", b"section", b"article", b"header", b"footer", b"main", b"body", b"html",
    b"blockquote", b"pre", b"dl", b"dt", b"dd", b"caption", b"address",
];

/// Parse section HTML into blocks.
pub fn parse(html: &str) -> Result<Vec<Block>, HtmlError> {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.expand_empty_elements = false;
    }

    let mut builder = BlockBuilder::default();

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| HtmlError {
            position: position as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                let name = tag_name(&e);
                if is_void(&name) {
                    builder.empty_element(&name);
                } else {
                    builder.start_element(&name);
                }
            }
            Event::Empty(e) => builder.empty_element(&tag_name(&e)),
            Event::End(e) => builder.end_element(&e.local_name().as_ref().to_ascii_lowercase()),
            Event::Text(e) => {
                let text = unescape(&e).map_err(|message| HtmlError {
                    position: position as u64,
                    message,
                })?;
                builder.text(&text);
            }
            Event::CData(e) => builder.text(&String::from_utf8_lossy(&e.into_inner())),
            Event::Eof => break,
            // Comments, doctype, declarations and processing instructions
            _ => {}
        }
    }

    Ok(builder.finish())
}

fn tag_name(e: &BytesStart<'_>) -> Vec<u8> {
    e.local_name().as_ref().to_ascii_lowercase()
}

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn unescape(text: &BytesText<'_>) -> Result<String, String> {
    text.unescape_with(resolve_html5_entity)
        .map(|cow| cow.into_owned())
        .map_err(|e| e.to_string())
}

fn heading_level(name: &[u8]) -> Option<u8> {
    match name {
        [b'h', digit @ b'1'..=b'6'] => Some(digit - b'0'),
        _ => None,
    }
}

// =============================================================================
// Block assembly
// =============================================================================

/// Where inline text currently goes
#[derive(Debug, Clone, PartialEq)]
enum Inline {
    Paragraph,
    Heading(u8),
    ListItem { depth: usize, marker: String },
}

#[derive(Debug, Default)]
struct ListState {
    ordered: bool,
    next_number: usize,
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<TableRow>,
    row: Option<TableRow>,
    cell: Option<TableCell>,
    /// Tables opened inside a cell of this table, flattened into the cell
    nested: usize,
}

#[derive(Debug, Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    buffer: TextBuffer,
    inline: Option<Inline>,
    lists: Vec<ListState>,
    table: Option<TableState>,
    skip_depth: usize,
}

impl BlockBuilder {
    fn start_element(&mut self, name: &[u8]) {
        if self.skip_depth > 0 || SKIPPED_ELEMENTS.contains(&name) {
            self.skip_depth += 1;
            return;
        }

        if let Some(table) = self.table.as_mut() {
            match name {
                b"table" if table.cell.is_some() => table.nested += 1,
                b"tr" if table.nested == 0 => {
                    table.close_row();
                    table.row = Some(TableRow::default());
                }
                b"td" | b"th" if table.nested == 0 => {
                    table.close_cell();
                    table.row.get_or_insert_with(TableRow::default);
                    table.cell = Some(TableCell {
                        text: String::new(),
                        header: name == b"th",
                    });
                }
                _ => {
                    if let Some(cell) = table.cell.as_mut() {
                        if is_line_breaking(name) {
                            push_break(&mut cell.text);
                        }
                    }
                }
            }
            return;
        }

        if name == b"table" {
            self.flush();
            self.table = Some(TableState::default());
            return;
        }

        if let Some(level) = heading_level(name) {
            self.flush();
            self.inline = Some(Inline::Heading(level));
            return;
        }

        match name {
            b"ul" | b"ol" => {
                self.flush();
                self.lists.push(ListState {
                    ordered: name == b"ol",
                    next_number: 1,
                });
            }
            b"li" => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(list) if list.ordered => {
                        let marker = format!("{}.", list.next_number);
                        list.next_number += 1;
                        marker
                    }
                    _ => crate::constants::BULLET.to_string(),
                };
                self.inline = Some(Inline::ListItem { depth, marker });
            }
            _ if BLOCK_ELEMENTS.contains(&name) => match self.inline {
                Some(Inline::ListItem { .. }) | Some(Inline::Heading(_)) => self.buffer.space(),
                _ => self.flush(),
            },
            _ => {}
        }
    }

    fn end_element(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }

        if let Some(table) = self.table.as_mut() {
            match name {
                b"table" if table.nested > 0 => table.nested -= 1,
                b"table" => {
                    table.close_row();
                    let rows = std::mem::take(&mut table.rows);
                    self.table = None;
                    if rows.iter().any(|row| !row.cells.is_empty()) {
                        self.blocks.push(Block::Table { rows });
                    }
                }
                b"tr" if table.nested == 0 => table.close_row(),
                b"td" | b"th" if table.nested == 0 => table.close_cell(),
                _ => {}
            }
            return;
        }

        if heading_level(name).is_some() || name == b"li" {
            self.flush();
            return;
        }

        match name {
            b"ul" | b"ol" => {
                self.flush();
                self.lists.pop();
            }
            _ if BLOCK_ELEMENTS.contains(&name) => match self.inline {
                Some(Inline::ListItem { .. }) | Some(Inline::Heading(_)) => self.buffer.space(),
                _ => self.flush(),
            },
            _ => {}
        }
    }

    fn empty_element(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            return;
        }

        if let Some(table) = self.table.as_mut() {
            if let Some(cell) = table.cell.as_mut() {
                if name == b"br" || name == b"hr" {
                    push_break(&mut cell.text);
                }
            }
            return;
        }

        match name {
            b"br" => self.buffer.line_break(),
            b"hr" => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }

        if let Some(table) = self.table.as_mut() {
            // Text between cells (indentation, stray content) is not rendered
            if let Some(cell) = table.cell.as_mut() {
                append_collapsed(&mut cell.text, text);
            }
            return;
        }

        self.buffer.push(text);
    }

    /// Close the running inline block, if it has any text.
    fn flush(&mut self) {
        let inline = self.inline.take().unwrap_or(Inline::Paragraph);
        let text = self.buffer.take();
        if text.is_empty() {
            return;
        }

        self.blocks.push(match inline {
            Inline::Paragraph => Block::Paragraph { text },
            Inline::Heading(level) => Block::Heading { level, text },
            Inline::ListItem { depth, marker } => Block::ListItem {
                depth,
                marker,
                text,
            },
        });
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(mut table) = self.table.take() {
            table.close_row();
            if table.rows.iter().any(|row| !row.cells.is_empty()) {
                self.blocks.push(Block::Table { rows: table.rows });
            }
        }
        self.flush();
        self.blocks
    }
}

impl TableState {
    fn close_cell(&mut self) {
        if let Some(mut cell) = self.cell.take() {
            cell.text = cell.text.trim().to_string();
            self.row.get_or_insert_with(TableRow::default).cells.push(cell);
        }
    }

    fn close_row(&mut self) {
        self.close_cell();
        if let Some(row) = self.row.take() {
            if !row.cells.is_empty() {
                self.rows.push(row);
            }
        }
    }
}

fn is_line_breaking(name: &[u8]) -> bool {
    name == b"li" || name == b"p" || name == b"div" || heading_level(name).is_some()
}

fn push_break(text: &mut String) {
    let trimmed_len = text.trim_end_matches(' ').len();
    text.truncate(trimmed_len);
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Append text with HTML whitespace collapsing.
fn append_collapsed(target: &mut String, text: &str) {
    let mut pending_space = text.starts_with(char::is_whitespace);
    for word in text.split_whitespace() {
        if pending_space && !target.is_empty() && !target.ends_with(['\n', ' ']) {
            target.push(' ');
        }
        target.push_str(word);
        pending_space = true;
    }
    if text.ends_with(char::is_whitespace) && !target.is_empty() && !target.ends_with(['\n', ' '])
    {
        target.push(' ');
    }
}

/// Inline text of the block being assembled
#[derive(Debug, Default)]
struct TextBuffer {
    text: String,
}

impl TextBuffer {
    fn push(&mut self, text: &str) {
        append_collapsed(&mut self.text, text);
    }

    fn space(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(['\n', ' ']) {
            self.text.push(' ');
        }
    }

    fn line_break(&mut self) {
        push_break(&mut self.text);
    }

    fn take(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        text.trim().to_string()
    }
}
