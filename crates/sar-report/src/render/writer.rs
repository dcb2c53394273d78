//! Page-by-page layout onto a lopdf document
//!
//! `PageWriter` keeps a single open page with a downward-moving cursor.
//! Content that does not fit below the cursor starts a new page. Every page
//! that is closed, whether generated here or imported from an attachment,
//! is passed to the registered `PageEventHandler` before it is added to the
//! page tree.

use super::text::{FontStyle, encode_win_ansi, text_width, wrap_text};
use super::xobject::{
    DecodedImage, ObjectCopier, get_page_dimensions, get_page_rotation, import_page,
    source_page_ids, upright_to_user_matrix,
};
use super::{Alignment, PageEventHandler, PageGeometry, PlacedText};
use crate::constants::{LINE_WIDTH_PT, LIST_INDENT_PT, TABLE_CELL_PADDING_PT};
use crate::html::TableRow;
use crate::options::{ImageScaling, ReportOptions};
use crate::types::{ReportError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

/// Gap between a list marker and its text, in points
const LIST_MARKER_GAP_PT: f32 = 4.0;

/// Gray level of table header cells
const HEADER_FILL_GRAY: f32 = 0.9;

/// Body lines that must fit under a heading for it to stay on the page
const HEADING_KEEP_WITH_NEXT_LINES: f32 = 2.0;

/// The page currently receiving content
struct OpenPage {
    operations: Vec<Operation>,
    xobjects: Dictionary,
    cursor_y: f32,
    has_content: bool,
}

pub struct PageWriter {
    doc: Document,
    pages_id: ObjectId,
    regular_font_id: ObjectId,
    bold_font_id: ObjectId,
    options: ReportOptions,
    geometry: PageGeometry,
    page_ids: Vec<ObjectId>,
    current: Option<OpenPage>,
    handler: Option<Box<dyn PageEventHandler>>,
    image_count: usize,
}

impl PageWriter {
    pub fn new(options: &ReportOptions) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let regular_font_id = doc.add_object(font_dictionary(FontStyle::Regular));
        let bold_font_id = doc.add_object(font_dictionary(FontStyle::Bold));

        Self {
            doc,
            pages_id,
            regular_font_id,
            bold_font_id,
            options: options.clone(),
            geometry: PageGeometry::from_options(options),
            page_ids: Vec::new(),
            current: None,
            handler: None,
            image_count: 0,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Register the page-completion handler. It must be in place before the
    /// first page is opened so that every page passes through it.
    pub fn set_page_event_handler(&mut self, handler: Box<dyn PageEventHandler>) -> Result<()> {
        if self.page_count() > 0 {
            return Err(ReportError::Layout(
                "Page event handler registered after pages were written".to_string(),
            ));
        }
        self.handler = Some(handler);
        Ok(())
    }

    /// Pages written so far, including the open page.
    pub fn page_count(&self) -> usize {
        self.page_ids.len() + usize::from(self.current.is_some())
    }

    /// Close the open page (if any) and start a new one.
    pub fn begin_page(&mut self) -> Result<()> {
        self.finish_page()?;
        self.current = Some(OpenPage {
            operations: vec![Operation::new("g", vec![0.0.into()])],
            xobjects: Dictionary::new(),
            cursor_y: self.geometry.content_top(),
            has_content: false,
        });
        Ok(())
    }

    fn ensure_page(&mut self) -> Result<&mut OpenPage> {
        if self.current.is_none() {
            self.begin_page()?;
        }
        self.current
            .as_mut()
            .ok_or_else(|| ReportError::Layout("No open page".to_string()))
    }

    /// Make sure `height` points are available below the cursor, breaking
    /// the page if needed. A fresh page is never broken again.
    fn reserve(&mut self, height: f32) -> Result<()> {
        let bottom = self.geometry.content_bottom();
        let page = self.ensure_page()?;
        if page.has_content && page.cursor_y - height < bottom {
            self.begin_page()?;
        }
        Ok(())
    }

    fn remaining_height(&self) -> f32 {
        match &self.current {
            Some(page) => page.cursor_y - self.geometry.content_bottom(),
            None => self.geometry.content_height(),
        }
    }

    fn at_page_top(&self) -> bool {
        self.current.as_ref().is_none_or(|page| !page.has_content)
    }

    /// Close the open page: run the handler and add it to the page tree.
    pub fn finish_page(&mut self) -> Result<()> {
        let Some(mut page) = self.current.take() else {
            return Ok(());
        };

        let page_number = self.page_ids.len() + 1;
        let overlay = self.overlay_for(page_number, &self.geometry);
        if !overlay.is_empty() {
            page.operations.push(Operation::new("g", vec![0.0.into()]));
            page.operations.extend(overlay.iter().flat_map(text_operations));
        }

        let content = Content {
            operations: page.operations,
        };
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(self.font_resources()));
        if !page.xobjects.is_empty() {
            resources.set("XObject", Object::Dictionary(page.xobjects));
        }

        let (width, height) = (self.geometry.width, self.geometry.height);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn overlay_for(&self, page_number: usize, geometry: &PageGeometry) -> Vec<PlacedText> {
        self.handler
            .as_ref()
            .map(|handler| handler.on_page_complete(page_number, geometry))
            .unwrap_or_default()
    }

    fn font_resources(&self) -> Dictionary {
        let mut fonts = Dictionary::new();
        fonts.set(
            FontStyle::Regular.resource_name(),
            Object::Reference(self.regular_font_id),
        );
        fonts.set(
            FontStyle::Bold.resource_name(),
            Object::Reference(self.bold_font_id),
        );
        fonts
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn line_height(&self, size: f32) -> f32 {
        size * self.options.line_spacing
    }

    /// Draw one already-wrapped line at the cursor and move down.
    fn draw_line(&mut self, line: &str, style: FontStyle, size: f32, left: f32, right: f32, alignment: Alignment) -> Result<()> {
        let line_height = self.line_height(size);
        self.reserve(line_height)?;

        let page = self.ensure_page()?;
        let baseline = page.cursor_y - size;
        let placed = PlacedText::aligned(line, alignment, left, right, baseline, style, size);
        page.operations.extend(text_operations(&placed));
        page.cursor_y -= line_height;
        page.has_content = true;
        Ok(())
    }

    /// Write text wrapped to the content width with the given alignment.
    pub fn write_line(&mut self, text: &str, style: FontStyle, size: f32, alignment: Alignment) -> Result<()> {
        let (left, right) = (self.geometry.content_left(), self.geometry.content_right());
        for line in wrap_text(text, style, size, right - left) {
            self.draw_line(&line, style, size, left, right, alignment)?;
        }
        Ok(())
    }

    /// Body text followed by half a line of space.
    pub fn write_paragraph(&mut self, text: &str) -> Result<()> {
        let size = self.options.body_font_size_pt;
        self.write_line(text, FontStyle::Regular, size, Alignment::Left)?;
        self.write_spacer(size * 0.5)
    }

    /// Bold heading, kept on the same page as the first lines that follow it.
    pub fn write_heading(&mut self, text: &str, level: u8) -> Result<()> {
        let size = self.heading_size(level);
        let width = self.geometry.content_width();
        let lines = wrap_text(text, FontStyle::Bold, size, width);
        if lines.is_empty() {
            return Ok(());
        }

        if !self.at_page_top() {
            self.write_spacer(size * 0.5)?;
        }

        let needed = self.line_height(size) * lines.len() as f32
            + self.line_height(self.options.body_font_size_pt) * HEADING_KEEP_WITH_NEXT_LINES;
        if needed <= self.geometry.content_height() {
            self.reserve(needed)?;
        }

        let (left, right) = (self.geometry.content_left(), self.geometry.content_right());
        for line in &lines {
            self.draw_line(line, FontStyle::Bold, size, left, right, Alignment::Left)?;
        }
        self.write_spacer(size * 0.25)
    }

    fn heading_size(&self, level: u8) -> f32 {
        let step = 2.0 * level.saturating_sub(1) as f32;
        (self.options.heading_font_size_pt - step).max(self.options.body_font_size_pt)
    }

    /// A list entry indented by nesting depth, with its marker hanging left.
    pub fn write_list_item(&mut self, marker: &str, text: &str, depth: usize) -> Result<()> {
        let size = self.options.body_font_size_pt;
        let left = self.geometry.content_left() + LIST_INDENT_PT * (depth + 1) as f32;
        let right = self.geometry.content_right();
        if left >= right {
            return Err(ReportError::Layout(format!(
                "List nesting depth {} leaves no room for text",
                depth
            )));
        }

        let lines = wrap_text(text, FontStyle::Regular, size, right - left);
        for (index, line) in lines.iter().enumerate() {
            self.draw_line(line, FontStyle::Regular, size, left, right, Alignment::Left)?;
            if index == 0 {
                let marker_width = text_width(marker, FontStyle::Regular, size);
                let line_height = self.line_height(size);
                let page = self.ensure_page()?;
                let placed = PlacedText {
                    text: marker.to_string(),
                    x: left - LIST_MARKER_GAP_PT - marker_width,
                    y: page.cursor_y + line_height - size,
                    style: FontStyle::Regular,
                    size,
                };
                page.operations.extend(text_operations(&placed));
            }
        }
        self.write_spacer(size * 0.2)
    }

    /// Vertical space on the open page, clamped to the bottom margin. Never
    /// opens a page by itself.
    pub fn write_spacer(&mut self, height: f32) -> Result<()> {
        let bottom = self.geometry.content_bottom();
        if let Some(page) = self.current.as_mut() {
            page.cursor_y = (page.cursor_y - height).max(bottom);
            page.has_content = true;
        }
        Ok(())
    }

    /// Horizontal rule across the content width.
    pub fn write_rule(&mut self) -> Result<()> {
        let gap = self.options.body_font_size_pt * 0.5;
        self.reserve(gap * 2.0)?;
        let (left, right) = (self.geometry.content_left(), self.geometry.content_right());

        let page = self.ensure_page()?;
        let y = page.cursor_y - gap;
        page.operations.extend(line_operations(left, y, right, y));
        page.cursor_y -= gap * 2.0;
        page.has_content = true;
        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Bordered table with equal-width columns. Rows taller than the space
    /// left on a page continue on the next one.
    pub fn write_table(&mut self, rows: &[TableRow]) -> Result<()> {
        let columns = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }

        let size = self.options.table_font_size_pt;
        let line_height = self.line_height(size);
        let column_width = self.geometry.content_width() / columns as f32;
        let text_width_limit = column_width - 2.0 * TABLE_CELL_PADDING_PT;
        if text_width_limit <= size {
            return Err(ReportError::Layout(format!(
                "Table with {} columns is too wide for the page",
                columns
            )));
        }

        for row in rows {
            let cells: Vec<(bool, Vec<String>)> = (0..columns)
                .map(|index| match row.cells.get(index) {
                    Some(cell) => {
                        let style = cell_style(cell.header);
                        (cell.header, wrap_text(&cell.text, style, size, text_width_limit))
                    }
                    None => (false, Vec::new()),
                })
                .collect();
            self.write_table_row(&cells, column_width, line_height, size)?;
        }

        self.write_spacer(self.options.body_font_size_pt * 0.5)
    }

    fn write_table_row(
        &mut self,
        cells: &[(bool, Vec<String>)],
        column_width: f32,
        line_height: f32,
        size: f32,
    ) -> Result<()> {
        let total_lines = cells.iter().map(|(_, lines)| lines.len()).max().unwrap_or(0).max(1);
        let row_height = total_lines as f32 * line_height + 2.0 * TABLE_CELL_PADDING_PT;

        // Move a row that would fit on a fresh page instead of splitting it
        if row_height <= self.geometry.content_height() {
            self.reserve(row_height)?;
        }

        let mut start = 0;
        while start < total_lines {
            self.ensure_page()?;
            let available = self.remaining_height() - 2.0 * TABLE_CELL_PADDING_PT;
            let fit = (available / line_height).floor() as usize;
            if fit == 0 {
                if self.at_page_top() {
                    return Err(ReportError::Layout(
                        "Table row does not fit on an empty page".to_string(),
                    ));
                }
                self.begin_page()?;
                continue;
            }

            let end = (start + fit).min(total_lines);
            self.draw_row_chunk(cells, start, end, column_width, line_height, size)?;
            start = end;
            if start < total_lines {
                self.begin_page()?;
            }
        }
        Ok(())
    }

    fn draw_row_chunk(
        &mut self,
        cells: &[(bool, Vec<String>)],
        start: usize,
        end: usize,
        column_width: f32,
        line_height: f32,
        size: f32,
    ) -> Result<()> {
        let left = self.geometry.content_left();
        let page = self.ensure_page()?;
        let top = page.cursor_y;
        let height = (end - start) as f32 * line_height + 2.0 * TABLE_CELL_PADDING_PT;
        let bottom = top - height;

        for (index, (header, lines)) in cells.iter().enumerate() {
            let x = left + index as f32 * column_width;
            if *header {
                page.operations.extend([
                    Operation::new("g", vec![HEADER_FILL_GRAY.into()]),
                    Operation::new(
                        "re",
                        vec![x.into(), bottom.into(), column_width.into(), height.into()],
                    ),
                    Operation::new("f", vec![]),
                    Operation::new("g", vec![0.0.into()]),
                ]);
            }
            page.operations.extend([
                Operation::new("w", vec![LINE_WIDTH_PT.into()]),
                Operation::new(
                    "re",
                    vec![x.into(), bottom.into(), column_width.into(), height.into()],
                ),
                Operation::new("S", vec![]),
            ]);

            let style = cell_style(*header);
            for (offset, line) in lines.iter().enumerate().take(end).skip(start) {
                let row_top = top - TABLE_CELL_PADDING_PT - (offset - start) as f32 * line_height;
                let placed = PlacedText {
                    text: line.clone(),
                    x: x + TABLE_CELL_PADDING_PT,
                    y: row_top - size,
                    style,
                    size,
                };
                page.operations.extend(text_operations(&placed));
            }
        }

        page.cursor_y = bottom;
        page.has_content = true;
        Ok(())
    }

    // =========================================================================
    // Images and imported pages
    // =========================================================================

    /// Place an image alone on a new page, centered horizontally under the
    /// top margin. Returns the number of pages added (always 1).
    pub fn place_image(&mut self, image: DecodedImage, scaling: ImageScaling) -> Result<usize> {
        self.begin_page()?;

        let geometry = self.geometry;
        let (natural_w, natural_h) = (image.width as f32, image.height as f32);
        let fit = (geometry.content_width() / natural_w).min(geometry.content_height() / natural_h);
        let scale = match scaling {
            ImageScaling::ShrinkToFit => fit.min(1.0),
            ImageScaling::Fit => fit,
        };
        let (draw_w, draw_h) = (natural_w * scale, natural_h * scale);
        let x = geometry.content_left() + (geometry.content_width() - draw_w) / 2.0;
        let y = geometry.content_top() - draw_h;

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let mut stream = image.stream;
        if let Some(smask) = image.smask {
            let smask_id = self.doc.add_object(smask);
            stream.dict.set("SMask", Object::Reference(smask_id));
        }
        let image_id = self.doc.add_object(stream);

        let page = self.ensure_page()?;
        page.xobjects.set(name.as_bytes(), Object::Reference(image_id));
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![draw_w.into(), 0.into(), 0.into(), draw_h.into(), x.into(), y.into()],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        page.has_content = true;

        self.finish_page()?;
        Ok(1)
    }

    /// Copy every page of `source` into the document after the current
    /// position. The imported content streams are kept byte for byte; the
    /// page handler's text is added in a separate stream drawn on top.
    pub fn import_pages(&mut self, source: &Document) -> Result<usize> {
        self.finish_page()?;

        let source_ids = source_page_ids(source);
        let mut copier = ObjectCopier::new(source);
        for &page_id in &source_ids {
            let target_id = self.doc.new_object_id();
            copier.reserve(page_id, target_id);
        }

        for &page_id in &source_ids {
            let new_id = import_page(&mut self.doc, &mut copier, page_id, self.pages_id)?;
            self.decorate_imported_page(new_id)?;
            self.page_ids.push(new_id);
        }

        Ok(source_ids.len())
    }

    fn decorate_imported_page(&mut self, page_id: ObjectId) -> Result<()> {
        let page_number = self.page_ids.len() + 1;
        let (x, y, width, height) = get_page_dimensions(&self.doc, page_id)?;
        let rotation = get_page_rotation(&self.doc, page_id)?;

        // Rotated pages get their overlay laid out upright and turned into
        // the page's user space
        let (geometry, matrix) = if rotation == 0 {
            (PageGeometry::with_margins(x, y, width, height, &self.options), None)
        } else {
            let (upright_w, upright_h) = if rotation == 180 {
                (width, height)
            } else {
                (height, width)
            };
            (
                PageGeometry::with_margins(0.0, 0.0, upright_w, upright_h, &self.options),
                Some(upright_to_user_matrix(rotation, x, y, width, height)),
            )
        };
        let overlay = self.overlay_for(page_number, &geometry);
        if overlay.is_empty() {
            return Ok(());
        }

        let mut overlay_ops = Vec::new();
        if let Some(m) = matrix {
            overlay_ops.push(Operation::new("q", vec![]));
            overlay_ops.push(Operation::new(
                "cm",
                m.iter().map(|&value| value.into()).collect(),
            ));
        }
        overlay_ops.push(Operation::new("g", vec![0.0.into()]));
        overlay_ops.extend(overlay.iter().flat_map(text_operations));
        if matrix.is_some() {
            overlay_ops.push(Operation::new("Q", vec![]));
        }
        let overlay_id = self.doc.add_object(Stream::new(
            Dictionary::new(),
            Content {
                operations: overlay_ops,
            }
            .encode()?,
        ));
        let save_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

        let page = self.doc.get_dictionary(page_id)?;
        let original_contents = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            _ => Vec::new(),
        };
        let resources = self.inline_resources(page.get(b"Resources").ok())?;

        let mut contents = Vec::with_capacity(original_contents.len() + 3);
        contents.push(Object::Reference(save_id));
        contents.extend(original_contents);
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(overlay_id));

        let page = self.doc.get_dictionary_mut(page_id)?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// A page's resources as a direct dictionary with the report fonts added.
    fn inline_resources(&self, resources: Option<&Object>) -> Result<Dictionary> {
        let mut resources = match resources {
            Some(object) => self.resolve_dictionary(object)?,
            None => Dictionary::new(),
        };
        let mut fonts = match resources.get(b"Font") {
            Ok(object) => self.resolve_dictionary(object)?,
            Err(_) => Dictionary::new(),
        };
        for (name, font) in self.font_resources().iter() {
            fonts.set(name.clone(), font.clone());
        }
        resources.set("Font", Object::Dictionary(fonts));
        Ok(resources)
    }

    fn resolve_dictionary(&self, object: &Object) -> Result<Dictionary> {
        match object {
            Object::Dictionary(dict) => Ok(dict.clone()),
            Object::Reference(id) => Ok(self.doc.get_dictionary(*id)?.clone()),
            _ => Ok(Dictionary::new()),
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Close the last page and complete the page tree and catalog.
    pub fn finish(mut self) -> Result<Document> {
        self.finish_page()?;
        if self.page_ids.is_empty() {
            return Err(ReportError::Layout("Document has no pages".to_string()));
        }

        let kids: Vec<Object> = self.page_ids.iter().copied().map(Object::Reference).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(self.options.report_title.clone()),
            "Producer" => Object::string_literal("sar-report"),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        Ok(self.doc)
    }
}

/// Serialise a finished document.
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn font_dictionary(style: FontStyle) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => style.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn cell_style(header: bool) -> FontStyle {
    if header {
        FontStyle::Bold
    } else {
        FontStyle::Regular
    }
}

fn text_operations(placed: &PlacedText) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![placed.style.resource_name().into(), placed.size.into()],
        ),
        Operation::new("Td", vec![placed.x.into(), placed.y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&placed.text),
                StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
    ]
}

fn line_operations(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<Operation> {
    vec![
        Operation::new("w", vec![LINE_WIDTH_PT.into()]),
        Operation::new("m", vec![x1.into(), y1.into()]),
        Operation::new("l", vec![x2.into(), y2.into()]),
        Operation::new("S", vec![]),
    ]
}
