use super::attachment::render_attachment;
use super::gather::{AttachmentContent, SectionContent};
use crate::constants::{ATTACHMENTS_HEADING, NO_DATA_HELD};
use crate::html::{self, Block};
use crate::render::{Alignment, FontStyle, PageWriter};
use crate::stats::SectionMetrics;
use crate::types::*;

/// Lay out one service: its HTML content, then its attachments in order.
/// The caller has already started the section on a fresh page.
pub(crate) fn render_section(
    writer: &mut PageWriter,
    metrics: &mut SectionMetrics,
    section: SectionContent,
) -> Result<()> {
    let service_name = section.service.service_name.clone();
    let blocks = parse_section(&service_name, section.html.as_deref())?;

    if blocks.is_empty() {
        log::info!("Service '{}' holds no data", service_name);
        metrics.no_data_held = true;
        let label = section.service.label();
        metrics.record_line(&label);
        writer.write_heading(&label, 1)?;
        writer.write_paragraph(NO_DATA_HELD)?;
    } else {
        for block in &blocks {
            write_block(writer, block)?;
            metrics.record_block(block);
        }
    }
    drop(blocks);

    if !section.attachments.is_empty() {
        write_attachments(writer, metrics, &service_name, section.attachments)?;
    }

    if metrics.unmappable_characters > 0 {
        log::warn!(
            "Service '{}': {} character(s) cannot be shown in the standard fonts and print as '?'",
            service_name,
            metrics.unmappable_characters
        );
    }
    Ok(())
}

fn write_attachments(
    writer: &mut PageWriter,
    metrics: &mut SectionMetrics,
    service_name: &str,
    attachments: Vec<AttachmentContent>,
) -> Result<()> {
    writer.write_heading(ATTACHMENTS_HEADING, 2)?;
    let size = writer.options().body_font_size_pt;
    for attachment in attachments {
        writer.write_line(
            &format!("Attachment: {}", attachment.descriptor.attachment_number),
            FontStyle::Bold,
            size,
            Alignment::Left,
        )?;
        let summary = attachment.descriptor.summary_line();
        metrics.record_line(&summary);
        writer.write_line(
            &summary,
            FontStyle::Regular,
            size,
            Alignment::Left,
        )?;

        let pages = render_attachment(writer, service_name, attachment)?;
        metrics.record_attachment(pages);
    }

    Ok(())
}

/// Blank or missing HTML yields no blocks.
fn parse_section(service_name: &str, html: Option<&str>) -> Result<Vec<Block>> {
    match html.map(str::trim) {
        Some(html) if !html.is_empty() => html::parse(html).map_err(|e| ReportError::Html {
            service: service_name.to_string(),
            message: e.to_string(),
        }),
        _ => Ok(Vec::new()),
    }
}

fn write_block(writer: &mut PageWriter, block: &Block) -> Result<()> {
    match block {
        Block::Heading { level, text } => writer.write_heading(text, *level),
        Block::Paragraph { text } => writer.write_paragraph(text),
        Block::ListItem {
            depth,
            marker,
            text,
        } => writer.write_list_item(marker, text, *depth),
        Block::Table { rows } => writer.write_table(rows),
        Block::Rule => writer.write_rule(),
    }
}
