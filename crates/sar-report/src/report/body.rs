use super::gather::SectionContent;
use super::section::render_section;
use crate::constants::{BULLET, CONTENTS_TITLE, END_OF_REPORT, printed_total, total_pages_line};
use crate::header_footer::HeaderFooter;
use crate::options::ReportOptions;
use crate::render::{Alignment, FontStyle, PageWriter, save_document};
use crate::stats::{AssemblyState, SectionMetrics};
use crate::types::*;

/// Fraction of the content height left blank above centered page text
const CENTERED_PAGE_OFFSET: f32 = 0.3;

/// The serialised body and its page accounting
pub(crate) struct BodyDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub sections: Vec<SectionMetrics>,
}

/// Build the body: contents page, cover banner, every section, rear page.
pub(crate) fn build_body(
    request: &ReportRequest,
    sections: Vec<SectionContent>,
    options: &ReportOptions,
) -> Result<BodyDocument> {
    let mut writer = PageWriter::new(options);
    writer.set_page_event_handler(Box::new(HeaderFooter::new(request, options)))?;

    let labels: Vec<String> = sections.iter().map(|s| s.service.label()).collect();
    write_contents_page(&mut writer, &labels)?;
    write_cover_banner(&mut writer, request)?;

    let mut state = AssemblyState::new();
    for section in sections {
        writer.begin_page()?;
        let metrics = state.begin_section(&section.service.service_name, writer.page_count());
        render_section(&mut writer, metrics, section)?;
        state.close_section(writer.page_count());
    }

    // The rear page is open when the count is taken, so it is included
    writer.begin_page()?;
    let page_count = writer.page_count();
    write_rear_page(&mut writer, printed_total(page_count))?;

    let mut document = writer.finish()?;
    let written = document.get_pages().len();
    if written != page_count {
        return Err(ReportError::Layout(format!(
            "Body has {} pages after the rear page was counted as page {}",
            written, page_count
        )));
    }
    let bytes = save_document(&mut document)?;

    log::debug!("Body document: {} pages, {} bytes", page_count, bytes.len());

    Ok(BodyDocument {
        bytes,
        page_count,
        sections: state.into_sections(),
    })
}

fn write_contents_page(writer: &mut PageWriter, labels: &[String]) -> Result<()> {
    let options = writer.options().clone();
    writer.begin_page()?;
    writer.write_line(
        CONTENTS_TITLE,
        FontStyle::Bold,
        options.title_font_size_pt,
        Alignment::Left,
    )?;
    writer.write_spacer(options.body_font_size_pt)?;

    for label in labels {
        writer.write_line(
            &format!("{} {}", BULLET, label),
            FontStyle::Regular,
            options.body_font_size_pt,
            Alignment::Left,
        )?;
    }
    Ok(())
}

/// Identity banner shown on the second page of the body.
fn write_cover_banner(writer: &mut PageWriter, request: &ReportRequest) -> Result<()> {
    let options = writer.options().clone();
    writer.begin_page()?;
    writer.write_spacer(writer.geometry().content_height() * CENTERED_PAGE_OFFSET)?;

    writer.write_line(
        &options.report_title,
        FontStyle::Bold,
        options.title_font_size_pt,
        Alignment::Center,
    )?;
    writer.write_spacer(options.body_font_size_pt)?;

    let lines = [
        format!("Name: {}", request.subject_name),
        request.identity_line(),
        format!("Case Reference: {}", request.case_reference),
    ];
    for line in lines.iter().filter(|line| !line.is_empty()) {
        writer.write_line(
            line,
            FontStyle::Regular,
            options.heading_font_size_pt,
            Alignment::Center,
        )?;
    }
    Ok(())
}

fn write_rear_page(writer: &mut PageWriter, printed_total: usize) -> Result<()> {
    let options = writer.options().clone();
    writer.write_spacer(writer.geometry().content_height() * CENTERED_PAGE_OFFSET)?;

    writer.write_line(
        END_OF_REPORT,
        FontStyle::Bold,
        options.heading_font_size_pt,
        Alignment::Center,
    )?;
    writer.write_line(
        &total_pages_line(printed_total),
        FontStyle::Regular,
        options.body_font_size_pt,
        Alignment::Center,
    )?;
    writer.write_spacer(options.body_font_size_pt)?;
    writer.write_line(
        &options.classification_marker,
        FontStyle::Bold,
        options.body_font_size_pt,
        Alignment::Center,
    )
}
