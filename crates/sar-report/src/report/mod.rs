//! Subject access request report assembly
//!
//! This module orchestrates one report:
//! 1. Gather section HTML and attachments from the content source
//! 2. Build the body (contents, banner, sections, rear page) and count it
//! 3. Build the internal cover with the printed page total
//! 4. Merge cover and body into the final document

mod attachment;
mod body;
mod cover;
mod gather;
mod merge;
mod section;

pub use cover::{CoverLine, cover_lines};

use crate::constants::printed_total;
use crate::options::ReportOptions;
use crate::render::unmappable_characters;
use crate::source::{SectionSource, WordConverter};
use crate::stats::ReportSummary;
use crate::types::*;
use body::build_body;
use chrono::NaiveDate;
use cover::build_cover;
use gather::{SectionContent, gather_sections};
use merge::merge;

/// Assembles reports from a content source and a Word converter.
pub struct ReportAssembler<S, C> {
    source: S,
    converter: C,
    options: ReportOptions,
}

impl<S, C> ReportAssembler<S, C>
where
    S: SectionSource,
    C: WordConverter,
{
    pub fn new(source: S, converter: C, options: ReportOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            source,
            converter,
            options,
        })
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Render a report dated today.
    pub async fn render_report(
        &self,
        request: &ReportRequest,
        services: &[SelectedService],
    ) -> Result<FinalDocument> {
        let today = chrono::Local::now().date_naive();
        self.render_report_on(request, services, today).await
    }

    /// Render a report with an explicit generation date.
    pub async fn render_report_on(
        &self,
        request: &ReportRequest,
        services: &[SelectedService],
        generated_on: NaiveDate,
    ) -> Result<FinalDocument> {
        request.validate()?;
        log::info!(
            "Rendering report {} with {} service(s)",
            request.id,
            services.len()
        );
        if services.is_empty() {
            log::warn!("Report {} has no selected services", request.id);
        }

        let sections = gather_sections(&self.source, &self.converter, request, services).await?;

        let owned_request = request.clone();
        let options = self.options.clone();
        let document = tokio::task::spawn_blocking(move || {
            assemble_sync(&owned_request, sections, &options, generated_on)
        })
        .await??;

        let summary = &document.summary;
        for section in &summary.sections {
            log::info!(
                "  {}: pages {}..{}, {} block(s), {} attachment(s){}",
                section.service_name,
                section.first_page,
                section.first_page + section.pages.saturating_sub(1),
                section.blocks,
                section.attachments,
                if section.no_data_held { ", no data held" } else { "" }
            );
        }
        log::info!(
            "Report {} complete: body {} pages, final {} pages, printed total {}",
            request.id,
            summary.body_page_count,
            summary.final_page_count,
            summary.printed_total
        );

        Ok(document)
    }
}

fn assemble_sync(
    request: &ReportRequest,
    sections: Vec<SectionContent>,
    options: &ReportOptions,
    generated_on: NaiveDate,
) -> Result<FinalDocument> {
    let body = build_body(request, sections, options)?;

    let total = printed_total(body.page_count);
    let cover = build_cover(request, options, generated_on, total)?;

    let merged = merge(&cover, &body.bytes, &options.report_title)?;

    let mut summary = ReportSummary::new(body.page_count, merged.page_count, body.sections);
    let identity = identity_unmappable_characters(request);
    if identity > 0 {
        log::warn!(
            "Report {}: {} character(s) of the subject identity cannot be shown in the standard fonts and print as '?'",
            request.id,
            identity
        );
    }
    summary.unmappable_characters += identity;

    Ok(FinalDocument {
        bytes: merged.bytes,
        summary,
    })
}

/// Unmappable characters in the text printed on the cover, banner and headers.
fn identity_unmappable_characters(request: &ReportRequest) -> usize {
    [
        request.subject_name.as_str(),
        request.identity_line().as_str(),
        request.case_reference.as_str(),
    ]
    .into_iter()
    .map(unmappable_characters)
    .sum()
}
