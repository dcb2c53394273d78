//! Fetching section content from the collaborators
//!
//! Everything the layout stage needs is awaited here, strictly in report
//! order. Attachment lists are checked for every service before any
//! attachment bytes are fetched, so an unsupported file fails the report
//! without further I/O.

use crate::source::{SectionSource, WordConverter};
use crate::types::*;
use std::collections::HashSet;

/// Owned content of one service, ready for layout
pub(crate) struct SectionContent {
    pub service: SelectedService,
    pub html: Option<String>,
    pub attachments: Vec<AttachmentContent>,
}

pub(crate) struct AttachmentContent {
    pub descriptor: AttachmentDescriptor,
    pub payload: AttachmentPayload,
}

pub(crate) enum AttachmentPayload {
    Image(Vec<u8>),
    Pdf(Vec<u8>),
    /// A Word document already converted to PDF
    Word { pdf: Vec<u8> },
}

impl AttachmentPayload {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            AttachmentPayload::Image(_) => AttachmentKind::Image,
            AttachmentPayload::Pdf(_) => AttachmentKind::Pdf,
            AttachmentPayload::Word { .. } => AttachmentKind::Word,
        }
    }
}

/// A service with its HTML and validated attachment list
struct SectionPlan {
    service: SelectedService,
    html: Option<String>,
    descriptors: Vec<AttachmentDescriptor>,
}

/// Fetch every section in final report order.
pub(crate) async fn gather_sections<S, C>(
    source: &S,
    converter: &C,
    request: &ReportRequest,
    services: &[SelectedService],
) -> Result<Vec<SectionContent>>
where
    S: SectionSource + ?Sized,
    C: WordConverter + ?Sized,
{
    let mut plans = Vec::with_capacity(services.len());
    for service in order_services(services) {
        plans.push(plan_section(source, request, service).await?);
    }

    let mut sections = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut attachments = Vec::with_capacity(plan.descriptors.len());
        for descriptor in plan.descriptors {
            let payload =
                fetch_payload(source, converter, &plan.service.service_name, &descriptor).await?;
            attachments.push(AttachmentContent {
                descriptor,
                payload,
            });
        }

        sections.push(SectionContent {
            service: plan.service,
            html: plan.html,
            attachments,
        });
    }

    Ok(sections)
}

async fn plan_section<S>(
    source: &S,
    request: &ReportRequest,
    service: SelectedService,
) -> Result<SectionPlan>
where
    S: SectionSource + ?Sized,
{
    let service_name = service.service_name.clone();

    let html = source
        .get_section_html(&request.id, &service_name)
        .await
        .map_err(|source| ReportError::ContentFetch {
            service: service_name.clone(),
            item: "section HTML".to_string(),
            source,
        })?;

    let mut descriptors = source
        .list_attachments(&request.id, &service_name)
        .await
        .map_err(|source| ReportError::ContentFetch {
            service: service_name.clone(),
            item: "attachment list".to_string(),
            source,
        })?;

    validate_attachments(&service_name, &mut descriptors)?;

    log::debug!(
        "Service '{}': {} HTML, {} attachment(s)",
        service_name,
        if html.is_some() { "has" } else { "no" },
        descriptors.len()
    );

    Ok(SectionPlan {
        service,
        html,
        descriptors,
    })
}

/// Sort attachments by number and reject anything that cannot be rendered.
pub(crate) fn validate_attachments(
    service_name: &str,
    descriptors: &mut [AttachmentDescriptor],
) -> Result<()> {
    descriptors.sort_by_key(|d| d.attachment_number);

    let mut seen = HashSet::new();
    for descriptor in descriptors.iter() {
        if descriptor.kind() == AttachmentKind::Unsupported {
            return Err(ReportError::UnsupportedAttachment {
                service: service_name.to_string(),
                storage_key: descriptor.storage_key.clone(),
                content_type: descriptor.content_type.clone(),
            });
        }

        if descriptor.attachment_number == 0 {
            return Err(ReportError::InvalidAttachment {
                service: service_name.to_string(),
                storage_key: descriptor.storage_key.clone(),
                reason: "attachment numbers start at 1".to_string(),
            });
        }

        if !seen.insert(descriptor.attachment_number) {
            return Err(ReportError::InvalidAttachment {
                service: service_name.to_string(),
                storage_key: descriptor.storage_key.clone(),
                reason: format!(
                    "attachment number {} is used more than once",
                    descriptor.attachment_number
                ),
            });
        }
    }

    Ok(())
}

async fn fetch_payload<S, C>(
    source: &S,
    converter: &C,
    service_name: &str,
    descriptor: &AttachmentDescriptor,
) -> Result<AttachmentPayload>
where
    S: SectionSource + ?Sized,
    C: WordConverter + ?Sized,
{
    let bytes = source
        .get_attachment(descriptor)
        .await
        .map_err(|source| ReportError::ContentFetch {
            service: service_name.to_string(),
            item: format!("attachment {}", descriptor.attachment_number),
            source,
        })?;

    log::debug!(
        "Fetched attachment {} of '{}' ({}, {} bytes)",
        descriptor.attachment_number,
        service_name,
        descriptor.content_type,
        bytes.len()
    );

    match descriptor.kind() {
        AttachmentKind::Image => Ok(AttachmentPayload::Image(bytes)),
        AttachmentKind::Pdf => Ok(AttachmentPayload::Pdf(bytes)),
        AttachmentKind::Word => {
            let pdf = converter
                .convert_word_to_pdf(bytes, &descriptor.filename)
                .await
                .map_err(|source| ReportError::Conversion {
                    filename: descriptor.filename.clone(),
                    source,
                })?;
            Ok(AttachmentPayload::Word { pdf })
        }
        AttachmentKind::Unsupported => Err(ReportError::UnsupportedAttachment {
            service: service_name.to_string(),
            storage_key: descriptor.storage_key.clone(),
            content_type: descriptor.content_type.clone(),
        }),
    }
}
