use super::gather::{AttachmentContent, AttachmentPayload};
use crate::render::{Alignment, FontStyle, PageWriter, decode_image};
use crate::types::*;
use lopdf::Document;

/// Lay out one attachment after its metadata lines. Returns the number of
/// pages it added to the body.
pub(crate) fn render_attachment(
    writer: &mut PageWriter,
    service_name: &str,
    attachment: AttachmentContent,
) -> Result<usize> {
    let AttachmentContent {
        descriptor,
        payload,
    } = attachment;
    let kind = payload.kind();

    let pages = match payload {
        AttachmentPayload::Image(bytes) => {
            let image = decode_image(&bytes)
                .map_err(|e| invalid(service_name, &descriptor, e.to_string()))?;
            let scaling = writer.options().image_scaling;
            writer.place_image(image, scaling)?
        }
        AttachmentPayload::Pdf(bytes) | AttachmentPayload::Word { pdf: bytes } => {
            render_pdf(writer, service_name, &descriptor, kind, &bytes)?
        }
    };

    log::debug!(
        "Attachment {} of '{}' ({}) added {} page(s)",
        descriptor.attachment_number,
        service_name,
        kind.label(),
        pages
    );
    Ok(pages)
}

fn render_pdf(
    writer: &mut PageWriter,
    service_name: &str,
    descriptor: &AttachmentDescriptor,
    kind: AttachmentKind,
    bytes: &[u8],
) -> Result<usize> {
    let document = Document::load_mem(bytes)
        .map_err(|e| invalid(service_name, descriptor, format!("unreadable PDF: {}", e)))?;

    let page_count = document.get_pages().len();
    if page_count == 0 {
        return Err(invalid(service_name, descriptor, "PDF has no pages".to_string()));
    }

    let size = writer.options().body_font_size_pt;
    writer.write_line(
        &follows_line(kind, page_count),
        FontStyle::Regular,
        size,
        Alignment::Left,
    )?;

    let imported = writer.import_pages(&document)?;
    if imported != page_count {
        return Err(ReportError::Layout(format!(
            "Attachment '{}' has {} page(s) but {} were imported",
            descriptor.storage_key, page_count, imported
        )));
    }
    Ok(imported)
}

/// "Attachment PDF content follows on subsequent 3 page(s)"
pub(crate) fn follows_line(kind: AttachmentKind, pages: usize) -> String {
    format!(
        "Attachment {} content follows on subsequent {} page(s)",
        kind.label(),
        pages
    )
}

fn invalid(service_name: &str, descriptor: &AttachmentDescriptor, reason: String) -> ReportError {
    ReportError::InvalidAttachment {
        service: service_name.to_string(),
        storage_key: descriptor.storage_key.clone(),
        reason,
    }
}
