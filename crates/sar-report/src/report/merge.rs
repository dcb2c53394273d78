//! Page-level merge of the cover and body documents

use crate::render::{ObjectCopier, import_page, save_document, source_page_ids};
use crate::types::{ReportError, Result};
use lopdf::{Document, Object, ObjectId, dictionary};

/// The final report and its page count
pub(crate) struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Concatenate the cover page and all body pages into one document.
///
/// Pages are copied with their content streams untouched. The result must
/// hold exactly one page more than the body.
pub(crate) fn merge(cover: &[u8], body: &[u8], title: &str) -> Result<MergedDocument> {
    let cover = Document::load_mem(cover)
        .map_err(|e| ReportError::Merge(format!("Cover could not be read: {}", e)))?;
    let body = Document::load_mem(body)
        .map_err(|e| ReportError::Merge(format!("Body could not be read: {}", e)))?;

    let cover_pages = cover.get_pages().len();
    if cover_pages != 1 {
        return Err(ReportError::Merge(format!(
            "Cover has {} pages, expected exactly 1",
            cover_pages
        )));
    }
    let body_pages = body.get_pages().len();

    let mut merged = Document::with_version("1.7");
    let pages_id = merged.new_object_id();

    let mut kids = Vec::with_capacity(1 + body_pages);
    for source in [&cover, &body] {
        kids.extend(append_pages(&mut merged, source, pages_id)?);
    }

    let count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = merged.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal("sar-report"),
    });
    merged.trailer.set("Root", catalog_id);
    merged.trailer.set("Info", info_id);

    let page_count = merged.get_pages().len();
    if page_count != 1 + body_pages {
        return Err(ReportError::Merge(format!(
            "Merged document has {} pages, expected {} (cover + {} body pages)",
            page_count,
            1 + body_pages,
            body_pages
        )));
    }

    let bytes = save_document(&mut merged)?;
    log::debug!("Merged report: {} pages, {} bytes", page_count, bytes.len());

    Ok(MergedDocument { bytes, page_count })
}

/// Copy every page of `source` under `pages_id`, in page order.
fn append_pages(target: &mut Document, source: &Document, pages_id: ObjectId) -> Result<Vec<ObjectId>> {
    let page_ids = source_page_ids(source);
    let mut copier = ObjectCopier::new(source);

    // Pages may reference each other (link annotations); reserve them all first
    for &page_id in &page_ids {
        let target_id = target.new_object_id();
        copier.reserve(page_id, target_id);
    }

    page_ids
        .into_iter()
        .map(|page_id| import_page(target, &mut copier, page_id, pages_id))
        .collect()
}
