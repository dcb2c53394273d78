//! Reading and writing report files

use crate::types::*;
use lopdf::Document;
use std::path::Path;

/// Load a PDF document
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref().to_owned();
    let bytes = tokio::fs::read(&path).await?;
    let doc = tokio::task::spawn_blocking(move || Document::load_mem(&bytes)).await??;
    Ok(doc)
}

/// Write a finished report to disk
pub async fn save_report(document: &FinalDocument, path: impl AsRef<Path>) -> Result<()> {
    tokio::fs::write(path, &document.bytes).await?;
    Ok(())
}

/// Text drawn on one page, 1-based
pub fn page_text(doc: &Document, page_number: u32) -> Result<String> {
    Ok(doc.extract_text(&[page_number])?)
}
