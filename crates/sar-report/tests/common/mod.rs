#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use lopdf::{Dictionary, Document, Object, Stream};
use sar_report::{
    AttachmentDescriptor, RejectingConverter, ReportAssembler, ReportOptions, ReportRequest,
    SectionSource, SourceError, WordConverter,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// A PDF whose page N draws the text "{prefix} N" with an inline font.
pub fn create_test_pdf(num_pages: usize, prefix: &str) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Courier".to_vec())),
    ]));

    let mut kids = Vec::new();
    for i in 1..=num_pages {
        let content = format!("BT /F1 12 Tf 72 700 Td ({} {}) Tj ET", prefix, i);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    doc
}

pub fn test_pdf_bytes(num_pages: usize, prefix: &str) -> Vec<u8> {
    let mut doc = create_test_pdf(num_pages, prefix);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A small PNG image.
pub fn test_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 13) as u8, 128])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn test_request() -> ReportRequest {
    ReportRequest {
        id: "req-42".to_string(),
        subject_name: "Jane Doe".to_string(),
        nomis_id: Some("A1234BC".to_string()),
        probation_id: None,
        case_reference: "SAR-2024-001".to_string(),
        date_from: NaiveDate::from_ymd_opt(2020, 1, 1),
        date_to: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    }
}

pub fn generation_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

pub fn descriptor(number: u32, content_type: &str, filename: &str) -> AttachmentDescriptor {
    AttachmentDescriptor {
        storage_key: format!("files/{}", filename),
        attachment_number: number,
        display_name: format!("Document {}", number),
        content_type: content_type.to_string(),
        size_bytes: 0,
        filename: filename.to_string(),
    }
}

/// Content held in memory, keyed by service name. Records every fetch.
#[derive(Default)]
pub struct MemorySource {
    pub html: HashMap<String, String>,
    pub attachments: HashMap<String, Vec<AttachmentDescriptor>>,
    pub files: HashMap<String, Vec<u8>>,
    pub fetched: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(mut self, service: &str, html: &str) -> Self {
        self.html.insert(service.to_string(), html.to_string());
        self
    }

    pub fn with_attachment(
        mut self,
        service: &str,
        descriptor: AttachmentDescriptor,
        bytes: Vec<u8>,
    ) -> Self {
        self.files.insert(descriptor.storage_key.clone(), bytes);
        self.attachments
            .entry(service.to_string())
            .or_default()
            .push(descriptor);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SectionSource for MemorySource {
    async fn get_section_html(
        &self,
        _request_id: &str,
        service_name: &str,
    ) -> Result<Option<String>, SourceError> {
        Ok(self.html.get(service_name).cloned())
    }

    async fn list_attachments(
        &self,
        _request_id: &str,
        service_name: &str,
    ) -> Result<Vec<AttachmentDescriptor>, SourceError> {
        Ok(self.attachments.get(service_name).cloned().unwrap_or_default())
    }

    async fn get_attachment(
        &self,
        descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, SourceError> {
        self.fetched
            .lock()
            .unwrap()
            .push(descriptor.storage_key.clone());
        self.files
            .get(&descriptor.storage_key)
            .cloned()
            .ok_or_else(|| format!("missing file {}", descriptor.storage_key).into())
    }
}

/// A source whose section HTML lookups always fail.
pub struct FailingSource;

#[async_trait]
impl SectionSource for FailingSource {
    async fn get_section_html(
        &self,
        _request_id: &str,
        _service_name: &str,
    ) -> Result<Option<String>, SourceError> {
        Err("upstream service unavailable".into())
    }

    async fn list_attachments(
        &self,
        _request_id: &str,
        _service_name: &str,
    ) -> Result<Vec<AttachmentDescriptor>, SourceError> {
        Ok(Vec::new())
    }

    async fn get_attachment(
        &self,
        _descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, SourceError> {
        Err("no attachments".into())
    }
}

/// Converts any Word document into a PDF of `pages` pages.
pub struct FixedConverter {
    pub pages: usize,
}

#[async_trait]
impl WordConverter for FixedConverter {
    async fn convert_word_to_pdf(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
    ) -> Result<Vec<u8>, SourceError> {
        Ok(test_pdf_bytes(self.pages, &format!("Converted {}", filename)))
    }
}

/// Raw content streams of one page of a serialised PDF, decompressed.
pub fn page_content(bytes: &[u8], page_number: u32) -> Vec<u8> {
    let doc = Document::load_mem(bytes).unwrap();
    let pages = doc.get_pages();
    let page_id = pages[&page_number];
    doc.get_page_content(page_id).unwrap()
}

/// Offset of a `(text) Tj` string operand in page content.
pub fn text_offset(content: &[u8], text: &str) -> Option<usize> {
    let mut needle = vec![b'('];
    needle.extend(sar_report::render::encode_win_ansi(text));
    needle.push(b')');
    content
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
}

pub fn page_has_text(bytes: &[u8], page_number: u32, text: &str) -> bool {
    text_offset(&page_content(bytes, page_number), text).is_some()
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

pub fn assembler<S: SectionSource>(source: S) -> ReportAssembler<S, RejectingConverter> {
    ReportAssembler::new(source, RejectingConverter, ReportOptions::default()).unwrap()
}
