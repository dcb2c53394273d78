mod common;

use common::*;
use lopdf::{Document, Object};
use sar_report::*;

fn short_section(title: &str) -> String {
    format!("<h1>{}</h1><p>One short paragraph of section text.</p>", title)
}

fn two_service_source() -> MemorySource {
    MemorySource::new()
        .with_html("alerts-api", &short_section("Alerts"))
        .with_html("keyworker-api", &short_section("Keyworker"))
}

fn two_services() -> Vec<SelectedService> {
    vec![
        SelectedService::new("alerts-api"),
        SelectedService::new("keyworker-api"),
    ]
}

#[tokio::test]
async fn test_two_single_page_sections_page_totals() {
    let assembler = assembler(two_service_source());
    let report = assembler
        .render_report_on(&test_request(), &two_services(), generation_date())
        .await
        .unwrap();

    // contents, banner, two sections, rear page
    assert_eq!(report.summary.body_page_count, 5);
    assert_eq!(report.summary.final_page_count, 6);
    assert_eq!(report.summary.printed_total, 7);
    assert_eq!(page_count(&report.bytes), 6);

    // Rear page is the last page of the merged document
    assert!(page_has_text(&report.bytes, 6, END_OF_REPORT));
    assert!(page_has_text(&report.bytes, 6, "Total pages: 7"));

    // The cover prints the same total line
    let cover = cover_lines(
        &test_request(),
        assembler.options(),
        generation_date(),
        report.summary.printed_total,
    );
    assert!(cover.iter().any(|line| line.text == "Total pages: 7"));
}

#[tokio::test]
async fn test_cover_page_prints_identity_and_total() {
    let mut request = test_request();
    request.subject_name = "Zo\u{eb} \u{141}ukasz".to_string();
    let report = assembler(two_service_source())
        .render_report_on(&request, &two_services(), generation_date())
        .await
        .unwrap();

    let cover = page_content(&report.bytes, 1);
    for line in [
        "Total pages: 7",
        "Report date range: 01/01/2020 - 30/06/2024",
        "Report generation date: 01/07/2024",
        "Case Reference: SAR-2024-001",
    ] {
        assert!(text_offset(&cover, line).is_some(), "{line}");
    }
    // No raw UTF-8 reaches the standard font
    assert!(!cover.windows(2).any(|w| w == [0xC3, 0xAB]));

    // Cover, banner and running header print the name identically
    let name = "Name: Zo\u{eb} \u{141}ukasz";
    assert!(text_offset(&cover, name).is_some());
    assert!(page_has_text(&report.bytes, 3, name));
    assert!(page_has_text(&report.bytes, 4, name));

    let doc = Document::load_mem(&report.bytes).unwrap();
    let text = page_text(&doc, 1).unwrap();
    assert!(text.contains("Name: Zo\u{eb} ?ukasz"), "{text}");
    assert!(text.contains("Total pages: 7"));

    assert_eq!(report.summary.unmappable_characters, 1);
}

#[tokio::test]
async fn test_unmappable_section_text_is_counted() {
    let source = MemorySource::new()
        .with_html("alerts-api", "<p>Transferred to \u{141}\u{f3}d\u{17a}.</p>")
        .with_html("keyworker-api", &short_section("Keyworker"));
    let report = assembler(source)
        .render_report_on(&test_request(), &two_services(), generation_date())
        .await
        .unwrap();

    assert_eq!(report.summary.sections[0].unmappable_characters, 2);
    assert_eq!(report.summary.sections[1].unmappable_characters, 0);
    assert_eq!(report.summary.unmappable_characters, 2);
    assert!(page_has_text(&report.bytes, 4, "Transferred to ?\u{f3}d?."));
}

#[tokio::test]
async fn test_contents_lists_services_in_render_order() {
    let source = MemorySource::new()
        .with_html("keyworker-api", &short_section("Keyworker"))
        .with_html("alerts-api", &short_section("Alerts"))
        .with_html("case-notes", &short_section("Case notes"))
        .with_html("adjudications", &short_section("Adjudications"));
    let services = vec![
        SelectedService::new("keyworker-api").with_position(2),
        SelectedService::new("alerts-api"),
        SelectedService::new("case-notes").with_position(1),
        SelectedService::new("adjudications").with_label("Prison Adjudications"),
    ];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    let expected_labels = [
        "Case Notes",
        "Keyworker Api",
        "Prison Adjudications",
        "Alerts Api",
    ];

    // Contents page is page 2 of the merged document
    let contents = page_content(&report.bytes, 2);
    assert!(text_offset(&contents, CONTENTS_TITLE).is_some());
    let offsets: Vec<usize> = expected_labels
        .iter()
        .map(|label| text_offset(&contents, &format!("\u{2022} {}", label)).unwrap())
        .collect();
    assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));

    // Sections are laid out in the same order
    let rendered: Vec<&str> = report
        .summary
        .sections
        .iter()
        .map(|s| s.service_name.as_str())
        .collect();
    assert_eq!(
        rendered,
        vec!["case-notes", "keyworker-api", "adjudications", "alerts-api"]
    );

    // Each section starts on its own page, in order
    let first_pages: Vec<usize> = report
        .summary
        .sections
        .iter()
        .map(|s| s.first_page)
        .collect();
    assert_eq!(first_pages, vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_header_and_footer_skip_first_two_body_pages() {
    let report = assembler(two_service_source())
        .render_report_on(&test_request(), &two_services(), generation_date())
        .await
        .unwrap();

    // Final page n + 1 is body page n
    let contents = page_content(&report.bytes, 2);
    assert!(text_offset(&contents, "Name: Jane Doe").is_none());
    assert!(text_offset(&contents, "OFFICIAL-SENSITIVE").is_none());

    let banner = page_content(&report.bytes, 3);
    assert!(text_offset(&banner, "Name: Jane Doe").is_some());
    assert!(text_offset(&banner, "OFFICIAL-SENSITIVE").is_none());

    for page in 4..=6 {
        let content = page_content(&report.bytes, page);
        assert!(text_offset(&content, "Name: Jane Doe").is_some(), "page {page}");
        assert!(text_offset(&content, "NOMIS ID: A1234BC").is_some(), "page {page}");
        assert!(
            text_offset(&content, "Case Reference: SAR-2024-001").is_some(),
            "page {page}"
        );
        assert!(text_offset(&content, "OFFICIAL-SENSITIVE").is_some(), "page {page}");
    }
}

#[tokio::test]
async fn test_banner_shows_subject_identity() {
    let mut request = test_request();
    request.nomis_id = None;
    request.probation_id = Some("X987654".to_string());

    let report = assembler(two_service_source())
        .render_report_on(&request, &two_services(), generation_date())
        .await
        .unwrap();

    let banner = page_content(&report.bytes, 3);
    assert!(text_offset(&banner, "SUBJECT ACCESS REQUEST REPORT").is_some());
    assert!(text_offset(&banner, "Probation ID: X987654").is_some());
    assert!(text_offset(&banner, "Case Reference: SAR-2024-001").is_some());
}

#[tokio::test]
async fn test_pdf_attachment_pages_are_copied_verbatim() {
    let attachment = test_pdf_bytes(1, "Attached");
    let original_stream = b"BT /F1 12 Tf 72 700 Td (Attached 1) Tj ET".to_vec();

    let source = MemorySource::new()
        .with_html("alerts-api", &short_section("Alerts"))
        .with_attachment(
            "alerts-api",
            descriptor(1, "application/pdf", "report.pdf"),
            attachment,
        );
    let services = vec![SelectedService::new("alerts-api")];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    // contents, banner, section, attachment page, rear page
    assert_eq!(report.summary.body_page_count, 5);
    assert_eq!(page_count(&report.bytes), 6);

    let section = page_content(&report.bytes, 4);
    assert!(text_offset(&section, ATTACHMENTS_HEADING).is_some());
    assert!(text_offset(&section, "Attachment: 1").is_some());
    assert!(text_offset(&section, "report.pdf - Document 1").is_some());
    assert!(
        text_offset(
            &section,
            "Attachment PDF content follows on subsequent 1 page(s)"
        )
        .is_some()
    );

    // The imported page keeps its original stream and gains the header overlay
    let doc = Document::load_mem(&report.bytes).unwrap();
    let page_id = doc.get_pages()[&5];
    let streams: Vec<Vec<u8>> = doc
        .get_page_contents(page_id)
        .into_iter()
        .map(|id| doc.get_object(id).unwrap().as_stream().unwrap().content.clone())
        .collect();
    assert!(streams.iter().any(|content| *content == original_stream));
    assert!(page_has_text(&report.bytes, 5, "Name: Jane Doe"));

    let metrics = &report.summary.sections[0];
    assert_eq!(metrics.attachments, 1);
    assert_eq!(metrics.attachment_pages, 1);
    assert_eq!(metrics.pages, 2);
}

#[tokio::test]
async fn test_attachments_render_in_number_order() {
    let source = MemorySource::new()
        .with_html("case-notes", &short_section("Case notes"))
        .with_attachment(
            "case-notes",
            descriptor(2, "application/pdf", "second.pdf"),
            test_pdf_bytes(1, "Second"),
        )
        .with_attachment(
            "case-notes",
            descriptor(1, "application/pdf", "first.pdf"),
            test_pdf_bytes(2, "First"),
        );
    let services = vec![SelectedService::new("case-notes")];

    let source_ref = assembler(source);
    let report = source_ref
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    // contents, banner, section, First x2, metadata page, Second x1, rear
    assert_eq!(report.summary.body_page_count, 8);

    let find_page = |text: &str| {
        (1..=report.summary.final_page_count as u32)
            .find(|&page| page_has_text(&report.bytes, page, text))
            .unwrap()
    };
    let first_1 = find_page("First 1");
    let first_2 = find_page("First 2");
    let second_1 = find_page("Second 1");
    assert!(first_1 < first_2);
    assert!(first_2 < second_1);
}

#[tokio::test]
async fn test_attachments_are_fetched_in_number_order() {
    let source = MemorySource::new()
        .with_html("case-notes", &short_section("Case notes"))
        .with_attachment(
            "case-notes",
            descriptor(3, "image/png", "c.png"),
            test_png_bytes(4, 4),
        )
        .with_attachment(
            "case-notes",
            descriptor(1, "application/pdf", "a.pdf"),
            test_pdf_bytes(1, "A"),
        )
        .with_attachment(
            "case-notes",
            descriptor(2, "application/pdf", "b.pdf"),
            test_pdf_bytes(1, "B"),
        );
    let services = vec![SelectedService::new("case-notes")];

    let source = std::sync::Arc::new(source);
    let assembler = ReportAssembler::new(
        SharedSource(source.clone()),
        RejectingConverter,
        ReportOptions::default(),
    )
    .unwrap();
    assembler
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    assert_eq!(
        source.fetched(),
        vec!["files/a.pdf", "files/b.pdf", "files/c.png"]
    );
}

/// Lets a test keep a handle on the source after handing it to the assembler.
struct SharedSource(std::sync::Arc<MemorySource>);

#[async_trait::async_trait]
impl SectionSource for SharedSource {
    async fn get_section_html(
        &self,
        request_id: &str,
        service_name: &str,
    ) -> std::result::Result<Option<String>, SourceError> {
        self.0.get_section_html(request_id, service_name).await
    }

    async fn list_attachments(
        &self,
        request_id: &str,
        service_name: &str,
    ) -> std::result::Result<Vec<AttachmentDescriptor>, SourceError> {
        self.0.list_attachments(request_id, service_name).await
    }

    async fn get_attachment(
        &self,
        descriptor: &AttachmentDescriptor,
    ) -> std::result::Result<Vec<u8>, SourceError> {
        self.0.get_attachment(descriptor).await
    }
}

#[tokio::test]
async fn test_unsupported_attachment_fails_before_any_fetch() {
    let source = std::sync::Arc::new(
        MemorySource::new()
            .with_html("alerts-api", &short_section("Alerts"))
            .with_attachment(
                "alerts-api",
                descriptor(1, "application/pdf", "ok.pdf"),
                test_pdf_bytes(1, "Ok"),
            )
            .with_html("case-notes", &short_section("Case notes"))
            .with_attachment(
                "case-notes",
                descriptor(1, "application/zip", "archive.zip"),
                vec![0x50, 0x4b, 0x03, 0x04],
            ),
    );
    let services = vec![
        SelectedService::new("alerts-api"),
        SelectedService::new("case-notes"),
    ];

    let assembler = ReportAssembler::new(
        SharedSource(source.clone()),
        RejectingConverter,
        ReportOptions::default(),
    )
    .unwrap();
    let result = assembler
        .render_report_on(&test_request(), &services, generation_date())
        .await;

    match result {
        Err(ReportError::UnsupportedAttachment {
            service,
            storage_key,
            content_type,
        }) => {
            assert_eq!(service, "case-notes");
            assert_eq!(storage_key, "files/archive.zip");
            assert_eq!(content_type, "application/zip");
        }
        other => panic!("Expected UnsupportedAttachment, got {:?}", other.map(|_| ())),
    }
    assert!(source.fetched().is_empty());
}

#[tokio::test]
async fn test_rendering_is_repeatable() {
    let source = two_service_source().with_attachment(
        "alerts-api",
        descriptor(1, "application/pdf", "report.pdf"),
        test_pdf_bytes(2, "Attached"),
    );
    let assembler = assembler(source);

    let first = assembler
        .render_report_on(&test_request(), &two_services(), generation_date())
        .await
        .unwrap();
    let second = assembler
        .render_report_on(&test_request(), &two_services(), generation_date())
        .await
        .unwrap();

    assert_eq!(first.summary, second.summary);
    for page in 1..=first.summary.final_page_count as u32 {
        assert_eq!(
            page_content(&first.bytes, page),
            page_content(&second.bytes, page),
            "page {page}"
        );
    }
}

#[tokio::test]
async fn test_missing_or_blank_html_prints_no_data_held() {
    let source = MemorySource::new().with_html("alerts-api", "   \n  ");
    let services = vec![
        SelectedService::new("alerts-api"),
        SelectedService::new("keyworker-api").with_label("Key Workers"),
    ];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    assert_eq!(report.summary.body_page_count, 5);
    assert!(page_has_text(&report.bytes, 4, "Alerts Api"));
    assert!(page_has_text(&report.bytes, 4, NO_DATA_HELD));
    assert!(page_has_text(&report.bytes, 5, "Key Workers"));
    assert!(page_has_text(&report.bytes, 5, NO_DATA_HELD));
    assert!(report.summary.sections.iter().all(|s| s.no_data_held));
}

#[tokio::test]
async fn test_word_attachment_is_converted_and_imported() {
    let source = MemorySource::new()
        .with_html("case-notes", &short_section("Case notes"))
        .with_attachment(
            "case-notes",
            descriptor(
                1,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "letter.docx",
            ),
            b"not really a docx".to_vec(),
        );
    let services = vec![SelectedService::new("case-notes")];

    let assembler =
        ReportAssembler::new(source, FixedConverter { pages: 2 }, ReportOptions::default())
            .unwrap();
    let report = assembler
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    // contents, banner, section, two converted pages, rear
    assert_eq!(report.summary.body_page_count, 6);
    assert_eq!(report.summary.printed_total, 8);
    assert!(page_has_text(
        &report.bytes,
        4,
        "Attachment Word content follows on subsequent 2 page(s)"
    ));
    assert!(page_has_text(&report.bytes, 5, "Converted letter.docx 1"));
    assert!(page_has_text(&report.bytes, 6, "Converted letter.docx 2"));
}

#[tokio::test]
async fn test_word_attachment_without_converter_fails() {
    let source = MemorySource::new().with_attachment(
        "case-notes",
        descriptor(1, "application/msword", "letter.doc"),
        b"legacy".to_vec(),
    );
    let services = vec![SelectedService::new("case-notes")];

    let result = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await;

    match result {
        Err(ReportError::Conversion { filename, .. }) => assert_eq!(filename, "letter.doc"),
        other => panic!("Expected Conversion error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_image_attachment_takes_one_page() {
    let source = MemorySource::new()
        .with_html("case-notes", &short_section("Case notes"))
        .with_attachment(
            "case-notes",
            descriptor(1, "image/png", "photo.png"),
            test_png_bytes(40, 20),
        );
    let services = vec![SelectedService::new("case-notes")];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    // contents, banner, section, image page, rear
    assert_eq!(report.summary.body_page_count, 5);
    assert_eq!(report.summary.sections[0].attachment_pages, 1);

    let doc = Document::load_mem(&report.bytes).unwrap();
    let page_id = doc.get_pages()[&5];
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let (_, image_ref) = xobjects.iter().next().unwrap();
    let image = doc
        .get_object(image_ref.as_reference().unwrap())
        .unwrap()
        .as_stream()
        .unwrap();
    assert_eq!(
        image.dict.get(b"Subtype").unwrap(),
        &Object::Name(b"Image".to_vec())
    );
    assert_eq!(image.dict.get(b"Width").unwrap(), &Object::Integer(40));

    // Image pages carry the running header too
    assert!(page_has_text(&report.bytes, 5, "Case Reference: SAR-2024-001"));
}

#[tokio::test]
async fn test_undecodable_image_is_invalid_attachment() {
    let source = MemorySource::new().with_attachment(
        "case-notes",
        descriptor(1, "image/jpeg", "broken.jpg"),
        b"definitely not a jpeg".to_vec(),
    );
    let services = vec![SelectedService::new("case-notes")];

    let result = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await;
    assert!(matches!(
        result,
        Err(ReportError::InvalidAttachment { .. })
    ));
}

#[tokio::test]
async fn test_long_section_flows_across_pages() {
    let paragraph = "Recorded observation about the subject during the period. ".repeat(12);
    let html: String = (0..40)
        .map(|i| format!("<p>{} {}</p>", i, paragraph))
        .collect();
    let source = MemorySource::new().with_html("case-notes", &html);
    let services = vec![SelectedService::new("case-notes")];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    let section = &report.summary.sections[0];
    assert!(section.pages > 1);
    assert_eq!(section.blocks, 40);
    assert_eq!(report.summary.body_page_count, 2 + section.pages + 1);

    for page in 4..=report.summary.final_page_count as u32 {
        assert!(page_has_text(&report.bytes, page, "OFFICIAL-SENSITIVE"));
    }
}

#[tokio::test]
async fn test_fetch_failure_names_the_service() {
    let services = vec![SelectedService::new("alerts-api")];
    let result = assembler(FailingSource)
        .render_report_on(&test_request(), &services, generation_date())
        .await;

    match result {
        Err(ReportError::ContentFetch { service, .. }) => assert_eq!(service, "alerts-api"),
        other => panic!("Expected ContentFetch error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_malformed_html_names_the_service() {
    let source = MemorySource::new().with_html("alerts-api", "<p>Fish &bogus; chips</p>");
    let services = vec![SelectedService::new("alerts-api")];

    let result = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await;

    match result {
        Err(ReportError::Html { service, .. }) => assert_eq!(service, "alerts-api"),
        other => panic!("Expected Html error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let mut request = test_request();
    request.nomis_id = None;
    request.probation_id = None;

    let result = assembler(two_service_source())
        .render_report_on(&request, &two_services(), generation_date())
        .await;
    assert!(matches!(result, Err(ReportError::Config(_))));
}

#[tokio::test]
async fn test_tables_render_cells() {
    let html = "<table><tr><th>Date</th><th>Note</th></tr>\
                <tr><td>01/02/2024</td><td>Moved cell</td></tr></table>";
    let source = MemorySource::new().with_html("case-notes", html);
    let services = vec![SelectedService::new("case-notes")];

    let report = assembler(source)
        .render_report_on(&test_request(), &services, generation_date())
        .await
        .unwrap();

    assert_eq!(report.summary.sections[0].table_rows, 2);
    for text in ["Date", "Note", "01/02/2024", "Moved cell"] {
        assert!(page_has_text(&report.bytes, 4, text), "{text}");
    }
}
