use doc_model::{
    Annotation, AnnotationKind, AnnotationMetadata, Color, Document, FontFamily, Page,
};
use lopdf::{dictionary, Dictionary, Object, Stream};
use pdf_engine::{
    flush_document, open_document, save_document, LopdfCodec, PageCodec, PdfEngineError,
};
use viewer_core::{Point, Rect, Rotation, Size};

/// Two Letter pages sharing one content stream, with size, rotation and
/// resources inherited from the page tree.
fn sample_pdf(media_box: [i64; 4]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT /F1 24 Tf 100 600 Td (Hello) Tj ET".to_vec(),
    ));

    let mut kids = Vec::new();
    for _ in 0..2 {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
            "Rotate" => 90,
            "MediaBox" => media_box.iter().map(|value| Object::Integer(*value)).collect::<Vec<_>>(),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("sample should save");
    bytes
}

fn letter_pdf() -> Vec<u8> {
    sample_pdf([0, 0, 612, 792])
}

fn rectangle() -> Annotation {
    Annotation::new(
        AnnotationKind::Rectangle {
            rect: Rect::new(72.0, 72.0, 200.0, 150.0),
            stroke_color: Color::RED,
            line_width: 2.0,
            fill_color: Some(Color::new(0, 0, 255, 128)),
        },
        AnnotationMetadata::new(Some("Reviewer".to_string())),
    )
    .expect("rectangle should be valid")
}

fn text() -> Annotation {
    Annotation::new(
        AnnotationKind::Text {
            rect: Rect::new(50.0, 400.0, 300.0, 460.0),
            content: "Approved (final)\nsecond line".to_string(),
            font_family: FontFamily::Courier,
            font_size: 14.0,
            font_color: Color::BLACK,
        },
        AnnotationMetadata::default(),
    )
    .expect("text should be valid")
}

fn annotated(bytes: &[u8]) -> Document {
    let codec = LopdfCodec::new();
    let mut document = open_document(&codec, bytes.to_vec()).expect("open should succeed");
    document.page_mut(0).expect("page 0").push_annotation(text()).expect("push text");
    document.page_mut(1).expect("page 1").push_annotation(rectangle()).expect("push rect");
    document
}

fn page_content(bytes: &[u8], page: usize) -> Vec<u8> {
    let doc = lopdf::Document::load_mem(bytes).expect("PDF should load");
    let page_id = *doc.get_pages().values().nth(page).expect("page should exist");
    doc.get_page_content(page_id).expect("content should read")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn open_resolves_inherited_size_and_rotation() {
    let document = open_document(&LopdfCodec::new(), letter_pdf()).expect("open should succeed");

    assert_eq!(document.page_count(), 2);
    for page in document.pages() {
        assert_eq!(page.size(), Size::LETTER);
        assert_eq!(page.rotation(), Rotation::Deg90);
        assert!(page.annotations().is_empty());
        assert!(page.source().is_some());
    }
    assert!(!document.is_dirty());
}

#[test]
fn annotations_survive_save_and_reopen() {
    let codec = LopdfCodec::new();
    let document = annotated(&letter_pdf());

    let saved = save_document(&codec, &document).expect("save should succeed");
    let reopened = open_document(&codec, saved).expect("reopen should succeed");

    assert_eq!(reopened.page_count(), 2);
    assert_eq!(
        reopened.page(0).expect("page 0").annotations(),
        document.page(0).expect("page 0").annotations()
    );
    assert_eq!(
        reopened.page(1).expect("page 1").annotations(),
        document.page(1).expect("page 1").annotations()
    );
    assert_eq!(reopened.page(1).expect("page 1").rotation(), Rotation::Deg90);
    assert!(!reopened.is_dirty());
}

#[test]
fn saved_pages_keep_original_content_under_the_overlay() {
    let saved =
        save_document(&LopdfCodec::new(), &annotated(&letter_pdf())).expect("save should succeed");

    let content = page_content(&saved, 1);
    assert!(contains(&content, b"(Hello) Tj"));
    assert!(contains(&content, b"1 0 0 RG"));
    assert!(content.starts_with(b"q\n"));
}

#[test]
fn repeated_saves_do_not_stack_overlays() {
    let codec = LopdfCodec::new();
    let first = save_document(&codec, &annotated(&letter_pdf())).expect("first save");
    let reopened = open_document(&codec, first.clone()).expect("reopen");
    let second = save_document(&codec, &reopened).expect("second save");

    assert_eq!(page_content(&first, 1), page_content(&second, 1));

    let again = open_document(&codec, second).expect("reopen again");
    let source = again.page(1).expect("page 1").source().expect("source").bytes().to_vec();
    let blob = lopdf::Document::load_mem(&source).expect("blob should load");
    let page_id = *blob.get_pages().values().next().expect("one page");
    let page = blob.get_dictionary(page_id).expect("page dict");
    assert!(!page.has(b"EditorOverlay"));
    assert_eq!(page.get(b"Contents").and_then(Object::as_array).expect("contents").len(), 1);
}

#[test]
fn flush_after_reload_matches_flush_before_save() {
    let codec = LopdfCodec::new();
    let document = annotated(&letter_pdf());
    let before = flush_document(&document).expect("flush before");

    let reopened =
        open_document(&codec, save_document(&codec, &document).expect("save")).expect("reopen");
    let after = flush_document(&reopened).expect("flush after");

    assert_eq!(before.len(), after.len());
    for (left, right) in before.iter().zip(&after) {
        assert_eq!(left.overlay, right.overlay);
        assert_eq!(left.size, right.size);
        assert_eq!(left.rotation, right.rotation);
    }
}

#[test]
fn saving_is_deterministic() {
    let codec = LopdfCodec::new();
    let document = annotated(&letter_pdf());

    let first = save_document(&codec, &document).expect("first save");
    let second = save_document(&codec, &document).expect("second save");
    assert_eq!(first, second);
}

#[test]
fn offset_media_box_shifts_overlay() {
    let codec = LopdfCodec::new();
    let document = annotated(&sample_pdf([50, 50, 662, 842]));
    assert_eq!(document.page(0).expect("page 0").size(), Size::LETTER);

    let saved = save_document(&codec, &document).expect("save");
    assert!(contains(&page_content(&saved, 1), b"1 0 0 1 50 50 cm"));
}

#[test]
fn blank_pages_are_written_with_their_size() {
    let codec = LopdfCodec::new();
    let mut document = Document::from_pages(vec![Page::blank(Size::A4).expect("A4")]);
    document.page_mut(0).expect("page 0").push_annotation(rectangle()).expect("push");

    let reopened =
        open_document(&codec, save_document(&codec, &document).expect("save")).expect("reopen");
    assert_eq!(reopened.page_count(), 1);
    assert_eq!(reopened.page(0).expect("page 0").size(), Size::A4);
    assert_eq!(reopened.page(0).expect("page 0").annotations().len(), 1);
}

#[test]
fn document_without_annotations_has_no_index() {
    let codec = LopdfCodec::new();
    let document = open_document(&codec, letter_pdf()).expect("open");
    let saved = save_document(&codec, &document).expect("save");

    let raw = codec.decode(&saved).expect("decode");
    assert!(raw.annotation_index.is_none());
    assert!(contains(&page_content(&saved, 0), b"(Hello) Tj"));
}

#[test]
fn blank_page_size_survives_reopen() {
    let codec = LopdfCodec::new();
    let size = Size::new(595.2756, 841.8898);
    let document = Document::from_pages(vec![Page::blank(size).expect("size should be valid")]);

    let reopened =
        open_document(&codec, save_document(&codec, &document).expect("save")).expect("reopen");
    assert_eq!(reopened.page(0).expect("page 0").size(), size);
}

#[test]
fn encrypted_documents_are_rejected() {
    let mut doc = lopdf::Document::load_mem(&letter_pdf()).expect("sample should load");
    doc.trailer.set(
        "Encrypt",
        dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::string_literal(vec![0u8; 32]),
            "U" => Object::string_literal(vec![0u8; 32]),
            "P" => -4,
        },
    );
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("encrypted sample should save");

    let err = open_document(&LopdfCodec::new(), bytes).expect_err("encrypted should fail");
    assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
}

#[test]
fn text_mentioning_encrypt_reopens() {
    let codec = LopdfCodec::new();
    let mut document = Document::from_pages(vec![Page::blank(Size::A4).expect("A4")]);
    let annotation = Annotation::new(
        AnnotationKind::Text {
            rect: Rect::new(20.0, 20.0, 200.0, 50.0),
            content: "/Encrypt".to_string(),
            font_family: FontFamily::Helvetica,
            font_size: 12.0,
            font_color: Color::BLACK,
        },
        AnnotationMetadata::default(),
    )
    .expect("text should be valid");
    document.page_mut(0).expect("page 0").push_annotation(annotation.clone()).expect("push");

    let saved = save_document(&codec, &document).expect("save");
    let reopened = open_document(&codec, saved).expect("reopen should succeed");
    assert_eq!(reopened.page(0).expect("page 0").annotations(), &[annotation]);
}

#[test]
fn garbage_is_a_parse_error() {
    let err = open_document(&LopdfCodec::new(), b"definitely not a pdf".to_vec())
        .expect_err("garbage should fail");
    assert!(matches!(err, PdfEngineError::Parse(_)));
}

#[test]
fn text_outside_latin1_fails_composition_with_the_annotation() {
    let codec = LopdfCodec::new();
    let mut document = open_document(&codec, letter_pdf()).expect("open");
    let note = Annotation::new(
        AnnotationKind::Text {
            rect: Rect::new(10.0, 10.0, 200.0, 40.0),
            content: "snowman \u{2603}".to_string(),
            font_family: FontFamily::Helvetica,
            font_size: 12.0,
            font_color: Color::BLACK,
        },
        AnnotationMetadata::default(),
    )
    .expect("text should be valid");
    let id = note.id();
    document.page_mut(1).expect("page 1").push_annotation(note).expect("push");

    let err = save_document(&codec, &document).expect_err("save should fail");
    match err {
        PdfEngineError::CompositionFailed { page_index, annotation_id, .. } => {
            assert_eq!(page_index, 1);
            assert_eq!(annotation_id, Some(id));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn note_and_line_annotations_round_trip() {
    let codec = LopdfCodec::new();
    let mut document = open_document(&codec, letter_pdf()).expect("open");
    let page = document.page_mut(0).expect("page 0");
    page.push_annotation(
        Annotation::new(
            AnnotationKind::Note {
                anchor: Point::new(300.0, 300.0),
                content: "check this".to_string(),
                color: Color::YELLOW,
            },
            AnnotationMetadata::new(Some("Ayşe".to_string())),
        )
        .expect("note"),
    )
    .expect("push note");
    page.push_annotation(
        Annotation::new(
            AnnotationKind::Line {
                start: Point::new(10.0, 10.0),
                end: Point::new(120.0, 80.0),
                stroke_color: Color::BLUE,
                line_width: 1.5,
                line_ending: doc_model::LineEnding::ClosedArrow,
            },
            AnnotationMetadata::default(),
        )
        .expect("line"),
    )
    .expect("push line");

    let reopened =
        open_document(&codec, save_document(&codec, &document).expect("save")).expect("reopen");
    assert_eq!(
        reopened.page(0).expect("page 0").annotations(),
        document.page(0).expect("page 0").annotations()
    );
}
