//! Reading existing files: bootstrap, page tree, objects, recovery.

mod common;

use common::{build_pdf, recording_sink, single_page_pdf, three_page_pdf};
use pdfio::parser::ObjectParser;
use pdfio::source::SliceStream;
use pdfio::{ErrorKind, FileState, MemorySource, ParserOptions, PdfDocument, Value};

fn with_startxref(pdf: &[u8], offset: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(pdf).into_owned();
    let at = text.rfind("startxref\n").expect("startxref keyword") + "startxref\n".len();
    let end = at + text[at..].find('\n').expect("startxref line end");
    let mut out = pdf[..at].to_vec();
    out.extend_from_slice(offset.as_bytes());
    out.extend_from_slice(&pdf[end..]);
    out
}

fn load(bytes: Vec<u8>, abort: bool) -> (PdfDocument, std::rc::Rc<std::cell::RefCell<Vec<ErrorKind>>>) {
    let (kinds, sink) = recording_sink(abort);
    let mut doc = PdfDocument::from_source(
        Box::new(MemorySource::new(bytes)),
        ParserOptions::default(),
        Box::new(sink),
    );
    let _ = doc.load();
    (doc, kinds)
}

#[test]
fn test_open_single_page() {
    let mut doc = PdfDocument::from_bytes(single_page_pdf()).expect("open");
    assert_eq!(doc.state(), FileState::OpenRead);
    assert_eq!(doc.version(), "1.7");
    assert_eq!(doc.page_count().unwrap(), 1);

    let page = doc.get_page(0).unwrap();
    assert_eq!(page.width(), 595.0);
    assert_eq!(page.height(), 842.0);
    assert_eq!(page.rotate, 0);
    assert_eq!(page.contents().len(), 1);

    let content = doc.get_object(page.contents()[0]).unwrap();
    assert_eq!(content.decode_stream().unwrap(), b"0 0 m S\n");
    doc.close().unwrap();
    assert_eq!(doc.state(), FileState::Closed);
}

#[test]
fn test_parse_nested_dictionary() {
    let input = b"<</Type /Example /Kids [1 0 R 2 0 R] /Rect [0 -1.5 612 792] \
/Name (Hello \\(world\\)) /Hex <48656C6C6F> /Flag true /Nothing null \
/Inner <</Deep [<</Leaf 42>>]>>>>";
    let mut parser = ObjectParser::new(SliceStream::new(input));
    let value = parser.read_value().expect("parse");
    let dict = value.as_dict().expect("dictionary");

    let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
    assert_eq!(keys, ["Type", "Kids", "Rect", "Name", "Hex", "Flag", "Nothing", "Inner"]);
    assert_eq!(dict.get_name("Type"), Some("Example"));
    assert_eq!(dict.get_array("Kids").unwrap().len(), 2);
    assert_eq!(dict.get_array("Kids").unwrap()[1].as_reference().unwrap().id, 2);
    assert_eq!(dict.get_rect("Rect").unwrap().y1, -1.5);
    assert_eq!(dict.get_string("Name"), Some(&b"Hello (world)"[..]));
    assert_eq!(dict.get_string("Hex"), Some(&b"Hello"[..]));
    assert_eq!(dict.get_bool("Flag"), Some(true));
    assert_eq!(dict.get("Nothing"), Some(&Value::Null));

    let leaf = dict.get_dict("Inner").unwrap().get_array("Deep").unwrap()[0]
        .as_dict()
        .unwrap()
        .get_integer("Leaf");
    assert_eq!(leaf, Some(42));
}

#[test]
fn test_inherited_attributes() {
    let mut doc = PdfDocument::from_bytes(three_page_pdf()).expect("open");
    assert_eq!(doc.version(), "1.4");
    assert_eq!(doc.page_count().unwrap(), 3);

    for index in 0..3 {
        let page = doc.get_page(index).unwrap();
        assert_eq!(page.index, index);
        assert_eq!(page.width(), 595.28);
        assert_eq!(page.height(), 842.0);
        assert!(page.resources.get_dict("Font").unwrap().contains_key("F1"));
    }
    assert_eq!(doc.get_page(0).unwrap().rotate, 0);
    assert_eq!(doc.get_page(2).unwrap().rotate, 90);
    assert!(doc.get_page(2).unwrap().contents().is_empty());
}

#[test]
fn test_indirect_stream_length() {
    let mut doc = PdfDocument::from_bytes(three_page_pdf()).expect("open");
    let page = doc.get_page(0).unwrap();
    let content = doc.get_object(page.contents()[0]).unwrap();
    assert_eq!(content.decode_stream().unwrap(), b"BT /F1 12 Tf 72 720 Td (One) Tj ET");
}

#[test]
fn test_page_out_of_range() {
    let mut doc = PdfDocument::from_bytes(three_page_pdf()).expect("open");
    let err = doc.get_page(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // A continuing sink keeps the document usable.
    assert_eq!(doc.state(), FileState::OpenRead);
    assert!(doc.get_page(1).is_ok());
}

#[test]
fn test_object_enumeration_and_info() {
    let mut doc = PdfDocument::from_bytes(three_page_pdf()).expect("open");
    assert_eq!(doc.object_count().unwrap(), 10);

    let numbers: Vec<u32> = (0..10)
        .map(|i| doc.get_object_by_index(i).unwrap().number())
        .collect();
    assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    assert_eq!(doc.get_object_by_index(10).unwrap_err().kind(), ErrorKind::NotFound);

    assert_eq!(doc.find_object(6).unwrap().dict().unwrap().get_name("BaseFont"), Some("Helvetica"));
    assert_eq!(doc.title().unwrap().as_deref(), Some("Three pages"));
    assert_eq!(doc.producer().unwrap().as_deref(), Some("fixture"));
    assert_eq!(doc.author().unwrap(), None);
}

#[test]
fn test_corrupt_startxref_aborts() {
    let bytes = with_startxref(&single_page_pdf(), "99999");
    let (mut doc, kinds) = load(bytes, true);

    assert_eq!(doc.state(), FileState::Error);
    assert!(kinds.borrow().contains(&ErrorKind::Structure));

    let err = doc.page_count().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(doc.close().is_ok());
    assert_eq!(doc.state(), FileState::Closed);
}

#[test]
fn test_corrupt_startxref_repaired() {
    let bytes = with_startxref(&three_page_pdf(), "99999");
    let (mut doc, kinds) = load(bytes, false);

    assert_eq!(doc.state(), FileState::OpenRead);
    assert!(kinds.borrow().contains(&ErrorKind::Structure));
    assert_eq!(doc.page_count().unwrap(), 3);
    assert_eq!(doc.get_page(2).unwrap().rotate, 90);
    assert_eq!(doc.title().unwrap().as_deref(), Some("Three pages"));
}

#[test]
fn test_repair_disabled() {
    let bytes = with_startxref(&single_page_pdf(), "99999");
    let (kinds, sink) = recording_sink(false);
    let options = ParserOptions { allow_xref_reconstruction: false, ..ParserOptions::default() };
    let mut doc =
        PdfDocument::from_source(Box::new(MemorySource::new(bytes)), options, Box::new(sink));

    assert_eq!(doc.load().unwrap_err().kind(), ErrorKind::Structure);
    assert_eq!(doc.state(), FileState::Error);
    assert_eq!(kinds.borrow().as_slice(), &[ErrorKind::Structure]);
}

#[test]
fn test_encrypted_rejected() {
    let bytes = build_pdf(
        "1.6",
        &[
            "<</Type /Catalog /Pages 2 0 R>>",
            "<</Type /Pages /Kids [] /Count 0>>",
            "<</Filter /Standard /V 2 /R 3 /O (owner) /U (user) /P -4>>",
        ],
        " /Encrypt 3 0 R",
    );
    let (doc, kinds) = load(bytes, false);
    assert_eq!(doc.state(), FileState::Error);
    assert_eq!(kinds.borrow().as_slice(), &[ErrorKind::Unsupported]);

    let err = PdfDocument::from_bytes(build_pdf(
        "1.6",
        &["<</Type /Catalog /Pages 2 0 R>>", "<</Type /Pages /Kids [] /Count 0>>", "<<>>"],
        " /Encrypt 3 0 R",
    ))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_missing_header() {
    let mut bytes = single_page_pdf();
    bytes[..5].copy_from_slice(b"%XYZ-");
    let err = PdfDocument::from_bytes(bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structure);
}

#[test]
fn test_xref_stream_with_object_stream() {
    let pages = "<</Type /Pages /Kids [3 0 R] /Count 1>>";
    let page = "<</Type /Page /Parent 2 0 R /MediaBox [0 0 300 400]>>";
    let header = format!("2 0 3 {} ", pages.len() + 1);
    let objstm_data = format!("{}{} {}", header, pages, page);

    let mut pdf = b"%PDF-1.5\n".to_vec();
    let catalog_at = pdf.len();
    pdf.extend_from_slice(b"1 0 obj\n<</Type /Catalog /Pages 2 0 R>>\nendobj\n");
    let objstm_at = pdf.len();
    pdf.extend_from_slice(
        format!(
            "4 0 obj\n<</Type /ObjStm /N 2 /First {} /Length {}>>\nstream\n{}\nendstream\nendobj\n",
            header.len(),
            objstm_data.len(),
            objstm_data
        )
        .as_bytes(),
    );
    let xref_at = pdf.len();

    let mut rows = Vec::new();
    let mut row = |kind: u8, field: usize, index: u8| {
        rows.push(kind);
        rows.extend_from_slice(&(field as u16).to_be_bytes());
        rows.push(index);
    };
    row(0, 0, 255);
    row(1, catalog_at, 0);
    row(2, 4, 0);
    row(2, 4, 1);
    row(1, objstm_at, 0);
    row(1, xref_at, 0);

    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<</Type /XRef /Size 6 /W [1 2 1] /Root 1 0 R /Length {}>>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&rows);
    pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());

    let mut doc = PdfDocument::from_bytes(pdf).expect("open");
    assert_eq!(doc.version(), "1.5");
    assert_eq!(doc.page_count().unwrap(), 1);
    let page = doc.get_page(0).unwrap();
    assert_eq!(page.reference.id, 3);
    assert_eq!(page.width(), 300.0);
    assert_eq!(page.height(), 400.0);
}
