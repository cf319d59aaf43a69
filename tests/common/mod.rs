//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use pdfio::ErrorKind;
use std::cell::RefCell;
use std::rc::Rc;

/// Assemble a PDF from object bodies numbered from 1, with a classic xref
/// table. The trailer names object 1 as `/Root`; `trailer_extra` is
/// appended inside the trailer dictionary.
pub fn build_pdf(version: &str, objects: &[&str], trailer_extra: &str) -> Vec<u8> {
    let mut pdf = format!("%PDF-{}\n", version).into_bytes();
    pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<</Size {} /Root 1 0 R{}>>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            trailer_extra,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// One A4 page, as in the simplest real-world files.
pub fn single_page_pdf() -> Vec<u8> {
    build_pdf(
        "1.7",
        &[
            "<</Type /Catalog /Pages 2 0 R>>",
            "<</Type /Pages /Kids [3 0 R] /Count 1>>",
            "<</Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 4 0 R>>",
            "<</Length 8>>\nstream\n0 0 m S\n\nendstream",
        ],
        "",
    )
}

/// Three pages sharing a font, with the media box on the page tree root.
pub fn three_page_pdf() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            "<</Type /Catalog /Pages 2 0 R>>",
            "<</Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 /MediaBox [0 0 595.28 842] /Resources <</Font <</F1 6 0 R>>>>>>",
            "<</Type /Page /Parent 2 0 R /Contents 7 0 R>>",
            "<</Type /Page /Parent 2 0 R /Contents 8 0 R>>",
            "<</Type /Page /Parent 2 0 R /Rotate 90>>",
            "<</Type /Font /Subtype /Type1 /BaseFont /Helvetica>>",
            "<</Length 9 0 R>>\nstream\nBT /F1 12 Tf 72 720 Td (One) Tj ET\nendstream",
            "<</Length 34>>\nstream\nBT /F1 12 Tf 72 720 Td (Two) Tj ET\nendstream",
            "34",
            "<</Title (Three pages) /Producer (fixture)>>",
        ],
        " /Info 10 0 R",
    )
}

/// A JPEG header sequence: SOI, APP0, SOF0 with the given geometry, EOI.
pub fn jpeg(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 8]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.push(components);
    for id in 1..=3u8 {
        data.extend_from_slice(&[id, 0x11, 0x00]);
    }
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// Error sink that records every reported kind and answers `abort`.
pub fn recording_sink(abort: bool) -> (Rc<RefCell<Vec<ErrorKind>>>, impl FnMut(ErrorKind, &str) -> bool) {
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&kinds);
    let sink = move |kind: ErrorKind, _message: &str| {
        seen.borrow_mut().push(kind);
        abort
    };
    (kinds, sink)
}
