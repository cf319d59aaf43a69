//! Print a summary of PDF files.
//!
//! For each file: version, page count, object count, and the media box of
//! every page. Exits with status 1 on the first file that fails.
//!
//! Usage:
//!   pdfio_info [--objects] [--json] FILE...
//!
//! `RUST_LOG=debug` shows parse progress and recoveries.

use pdfio::writer::{format_number, ObjectSerializer};
use pdfio::{PdfDocument, Rect, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

struct InfoConfig {
    files: Vec<PathBuf>,
    objects: bool,
    json: bool,
}

impl InfoConfig {
    fn from_args() -> Self {
        let mut files = Vec::new();
        let mut objects = false;
        let mut json = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--objects" => objects = true,
                "--json" => json = true,
                _ => files.push(PathBuf::from(arg)),
            }
        }

        Self { files, objects, json }
    }
}

#[derive(Debug, Serialize)]
struct PageSummary {
    index: usize,
    object: String,
    media_box: [f64; 4],
    rotate: i64,
}

#[derive(Debug, Serialize)]
struct ObjectSummary {
    number: u32,
    generation: u16,
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
    stream_length: Option<usize>,
}

#[derive(Debug, Serialize)]
struct FileSummary {
    path: String,
    version: String,
    pages: usize,
    objects: usize,
    title: Option<String>,
    producer: Option<String>,
    page_list: Vec<PageSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    object_list: Vec<ObjectSummary>,
}

fn rect_array(rect: &Rect) -> [f64; 4] {
    [rect.x1, rect.y1, rect.x2, rect.y2]
}

fn summarize(path: &Path, with_objects: bool) -> Result<FileSummary> {
    let mut doc = PdfDocument::open(path)?;
    let pages = doc.page_count()?;
    let objects = doc.object_count()?;

    let mut page_list = Vec::with_capacity(pages);
    for index in 0..pages {
        let page = doc.get_page(index)?;
        page_list.push(PageSummary {
            index,
            object: page.reference.to_string(),
            media_box: rect_array(&page.media_box),
            rotate: page.rotate,
        });
    }

    let mut object_list = Vec::new();
    if with_objects {
        let serializer = ObjectSerializer::new();
        for index in 0..objects {
            let object = doc.get_object_by_index(index)?;
            object_list.push(ObjectSummary {
                number: object.number(),
                generation: object.generation(),
                kind: object.value().type_name(),
                value: serializer.serialize_to_string(object.value()),
                stream_length: object.raw_stream().map(|data| data.len()),
            });
        }
    }

    let summary = FileSummary {
        path: path.display().to_string(),
        version: doc.version().to_string(),
        pages,
        objects,
        title: doc.title()?,
        producer: doc.producer()?,
        page_list,
        object_list,
    };
    doc.close()?;
    Ok(summary)
}

fn print_text(summary: &FileSummary) {
    println!(
        "{}: PDF {}, {} pages, {} objects",
        summary.path, summary.version, summary.pages, summary.objects
    );
    for page in &summary.page_list {
        let media_box: Vec<String> = page.media_box.iter().map(|&v| format_number(v)).collect();
        print!("  page {} ({}): [{}]", page.index + 1, page.object, media_box.join(" "));
        if page.rotate != 0 {
            print!(" rotated {}", page.rotate);
        }
        println!();
    }
    for object in &summary.object_list {
        match object.stream_length {
            Some(length) => println!(
                "  {} {} obj {} stream ({} bytes)",
                object.number, object.generation, object.value, length
            ),
            None => println!("  {} {} obj {}", object.number, object.generation, object.value),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let config = InfoConfig::from_args();

    if config.files.is_empty() {
        eprintln!("Usage: pdfio_info [--objects] [--json] FILE...");
        return ExitCode::from(1);
    }

    for path in &config.files {
        let summary = match summarize(path, config.objects) {
            Ok(summary) => summary,
            Err(e) => {
                eprintln!("{}: {} ({})", path.display(), e, e.kind());
                return ExitCode::from(1);
            },
        };
        if config.json {
            match serde_json::to_string(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("{}: cannot encode summary: {}", path.display(), e);
                    return ExitCode::from(1);
                },
            }
        } else {
            print_text(&summary);
        }
    }

    ExitCode::SUCCESS
}
