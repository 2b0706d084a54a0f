//! File-to-text extraction keyed by extension.
//!
//! Upstream of the pipeline: turns an uploaded file into the raw document
//! text. Plain-text formats are read as-is, structured markup is decoded to
//! text, PDF goes through the Pdfium runtime (behind the `pdf` feature).
//! Anything else fails with a clear unsupported-extension error.

use std::path::Path;

use pulldown_cmark::{Event, Parser, Tag};
use scraper::{Html, Selector};

use crate::error::PipelineError;

/// Reads `path` and returns its text content, routed by file extension.
///
/// Supported: `.txt` and `.tex` (raw), `.md`/`.markdown` (Markdown decoded),
/// `.html`/`.htm` (markup stripped), `.pdf` (with the `pdf` feature).
pub fn extract_file_text(path: impl AsRef<Path>) -> Result<String, PipelineError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "tex" => Ok(std::fs::read_to_string(path)?),
        "md" | "markdown" => Ok(markdown_to_text(&std::fs::read_to_string(path)?)),
        "html" | "htm" => Ok(html_to_text(&std::fs::read_to_string(path)?)),
        #[cfg(feature = "pdf")]
        "pdf" => pdf_to_text(&std::fs::read(path)?),
        "" => Err(PipelineError::UnsupportedInput(format!(
            "file '{}' has no extension",
            path.display()
        ))),
        other => Err(PipelineError::UnsupportedInput(format!(
            "unsupported file extension: .{other}"
        ))),
    }
}

/// Flattens Markdown to plain text, keeping paragraph breaks.
fn markdown_to_text(source: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(source) {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::End(Tag::Paragraph | Tag::Heading(..) | Tag::Item) => text.push_str("\n\n"),
            _ => {}
        }
    }
    text.trim().to_string()
}

/// Strips markup, keeping the body's text nodes with collapsed whitespace.
fn html_to_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let body = Selector::parse("body").ok().and_then(|selector| {
        document.select(&selector).next()
    });
    let pieces: Vec<&str> = match body {
        Some(body) => body.text().collect(),
        None => document.root_element().text().collect(),
    };
    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts text from a PDF byte buffer, one page per paragraph.
#[cfg(feature = "pdf")]
fn pdf_to_text(bytes: &[u8]) -> Result<String, PipelineError> {
    use pdfium_render::prelude::Pdfium;

    let bindings = Pdfium::bind_to_system_library().map_err(|err| {
        PipelineError::UnsupportedInput(format!("failed to load the Pdfium runtime: {err}"))
    })?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| PipelineError::UnsupportedInput(format!("failed to load PDF: {err}")))?;

    let mut text = String::new();
    for page in document.pages().iter() {
        let page_text = page
            .text()
            .map_err(|err| {
                PipelineError::UnsupportedInput(format!("failed to extract PDF page text: {err}"))
            })?
            .all();
        if page_text.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&page_text);
    }
    Ok(text)
}
