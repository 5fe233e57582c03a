//! Positional extraction of translatable fragments.
//!
//! Structured documents are tokenized with `quick-xml`; prose documents are
//! scanned line by line. Both return fragments in document order, which the
//! applier relies on.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;

use crate::error::{Result, TranslateError};
use crate::model::{DocumentKind, FragmentContext, Position, TextExtraction};

/// Elements whose direct text content is translatable.
pub const TEXT_ELEMENTS: &[&str] = &["text", "tspan", "textPath", "title"];

/// Extract fragments from a document on disk. The file is never modified.
pub fn extract(path: &Path, kind: DocumentKind) -> Result<Vec<TextExtraction>> {
    let content = std::fs::read_to_string(path).map_err(|e| TranslateError::io(path, e))?;
    let fragments = match kind {
        DocumentKind::Structured => {
            extract_structured(&content).map_err(|message| TranslateError::Extraction {
                path: path.to_path_buf(),
                message,
            })?
        }
        DocumentKind::Prose => extract_prose(&content),
    };
    tracing::debug!(
        event = "text_extracted",
        path = %path.display(),
        kind = kind.as_str(),
        count = fragments.len()
    );
    Ok(fragments)
}

/// Byte offsets at which each line starts.
fn line_starts_of(text: &str) -> Vec<usize> {
    let mut starts = Vec::with_capacity(256);
    starts.push(0);
    for (i, b) in text.as_bytes().iter().enumerate() {
        if *b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// 1-based line containing byte `pos`.
fn byte_pos_to_line(pos: usize, starts: &[usize]) -> usize {
    starts.partition_point(|&s| s <= pos).max(1)
}

pub fn extract_structured(xml: &str) -> Result<Vec<TextExtraction>, String> {
    let mut reader = Reader::from_str(xml);
    let line_starts = line_starts_of(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut out = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(XmlEvent::End(_)) => {
                stack.pop();
            }
            Ok(XmlEvent::Text(e)) => {
                let Some(parent) = stack.last() else {
                    continue;
                };
                if !TEXT_ELEMENTS.contains(&parent.as_str()) {
                    continue;
                }
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                let value = e
                    .unescape()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| raw.clone());
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                let leading = raw.len() - raw.trim_start().len();
                let context = if parent == "title" {
                    FragmentContext::Title
                } else {
                    FragmentContext::Label
                };
                out.push(TextExtraction {
                    position: Position::Element {
                        line: Some(byte_pos_to_line(start + leading, &line_starts)),
                        xpath: format!("/{}", stack.join("/")),
                    },
                    context,
                    source_text: value.to_string(),
                    target_text: String::new(),
                });
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(format!("at byte {}: {e}", reader.error_position()));
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{open}>"));
    }
    Ok(out)
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn classify(trimmed: &str) -> FragmentContext {
    if trimmed.starts_with('#') {
        return FragmentContext::Heading;
    }
    if trimmed.starts_with('>') {
        return FragmentContext::Blockquote;
    }
    if ["- ", "* ", "+ "].iter().any(|p| trimmed.starts_with(p)) {
        return FragmentContext::ListItem;
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if rest.starts_with(". ") || rest.starts_with(") ") {
            return FragmentContext::ListItem;
        }
    }
    FragmentContext::Paragraph
}

/// One fragment per non-blank line outside fenced code blocks.
pub fn extract_prose(text: &str) -> Vec<TextExtraction> {
    let mut out = Vec::new();
    let mut fence: Option<&'static str> = None;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(marker) = fence_marker(trimmed) {
            match fence {
                None => fence = Some(marker),
                Some(open) if open == marker => fence = None,
                Some(_) => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }
        out.push(TextExtraction {
            position: Position::Line { line: index + 1 },
            context: classify(trimmed),
            source_text: trimmed.to_string(),
            target_text: String::new(),
        });
    }
    out
}
