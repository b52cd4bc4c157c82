//! Heading-based HTML sectioning and size-bounded chunking.

use scraper::{ElementRef, Html, Node};
use text_splitter::{ChunkConfig, TextSplitter};

use graphops_shared::{GraphOpsError, Result};

/// Heading tags that open a new section.
const HEADINGS: [&str; 4] = ["h1", "h2", "h3", "h4"];

/// Elements whose text is never content.
const SKIPPED: [&str; 3] = ["script", "style", "noscript"];

/// Block-level elements that force a line break between text runs.
const BLOCKS: [&str; 12] = [
    "p", "div", "section", "article", "li", "ul", "ol", "table", "tr", "blockquote", "pre", "br",
];

/// One section of a document: an optional heading and the text below it,
/// up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: Option<String>,
    pub text: String,
}

/// Split an HTML document into sections at h1–h4 boundaries.
///
/// Text before the first heading becomes a heading-less leading section.
/// Sections with no heading and no text are dropped.
pub fn split_sections(html: &str) -> Vec<Section> {
    let doc = Html::parse_document(html);

    let mut sections = Vec::new();
    let mut heading: Option<String> = None;
    let mut buf = String::new();

    collect(doc.root_element(), &mut sections, &mut heading, &mut buf);
    flush(&mut sections, &mut heading, &mut buf);

    sections
}

fn collect(
    element: ElementRef<'_>,
    sections: &mut Vec<Section>,
    heading: &mut Option<String>,
    buf: &mut String,
) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if HEADINGS.contains(&name) {
                flush(sections, heading, buf);
                let text = el.text().collect::<String>();
                *heading = Some(normalize(&text));
            } else if SKIPPED.contains(&name) {
                continue;
            } else {
                collect(el, sections, heading, buf);
                if BLOCKS.contains(&name) {
                    buf.push('\n');
                }
            }
        } else if let Node::Text(text) = child.value() {
            buf.push_str(text);
        }
    }
}

fn flush(sections: &mut Vec<Section>, heading: &mut Option<String>, buf: &mut String) {
    let text = normalize_lines(buf);
    buf.clear();

    let heading = heading.take();
    if heading.is_none() && text.is_empty() {
        return;
    }
    sections.push(Section { heading, text });
}

/// Collapse all whitespace to single spaces.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse intra-line whitespace but keep line breaks between blocks.
fn normalize_lines(s: &str) -> String {
    s.lines()
        .map(normalize)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chunk sections into strings no longer than `chunk_size` characters,
/// with `overlap` characters carried between adjacent chunks.
///
/// Each section is chunked independently with its heading prepended, so a
/// chunk never straddles a heading boundary.
pub fn chunk_sections(sections: &[Section], chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| GraphOpsError::validation(format!("invalid chunking config: {e}")))?;
    let splitter = TextSplitter::new(config);

    let mut chunks = Vec::new();
    for section in sections {
        let body = match &section.heading {
            Some(h) if !section.text.is_empty() => format!("{h}\n\n{}", section.text),
            Some(h) => h.clone(),
            None => section.text.clone(),
        };
        if body.is_empty() {
            continue;
        }
        chunks.extend(splitter.chunks(&body).map(str::to_owned));
    }

    Ok(chunks)
}
