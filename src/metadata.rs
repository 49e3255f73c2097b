//! Calibre metadata sidecar (`metadata.opf`) model.

mod mangle;

pub use mangle::{MangleOptions, SeriesContext, description_header, mangle};

use crate::error::Result;
use roxmltree::Document;
use serde::Serialize;

/// The handful of sidecar fields the mirror cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    /// `<dc:title>`.
    pub title: Option<String>,
    /// `<meta name="calibre:title_sort">`.
    pub title_sort: Option<String>,
    /// `<dc:creator>` values in document order.
    pub creators: Vec<String>,
    /// `<meta name="calibre:series">`, only when non-blank.
    pub series: Option<String>,
    /// `<meta name="calibre:series_index">`. Blank when a series is set but
    /// no index was recorded.
    pub series_index: Option<String>,
    /// `<dc:description>`, usually escaped HTML.
    pub description: Option<String>,
    /// `<dc:subject>` tags, case preserved, deduplicated case-insensitively.
    pub tags: Vec<String>,
}

impl MetadataRecord {
    /// Parse a sidecar document.
    pub fn parse(content: &str) -> Result<Self> {
        let doc = Document::parse(strip_bom(content))?;
        let mut record = MetadataRecord::default();

        for node in doc.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "title" if record.title.is_none() => {
                    record.title = Some(text_of(node));
                }
                "creator" => {
                    let creator = text_of(node);
                    if !creator.is_empty() {
                        record.creators.push(creator);
                    }
                }
                "description" if record.description.is_none() => {
                    record.description = Some(text_of(node));
                }
                "subject" => {
                    let tag = text_of(node);
                    if !tag.is_empty() && !record.has_tag(&tag) {
                        record.tags.push(tag);
                    }
                }
                "meta" => {
                    let content = node.attribute("content").map(str::to_string);
                    match node.attribute("name") {
                        Some("calibre:series") => {
                            record.series = content.filter(|s| !s.trim().is_empty());
                        }
                        Some("calibre:series_index") => record.series_index = content,
                        Some("calibre:title_sort") => record.title_sort = content,
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        if record.series.is_some() && record.series_index.is_none() {
            record.series_index = Some(String::new());
        }

        Ok(record)
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }

    /// Display name for authors.
    pub fn authors_display(&self) -> String {
        self.creators.join(", ")
    }
}

/// Full text content of an element, trimmed.
fn text_of(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Drop a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uuid_id" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Book A</dc:title>
    <dc:creator opf:file-as="Doe, Jane" opf:role="aut">Jane Doe</dc:creator>
    <dc:creator opf:role="aut">John Roe</dc:creator>
    <dc:description>&lt;p&gt;A story.&lt;/p&gt;</dc:description>
    <dc:subject>Fantasy</dc:subject>
    <dc:subject>Dragons</dc:subject>
    <dc:subject>fantasy</dc:subject>
    <meta name="calibre:series" content="Lorem Ipsum"/>
    <meta name="calibre:series_index" content="3.2"/>
    <meta name="calibre:title_sort" content="Book A"/>
  </metadata>
</package>"#;

    #[test]
    fn parses_calibre_fields() {
        let record = MetadataRecord::parse(OPF).unwrap();
        assert_eq!(record.title.as_deref(), Some("Book A"));
        assert_eq!(record.title_sort.as_deref(), Some("Book A"));
        assert_eq!(record.creators, vec!["Jane Doe", "John Roe"]);
        assert_eq!(record.series.as_deref(), Some("Lorem Ipsum"));
        assert_eq!(record.series_index.as_deref(), Some("3.2"));
        assert_eq!(record.description.as_deref(), Some("<p>A story.</p>"));
        assert_eq!(record.tags, vec!["Fantasy", "Dragons"]);
    }

    #[test]
    fn series_without_index_gets_blank_index() {
        let opf = r#"<package><metadata>
            <meta name="calibre:series" content="Saga"/>
        </metadata></package>"#;
        let record = MetadataRecord::parse(opf).unwrap();
        assert_eq!(record.series.as_deref(), Some("Saga"));
        assert_eq!(record.series_index.as_deref(), Some(""));
    }

    #[test]
    fn blank_series_is_no_series() {
        let opf = r#"<package><metadata>
            <meta name="calibre:series" content="  "/>
            <meta name="calibre:series_index" content="1.0"/>
        </metadata></package>"#;
        let record = MetadataRecord::parse(opf).unwrap();
        assert!(record.series.is_none());
    }

    #[test]
    fn tags_compare_case_insensitively() {
        let record = MetadataRecord::parse(OPF).unwrap();
        assert!(record.has_tag("DRAGONS"));
        assert!(!record.has_tag("Space"));
    }

    #[test]
    fn malformed_sidecar_is_an_error() {
        assert!(MetadataRecord::parse("<package><metadata>").is_err());
        assert!(MetadataRecord::parse("").is_err());
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let with_bom = format!("\u{feff}{OPF}");
        assert!(MetadataRecord::parse(&with_bom).is_ok());
    }
}
