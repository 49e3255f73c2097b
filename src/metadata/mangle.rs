//! Rewriting sidecar fields to carry series and author context.
//!
//! The rewrite streams the source document through quick-xml and only
//! replaces the text of `<dc:title>` and `<dc:description>` and the
//! `content` attribute of the `calibre:title_sort` meta. Every other event
//! (declaration, comments, whitespace, unknown elements, entity references)
//! is written back as it was read.

use crate::config::FolderMode;
use crate::error::Result;
use crate::index;
use crate::metadata::{MetadataRecord, strip_bom};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Which fields get the series index prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MangleOptions {
    /// Prefix `<dc:title>`.
    pub mangle_title: bool,
    /// Prefix the `calibre:title_sort` meta.
    pub mangle_title_sort: bool,
}

impl Default for MangleOptions {
    fn default() -> Self {
        Self {
            mangle_title: true,
            mangle_title_sort: false,
        }
    }
}

/// Series placement of a book, present only when the folder mode groups by
/// series and the sidecar names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesContext {
    /// Series name.
    pub series: String,
    /// Index as written in the sidecar.
    pub raw_index: String,
    /// Normalized, sortable index.
    pub token: String,
}

impl SeriesContext {
    /// Series context for a book exported under `mode`.
    pub fn for_book(record: &MetadataRecord, mode: FolderMode) -> Option<Self> {
        if !mode.has_series() {
            return None;
        }
        let series = record.series.as_deref()?.trim();
        let raw_index = record.series_index.clone().unwrap_or_default();
        Some(Self {
            series: series.to_string(),
            token: index::normalize(&raw_index),
            raw_index: raw_index.trim().to_string(),
        })
    }

    /// `"<token> - "`, the prefix applied to folder names and titles.
    pub fn prefix(&self) -> String {
        format!("{} - ", self.token)
    }

    /// Prefix `value` unless it already carries the prefix.
    fn prefixed(&self, value: &str) -> String {
        let prefix = self.prefix();
        if value.starts_with(&prefix) {
            value.to_string()
        } else {
            format!("{prefix}{value}")
        }
    }
}

/// Heading prepended to the description, as HTML.
///
/// Always names the authors; also names the series when there is one.
/// Returns `None` when there is nothing to say.
pub fn description_header(creators: &[String], series: Option<&SeriesContext>) -> Option<String> {
    let authors = escape(creators.join(", ").as_str()).into_owned();

    let line = match series {
        Some(ctx) => {
            let name = escape(ctx.series.as_str()).into_owned();
            let mut line = if ctx.raw_index.is_empty() {
                format!("Part of <em>{name}</em>")
            } else {
                format!("Book {} of <em>{name}</em>", escape(ctx.raw_index.as_str()))
            };
            if !authors.is_empty() {
                line.push_str(&format!(", by {authors}"));
            }
            line
        }
        None if !authors.is_empty() => format!("By {authors}"),
        None => return None,
    };

    Some(format!("<H4>{line}</H4>"))
}

/// New values for the fields being rewritten. `None` leaves a field alone.
#[derive(Debug, Default)]
struct FieldEdits {
    title: Option<String>,
    title_sort: Option<String>,
    description: Option<String>,
}

impl FieldEdits {
    fn compute(
        record: &MetadataRecord,
        series: Option<&SeriesContext>,
        options: MangleOptions,
    ) -> Self {
        let mut edits = FieldEdits::default();

        if let Some(ctx) = series {
            if options.mangle_title {
                edits.title = record.title.as_deref().map(|t| ctx.prefixed(t));
            }
            if options.mangle_title_sort {
                edits.title_sort = record.title_sort.as_deref().map(|t| ctx.prefixed(t));
            }
        }

        if let (Some(desc), Some(header)) = (
            record.description.as_deref(),
            description_header(&record.creators, series),
        ) && !desc.starts_with(&header)
        {
            edits.description = Some(format!("{header}{desc}"));
        }

        edits
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.title_sort.is_none() && self.description.is_none()
    }
}

/// Produce the sidecar content to write into the destination book folder.
///
/// `content` is the source sidecar and `record` its parsed form. Mangling an
/// already mangled document with the same inputs yields it unchanged.
pub fn mangle(
    content: &str,
    record: &MetadataRecord,
    series: Option<&SeriesContext>,
    options: MangleOptions,
) -> Result<String> {
    let content = strip_bom(content);
    let edits = FieldEdits::compute(record, series, options);
    if edits.is_empty() {
        return Ok(content.to_string());
    }
    rewrite(content, &edits)
}

/// Tracks which of the replaced elements have been seen; only the first of
/// each is rewritten.
#[derive(Default)]
struct Claimed {
    title: bool,
    description: bool,
}

impl Claimed {
    fn replacement<'e>(&mut self, local_name: &[u8], edits: &'e FieldEdits) -> Option<&'e str> {
        match local_name {
            b"title" if !self.title => {
                self.title = true;
                edits.title.as_deref()
            }
            b"description" if !self.description => {
                self.description = true;
                edits.description.as_deref()
            }
            _ => None,
        }
    }
}

fn rewrite(content: &str, edits: &FieldEdits) -> Result<String> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::with_capacity(content.len() + 256));

    let mut claimed = Claimed::default();
    // Nesting depth inside an element whose children are being replaced.
    let mut replacing: Option<usize> = None;

    loop {
        let event = reader.read_event()?;

        if let Some(depth) = replacing {
            match event {
                Event::Start(_) => replacing = Some(depth + 1),
                Event::End(_) if depth > 0 => replacing = Some(depth - 1),
                Event::End(end) => {
                    replacing = None;
                    writer.write_event(Event::End(end))?;
                }
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(start) => {
                match claimed.replacement(start.local_name().as_ref(), edits) {
                    Some(text) => {
                        writer.write_event(Event::Start(start))?;
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                        replacing = Some(0);
                    }
                    None => writer.write_event(Event::Start(patch_meta(start, edits)))?,
                }
            }
            Event::Empty(empty) => {
                match claimed.replacement(empty.local_name().as_ref(), edits) {
                    // `<dc:description/>` has no text to swap, so it is
                    // expanded into an element pair.
                    Some(text) => {
                        let end = empty.to_end().into_owned();
                        writer.write_event(Event::Start(empty))?;
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                        writer.write_event(Event::End(end))?;
                    }
                    None => writer.write_event(Event::Empty(patch_meta(empty, edits)))?,
                }
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Swap the `content` attribute of the title-sort meta, leave anything else
/// untouched.
fn patch_meta<'a>(element: BytesStart<'a>, edits: &FieldEdits) -> BytesStart<'a> {
    let Some(sort) = edits.title_sort.as_deref() else {
        return element;
    };
    if element.local_name().as_ref() != b"meta" {
        return element;
    }
    let is_title_sort = element
        .attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"name" && a.value.as_ref() == b"calibre:title_sort");
    if !is_title_sort {
        return element;
    }

    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(name);
    for attr in element.attributes().flatten() {
        if attr.key.as_ref() == b"content" {
            patched.push_attribute(("content", sort));
        } else {
            patched.push_attribute(attr);
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <!-- written by calibre -->
    <dc:title>Book A</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:description>&lt;p&gt;Dragons &amp; more.&lt;/p&gt;</dc:description>
    <dc:subject>Fantasy</dc:subject>
    <meta name="calibre:series" content="Lorem Ipsum"/>
    <meta name="calibre:series_index" content="3.2"/>
    <meta name="calibre:title_sort" content="Book A"/>
    <x:unknown xmlns:x="urn:x" keep="me">opaque</x:unknown>
  </metadata>
  <guide><reference type="cover" href="cover.jpg" title="Cover"/></guide>
</package>"#;

    fn series_ctx(record: &MetadataRecord) -> Option<SeriesContext> {
        SeriesContext::for_book(record, FolderMode::AuthorSeriesBook)
    }

    #[test]
    fn title_gets_index_prefix() {
        let record = MetadataRecord::parse(OPF).unwrap();
        let ctx = series_ctx(&record);
        let out = mangle(OPF, &record, ctx.as_ref(), MangleOptions::default()).unwrap();

        let mangled = MetadataRecord::parse(&out).unwrap();
        assert_eq!(mangled.title.as_deref(), Some("003.02 - Book A"));
        assert_eq!(mangled.title_sort.as_deref(), Some("Book A"));
        assert_eq!(
            mangled.description.as_deref(),
            Some("<H4>Book 3.2 of <em>Lorem Ipsum</em>, by Jane Doe</H4><p>Dragons & more.</p>")
        );
    }

    #[test]
    fn title_sort_prefix_when_enabled() {
        let record = MetadataRecord::parse(OPF).unwrap();
        let ctx = series_ctx(&record);
        let options = MangleOptions {
            mangle_title: false,
            mangle_title_sort: true,
        };
        let out = mangle(OPF, &record, ctx.as_ref(), options).unwrap();

        let mangled = MetadataRecord::parse(&out).unwrap();
        assert_eq!(mangled.title.as_deref(), Some("Book A"));
        assert_eq!(mangled.title_sort.as_deref(), Some("003.02 - Book A"));
    }

    #[test]
    fn untouched_parts_survive_verbatim() {
        let record = MetadataRecord::parse(OPF).unwrap();
        let ctx = series_ctx(&record);
        let out = mangle(OPF, &record, ctx.as_ref(), MangleOptions::default()).unwrap();

        assert!(out.starts_with("<?xml version='1.0' encoding='utf-8'?>"));
        assert!(out.contains("<!-- written by calibre -->"));
        assert!(out.contains(r#"<x:unknown xmlns:x="urn:x" keep="me">opaque</x:unknown>"#));
        assert!(out.contains(r#"<meta name="calibre:series_index" content="3.2"/>"#));
        assert!(out.contains(r#"<reference type="cover" href="cover.jpg" title="Cover"/>"#));
    }

    #[test]
    fn mangling_twice_is_stable() {
        let record = MetadataRecord::parse(OPF).unwrap();
        let ctx = series_ctx(&record);
        let options = MangleOptions {
            mangle_title: true,
            mangle_title_sort: true,
        };
        let once = mangle(OPF, &record, ctx.as_ref(), options).unwrap();

        let record_once = MetadataRecord::parse(&once).unwrap();
        let twice = mangle(&once, &record_once, ctx.as_ref(), options).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn no_series_only_adds_author_line() {
        let record = MetadataRecord::parse(OPF).unwrap();
        let ctx = SeriesContext::for_book(&record, FolderMode::Book);
        assert!(ctx.is_none());

        let out = mangle(OPF, &record, None, MangleOptions::default()).unwrap();
        let mangled = MetadataRecord::parse(&out).unwrap();
        assert_eq!(mangled.title.as_deref(), Some("Book A"));
        assert_eq!(
            mangled.description.as_deref(),
            Some("<H4>By Jane Doe</H4><p>Dragons & more.</p>")
        );
    }

    #[test]
    fn self_closing_description_gets_author_line() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Stray</dc:title>
    <dc:creator>Jane</dc:creator>
    <dc:description/>
  </metadata>
</package>"#;
        let record = MetadataRecord::parse(opf).unwrap();
        assert_eq!(record.description.as_deref(), Some(""));

        let out = mangle(opf, &record, None, MangleOptions::default()).unwrap();
        assert!(out.contains("<dc:description>&lt;H4&gt;By Jane&lt;/H4&gt;</dc:description>"));
        let mangled = MetadataRecord::parse(&out).unwrap();
        assert_eq!(mangled.description.as_deref(), Some("<H4>By Jane</H4>"));
        assert_eq!(mangled.title.as_deref(), Some("Stray"));

        let again = mangle(&out, &mangled, None, MangleOptions::default()).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn blank_index_sorts_last_and_reads_naturally() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>Stray</dc:title><dc:description>Text</dc:description>
<meta name="calibre:series" content="Saga"/>
</metadata></package>"#;
        let record = MetadataRecord::parse(opf).unwrap();
        let ctx = SeriesContext::for_book(&record, FolderMode::SeriesBook).unwrap();
        assert_eq!(ctx.token, "999");

        let out = mangle(opf, &record, Some(&ctx), MangleOptions::default()).unwrap();
        let mangled = MetadataRecord::parse(&out).unwrap();
        assert_eq!(mangled.title.as_deref(), Some("999 - Stray"));
        assert_eq!(
            mangled.description.as_deref(),
            Some("<H4>Part of <em>Saga</em></H4>Text")
        );
    }

    #[test]
    fn nothing_to_change_returns_input() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata></package>"#;
        let record = MetadataRecord::parse(opf).unwrap();
        assert_eq!(
            mangle(opf, &record, None, MangleOptions::default()).unwrap(),
            opf
        );
    }

    #[test]
    fn header_escapes_names() {
        let ctx = SeriesContext {
            series: "Cats & Dogs".to_string(),
            raw_index: "1".to_string(),
            token: "001".to_string(),
        };
        let header = description_header(&["A <B>".to_string()], Some(&ctx)).unwrap();
        assert_eq!(
            header,
            "<H4>Book 1 of <em>Cats &amp; Dogs</em>, by A &lt;B&gt;</H4>"
        );
    }
}
