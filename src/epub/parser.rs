//! EPUB parsing utilities (container.xml, OPF, NCX).

use quick_xml::escape::unescape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::book::{ImageItem, Metadata};
use crate::error::{Error, Result};
use crate::package::{NavPoint, CSS_MEDIA_TYPE, NCX_MEDIA_TYPE};

/// What an existing `content.opf` tells us about a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct PackageInfo {
    pub metadata: Metadata,
    /// Href of the navigation document.
    pub toc: Option<String>,
    /// Hrefs of every stylesheet in the manifest.
    pub stylesheets: Vec<String>,
    pub images: Vec<ImageItem>,
}

/// One-to-one Dublin Core elements copied straight into [`Metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcField {
    Title,
    Identifier,
    Language,
    Publisher,
    Description,
    Coverage,
    Source,
    Rights,
}

/// Whether a package without the element is rejected or read as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// Field table for `metadata/dc:*` one-to-one elements.
pub const ONE_TO_ONE_FIELDS: [(DcField, Presence); 8] = [
    (DcField::Title, Presence::Required),
    (DcField::Identifier, Presence::Required),
    (DcField::Language, Presence::Required),
    (DcField::Publisher, Presence::Optional),
    (DcField::Description, Presence::Optional),
    (DcField::Coverage, Presence::Optional),
    (DcField::Source, Presence::Optional),
    (DcField::Rights, Presence::Optional),
];

impl DcField {
    /// Local element name (without the `dc:` prefix).
    pub fn element(self) -> &'static str {
        match self {
            DcField::Title => "title",
            DcField::Identifier => "identifier",
            DcField::Language => "language",
            DcField::Publisher => "publisher",
            DcField::Description => "description",
            DcField::Coverage => "coverage",
            DcField::Source => "source",
            DcField::Rights => "rights",
        }
    }

    fn from_element(local: &[u8]) -> Option<Self> {
        ONE_TO_ONE_FIELDS
            .iter()
            .map(|&(field, _)| field)
            .find(|field| field.element().as_bytes() == local)
    }

    fn slot(self, metadata: &mut Metadata) -> &mut String {
        match self {
            DcField::Title => &mut metadata.title,
            DcField::Identifier => &mut metadata.identifier,
            DcField::Language => &mut metadata.language,
            DcField::Publisher => &mut metadata.publisher,
            DcField::Description => &mut metadata.description,
            DcField::Coverage => &mut metadata.coverage,
            DcField::Source => &mut metadata.source,
            DcField::Rights => &mut metadata.rights,
        }
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

/// Root folder of a package: the part of the OPF path before the first `/`.
///
/// An OPF at the archive root gives an empty folder name.
pub fn root_folder(opf_path: &str) -> &str {
    opf_path.split_once('/').map_or("", |(folder, _)| folder)
}

/// Metadata element currently collecting text.
enum Capture {
    OneToOne(DcField),
    Creator,
    PublicationDate,
    Subject,
}

/// Parse an OPF package document.
///
/// One-to-one fields take the first matching element. The first creator gives
/// the display author and, through `opf:file-as`, the sort author. The
/// original publication date is the first `dc:date` whose `opf:event` is
/// `original-publication`. Subjects are joined with `", "`.
///
/// Fails with [`Error::MissingMetadata`] when a required element from
/// [`ONE_TO_ONE_FIELDS`] is absent; optional ones are read as empty.
pub fn parse_opf(content: &str) -> Result<PackageInfo> {
    let mut reader = Reader::from_str(content);

    let mut info = PackageInfo::default();
    let mut seen: Vec<DcField> = Vec::new();
    let mut subjects: Vec<String> = Vec::new();
    let mut have_creator = false;
    let mut have_date = false;

    let mut in_metadata = false;
    let mut in_manifest = false;
    let mut capture: Option<Capture> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"manifest" => in_manifest = true,
                    b"item" if in_manifest => read_manifest_item(&e, &mut info)?,
                    _ if in_metadata && capture.is_none() => {
                        capture = metadata_capture(&e, &seen, have_creator, have_date, &mut info)?;
                        buf_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if in_manifest && local == b"item" {
                    read_manifest_item(&e, &mut info)?;
                } else if in_metadata
                    && let Some(field) = DcField::from_element(local)
                    && !seen.contains(&field)
                {
                    seen.push(field);
                }
            }
            Event::Text(e) => {
                if capture.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if capture.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if capture.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = false,
                    b"manifest" => in_manifest = false,
                    _ => {}
                }

                if let Some(current) = capture.take() {
                    let text = buf_text.trim().to_string();
                    match current {
                        Capture::OneToOne(field) => {
                            *field.slot(&mut info.metadata) = text;
                            seen.push(field);
                        }
                        Capture::Creator => {
                            info.metadata.author = text;
                            have_creator = true;
                        }
                        Capture::PublicationDate => {
                            info.metadata.orig_publish_date = text;
                            have_date = true;
                        }
                        Capture::Subject => subjects.push(text),
                    }
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    for (field, presence) in ONE_TO_ONE_FIELDS {
        if presence == Presence::Required && !seen.contains(&field) {
            return Err(Error::MissingMetadata(field.element()));
        }
    }

    info.metadata.subject = subjects.join(", ");
    Ok(info)
}

/// Decide whether a metadata child element should collect its text.
fn metadata_capture(
    e: &BytesStart<'_>,
    seen: &[DcField],
    have_creator: bool,
    have_date: bool,
    info: &mut PackageInfo,
) -> Result<Option<Capture>> {
    let name = e.name();
    let local = local_name(name.as_ref());

    if let Some(field) = DcField::from_element(local) {
        return Ok((!seen.contains(&field)).then_some(Capture::OneToOne(field)));
    }

    match local {
        b"creator" if !have_creator => {
            if let Some(file_as) = attribute(e, b"file-as")? {
                info.metadata.author_sort = file_as;
            }
            Ok(Some(Capture::Creator))
        }
        b"date" if !have_date => {
            let event = attribute(e, b"event")?;
            Ok((event.as_deref() == Some("original-publication"))
                .then_some(Capture::PublicationDate))
        }
        b"subject" => Ok(Some(Capture::Subject)),
        _ => Ok(None),
    }
}

/// Record a manifest item by media type: navigation document, stylesheet or image.
fn read_manifest_item(e: &BytesStart<'_>, info: &mut PackageInfo) -> Result<()> {
    let Some(href) = attribute(e, b"href")? else {
        return Ok(());
    };
    let media_type = attribute(e, b"media-type")?.unwrap_or_default();

    if media_type == NCX_MEDIA_TYPE {
        info.toc = Some(href);
    } else if media_type == CSS_MEDIA_TYPE {
        info.stylesheets.push(href);
    } else if media_type.starts_with("image/") {
        let (dir, name) = match href.find('/') {
            Some(pos) => href.split_at(pos + 1),
            None => ("", href.as_str()),
        };
        let id = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        let mut image = ImageItem::new(id, dir, name);
        image.media_type = media_type;
        info.images.push(image);
    }
    Ok(())
}

/// Parse an NCX navigation document into a tree of nav points.
pub fn parse_ncx(content: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(content);

    struct NavPointState {
        children: Vec<NavPoint>,
        text: Option<String>,
        src: Option<String>,
    }

    let mut stack: Vec<NavPointState> = vec![NavPointState {
        children: Vec::new(),
        text: None,
        src: None,
    }];
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(NavPointState {
                    children: Vec::new(),
                    text: None,
                    src: None,
                }),
                b"text" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content"
                    && let Some(src) = attribute(&e, b"src")?
                    && let Some(state) = stack.last_mut()
                {
                    state.src = Some(src);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    state.text.get_or_insert_with(String::new).push_str(&raw);
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(state) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    state.text.get_or_insert_with(String::new).push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" => {
                    if stack.len() > 1
                        && let Some(state) = stack.pop()
                        && let (Some(text), Some(src)) = (state.text, state.src)
                    {
                        let mut point = NavPoint::new(text.trim(), src);
                        point.children = state.children;

                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(point);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stack.swap_remove(0).children)
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the first attribute with the given local name, entities resolved.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr: Attribute<'_> = attr?;
        if local_name(attr.key.as_ref()) == key {
            let raw = String::from_utf8(attr.value.to_vec())?;
            let value = unescape(&raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.clone());
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Dune</dc:title>
    <dc:creator opf:role="aut" opf:file-as="Herbert, Frank">Frank Herbert</dc:creator>
    <dc:identifier id="BookId">urn:uuid:1234</dc:identifier>
    <dc:language>en-US</dc:language>
    <dc:publisher>Ace &amp; Sons</dc:publisher>
    <dc:description>Spice.</dc:description>
    <dc:coverage>Arrakis</dc:coverage>
    <dc:source>Manuscript</dc:source>
    <dc:rights>All rights reserved</dc:rights>
    <dc:date opf:event="epub-creation">2024-01-01</dc:date>
    <dc:date opf:event="original-publication">1965</dc:date>
    <dc:date opf:event="original-publication">1966</dc:date>
    <dc:subject>Science Fiction</dc:subject>
    <dc:subject>Classics</dc:subject>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="css-main" href="css/main.css" media-type="text/css"/>
    <item id="cover" href="images/cover.jpg" media-type="image/jpeg"/>
    <item id="logo" href="logo.png" media-type="image/png"/>
    <item id="ch1" href="ChapterOne.xml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
  </spine>
</package>"#;

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"opf:file-as"), b"file-as");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_attribute_entities_resolved() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>T</dc:title><dc:identifier>id</dc:identifier><dc:language>en</dc:language>
    <dc:creator opf:file-as="O&apos;Brien &amp; Co, Flann">Flann O'Brien</dc:creator>
  </metadata><manifest>
    <item id="c" href="css/a&#38;b.css" media-type="text/css"/>
    <item id="x" href="odd&unknown;.css" media-type="text/css"/>
  </manifest></package>"#;
        let info = parse_opf(opf).unwrap();
        assert_eq!(info.metadata.author_sort, "O'Brien & Co, Flann");
        assert_eq!(info.stylesheets, vec!["css/a&b.css", "odd&unknown;.css"]);
    }

    #[test]
    fn test_parse_container_xml() {
        let container = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

        let path = parse_container_xml(container).unwrap();
        assert_eq!(path, "OEBPS/content.opf");
        assert_eq!(root_folder(&path), "OEBPS");
    }

    #[test]
    fn test_parse_container_xml_with_bom() {
        let mut container = vec![0xEF, 0xBB, 0xBF];
        container.extend_from_slice(
            br#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#,
        );

        let path = parse_container_xml(&container).unwrap();
        assert_eq!(path, "content.opf");
        assert_eq!(root_folder(&path), "");
    }

    #[test]
    fn test_parse_container_xml_without_rootfile() {
        let err = parse_container_xml(b"<container/>").unwrap_err();
        assert!(matches!(err, Error::InvalidEpub(_)));
    }

    #[test]
    fn test_parse_opf_one_to_one_fields() {
        let info = parse_opf(FULL_OPF).unwrap();
        let meta = &info.metadata;

        assert_eq!(meta.title, "Dune");
        assert_eq!(meta.identifier, "urn:uuid:1234");
        assert_eq!(meta.language, "en-US");
        assert_eq!(meta.publisher, "Ace & Sons");
        assert_eq!(meta.description, "Spice.");
        assert_eq!(meta.coverage, "Arrakis");
        assert_eq!(meta.source, "Manuscript");
        assert_eq!(meta.rights, "All rights reserved");
    }

    #[test]
    fn test_parse_opf_creator_date_subjects() {
        let meta = parse_opf(FULL_OPF).unwrap().metadata;

        assert_eq!(meta.author, "Frank Herbert");
        assert_eq!(meta.author_sort, "Herbert, Frank");
        assert_eq!(meta.orig_publish_date, "1965");
        assert_eq!(meta.subject, "Science Fiction, Classics");
    }

    #[test]
    fn test_parse_opf_manifest_by_media_type() {
        let info = parse_opf(FULL_OPF).unwrap();

        assert_eq!(info.toc.as_deref(), Some("toc.ncx"));
        assert_eq!(info.stylesheets, vec!["css/main.css"]);
        assert_eq!(info.images.len(), 2);

        let cover = &info.images[0];
        assert_eq!(cover.id, "cover");
        assert_eq!(cover.name, "cover.jpg");
        assert_eq!(cover.href, "images/cover.jpg");
        assert_eq!(cover.media_type, "image/jpeg");

        assert_eq!(info.images[1].href, "logo.png");
        assert_eq!(info.images[1].id, "logo");
    }

    #[test]
    fn test_parse_opf_optional_fields_default_empty() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>T</dc:title><dc:identifier>id</dc:identifier><dc:language/>
  </metadata><manifest/></package>"#;
        let info = parse_opf(opf).unwrap();
        assert_eq!(info.metadata.language, "");
        assert_eq!(info.metadata.publisher, "");
        assert_eq!(info.metadata.orig_publish_date, "");
        assert_eq!(info.metadata.subject, "");
        assert_eq!(info.toc, None);
    }

    #[test]
    fn test_parse_opf_missing_required_field() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>T</dc:title><dc:language>en</dc:language>
  </metadata></package>"#;
        let err = parse_opf(opf).unwrap_err();
        assert!(matches!(err, Error::MissingMetadata("identifier")));
    }

    #[test]
    fn test_parse_ncx_nested() {
        let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="part1" playOrder="1">
      <navLabel><text>Part &amp; Parcel</text></navLabel>
      <content src="part1.xml"/>
      <navPoint id="ch1" playOrder="2">
        <navLabel><text>Chapter 1</text></navLabel>
        <content src="ch1.xml"/>
      </navPoint>
    </navPoint>
    <navPoint id="part2" playOrder="3">
      <navLabel><text>Part 2</text></navLabel>
      <content src="part2.xml"/>
    </navPoint>
  </navMap>
</ncx>"#;

        let nav = parse_ncx(ncx).unwrap();

        assert_eq!(nav.len(), 2);
        assert_eq!(nav[0].label, "Part & Parcel");
        assert_eq!(nav[0].children.len(), 1);
        assert_eq!(nav[0].children[0].href, "ch1.xml");
        assert_eq!(nav[1].label, "Part 2");
    }
}
