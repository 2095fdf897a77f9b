//! Render package files: `content.opf`, `toc.ncx`, title page and sections.
//!
//! Output is built as strings, one element per line, EPUB 2 flavoured.

use crate::book::{Book, Section};
use crate::package::{NavPoint, Package};
use crate::util::{escape_xml, uuid_hash};

/// Contents of the `mimetype` sentinel.
pub const MIMETYPE: &str = "application/epub+zip";

/// Default root folder for package content.
pub const DEFAULT_ROOT_FOLDER: &str = "OPS";

pub const OPF_FILE: &str = "content.opf";

/// `META-INF/container.xml` pointing at `root/content.opf`.
pub fn container_xml(root: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}/{OPF_FILE}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#,
        escape_xml(root)
    )
}

/// Stylesheet shipped with every new package.
pub const DEFAULT_STYLESHEET: &str = r#"body {
  font-family: serif;
  margin: 0 5%;
  text-align: justify;
}

h1, h2, h3 {
  font-family: sans-serif;
  text-align: center;
  page-break-before: always;
}

p {
  margin: 0;
  text-indent: 1.5em;
}

.titlepage {
  text-align: center;
  margin-top: 30%;
}

.author {
  font-style: italic;
}
"#;

/// Package identifier: `urn:uuid:` plus a hash of author and title, or the
/// stored identifier when the metadata carries no author/title.
pub fn package_uid(book: &Book) -> String {
    let meta = &book.metadata;
    if meta.is_empty() {
        meta.identifier.clone()
    } else {
        format!(
            "urn:uuid:{}",
            uuid_hash(&format!("{}{}", meta.author_sort, meta.title))
        )
    }
}

pub fn generate_opf(book: &Book, package: &Package) -> String {
    let meta = &book.metadata;
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );

    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&meta.title)
    ));
    opf.push_str(&format!(
        "    <dc:creator opf:role=\"aut\" opf:file-as=\"{}\">{}</dc:creator>\n",
        escape_xml(&meta.author_sort),
        escape_xml(&meta.author)
    ));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\" opf:scheme=\"UUID\">{}</dc:identifier>\n",
        escape_xml(&package_uid(book))
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(&meta.language)
    ));

    for (name, value) in [
        ("publisher", &meta.publisher),
        ("description", &meta.description),
        ("coverage", &meta.coverage),
        ("source", &meta.source),
        ("rights", &meta.rights),
    ] {
        opf.push_str(&format!(
            "    <dc:{name}>{}</dc:{name}>\n",
            escape_xml(value)
        ));
    }

    if !meta.orig_publish_date.is_empty() {
        opf.push_str(&format!(
            "    <dc:date opf:event=\"original-publication\">{}</dc:date>\n",
            escape_xml(&meta.orig_publish_date)
        ));
    }
    if !meta.date_created.is_empty() {
        opf.push_str(&format!(
            "    <dc:date opf:event=\"epub-creation\">{}</dc:date>\n",
            escape_xml(&meta.date_created)
        ));
    }

    for subject in meta
        .subject
        .split(", ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        opf.push_str(&format!(
            "    <dc:subject>{}</dc:subject>\n",
            escape_xml(subject)
        ));
    }

    if let Some(ref cover) = package.cover_id {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            escape_xml(cover)
        ));
    }

    opf.push_str("  </metadata>\n  <manifest>\n");

    for item in &package.manifest {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
            escape_xml(&item.id),
            escape_xml(&item.href),
            escape_xml(&item.media_type)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");

    for item in &package.spine {
        if item.linear {
            opf.push_str(&format!(
                "    <itemref idref=\"{}\"/>\n",
                escape_xml(&item.idref)
            ));
        } else {
            opf.push_str(&format!(
                "    <itemref idref=\"{}\" linear=\"no\"/>\n",
                escape_xml(&item.idref)
            ));
        }
    }

    opf.push_str("  </spine>\n  <guide>\n");
    opf.push_str(
        "    <reference type=\"title-page\" title=\"Title Page\" href=\"titlepage.xml\"/>\n",
    );
    opf.push_str("  </guide>\n</package>\n");
    opf
}

pub fn generate_ncx(book: &Book, package: &Package) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );

    ncx.push_str(&escape_xml(&package_uid(book)));
    ncx.push_str(&format!(
        r#""/>
    <meta name="dtb:depth" content="{}"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
        package.nav_depth()
    ));
    ncx.push_str(&escape_xml(&book.metadata.title));
    ncx.push_str("</text>\n  </docTitle>\n");
    ncx.push_str(&format!(
        "  <docAuthor>\n    <text>{}</text>\n  </docAuthor>\n  <navMap>\n",
        escape_xml(&book.metadata.author_sort)
    ));

    let mut play_order = 1;
    let title_page = NavPoint::new("Title Page", "titlepage.xml");
    write_nav_point(&mut ncx, &title_page, &mut play_order, 2);
    for point in &package.nav {
        write_nav_point(&mut ncx, point, &mut play_order, 2);
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn write_nav_point(ncx: &mut String, point: &NavPoint, play_order: &mut usize, indent: usize) {
    let indent_str = "  ".repeat(indent);

    ncx.push_str(&format!(
        "{}<navPoint id=\"navpoint-{}\" playOrder=\"{}\">\n",
        indent_str, play_order, play_order
    ));
    ncx.push_str(&format!(
        "{}  <navLabel>\n{}    <text>{}</text>\n{}  </navLabel>\n",
        indent_str,
        indent_str,
        escape_xml(&point.label),
        indent_str
    ));
    ncx.push_str(&format!(
        "{}  <content src=\"{}\"/>\n",
        indent_str,
        escape_xml(&point.href)
    ));

    *play_order += 1;

    for child in &point.children {
        write_nav_point(ncx, child, play_order, indent + 1);
    }

    ncx.push_str(&format!("{}</navPoint>\n", indent_str));
}

const XHTML_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
"#;

fn xhtml_open(title: &str, stylesheets: &[String]) -> String {
    let mut out = String::from(XHTML_HEAD);
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", escape_xml(title)));
    for href in stylesheets {
        out.push_str(&format!(
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
            escape_xml(href)
        ));
    }
    out.push_str("</head>\n");
    out
}

pub fn generate_title_page(book: &Book) -> String {
    let meta = &book.metadata;
    let mut page = xhtml_open(&meta.title, &book.stylesheets);
    page.push_str("<body>\n<div class=\"titlepage\">\n");
    page.push_str(&format!("  <h1>{}</h1>\n", escape_xml(&meta.title)));
    page.push_str(&format!(
        "  <p class=\"author\">{}</p>\n",
        escape_xml(&meta.author)
    ));
    if !meta.publisher.is_empty() {
        page.push_str(&format!("  <p>{}</p>\n", escape_xml(&meta.publisher)));
    }
    if !meta.orig_publish_date.is_empty() {
        page.push_str(&format!("  <p>{}</p>\n", escape_xml(&meta.orig_publish_date)));
    }
    page.push_str("</div>\n</body>\n</html>\n");
    page
}

/// Content document for one section.
///
/// The heading is re-emitted at the section's level; body lines are copied
/// as they appeared in the manuscript.
pub fn generate_section(book: &Book, section: &Section) -> String {
    let mut page = xhtml_open(&book.metadata.title, &book.stylesheets);
    page.push_str("<body>\n");
    page.push_str(&format!(
        "<h{level} id=\"{}\">{}</h{level}>\n",
        escape_xml(&section.identifier),
        escape_xml(&section.heading),
        level = section.level
    ));
    for line in &section.body {
        page.push_str(line);
        page.push('\n');
    }
    page.push_str("</body>\n</html>\n");
    page
}
