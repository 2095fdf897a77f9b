//! Assemble manifest, spine and navigation tree for a [`Book`].
//!
//! The result is plain data; [`crate::epub::writer`] turns it into
//! `content.opf` and `toc.ncx`.

use crate::book::{Book, SectionId, Sections, SECTION_MEDIA_TYPE};

pub const NCX_ID: &str = "ncx";
pub const NCX_HREF: &str = "toc.ncx";
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
pub const TITLE_PAGE_ID: &str = "titlepage";
pub const TITLE_PAGE_HREF: &str = "titlepage.xml";
pub const COVER_ID: &str = "cover";
/// Manifest ids taken by generated items; sections never use them.
pub const RESERVED_IDS: [&str; 3] = [NCX_ID, TITLE_PAGE_ID, COVER_ID];
pub const CSS_MEDIA_TYPE: &str = "text/css";

/// How sections appear in the navigation document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TocStyle {
    /// Sub-chapters nest under their parent chapter.
    #[default]
    Nested,
    /// Every section is top level, labelled with its dotted display name.
    Flat,
}

/// A manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

impl ManifestItem {
    fn new(id: impl Into<String>, href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
        }
    }
}

/// A reading-order entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

/// A navigation document entry (hierarchical).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct NavPoint {
    pub label: String,
    pub href: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Number of levels in this subtree, counting this point.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(NavPoint::depth).max().unwrap_or(0)
    }
}

/// Everything the package descriptor and navigation document list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub nav: Vec<NavPoint>,
    /// Manifest id of the cover image.
    pub cover_id: Option<String>,
}

impl Package {
    /// Depth of the navigation tree (at least 1).
    pub fn nav_depth(&self) -> usize {
        self.nav.iter().map(NavPoint::depth).max().unwrap_or(1)
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

/// Build the manifest, spine and navigation tree for a book.
///
/// The manifest lists the navigation document, the title page, every section
/// file, every stylesheet and every image. The spine is the title page
/// followed by sections in heading order, with footnote sections marked
/// non-linear.
pub fn assemble(book: &Book, toc_style: TocStyle) -> Package {
    let mut manifest = vec![
        ManifestItem::new(NCX_ID, NCX_HREF, NCX_MEDIA_TYPE),
        ManifestItem::new(TITLE_PAGE_ID, TITLE_PAGE_HREF, SECTION_MEDIA_TYPE),
    ];
    let mut spine = vec![SpineItem {
        idref: TITLE_PAGE_ID.to_string(),
        linear: true,
    }];

    for section in &book.sections {
        manifest.push(ManifestItem::new(
            &section.identifier,
            section.file_name(),
            SECTION_MEDIA_TYPE,
        ));
        spine.push(SpineItem {
            idref: section.identifier.clone(),
            linear: section.linear,
        });
    }

    for href in &book.stylesheets {
        manifest.push(ManifestItem::new(stylesheet_id(href), href, CSS_MEDIA_TYPE));
    }

    for image in &book.images {
        manifest.push(ManifestItem::new(&image.id, &image.href, &image.media_type));
    }

    let nav = match toc_style {
        TocStyle::Nested => book
            .sections
            .roots()
            .map(|(id, _)| nested_nav_point(&book.sections, id))
            .collect(),
        TocStyle::Flat => book
            .sections
            .iter()
            .map(|s| NavPoint::new(&s.display_name, s.file_name()))
            .collect(),
    };

    Package {
        manifest,
        spine,
        nav,
        cover_id: book.cover_image.clone(),
    }
}

fn nested_nav_point(sections: &Sections, id: SectionId) -> NavPoint {
    let section = &sections[id];
    NavPoint {
        label: section.name.clone(),
        href: section.file_name(),
        children: sections
            .children(id)
            .map(|(child, _)| nested_nav_point(sections, child))
            .collect(),
    }
}

/// Manifest id for a stylesheet: `css-` plus its file stem.
fn stylesheet_id(href: &str) -> String {
    let file = href.rsplit('/').next().unwrap_or(href);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    format!("css-{stem}")
}
