//! Book aggregate: metadata, sections, images.

mod section;

pub use section::{
    display_name, Section, SectionId, Sections, SECTION_EXTENSION, SECTION_MEDIA_TYPE,
};

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::util::{image_media_type, short_hash, today};

/// Separator between fields of a manuscript file name.
pub const FIELD_SEPARATOR: &str = " - ";

/// Everything needed to build one package.
///
/// Created per conversion run and dropped once the package is written.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    pub sections: Sections,
    pub images: Vec<ImageItem>,
    /// Stylesheet hrefs relative to the package root folder.
    pub stylesheets: Vec<String>,
    /// Href of the navigation document, relative to the package root folder.
    pub toc: String,
    /// Manifest id of the cover image, if any.
    pub cover_image: Option<String>,
}

impl Book {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Register an image, replacing any earlier image with the same href.
    pub fn add_image(&mut self, image: ImageItem) {
        self.images.retain(|i| i.href != image.href);
        self.images.push(image);
    }
}

/// Book metadata (Dublin Core plus the fields the file-name convention carries).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Metadata {
    pub title: String,
    /// Display form: `First Last`.
    pub author: String,
    /// Sort form: `Last, First`.
    pub author_sort: String,
    pub identifier: String,
    pub language: String,
    pub publisher: String,
    pub description: String,
    pub coverage: String,
    pub source: String,
    pub rights: String,
    pub orig_publish_date: String,
    /// Subjects joined with `", "`.
    pub subject: String,
    /// Date the package was generated (`YYYY-MM-DD`).
    pub date_created: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Parse `Title - Last, First - Publisher - Year - Subject` from a file name.
    ///
    /// The extension and directory are ignored. The subject is optional. With
    /// fewer than four fields every field is left empty: the manuscript is
    /// still split, as a structural dry run.
    ///
    /// ```
    /// use bindery::Metadata;
    ///
    /// let meta = Metadata::from_file_name("Dune - Herbert, Frank - Ace Books - 1965 - Science Fiction.html");
    /// assert_eq!(meta.author, "Frank Herbert");
    /// assert_eq!(meta.subject, "Science Fiction");
    /// ```
    pub fn from_file_name(file_name: &str) -> Self {
        let stem = file_stem(file_name);
        let fields: Vec<&str> = stem.split(FIELD_SEPARATOR).collect();

        if fields.len() < 4 {
            warn!(
                file = %file_name,
                fields = fields.len(),
                "file name lacks metadata fields; building with empty metadata"
            );
            return Self::default();
        }

        let title = fields[0].trim().to_string();
        let author_sort = fields[1].trim().to_string();
        let author = match author_sort.split_once(',') {
            Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
            None => author_sort.clone(),
        };

        Self {
            identifier: short_hash(&format!("{author_sort}{title}")),
            publisher: fields[2].trim().to_string(),
            orig_publish_date: fields[3].trim().to_string(),
            subject: fields.get(4).map(|s| s.trim().to_string()).unwrap_or_default(),
            title,
            author,
            author_sort,
            ..Default::default()
        }
    }

    /// Whether this record came from a dry-run file name.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.author_sort.is_empty()
    }

    /// Author surname, the part of the sort form before the comma.
    pub fn author_last(&self) -> &str {
        self.author_sort
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }

    /// Default package name: `Last_TitleInTitleCase`, spaces removed.
    pub fn package_name(&self) -> String {
        format!("{}_{}", self.author_last(), title_case(&self.title)).replace(' ', "")
    }

    pub fn title_hash(&self) -> String {
        short_hash(&self.title)
    }

    pub fn author_hash(&self) -> String {
        short_hash(&self.author_sort)
    }

    /// Obfuscated library name for the package, from [`package_name`](Self::package_name).
    pub fn file_name_hash(&self) -> String {
        short_hash(&self.package_name())
    }

    /// Fill in the fields a fresh package needs but the file name can't carry.
    pub fn with_defaults(mut self, language: &str) -> Self {
        if self.language.is_empty() {
            self.language = language.to_string();
        }
        if self.date_created.is_empty() {
            self.date_created = today();
        }
        self
    }
}

/// File name without directory or extension.
///
/// Only a short alphanumeric suffix counts as an extension, so titles such as
/// `Dr. Who - ...` keep their dots.
fn file_stem(file_name: &str) -> &str {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}

/// Capitalise the first letter of every word and lowercase the rest.
///
/// Any non-alphabetic character starts a new word.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// An image file carried in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ImageItem {
    /// Manifest id (file stem, or `cover`).
    pub id: String,
    /// File name without directory.
    pub name: String,
    /// Path relative to the package root folder (`images/cover.jpg`).
    pub href: String,
    /// Where the file was copied from, if it came from outside the package.
    pub source: Option<PathBuf>,
    pub media_type: String,
}

impl ImageItem {
    /// Image stored under `dir` (e.g. `images/`) inside the package.
    pub fn new(id: impl Into<String>, dir: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let media_type = image_media_type(&name)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            id: id.into(),
            href: format!("{dir}{name}"),
            name,
            source: None,
            media_type,
        }
    }

    /// Image copied from a file on disk, named after the file stem.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: Some(path.to_path_buf()),
            ..Self::new(id, "images/", name)
        }
    }
}
