//! Chapter and sub-chapter units produced by the manuscript splitter.
//!
//! Sections live in a flat arena ([`Sections`]) in the order their headings
//! appear. Parent/child links are [`SectionId`] indices into that arena, so a
//! section's children are owned by the list but reachable from the parent.

use std::ops::Index;

/// Media type of every generated section file.
pub const SECTION_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Extension of generated section files.
pub const SECTION_EXTENSION: &str = "xml";

/// Index of a section within its [`Sections`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

/// One chapter or sub-chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading depth: 1 for chapters, 2 and 3 for nested sub-chapters.
    pub level: u8,
    /// Heading text with tags stripped, separator included.
    pub heading: String,
    /// Short heading name (text before `" - "`).
    pub name: String,
    /// Long heading description (text after `" - "`), possibly empty.
    pub title: String,
    /// Alphanumeric slug: parent identifier followed by this section's name.
    pub identifier: String,
    /// Name as shown in a flat table of contents, dotted by depth.
    pub display_name: String,
    /// Whether the section is part of the linear reading order.
    pub linear: bool,
    /// Raw lines of the section body, in document order.
    pub body: Vec<String>,
    pub parent: Option<SectionId>,
    pub children: Vec<SectionId>,
}

impl Section {
    /// File name of the generated content document (`identifier.xml`).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.identifier, SECTION_EXTENSION)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Display name for a heading at `level`.
///
/// Top-level chapters keep their name. Nested sections get four dots per
/// level below the first, so readers that cannot nest a table of contents
/// still show the hierarchy (`....Scene`, `........Beat`).
pub fn display_name(level: u8, name: &str) -> String {
    let depth = usize::from(level.saturating_sub(1));
    format!("{}{}", "....".repeat(depth), name)
}

/// Ordered list of sections in heading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    items: Vec<Section>,
}

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section, linking it under `section.parent` if set.
    pub(crate) fn push(&mut self, section: Section) -> SectionId {
        let id = SectionId(self.items.len());
        if let Some(parent) = section.parent {
            self.items[parent.0].children.push(id);
        }
        self.items.push(section);
        id
    }

    pub(crate) fn get_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.items.get_mut(id.0)
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.items.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All sections in heading order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.items.iter()
    }

    /// Sections paired with their ids, in heading order.
    pub fn entries(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, s)| (SectionId(i), s))
    }

    /// Sections without a parent, in heading order.
    pub fn roots(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.entries().filter(|(_, s)| s.is_root())
    }

    /// Direct children of a section, in heading order.
    pub fn children(&self, id: SectionId) -> impl Iterator<Item = (SectionId, &Section)> {
        self.items
            .get(id.0)
            .map(|s| s.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&child| (child, &self.items[child.0]))
    }

    /// Most recent section whose level is strictly below `level`.
    pub fn find_parent(&self, level: u8) -> Option<SectionId> {
        self.items
            .iter()
            .rposition(|s| s.level < level)
            .map(SectionId)
    }
}

impl Index<SectionId> for Sections {
    type Output = Section;

    fn index(&self, id: SectionId) -> &Section {
        &self.items[id.0]
    }
}

impl<'a> IntoIterator for &'a Sections {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
