//! Per-conversion working directory.
//!
//! A [`Workspace`] owns one temporary directory holding an unpacked package
//! tree, plus the [`Book`] it was built from or read out of. Nothing is shared
//! between workspaces; each build or unpack gets its own directory, removed on
//! drop unless [`Workspace::keep`] is called.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::book::{Book, ImageItem, Metadata};
use crate::chapters::split_chapters;
use crate::epub::archive::{self, EPUB_EXTENSION, MIMETYPE_ENTRY};
use crate::epub::parser::{parse_container_xml, parse_ncx, parse_opf, root_folder};
use crate::epub::writer::{
    container_xml, generate_ncx, generate_opf, generate_section, generate_title_page,
    DEFAULT_ROOT_FOLDER, DEFAULT_STYLESHEET, MIMETYPE, OPF_FILE,
};
use crate::error::{Error, Result};
use crate::package::{assemble, NavPoint, TocStyle, COVER_ID, NCX_HREF, TITLE_PAGE_HREF};
use crate::util::{decode_text, IMAGE_EXTENSIONS};

pub const META_DIR: &str = "META-INF";
pub const CSS_DIR: &str = "css";
pub const IMAGES_DIR: &str = "images";
pub const STYLESHEET_HREF: &str = "css/main.css";
const CONTAINER_FILE: &str = "container.xml";
const COVER_FALLBACK: &str = "cover.jpg";

/// Settings for building a package from a manuscript.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// `dc:language` of the package.
    pub language: String,
    /// Author written when the file name carries no metadata.
    pub creator: String,
    pub toc_style: TocStyle,
    /// Contents of `css/main.css`.
    pub stylesheet: String,
    /// Overrides today's date as the creation date.
    pub date_created: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            creator: "EPUB Author".to_string(),
            toc_style: TocStyle::default(),
            stylesheet: DEFAULT_STYLESHEET.to_string(),
            date_created: None,
        }
    }
}

/// Where a workspace's package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Split from an HTML manuscript; every package file can be regenerated.
    Manuscript,
    /// Extracted from an existing EPUB; files are edited in place.
    Archive,
}

/// An unpacked package tree in a temporary directory.
#[derive(Debug)]
pub struct Workspace {
    temp: TempDir,
    root: PathBuf,
    content_dir: PathBuf,
    opf_path: PathBuf,
    file_name: String,
    origin: Origin,
    toc_style: TocStyle,
    pub book: Book,
    /// Navigation tree as last written or read.
    pub nav: Vec<NavPoint>,
}

impl Workspace {
    /// Split a manuscript and lay out a complete package tree.
    ///
    /// Book metadata comes from the manuscript's file name
    /// (`Title - Last, First - Publisher - Year - Subject.html`). A cover is
    /// picked up from `<Last>_<Title>.jpg` or `cover.jpg` next to the
    /// manuscript.
    pub fn create(manuscript: impl AsRef<Path>, options: &BuildOptions) -> Result<Self> {
        let manuscript = manuscript.as_ref();
        let file_name = manuscript
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidManuscript(format!("not a file: {}", manuscript.display()))
            })?;

        let mut metadata = Metadata::from_file_name(&file_name).with_defaults(&options.language);
        if let Some(ref date) = options.date_created {
            metadata.date_created = date.clone();
        }
        if metadata.author.is_empty() {
            metadata.author = options.creator.clone();
        }

        let bytes = fs::read(manuscript)?;
        let mut book = Book::new(metadata);
        book.sections = split_chapters(&decode_text(&bytes));

        let package_name = if book.metadata.is_empty() {
            manuscript
                .file_stem()
                .map(|s| s.to_string_lossy().replace(' ', ""))
                .unwrap_or_default()
        } else {
            book.metadata.package_name()
        };

        let temp = tempfile::Builder::new().prefix("bindery-").tempdir()?;
        let root = temp.path().join(&package_name);
        let content_dir = root.join(DEFAULT_ROOT_FOLDER);
        let mut workspace = Self {
            temp,
            opf_path: content_dir.join(OPF_FILE),
            content_dir,
            root,
            file_name: format!("{package_name}.{EPUB_EXTENSION}"),
            origin: Origin::Manuscript,
            toc_style: options.toc_style,
            book,
            nav: Vec::new(),
        };

        let source_dir = manuscript.parent().unwrap_or(Path::new("."));
        if let Err(e) = workspace.lay_out(source_dir, &package_name, &options.stylesheet) {
            let kept = workspace.keep();
            warn!(dir = %kept.display(), error = %e, "build failed; working directory kept");
            return Err(e);
        }

        info!(
            title = %workspace.book.metadata.title,
            sections = workspace.book.sections.len(),
            root = %workspace.root.display(),
            "package built"
        );
        Ok(workspace)
    }

    /// Unpack an existing EPUB and read its package document.
    pub fn open(epub: impl AsRef<Path>) -> Result<Self> {
        let archive::Unpacked {
            temp,
            root,
            file_name,
        } = archive::unpack(epub)?;

        let container = root.join(META_DIR).join(CONTAINER_FILE);
        let opf_relative = if container.is_file() {
            parse_container_xml(&fs::read(&container)?)?
        } else {
            warn!("no container.xml; assuming {DEFAULT_ROOT_FOLDER}/{OPF_FILE}");
            format!("{DEFAULT_ROOT_FOLDER}/{OPF_FILE}")
        };
        let content_dir = root.join(root_folder(&opf_relative));
        let opf_path = root.join(&opf_relative);

        let info = parse_opf(&fs::read_to_string(&opf_path)?)?;
        let nav = match info.toc {
            Some(ref href) => {
                let ncx_path = opf_path.parent().unwrap_or(&content_dir).join(href);
                match fs::read_to_string(&ncx_path) {
                    Ok(ncx) => parse_ncx(&ncx)?,
                    Err(e) => {
                        warn!(path = %ncx_path.display(), error = %e, "navigation document unreadable");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let mut book = Book::new(info.metadata);
        book.images = info.images;
        book.stylesheets = info.stylesheets;
        book.toc = info.toc.unwrap_or_default();

        let workspace = Self {
            temp,
            root,
            content_dir,
            opf_path,
            file_name,
            origin: Origin::Archive,
            toc_style: TocStyle::default(),
            book,
            nav,
        };

        let on_disk = workspace.image_files()?;
        for path in &on_disk {
            let listed = workspace
                .book
                .images
                .iter()
                .any(|image| workspace.content_dir.join(&image.href) == workspace.root.join(path));
            if !listed {
                warn!(image = %path.display(), "image not listed in the manifest");
            }
        }
        info!(
            title = %workspace.book.metadata.title,
            images = on_disk.len(),
            root = %workspace.root.display(),
            "package opened"
        );
        Ok(workspace)
    }

    /// Package root: the directory that becomes the archive.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding `content.opf` and the content files.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn images_dir(&self) -> PathBuf {
        self.content_dir.join(IMAGES_DIR)
    }

    /// Default file name for the saved package.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Copy an image into `images/` and register it with the book.
    ///
    /// Call [`rebuild`](Self::rebuild) afterwards to list it in the manifest.
    pub fn add_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = ImageItem::from_path(path);
        let images_dir = self.images_dir();
        fs::create_dir_all(&images_dir)?;
        fs::copy(path, images_dir.join(&image.name))?;
        info!(image = %image.name, "image added");
        self.book.add_image(image);
        Ok(())
    }

    /// Copy several images; see [`add_image`](Self::add_image).
    pub fn add_images<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> Result<()> {
        for path in paths {
            self.add_image(path)?;
        }
        Ok(())
    }

    /// Regenerate `content.opf` and `toc.ncx` from the book.
    ///
    /// Only manuscript builds carry a section list, so an unpacked archive
    /// cannot be rebuilt without losing its spine.
    pub fn rebuild(&mut self) -> Result<()> {
        if self.origin == Origin::Archive {
            return Err(Error::InvalidEpub(
                "cannot regenerate the package document of an unpacked archive".into(),
            ));
        }

        let package = assemble(&self.book, self.toc_style);

        info!("creating OPF file");
        fs::write(&self.opf_path, generate_opf(&self.book, &package))?;

        info!("creating TOC file");
        fs::write(
            self.content_dir.join(NCX_HREF),
            generate_ncx(&self.book, &package),
        )?;

        self.nav = package.nav;
        Ok(())
    }

    /// Pack the package tree, adding `.epub` when `dest` lacks it.
    pub fn save(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = with_epub_extension(dest.as_ref());
        archive::pack(&self.root, &dest)?;
        Ok(dest)
    }

    /// Every file in the package tree, relative to the root, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file()
                && let Ok(relative) = entry.path().strip_prefix(&self.root)
            {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Image files anywhere in the package tree, by extension.
    pub fn image_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|p| {
                p.extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
            })
            .collect())
    }

    /// Keep the temporary directory on disk and return its path.
    pub fn keep(self) -> PathBuf {
        self.temp.keep()
    }

    fn lay_out(&mut self, source_dir: &Path, package_name: &str, stylesheet: &str) -> Result<()> {
        let meta_dir = self.root.join(META_DIR);
        let css_dir = self.content_dir.join(CSS_DIR);
        for dir in [&meta_dir, &css_dir, &self.images_dir()] {
            fs::create_dir_all(dir)?;
        }

        fs::write(self.root.join(MIMETYPE_ENTRY), MIMETYPE)?;
        fs::write(
            meta_dir.join(CONTAINER_FILE),
            container_xml(DEFAULT_ROOT_FOLDER),
        )?;
        fs::write(self.content_dir.join(STYLESHEET_HREF), stylesheet)?;
        self.book.stylesheets = vec![STYLESHEET_HREF.to_string()];
        self.book.toc = NCX_HREF.to_string();

        if let Some(cover) = find_cover(source_dir, package_name) {
            let name = cover
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            fs::copy(&cover, self.images_dir().join(&name))?;
            let mut image = ImageItem::new(COVER_ID, "images/", name);
            image.source = Some(cover);
            self.book.add_image(image);
            self.book.cover_image = Some(COVER_ID.to_string());
        }

        info!("creating title page");
        fs::write(
            self.content_dir.join(TITLE_PAGE_HREF),
            generate_title_page(&self.book),
        )?;

        for section in &self.book.sections {
            info!(section = %section.name, "creating chapter file");
            fs::write(
                self.content_dir.join(section.file_name()),
                generate_section(&self.book, section),
            )?;
        }

        self.rebuild()
    }
}

/// Cover image next to the manuscript: `<package_name>.jpg`, else `cover.jpg`.
fn find_cover(dir: &Path, package_name: &str) -> Option<PathBuf> {
    [format!("{package_name}.jpg"), COVER_FALLBACK.to_string()]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn with_epub_extension(dest: &Path) -> PathBuf {
    let has_ext = dest
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(EPUB_EXTENSION));
    if has_ext {
        dest.to_path_buf()
    } else {
        let mut name = dest.as_os_str().to_os_string();
        name.push(".");
        name.push(EPUB_EXTENSION);
        PathBuf::from(name)
    }
}
