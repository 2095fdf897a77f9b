//! # bindery
//!
//! Turn a single flat HTML manuscript into an EPUB package, one content file
//! per chapter, and unpack existing EPUBs for inspection.
//!
//! ## Features
//!
//! - Split a manuscript on `<h1>`, `<h2>` and `<h3>` lines into nested sections
//! - Read book metadata from the manuscript's file name
//! - Generate `content.opf`, `toc.ncx`, a title page and section documents
//! - Pack and unpack EPUB archives (`mimetype` first, stored)
//! - Read metadata, stylesheets and images back out of an existing package
//!
//! ## Quick Start
//!
//! ```no_run
//! use bindery::{BuildOptions, Workspace};
//!
//! let workspace = Workspace::create(
//!     "Dune - Herbert, Frank - Ace Books - 1965 - Science Fiction.html",
//!     &BuildOptions::default(),
//! )?;
//! workspace.save("Dune.epub")?;
//! # Ok::<(), bindery::Error>(())
//! ```
//!
//! ## Splitting Without a Package
//!
//! ```
//! use bindery::chapters::split_chapters;
//!
//! let html = "<body>\n<h1>Chapter One - Arrakis</h1>\n<p>...</p>\n<h2>The Desert</h2>\n</body>";
//! let sections = split_chapters(html);
//!
//! let ids: Vec<_> = sections.iter().map(|s| s.identifier.as_str()).collect();
//! assert_eq!(ids, ["ChapterOne", "ChapterOneTheDesert"]);
//! ```

pub mod book;
pub mod chapters;
pub mod epub;
pub mod error;
pub mod package;
pub mod util;
pub mod workspace;

pub use book::{Book, ImageItem, Metadata, Section, SectionId, Sections};
pub use epub::{pack, unpack, PackageInfo};
pub use error::{Error, Result};
pub use package::{assemble, Package, TocStyle};
pub use workspace::{BuildOptions, Origin, Workspace};
