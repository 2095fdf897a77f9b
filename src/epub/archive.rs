//! Pack a package directory into an EPUB archive and unpack one for editing.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::writer::MIMETYPE;
use crate::error::{Error, Result};

/// Name of the sentinel entry that must come first, uncompressed.
pub const MIMETYPE_ENTRY: &str = "mimetype";

/// Package file extension.
pub const EPUB_EXTENSION: &str = "epub";

/// An archive extracted to a fresh temporary directory.
///
/// The directory is deleted when this value is dropped, unless
/// [`keep`](Self::keep) is called.
#[derive(Debug)]
pub struct Unpacked {
    pub temp: TempDir,
    /// Extracted package root (`<temp>/<stem>`).
    pub root: PathBuf,
    /// Canonical package file name: `<stem>.epub`.
    pub file_name: String,
}

impl Unpacked {
    /// Stop tracking the temporary directory and return its path.
    pub fn keep(self) -> PathBuf {
        self.temp.keep()
    }
}

/// Extract an EPUB into a new temporary directory.
///
/// The archive's `mimetype` entry is not checked; a package without one is
/// extracted all the same and only logged.
pub fn unpack(path: impl AsRef<Path>) -> Result<Unpacked> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidEpub(format!("no file name in {}", path.display())))?;

    let temp = tempfile::Builder::new().prefix("bindery-").tempdir()?;
    let root = temp.path().join(&stem);
    fs::create_dir_all(&root)?;

    let mut archive = ZipArchive::new(File::open(path)?)?;
    if archive.index_for_name(MIMETYPE_ENTRY).is_none() {
        warn!(path = %path.display(), "archive has no mimetype entry");
    }
    archive.extract(&root)?;

    info!(path = %path.display(), root = %root.display(), entries = archive.len(), "unpacked");
    Ok(Unpacked {
        temp,
        root,
        file_name: format!("{stem}.{EPUB_EXTENSION}"),
    })
}

/// Pack a package directory into an EPUB file, replacing any existing file.
pub fn pack(dir: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let dest = dest.as_ref();
    if dest.exists() {
        debug!(dest = %dest.display(), "replacing existing package");
        fs::remove_file(dest)?;
    }
    let file = File::create(dest)?;
    pack_to_writer(dir.as_ref(), file)?;
    info!(dest = %dest.display(), "package saved");
    Ok(())
}

/// Pack a package directory into any [`Write`] + [`Seek`] destination.
///
/// `mimetype` is written first and stored uncompressed, from the directory's
/// own file when present and the standard value otherwise. Every other file
/// is deflated under its path relative to `dir`; files named `mimetype`
/// (any case, any depth) are not written again.
pub fn pack_to_writer<W: Write + Seek>(dir: &Path, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);

    let options_stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mimetype = match fs::read(dir.join(MIMETYPE_ENTRY)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => MIMETYPE.as_bytes().to_vec(),
        Err(e) => return Err(e.into()),
    };
    zip.start_file(MIMETYPE_ENTRY, options_stored)?;
    zip.write_all(&mimetype)?;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file()
            || entry
                .file_name()
                .to_string_lossy()
                .eq_ignore_ascii_case(MIMETYPE_ENTRY)
        {
            continue;
        }

        let name = archive_name(dir, entry.path())?;
        zip.start_file(name.as_str(), options_deflate)?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
    }

    Ok(zip.finish()?)
}

/// Archive entry name: path relative to `root`, `/`-separated.
fn archive_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| Error::Io(io::Error::other(e)))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
