//! End-to-end tests: manuscript in, EPUB out, and back again.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use bindery::{BuildOptions, Origin, TocStyle, Workspace};
use tempfile::TempDir;
use zip::{CompressionMethod, ZipArchive};

const DUNE_FILE: &str = "Dune - Herbert, Frank - Ace Books - 1965 - Science Fiction.html";

const DUNE_HTML: &str = r#"<html>
<head><title>Dune</title></head>
<body>
<p>Front matter that belongs to no chapter.</p>
<h1>Chapter One - Arrakis</h1>
<p>In the week before their departure to Arrakis,</p>
<p>an old crone came to visit the mother of the boy, Paul.</p>
<h2>The Desert - A Subsection</h2>
<p>Sand, as far as the eye could see.</p>
</body>
</html>
"#;

fn options() -> BuildOptions {
    BuildOptions {
        date_created: Some("2024-05-01".to_string()),
        ..Default::default()
    }
}

fn write_manuscript(dir: &Path, name: &str, html: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, html).unwrap();
    path
}

fn entry_names(epub: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(fs::File::open(epub).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn read_entry(epub: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(fs::File::open(epub).unwrap()).unwrap();
    let mut contents = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    contents
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn test_dune_metadata_and_sections() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);

    let workspace = Workspace::create(&manuscript, &options()).unwrap();
    let book = &workspace.book;

    let meta = &book.metadata;
    assert_eq!(meta.title, "Dune");
    assert_eq!(meta.author, "Frank Herbert");
    assert_eq!(meta.author_sort, "Herbert, Frank");
    assert_eq!(meta.publisher, "Ace Books");
    assert_eq!(meta.orig_publish_date, "1965");
    assert_eq!(meta.subject, "Science Fiction");
    assert_eq!(meta.language, "en-US");
    assert_eq!(meta.date_created, "2024-05-01");

    assert_eq!(book.sections.len(), 2);
    let roots: Vec<_> = book.sections.roots().collect();
    assert_eq!(roots.len(), 1);
    let (root_id, root) = roots[0];
    assert_eq!(root.identifier, "ChapterOne");
    assert_eq!(root.level, 1);
    assert_eq!(root.title, "Arrakis");
    assert_eq!(root.body.len(), 2);

    let children: Vec<_> = book.sections.children(root_id).collect();
    assert_eq!(children.len(), 1);
    let (_, child) = children[0];
    assert_eq!(child.identifier, "ChapterOneTheDesert");
    assert_eq!(child.level, 2);
    assert_eq!(child.body.len(), 1);
    assert_eq!(child.display_name, "....The Desert");

    assert_eq!(workspace.file_name(), "Herbert_Dune.epub");
    assert_eq!(workspace.origin(), Origin::Manuscript);
}

#[test]
fn test_package_tree_layout() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let workspace = Workspace::create(&manuscript, &options()).unwrap();

    let files: Vec<String> = workspace
        .files()
        .unwrap()
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();

    for expected in [
        "mimetype",
        "META-INF/container.xml",
        "OPS/content.opf",
        "OPS/toc.ncx",
        "OPS/titlepage.xml",
        "OPS/css/main.css",
        "OPS/ChapterOne.xml",
        "OPS/ChapterOneTheDesert.xml",
    ] {
        assert!(files.contains(&expected.to_string()), "missing {expected}: {files:?}");
    }

    let chapter = fs::read_to_string(workspace.content_dir().join("ChapterOne.xml")).unwrap();
    assert!(chapter.contains(r#"<h1 id="ChapterOne">Chapter One - Arrakis</h1>"#));
    assert!(chapter.contains("<p>an old crone came to visit the mother of the boy, Paul.</p>"));
    assert!(!chapter.contains("Front matter"));
    assert!(!chapter.contains("Sand"));
}

#[test]
fn test_saved_archive_starts_with_stored_mimetype() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let workspace = Workspace::create(&manuscript, &options()).unwrap();

    let dest = workspace.save(dir.path().join("out")).unwrap();
    assert_eq!(dest, dir.path().join("out.epub"));

    let mut archive = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    {
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }
    for i in 1..archive.len() {
        let entry = archive.by_index(i).unwrap();
        assert_ne!(entry.name(), "mimetype");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
    }

    assert_eq!(read_entry(&dest, "mimetype"), "application/epub+zip");
}

#[test]
fn test_opf_spine_and_ncx_nesting() {
    let dir = TempDir::new().unwrap();
    let footnoted = DUNE_HTML.replace(
        "</body>",
        "<h1>Footnotes</h1>\n<p>[1] The spice must flow.</p>\n</body>",
    );
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, &footnoted);
    let workspace = Workspace::create(&manuscript, &options()).unwrap();
    let dest = workspace.save(dir.path().join("Dune.epub")).unwrap();

    let opf = read_entry(&dest, "OPS/content.opf");
    let title_page = opf.find(r#"<itemref idref="titlepage"/>"#).unwrap();
    let chapter = opf.find(r#"<itemref idref="ChapterOne"/>"#).unwrap();
    let desert = opf.find(r#"<itemref idref="ChapterOneTheDesert"/>"#).unwrap();
    assert!(title_page < chapter && chapter < desert);
    assert!(opf.contains(r#"<itemref idref="Footnotes" linear="no"/>"#));
    assert!(opf.contains(r#"<dc:date opf:event="epub-creation">2024-05-01</dc:date>"#));

    let ncx = read_entry(&dest, "OPS/toc.ncx");
    assert!(ncx.contains(r#"<meta name="dtb:depth" content="2"/>"#));
    let outer = ncx.find("<text>Chapter One</text>").unwrap();
    let inner = ncx.find("<text>The Desert</text>").unwrap();
    assert!(outer < inner);
    assert!(!ncx[outer..inner].contains("</navPoint>"));
}

#[test]
fn test_flat_toc_lists_every_section_at_top_level() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let flat = BuildOptions {
        toc_style: TocStyle::Flat,
        ..options()
    };
    let workspace = Workspace::create(&manuscript, &flat).unwrap();

    assert_eq!(workspace.nav.len(), 2);
    assert!(workspace.nav.iter().all(|p| p.children.is_empty()));
    assert_eq!(workspace.nav[1].label, "....The Desert");
}

#[test]
fn test_dry_run_file_name() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), "draft notes.html", DUNE_HTML);

    let workspace = Workspace::create(&manuscript, &options()).unwrap();
    assert!(workspace.book.metadata.is_empty());
    assert_eq!(workspace.book.metadata.author, "EPUB Author");
    assert_eq!(workspace.file_name(), "draftnotes.epub");
    assert_eq!(workspace.book.sections.len(), 2);
}

#[test]
fn test_creator_option_fills_missing_author() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), "draft.html", DUNE_HTML);
    let custom = BuildOptions {
        creator: "Jane Doe".to_string(),
        ..options()
    };

    let workspace = Workspace::create(&manuscript, &custom).unwrap();
    assert_eq!(workspace.book.metadata.author, "Jane Doe");
    let opf = fs::read_to_string(workspace.content_dir().join("content.opf")).unwrap();
    assert!(opf.contains(">Jane Doe</dc:creator>"));
}

#[test]
fn test_cover_next_to_manuscript() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    fs::write(dir.path().join("Herbert_Dune.jpg"), b"\xff\xd8\xff").unwrap();

    let workspace = Workspace::create(&manuscript, &options()).unwrap();
    assert_eq!(workspace.book.cover_image.as_deref(), Some("cover"));
    assert!(workspace.images_dir().join("Herbert_Dune.jpg").is_file());

    let dest = workspace.save(dir.path().join("Dune.epub")).unwrap();
    let opf = read_entry(&dest, "OPS/content.opf");
    assert!(opf.contains(r#"<meta name="cover" content="cover"/>"#));
    assert!(opf.contains(r#"href="images/Herbert_Dune.jpg" media-type="image/jpeg""#));
    assert!(entry_names(&dest).contains(&"OPS/images/Herbert_Dune.jpg".to_string()));
}

#[test]
fn test_added_image_reaches_manifest_after_rebuild() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let map = dir.path().join("map.png");
    fs::write(&map, b"\x89PNG").unwrap();

    let mut workspace = Workspace::create(&manuscript, &options()).unwrap();
    workspace.add_image(&map).unwrap();
    workspace.rebuild().unwrap();

    let opf = fs::read_to_string(workspace.content_dir().join("content.opf")).unwrap();
    assert!(opf.contains(r#"href="images/map.png" media-type="image/png""#));
    assert_eq!(
        workspace.image_files().unwrap(),
        vec![PathBuf::from("OPS").join("images").join("map.png")]
    );
}

// ============================================================================
// Open
// ============================================================================

#[test]
fn test_reopen_reads_metadata_back() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let built = Workspace::create(&manuscript, &options()).unwrap();
    let dest = built.save(dir.path().join("Herbert_Dune.epub")).unwrap();

    let opened = Workspace::open(&dest).unwrap();
    assert_eq!(opened.origin(), Origin::Archive);
    assert_eq!(opened.file_name(), "Herbert_Dune.epub");

    let meta = &opened.book.metadata;
    assert_eq!(meta.title, "Dune");
    assert_eq!(meta.author, "Frank Herbert");
    assert_eq!(meta.author_sort, "Herbert, Frank");
    assert_eq!(meta.language, "en-US");
    assert_eq!(meta.publisher, "Ace Books");
    assert_eq!(meta.orig_publish_date, "1965");
    assert_eq!(meta.subject, "Science Fiction");
    assert!(meta.identifier.starts_with("urn:uuid:"));
    assert_eq!(meta.description, "");

    assert_eq!(opened.book.toc, "toc.ncx");
    assert_eq!(opened.book.stylesheets, vec!["css/main.css".to_string()]);

    let labels: Vec<_> = opened.nav.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, ["Title Page", "Chapter One"]);
    assert_eq!(opened.nav[1].children[0].label, "The Desert");
}

#[test]
fn test_reopened_archive_cannot_be_rebuilt() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);
    let built = Workspace::create(&manuscript, &options()).unwrap();
    let dest = built.save(dir.path().join("Dune.epub")).unwrap();

    let mut opened = Workspace::open(&dest).unwrap();
    assert!(opened.rebuild().is_err());

    // Saving an unpacked archive repacks it unchanged.
    let again = opened.save(dir.path().join("Dune-copy")).unwrap();
    assert_eq!(entry_names(&again), entry_names(&dest));
}

#[test]
fn test_workspace_removed_on_drop_unless_kept() {
    let dir = TempDir::new().unwrap();
    let manuscript = write_manuscript(dir.path(), DUNE_FILE, DUNE_HTML);

    let dropped = Workspace::create(&manuscript, &options()).unwrap();
    let dropped_root = dropped.root().to_path_buf();
    drop(dropped);
    assert!(!dropped_root.exists());

    let kept = Workspace::create(&manuscript, &options()).unwrap();
    let kept_root = kept.root().to_path_buf();
    let temp = kept.keep();
    assert!(kept_root.is_dir());
    fs::remove_dir_all(temp).unwrap();
}
