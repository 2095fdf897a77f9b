//! bindery - HTML manuscript to EPUB builder

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bindery::chapters::split_chapters_from_reader;
use bindery::{BuildOptions, Sections, TocStyle, Workspace};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(version, about = "Split an HTML manuscript into an EPUB package", long_about = None)]
#[command(after_help = "EXAMPLES:
    bindery build \"Dune - Herbert, Frank - Ace Books - 1965 - Science Fiction.html\"
    bindery split draft.html                 Show the chapter tree only
    bindery info Herbert_Dune.epub           Show package metadata
    bindery unpack Herbert_Dune.epub         Extract for editing
    bindery pack /tmp/bindery-x/Herbert_Dune Dune.epub")]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an EPUB from an HTML manuscript
    Build {
        /// Manuscript named "Title - Last, First - Publisher - Year - Subject.html"
        #[arg(value_name = "MANUSCRIPT")]
        input: PathBuf,

        /// Output file (defaults to Last_Title.epub in the current directory)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Package language
        #[arg(long, default_value = "en-US")]
        language: String,

        /// Author to use when the file name carries no metadata
        #[arg(long, default_value = "EPUB Author")]
        creator: String,

        /// Table of contents layout
        #[arg(long, value_enum, default_value_t = TocStyle::Nested)]
        toc: TocStyle,

        /// Stylesheet to ship instead of the built-in one
        #[arg(long, value_name = "CSS")]
        stylesheet: Option<PathBuf>,

        /// Extra images to include
        #[arg(long = "image", value_name = "IMAGE")]
        images: Vec<PathBuf>,

        /// Keep the working directory after saving
        #[arg(long)]
        keep: bool,
    },

    /// Print the chapter tree of a manuscript without building anything
    Split {
        #[arg(value_name = "MANUSCRIPT")]
        input: PathBuf,
    },

    /// Show metadata of an existing EPUB
    Info {
        #[arg(value_name = "EPUB")]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract an EPUB to a working directory and print its path
    Unpack {
        #[arg(value_name = "EPUB")]
        input: PathBuf,
    },

    /// Pack a working directory into an EPUB
    Pack {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let result = match cli.command {
        Command::Build {
            input,
            output,
            language,
            creator,
            toc,
            stylesheet,
            images,
            keep,
        } => {
            let options = BuildOptions {
                language,
                creator,
                toc_style: toc,
                ..Default::default()
            };
            build(input, output, options, stylesheet, images, keep)
        }
        Command::Split { input } => split(input),
        Command::Info { input, json } => show_info(input, json),
        Command::Unpack { input } => unpack(input),
        Command::Pack { dir, output } => bindery::pack(&dir, &output)
            .map(|()| println!("Saved {}", output.display()))
            .map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .init();
}

fn build(
    input: PathBuf,
    output: Option<PathBuf>,
    mut options: BuildOptions,
    stylesheet: Option<PathBuf>,
    images: Vec<PathBuf>,
    keep: bool,
) -> Result<(), String> {
    if let Some(path) = stylesheet {
        options.stylesheet = std::fs::read_to_string(&path)
            .map_err(|e| format!("{}: {e}", path.display()))?;
    }

    let mut workspace = Workspace::create(&input, &options).map_err(|e| e.to_string())?;

    let result = (|| -> bindery::Result<PathBuf> {
        if !images.is_empty() {
            workspace.add_images(&images)?;
            workspace.rebuild()?;
        }
        let dest = output.unwrap_or_else(|| PathBuf::from(workspace.file_name()));
        workspace.save(dest)
    })();

    match result {
        Ok(dest) => {
            println!("Saved {}", dest.display());
            if keep {
                println!("Working directory: {}", workspace.keep().display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Working directory kept: {}", workspace.keep().display());
            Err(e.to_string())
        }
    }
}

fn split(input: PathBuf) -> Result<(), String> {
    let file = std::fs::File::open(&input).map_err(|e| format!("{}: {e}", input.display()))?;
    let sections =
        split_chapters_from_reader(std::io::BufReader::new(file)).map_err(|e| e.to_string())?;
    print_tree(&sections);
    Ok(())
}

fn print_tree(sections: &Sections) {
    for section in sections {
        let indent = "  ".repeat(usize::from(section.level.saturating_sub(1)));
        let linear = if section.linear { "" } else { " (non-linear)" };
        println!(
            "{indent}{} -> {} [{} lines]{linear}",
            section.heading,
            section.file_name(),
            section.body.len()
        );
    }
    println!("Sections: {}", sections.len());
}

fn show_info(input: PathBuf, json: bool) -> Result<(), String> {
    let workspace = Workspace::open(&input).map_err(|e| e.to_string())?;
    let book = &workspace.book;

    if json {
        let value = serde_json::json!({
            "file": workspace.file_name(),
            "metadata": book.metadata,
            "toc": book.toc,
            "stylesheets": book.stylesheets,
            "images": book.images,
            "nav": workspace.nav,
        });
        let text = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    let meta = &book.metadata;
    println!("File: {}", workspace.file_name());
    println!("Title: {}", meta.title);
    if !meta.author.is_empty() {
        println!("Author: {} ({})", meta.author, meta.author_sort);
    }
    println!("Identifier: {}", meta.identifier);
    println!("Language: {}", meta.language);
    if !meta.publisher.is_empty() {
        println!("Publisher: {}", meta.publisher);
    }
    if !meta.orig_publish_date.is_empty() {
        println!("Published: {}", meta.orig_publish_date);
    }
    if !meta.subject.is_empty() {
        println!("Subject: {}", meta.subject);
    }
    if !meta.description.is_empty() {
        let desc = meta.description.trim();
        match desc.char_indices().nth(200) {
            Some((cut, _)) => println!("Description: {}...", &desc[..cut]),
            None => println!("Description: {desc}"),
        }
    }
    println!("TOC: {}", book.toc);
    println!("Stylesheets: {}", book.stylesheets.len());
    println!("Images: {}", book.images.len());
    println!("TOC entries: {}", workspace.nav.len());

    Ok(())
}

fn unpack(input: PathBuf) -> Result<(), String> {
    let workspace = Workspace::open(&input).map_err(|e| e.to_string())?;
    for file in workspace.files().map_err(|e| e.to_string())? {
        println!("  {}", file.display());
    }
    let root = workspace.root().to_path_buf();
    workspace.keep();
    println!("Unpacked to {}", root.display());
    Ok(())
}
