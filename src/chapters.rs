//! Split a flat HTML manuscript into chapter sections.
//!
//! The splitter is line-oriented. It recognises the literal heading openers
//! `<h1>`, `<h2>` and `<h3>` at the start of a trimmed line and nothing else.
//! Everything between `<body` and `</body` (or `</html`) that is not a
//! heading is collected, untouched, into whichever section was opened last.
//!
//! Parent resolution follows heading order rather than a stack: a new
//! section's parent is the most recent earlier section whose level is lower.
//! Skipped levels therefore attach to the nearest shallower heading (an `<h3>`
//! directly after an `<h1>` becomes that chapter's child).

use std::collections::HashSet;
use std::io::BufRead;

use tracing::{debug, info, warn};

use crate::book::{display_name, Section, SectionId, Sections};
use crate::error::Result;
use crate::package::RESERVED_IDS;
use crate::util::{decode_text, strip_tags};

/// Separator between a heading's short name and its long title.
pub const HEADING_SEPARATOR: &str = " - ";

/// Heading openers and the section level each one starts.
const HEADING_MARKERS: [(&str, u8); 3] = [("<h1>", 1), ("<h2>", 2), ("<h3>", 3)];

/// Name of the section that holds notes outside the reading order.
const FOOTNOTES: &str = "footnotes";

/// Identifier for headings with no letters or digits (`* * *`).
const UNNAMED_SECTION: &str = "section";

/// Split a whole manuscript held in memory.
///
/// ```
/// use bindery::chapters::split_chapters;
///
/// let html = "<html>\n<body>\n<h1>One</h1>\n<p>Hi</p>\n</body>\n</html>\n";
/// let sections = split_chapters(html);
/// assert_eq!(sections.len(), 1);
/// assert_eq!(sections.iter().next().unwrap().body, vec!["<p>Hi</p>"]);
/// ```
pub fn split_chapters(html: &str) -> Sections {
    let mut splitter = ChapterSplitter::new();
    for line in html.lines() {
        if !splitter.push_line(line) {
            break;
        }
    }
    splitter.finish()
}

/// Split a manuscript read line by line.
///
/// Each line is decoded on its own, as UTF-8 or else Windows-1252.
pub fn split_chapters_from_reader<R: BufRead>(mut reader: R) -> Result<Sections> {
    let mut splitter = ChapterSplitter::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = decode_text(&buf);
        if !splitter.push_line(line.trim_end_matches(['\n', '\r'])) {
            break;
        }
    }
    Ok(splitter.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Head matter; nothing is kept until a `<body` line.
    BeforeBody,
    InBody,
    /// A `</body` or `</html` line was seen.
    Done,
}

/// Incremental manuscript splitter.
///
/// Feed lines with [`push_line`](Self::push_line) and collect the result
/// with [`finish`](Self::finish).
#[derive(Debug)]
pub struct ChapterSplitter {
    phase: Phase,
    sections: Sections,
    active: Option<SectionId>,
    identifiers: HashSet<String>,
    dropped: usize,
}

impl Default for ChapterSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChapterSplitter {
    pub fn new() -> Self {
        Self {
            phase: Phase::BeforeBody,
            sections: Sections::new(),
            active: None,
            identifiers: RESERVED_IDS.iter().map(|id| id.to_string()).collect(),
            dropped: 0,
        }
    }

    /// Process one line. Returns `false` once the end of the body is reached.
    pub fn push_line(&mut self, line: &str) -> bool {
        match self.phase {
            Phase::BeforeBody => {
                if starts_with_ignore_case(line, "<body") {
                    self.phase = Phase::InBody;
                }
                true
            }
            Phase::InBody => {
                let line = line.trim();
                if starts_with_ignore_case(line, "</body") || starts_with_ignore_case(line, "</html")
                {
                    self.phase = Phase::Done;
                    return false;
                }

                if let Some(level) = heading_level(line) {
                    self.open_section(level, line);
                } else if let Some(id) = self.active
                    && let Some(section) = self.sections.get_mut(id)
                {
                    section.body.push(line.to_string());
                } else {
                    self.dropped += 1;
                }
                true
            }
            Phase::Done => false,
        }
    }

    /// Finish splitting and return the sections in heading order.
    pub fn finish(self) -> Sections {
        if self.dropped > 0 {
            debug!(lines = self.dropped, "dropped lines before the first heading");
        }
        if self.phase == Phase::BeforeBody {
            warn!("no <body> line found; manuscript produced no sections");
        }
        info!(sections = self.sections.len(), "done processing chapters");
        self.sections
    }

    fn open_section(&mut self, level: u8, line: &str) {
        let heading = strip_tags(line);
        let (name, title) = split_heading(&heading);
        let linear = !name.eq_ignore_ascii_case(FOOTNOTES);

        let parent = if level > 1 {
            self.sections.find_parent(level)
        } else {
            None
        };

        let prefix = parent
            .map(|p| self.sections[p].identifier.as_str())
            .unwrap_or_default();
        let base = sanitize_identifier(&format!("{prefix}{name}"));
        let identifier = self.unique_identifier(base);

        let section = Section {
            level,
            display_name: display_name(level, &name),
            heading,
            name,
            title,
            identifier,
            linear,
            body: Vec::new(),
            parent,
            children: Vec::new(),
        };

        info!(identifier = %section.identifier, level, "found chapter");
        self.active = Some(self.sections.push(section));
    }

    /// Reserve `base`, appending 2, 3, ... if an earlier section or a
    /// generated manifest item already took it.
    ///
    /// Identifiers double as file names, so they are compared without case.
    fn unique_identifier(&mut self, base: String) -> String {
        let base = if base.is_empty() {
            UNNAMED_SECTION.to_string()
        } else {
            base
        };
        if self.identifiers.insert(base.to_ascii_lowercase()) {
            return base;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{base}{n}");
            if self.identifiers.insert(candidate.to_ascii_lowercase()) {
                warn!(identifier = %base, renamed = %candidate, "duplicate section identifier");
                return candidate;
            }
            n += 1;
        }
    }
}

/// Level of a heading line, or `None` for ordinary text.
///
/// Only the exact lowercase openers `<h1>`, `<h2>` and `<h3>` count, after
/// surrounding whitespace is trimmed. `<h1 class="x">`, `<H1>` and `<h4>` are
/// body text.
pub fn heading_level(line: &str) -> Option<u8> {
    let line = line.trim();
    HEADING_MARKERS
        .iter()
        .find(|(marker, _)| line.starts_with(marker))
        .map(|&(_, level)| level)
}

/// Split heading text into `(name, title)` on the `" - "` separator.
///
/// Text with no separator, or more than one, is all name.
///
/// ```
/// use bindery::chapters::split_heading;
///
/// assert_eq!(split_heading("Chapter One - A New Dawn"), ("Chapter One".into(), "A New Dawn".into()));
/// assert_eq!(split_heading("Epilogue"), ("Epilogue".into(), String::new()));
/// ```
pub fn split_heading(text: &str) -> (String, String) {
    let parts: Vec<&str> = text.split(HEADING_SEPARATOR).collect();
    match parts.as_slice() {
        [name, title] => (name.trim().to_string(), title.trim().to_string()),
        _ => (text.trim().to_string(), String::new()),
    }
}

/// Keep only ASCII letters and digits.
pub fn sanitize_identifier(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}
