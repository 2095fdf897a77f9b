//! Small pure helpers: tag stripping, hashing, text decoding, media types.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex_lite::Regex;

// ============================================================================
// Tag Stripping
// ============================================================================

/// Any tag: `<`, then anything but another `<`, up to the first `>`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<]*?/?>").unwrap());

/// Strip every HTML tag from a line of text.
///
/// A `<` that is not closed before the next `<` (or the end of the line) is
/// kept as literal text.
///
/// ```
/// use bindery::util::strip_tags;
///
/// assert_eq!(strip_tags("<h1>Chapter <em>One</em></h1>"), "Chapter One");
/// assert_eq!(strip_tags("a < b <br/>"), "a < b ");
/// ```
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// Strip one specific tag (opening, closing, or self-closing) from a line.
///
/// Matches `<tag>`, `<tag attr="...">`, `</tag>`, `<tag/>` and namespaced
/// forms such as `<tag:p>` (word-processor export debris). Other tags are left
/// alone, including ones that merely share a prefix (`<b>` does not match
/// `<br>`).
///
/// ```
/// use bindery::util::strip_single_tag;
///
/// assert_eq!(strip_single_tag("<p><span class=\"x\">Hi</span></p>", "span"), "<p>Hi</p>");
/// assert_eq!(strip_single_tag("Text<o:p></o:p>", "o"), "Text");
/// ```
pub fn strip_single_tag(text: &str, tag: &str) -> String {
    if tag.is_empty() {
        return text.to_string();
    }

    let pattern = format!(r"(?i)</?{}(?:[/:\s][^>]*)?>", regex_lite::escape(tag));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// Short fingerprint of a string: the first 8 hex digits of its SHA-1.
///
/// Used for book identifiers and obfuscated library file names.
pub fn short_hash(text: &str) -> String {
    let digest = sha1_smol::Sha1::from(text).hexdigest();
    digest[..8].to_string()
}

/// SHA-1 of a string laid out as a UUID (`8-4-4-4-12`).
///
/// Gives a stable `urn:uuid:` identifier for a given title and author.
pub fn uuid_hash(text: &str) -> String {
    let d = sha1_smol::Sha1::from(text).hexdigest();
    format!(
        "{}-{}-{}-{}-{}",
        &d[..8],
        &d[8..12],
        &d[12..16],
        &d[16..20],
        &d[20..32]
    )
}

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode manuscript bytes to a string.
///
/// Tries UTF-8 first (BOM is handled by encoding_rs), then falls back to
/// Windows-1252, which is what word processors usually emit for "HTML".
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

// ============================================================================
// Media Types
// ============================================================================

/// Image extensions recognised when scanning a package tree.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png", "bmp"];

/// Media type for an image file name, judged by extension.
pub fn image_media_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Escape text for use in XML content and attribute values.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ============================================================================
// Date Utilities
// ============================================================================

/// Today's local date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_simple() {
        assert_eq!(strip_tags("<h2>Prologue - The Beginning</h2>"), "Prologue - The Beginning");
    }

    #[test]
    fn test_strip_tags_with_attributes_and_self_closing() {
        assert_eq!(strip_tags("<p class=\"x\">One<br/>Two</p>"), "OneTwo");
    }

    #[test]
    fn test_strip_tags_unclosed_bracket_kept() {
        assert_eq!(strip_tags("1 < 2"), "1 < 2");
        assert_eq!(strip_tags("x <<b>y"), "x <y");
    }

    #[test]
    fn test_strip_single_tag() {
        assert_eq!(strip_single_tag("<b>bold</b> <br/>", "b"), "bold <br/>");
        assert_eq!(strip_single_tag("<SPAN>x</SPAN>", "span"), "x");
        assert_eq!(strip_single_tag("keep <table>", "t"), "keep <table>");
        assert_eq!(strip_single_tag("none", ""), "none");
    }

    #[test]
    fn test_short_hash() {
        // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(short_hash("abc"), "a9993e36");
        assert_eq!(short_hash("abc"), short_hash("abc"));
        assert_ne!(short_hash("abc"), short_hash("abd"));
    }

    #[test]
    fn test_uuid_hash_layout() {
        assert_eq!(uuid_hash("abc"), "a9993e36-4706-816a-ba3e-25717850c26c");
    }

    #[test]
    fn test_decode_text_windows_1252_fallback() {
        // 0x93/0x94 are curly quotes in CP1252 and invalid as UTF-8
        let bytes = b"\x93Hi\x94";
        assert_eq!(decode_text(bytes), "\u{201c}Hi\u{201d}");
        assert_eq!(decode_text("plain".as_bytes()), "plain");
    }

    #[test]
    fn test_image_media_type() {
        assert_eq!(image_media_type("cover.JPG"), Some("image/jpeg"));
        assert_eq!(image_media_type("a.png"), Some("image/png"));
        assert_eq!(image_media_type("notes.txt"), None);
        assert_eq!(image_media_type("noext"), None);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & <b> \"c\""), "a &amp; &lt;b&gt; &quot;c&quot;");
    }

    #[test]
    fn test_today_format() {
        let date = today();
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok(), "{date}");
    }

    #[test]
    fn test_strip_single_tag_namespaced_and_closing() {
        assert_eq!(strip_single_tag("a<o:p class=\"x\"></o:p>b", "o"), "ab");
        assert_eq!(strip_single_tag("<span/>x", "span"), "x");
        assert_eq!(strip_single_tag("<c++>x", "c++"), "x");
    }
}
