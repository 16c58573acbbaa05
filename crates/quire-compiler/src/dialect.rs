//! Markup dialects
//!
//! Both dialects mark header depth by repeating a marker character at the
//! start of a line: `=` for AsciiDoc, `#` for Markdown. Everything else
//! about them is treated as opaque content.

use serde::{Deserialize, Serialize};

/// Deepest header level either dialect supports
pub const MAX_LEVEL: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    AsciiDoc,
    Markdown,
}

/// A recognised header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine<'a> {
    pub level: u8,
    pub title: &'a str,
}

impl Dialect {
    pub fn marker(self) -> char {
        match self {
            Dialect::AsciiDoc => '=',
            Dialect::Markdown => '#',
        }
    }

    /// Guess the dialect from a document's first non-blank line
    pub fn detect(first_line: &str) -> Option<Self> {
        match first_line.trim_start().chars().next()? {
            '=' => Some(Dialect::AsciiDoc),
            '#' => Some(Dialect::Markdown),
            _ => None,
        }
    }

    /// Parse a header line
    ///
    /// A header is 1 to 6 markers followed by whitespace and a title, or by
    /// nothing at all (an empty title). More than 6 markers, or markers
    /// glued to text (`#hashtag`), are content.
    pub fn parse_header<'a>(self, line: &'a str) -> Option<HeaderLine<'a>> {
        let marker = self.marker();
        let count = line.chars().take_while(|c| *c == marker).count();
        if count == 0 || count > MAX_LEVEL as usize {
            return None;
        }
        // Markers are ASCII, so `count` is also a byte offset
        let rest = &line[count..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(HeaderLine {
            level: count as u8,
            title: rest.trim(),
        })
    }

    /// Header markers for a level, e.g. `===` for AsciiDoc level 3
    pub fn header_prefix(self, level: u8) -> String {
        std::iter::repeat_n(self.marker(), level as usize).collect()
    }

    /// Render a header line
    pub fn render_header(self, level: u8, title: &str) -> String {
        format!("{} {}", self.header_prefix(level), title)
    }

    /// If `line` opens or closes a delimited block, the delimiter that
    /// closes it. Headers are not recognised inside such blocks.
    pub fn block_delimiter(self, line: &str) -> Option<String> {
        let trimmed = line.trim_end();
        match self {
            Dialect::Markdown => {
                let t = trimmed.trim_start();
                for fence in ['`', '~'] {
                    let n = t.chars().take_while(|c| *c == fence).count();
                    if n >= 3 {
                        return Some(std::iter::repeat_n(fence, n).collect());
                    }
                }
                None
            }
            Dialect::AsciiDoc => {
                let first = trimmed.chars().next()?;
                let uniform = trimmed.chars().all(|c| c == first);
                if uniform && trimmed.len() >= 4 && matches!(first, '-' | '.' | '+' | '/' | '=' | '*' | '_') {
                    Some(trimmed.to_string())
                } else {
                    None
                }
            }
        }
    }

    /// Whether `line` closes the block opened by `delimiter`
    pub fn closes_block(self, delimiter: &str, line: &str) -> bool {
        match self {
            Dialect::Markdown => {
                let t = line.trim();
                let fence = delimiter.chars().next().unwrap_or('`');
                t.len() >= delimiter.len() && t.chars().all(|c| c == fence)
            }
            Dialect::AsciiDoc => line.trim_end() == delimiter,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::AsciiDoc => write!(f, "asciidoc"),
            Dialect::Markdown => write!(f, "markdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Dialect::detect("= Title"), Some(Dialect::AsciiDoc));
        assert_eq!(Dialect::detect("  # Title"), Some(Dialect::Markdown));
        assert_eq!(Dialect::detect("Title"), None);
        assert_eq!(Dialect::detect(""), None);
    }

    #[test]
    fn test_parse_header_levels() {
        let h = Dialect::AsciiDoc.parse_header("=== Section Three").unwrap();
        assert_eq!(h.level, 3);
        assert_eq!(h.title, "Section Three");

        let h = Dialect::Markdown.parse_header("##   Spaced  ").unwrap();
        assert_eq!(h.level, 2);
        assert_eq!(h.title, "Spaced");

        let h = Dialect::AsciiDoc.parse_header("=").unwrap();
        assert_eq!(h.title, "");
    }

    #[test]
    fn test_non_headers() {
        assert!(Dialect::Markdown.parse_header("#hashtag").is_none());
        assert!(Dialect::Markdown.parse_header("####### too deep").is_none());
        assert!(Dialect::AsciiDoc.parse_header("plain text").is_none());
        assert!(Dialect::AsciiDoc.parse_header("# not asciidoc").is_none());
        assert!(Dialect::Markdown.parse_header(" # indented").is_none());
    }

    #[test]
    fn test_render_header() {
        assert_eq!(Dialect::AsciiDoc.render_header(3, "S1"), "=== S1");
        assert_eq!(Dialect::Markdown.render_header(2, "Ch"), "## Ch");
    }

    #[test]
    fn test_block_delimiters() {
        assert_eq!(Dialect::Markdown.block_delimiter("```rust"), Some("```".to_string()));
        assert_eq!(Dialect::Markdown.block_delimiter("~~~~"), Some("~~~~".to_string()));
        assert!(Dialect::Markdown.block_delimiter("``inline``").is_none());
        assert!(Dialect::Markdown.closes_block("```", "```"));
        assert!(!Dialect::Markdown.closes_block("````", "```"));

        assert_eq!(Dialect::AsciiDoc.block_delimiter("----"), Some("----".to_string()));
        assert_eq!(Dialect::AsciiDoc.block_delimiter("...."), Some("....".to_string()));
        assert!(Dialect::AsciiDoc.block_delimiter("---").is_none());
        assert!(Dialect::AsciiDoc.block_delimiter("-- text").is_none());
        assert!(Dialect::AsciiDoc.closes_block("----", "----"));
        assert!(!Dialect::AsciiDoc.closes_block("----", "------"));
    }
}
