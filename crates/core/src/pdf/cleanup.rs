//! Normalization pass over Markdown assembled from PDF text.
//!
//! [`cleanup_markdown`] is pure and idempotent: feeding its output back in
//! returns the same string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

static HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\p{Ll})-\n[ \t]*").unwrap());
static HEADING_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s").unwrap());
static STRUCTURAL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:#{1,6}\s|[-*+•]\s|\d+[.)]\s|>|\||```)").unwrap());
static MARKER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:#{1,6}[ \t]+|[-*+•][ \t]+|\d+[.)][ \t]+)?").unwrap());
static BOLD_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[ \t]*([^*\n]*?[^*\s])[ \t]*\*\*").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

const LIGATURES: &[(char, &str)] = &[
    ('\u{fb00}', "ff"),
    ('\u{fb01}', "fi"),
    ('\u{fb02}', "fl"),
    ('\u{fb03}', "ffi"),
    ('\u{fb04}', "ffl"),
    ('\u{fb05}', "st"),
    ('\u{fb06}', "st"),
];

/// Normalizes Markdown produced from PDF text.
///
/// In order: NFC normalization with ligatures expanded, hyphenated line-wrap
/// rejoining, unwrapping of bare line wraps, space collapsing, emphasis and
/// punctuation spacing, blank lines around every heading and at most one
/// blank line anywhere.
///
/// # Example
///
/// ```rust
/// use stash_core::cleanup_markdown;
///
/// let out = cleanup_markdown("# Intro\nThe experi-\nment  worked .\n\n\n\nNext");
/// assert_eq!(out, "# Intro\n\nThe experiment worked.\n\nNext");
/// assert_eq!(cleanup_markdown(&out), out);
/// ```
pub fn cleanup_markdown(input: &str) -> String {
    let text = normalize_unicode(input);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = map_lines(&text, |line| line.trim_end().to_string());
    let text = rejoin_hyphenation(&text);
    let text = unwrap_lines(&text);
    let text = map_lines(&text, collapse_inner_spaces);
    let text = BOLD_SPACING.replace_all(&text, "**$1**");
    let text = map_lines(&text, tighten_punctuation);
    let text = space_around_headings(&text);

    EXCESS_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

fn normalize_unicode(text: &str) -> String {
    let mut expanded = String::with_capacity(text.len());
    for c in text.chars() {
        match LIGATURES.iter().find(|(lig, _)| *lig == c) {
            Some((_, plain)) => expanded.push_str(plain),
            None if c == '\u{a0}' => expanded.push(' '),
            None => expanded.push(c),
        }
    }
    expanded.nfc().collect()
}

fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

/// Joins `xyz-\nabc` into `xyzabc` when both sides are lowercase letters.
pub(crate) fn rejoin_hyphenation(text: &str) -> String {
    HYPHEN_BREAK
        .replace_all(text, |caps: &Captures| {
            let end = caps.get(0).map_or(0, |m| m.end());
            let next_is_lower = text[end..].chars().next().is_some_and(char::is_lowercase);
            if next_is_lower { caps[1].to_string() } else { caps[0].to_string() }
        })
        .into_owned()
}

/// Merges wrapped lines of the same paragraph or list item.
fn unwrap_lines(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let continues = !line.trim().is_empty()
            && !STRUCTURAL_LINE.is_match(line)
            && lines.last().is_some_and(|prev| !prev.trim().is_empty() && !HEADING_LINE.is_match(prev));

        match lines.last_mut() {
            Some(prev) if continues => {
                prev.push(' ');
                prev.push_str(line.trim_start());
            }
            _ => lines.push(line.to_string()),
        }
    }
    lines.join("\n")
}

/// Collapses runs of spaces and tabs after the indentation.
fn collapse_inner_spaces(line: &str) -> String {
    let (indent, rest) = line.split_at(line.len() - line.trim_start().len());
    let mut out = String::with_capacity(line.len());
    out.push_str(indent);

    let mut in_space = false;
    for c in rest.chars() {
        if c == ' ' || c == '\t' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn is_closing_punctuation(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '!' | '?' | '.')
}

/// Drops spaces before punctuation that closes a word (`word ,` -> `word,`).
///
/// Indentation and heading or list markers are left alone.
fn tighten_punctuation(line: &str) -> String {
    let prefix_len = MARKER_PREFIX.find(line).map_or(0, |m| m.end());
    let (indent, rest) = line.split_at(prefix_len);
    let chars: Vec<char> = rest.chars().collect();
    let mut out = String::with_capacity(line.len());
    out.push_str(indent);

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ' ' || chars[i] == '\t' {
            let mut j = i;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            let closes = j < chars.len()
                && is_closing_punctuation(chars[j])
                && chars.get(j + 1).is_none_or(|c| c.is_whitespace());
            if !closes {
                out.extend(&chars[i..j]);
            }
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Surrounds heading lines with blank lines.
fn space_around_headings(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let heading = HEADING_LINE.is_match(line);
        if heading && out.last().is_some_and(|prev| !prev.trim().is_empty()) {
            out.push("");
        }
        out.push(line);
        if heading && lines.get(i + 1).is_some_and(|next| !next.trim().is_empty()) {
            out.push("");
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("The experi-\nment", "The experiment")]
    #[case("multi-\n   line", "multiline")]
    #[case("a-\nb-\nc", "abc")]
    #[case("Well-\nKnown", "Well- Known")]
    #[case("2020-\n2021", "2020- 2021")]
    fn test_hyphenation(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(cleanup_markdown(input), expected);
    }

    #[test]
    fn test_bare_wraps_are_unwrapped() {
        let input = "First line of text\ncontinues here\n\n- item one\nwrapped item\n- item two";
        assert_eq!(
            cleanup_markdown(input),
            "First line of text continues here\n\n- item one wrapped item\n- item two"
        );
    }

    #[test]
    fn test_blank_lines_collapsed() {
        assert_eq!(cleanup_markdown("a\n\n\n\n\nb\n\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_spaces_collapsed_and_trailing_trimmed() {
        assert_eq!(cleanup_markdown("some   text\twith \t gaps   \nx"), "some text with gaps x");
        assert_eq!(cleanup_markdown("- a\n    - indented   item  "), "- a\n    - indented item");
    }

    #[rstest]
    #[case("** bold **", "**bold**")]
    #[case("a ** b** and **c ** d", "a **b** and **c** d")]
    #[case("**already**", "**already**")]
    fn test_emphasis_spacing(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(cleanup_markdown(input), expected);
    }

    #[rstest]
    #[case("word , next", "word, next")]
    #[case("end .", "end.")]
    #[case("really ?!", "really ?!")]
    #[case("why ? because", "why? because")]
    #[case("keep .5 as is", "keep .5 as is")]
    fn test_punctuation_spacing(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(cleanup_markdown(input), expected);
    }

    #[test]
    fn test_blank_line_after_heading() {
        assert_eq!(cleanup_markdown("# Title\nBody\n## Sub\n- item"), "# Title\n\nBody\n\n## Sub\n\n- item");
        assert_eq!(cleanup_markdown("# Empty ."), "# Empty.");
        assert_eq!(cleanup_markdown("# .\ny"), "# .\n\ny");
    }

    #[test]
    fn test_ligatures_and_nfc() {
        assert_eq!(cleanup_markdown("\u{fb01}nal o\u{fb03}ce"), "final office");
        assert_eq!(cleanup_markdown("cafe\u{301}"), "caf\u{e9}");
        assert_eq!(cleanup_markdown("a\u{a0}\u{a0}b"), "a b");
    }

    #[test]
    fn test_idempotent_on_examples() {
        let samples = [
            "# Intro\nThe experi-\nment  worked .\n\n\n\nNext",
            "  # x\n- y",
            "#\nb\n# c\nd",
            "1 . x\ny",
            "a , , b",
            "** a **.",
            "x\n- \n",
            "# .\ny",
            "- .\ny",
            "a\n# b\nc",
        ];
        for sample in samples {
            let once = cleanup_markdown(sample);
            assert_eq!(cleanup_markdown(&once), once, "input: {:?}", sample);
        }
    }

    proptest! {
        #[test]
        fn test_cleanup_is_idempotent(input in "[a-zA-Z0-9 .,;:!?#\\n\\t\\-\u{fb01}]{0,160}") {
            let once = cleanup_markdown(&input);
            prop_assert_eq!(cleanup_markdown(&once), once);
        }
    }
}
