//! Turning styled runs into typed text elements.
//!
//! PDFs carry no semantic tags, so structure is read back from typography:
//! runs are grouped into elements at size changes and paragraph breaks, and
//! each element is typed by list markers, its size relative to body text,
//! weight, length and wording.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::layout::StyledRun;
use super::structure::DocumentStructuralInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
    ListItem,
}

impl ElementType {
    pub fn heading_level(self) -> Option<usize> {
        match self {
            ElementType::Heading1 => Some(1),
            ElementType::Heading2 => Some(2),
            ElementType::Heading3 => Some(3),
            _ => None,
        }
    }
}

/// A group of consecutive runs sharing a size and paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    /// Text with line breaks kept as `\n`
    pub text: String,
    pub font_size: f32,
    pub is_bold: bool,
    pub is_italic: bool,
    pub element_type: ElementType,
}

impl TextElement {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: false,
            is_italic: false,
            element_type: ElementType::Paragraph,
        }
    }

    /// Characters of text, ignoring surrounding whitespace.
    pub fn char_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListKind {
    /// Glyph, dash, star or plus bullets
    Bullet,
    /// `N.` and `N)`
    Numbered(u32),
    /// Letters, roman numerals and parenthesised markers, kept verbatim
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMarker {
    pub kind: ListKind,
    /// Nesting depth from leading indentation, two columns per level
    pub level: usize,
    pub content: String,
}

/// Elements at or above this size ratio are heading candidates.
const HEADING_RATIO: f32 = 1.2;
const STRONG_HEADING_RATIO: f32 = 1.3;
const TITLE_RATIO: f32 = 1.6;
const BOLD_HEADING_RATIO: f32 = 1.1;
const RATIO_EPSILON: f32 = 1e-4;

/// Longest text still considered "short" for heading purposes.
const SHORT_HEADING_LEN: usize = 60;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•◦▪▫●○■□►▸‣⁃·–—*+-]\s+(\S.*)$").unwrap());
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(\S.*)$").unwrap());
static LETTERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((?i:[ivxlcdm]{1,6}|[a-z])[.)])\s+(\S.*)$").unwrap());
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\((?:\d{1,3}|[a-zA-Z]|(?i:[ivxlcdm]{1,6}))\))\s+(\S.*)$").unwrap());

static NUMBERED_SECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.(?:\d+\.?)*\s+\S").unwrap());
static SECTION_NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*\.?|[IVXivx]+\.)\s+").unwrap());
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap());
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
static AUTHOR_AFFILIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\p{Lu}[\p{L}.'-]*\s+){1,3}\p{Lu}[\p{L}'-]*\s*[\d*†‡][\d,*†‡\s]*$").unwrap()
});

const ACADEMIC_SECTIONS: &[&str] = &[
    "abstract",
    "introduction",
    "background",
    "related work",
    "method",
    "methods",
    "methodology",
    "materials and methods",
    "approach",
    "experiments",
    "experimental setup",
    "evaluation",
    "results",
    "discussion",
    "conclusion",
    "conclusions",
    "future work",
    "limitations",
    "acknowledgments",
    "acknowledgements",
    "references",
    "bibliography",
    "appendix",
    "summary",
];

/// Recognises list item markers, looking past leading indentation.
pub fn list_marker(text: &str) -> Option<ListMarker> {
    let first_line = text.lines().next().unwrap_or_default();
    let body = first_line.trim_start();
    let indent: usize = first_line[..first_line.len() - body.len()]
        .chars()
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum();
    let level = indent / 2;

    let rest_of_text = |first: &str| {
        let mut content = first.trim().to_string();
        for line in text.lines().skip(1) {
            content.push('\n');
            content.push_str(line);
        }
        content
    };

    if let Some(caps) = BULLET.captures(body) {
        return Some(ListMarker { kind: ListKind::Bullet, level, content: rest_of_text(&caps[1]) });
    }
    if let Some(caps) = NUMBERED.captures(body) {
        let n = caps[1].parse().unwrap_or(1);
        return Some(ListMarker { kind: ListKind::Numbered(n), level, content: rest_of_text(&caps[2]) });
    }
    for pattern in [&*LETTERED, &*PARENTHESIZED] {
        if let Some(caps) = pattern.captures(body) {
            return Some(ListMarker {
                kind: ListKind::Marker(caps[1].to_string()),
                level,
                content: rest_of_text(&caps[2]),
            });
        }
    }
    None
}

/// Wording typical of section headings.
pub fn is_heading_pattern(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    let len = text.chars().count();

    if NUMBERED_SECTION.is_match(text) || text.ends_with(':') {
        return true;
    }

    let bare = SECTION_NUMBER_PREFIX.replace(text, "");
    let bare = bare.trim().trim_end_matches([':', '.']).to_lowercase();
    if len <= 40 && (ACADEMIC_SECTIONS.contains(&bare.as_str()) || bare.starts_with("appendix ")) {
        return true;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    len <= SHORT_HEADING_LEN && letters >= 2 && !text.chars().any(char::is_lowercase)
}

/// Text that is never a heading however large it is drawn.
pub fn is_never_heading(text: &str) -> bool {
    let text = text.trim();
    let len = text.chars().count();

    if len > 200 || (len > 100 && text.contains('.')) {
        return true;
    }

    let numeric_fragment = len <= 8
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace() || c.is_ascii_punctuation());
    if numeric_fragment {
        return true;
    }

    EMAIL.is_match(text) || URL.is_match(text) || (len <= SHORT_HEADING_LEN && AUTHOR_AFFILIATION.is_match(text))
}

/// Types one element from its text and typography.
///
/// Glyph bullets are list items at any size. Numbered and lettered markers are
/// list items only near body size; drawn larger they are section headings.
pub fn classify(text: &str, font_size: f32, is_bold: bool, info: &DocumentStructuralInfo) -> ElementType {
    let ratio = info.ratio(font_size) + RATIO_EPSILON;

    if let Some(marker) = list_marker(text)
        && (marker.kind == ListKind::Bullet || ratio < HEADING_RATIO)
    {
        return ElementType::ListItem;
    }

    let text = text.trim();
    if is_never_heading(text) {
        return ElementType::Paragraph;
    }

    let short = text.chars().count() <= SHORT_HEADING_LEN;
    let pattern = is_heading_pattern(text);

    if ratio >= TITLE_RATIO {
        ElementType::Heading1
    } else if ratio >= STRONG_HEADING_RATIO {
        ElementType::Heading2
    } else if ratio >= HEADING_RATIO && (is_bold || short || pattern) {
        if is_bold && (short || pattern) { ElementType::Heading2 } else { ElementType::Heading3 }
    } else if ratio >= BOLD_HEADING_RATIO && is_bold && short && pattern {
        ElementType::Heading3
    } else {
        ElementType::Paragraph
    }
}

/// Types every element in place.
pub fn classify_elements(elements: &mut [TextElement], info: &DocumentStructuralInfo) {
    for element in elements {
        element.element_type = classify(&element.text, element.font_size, element.is_bold, info);
    }
}

#[derive(Debug)]
struct PendingElement {
    text: String,
    font_size: f32,
    chars: usize,
    bold_chars: usize,
    italic_chars: usize,
}

impl PendingElement {
    fn start(run: &StyledRun) -> Self {
        let mut pending =
            Self { text: String::new(), font_size: run.font_size, chars: 0, bold_chars: 0, italic_chars: 0 };
        pending.text.push_str(run.text.trim_end_matches('\n'));
        pending.count(run);
        pending
    }

    fn push(&mut self, run: &StyledRun) {
        if run.new_line {
            let kept = self.text.trim_end().len();
            self.text.truncate(kept);
            self.text.push('\n');
            self.text.push_str(run.text.trim_start());
        } else {
            if run.space_before && !self.text.ends_with(char::is_whitespace) && !run.text.starts_with(char::is_whitespace)
            {
                self.text.push(' ');
            }
            self.text.push_str(&run.text);
        }
        self.count(run);
    }

    fn count(&mut self, run: &StyledRun) {
        let chars = run.text.trim().chars().count();
        self.chars += chars;
        if run.is_bold {
            self.bold_chars += chars;
        }
        if run.is_italic {
            self.italic_chars += chars;
        }
    }

    fn finish(self) -> TextElement {
        TextElement {
            text: self.text.trim_end().to_string(),
            font_size: self.font_size,
            is_bold: self.bold_chars * 2 > self.chars,
            is_italic: self.italic_chars * 2 > self.chars,
            element_type: ElementType::Paragraph,
        }
    }
}

fn ends_sentence(text: &str) -> bool {
    let text = text.trim_end().trim_end_matches(['"', '\'', ')', '\u{201d}', '\u{2019}']);
    text.ends_with(['.', '!', '?'])
}

fn starts_block(text: &str) -> bool {
    let first = text.trim_start().chars().next();
    first.is_some_and(|c| c.is_uppercase() || c.is_ascii_digit()) || list_marker(text).is_some()
}

/// Groups runs into elements.
///
/// A new element starts when the size moves by more than `tolerance` points,
/// or at a line break that ends a sentence or begins with a capital, a digit or
/// a list marker. Blank runs on their own line are hard paragraph breaks.
/// Returned elements are typed [`ElementType::Paragraph`] until classified.
pub fn group_runs(runs: &[StyledRun], tolerance: f32) -> Vec<TextElement> {
    let mut elements = Vec::new();
    let mut pending: Option<PendingElement> = None;

    for run in runs {
        if run.text.trim().is_empty() {
            if run.new_line
                && let Some(done) = pending.take()
            {
                elements.push(done.finish());
            }
            continue;
        }

        if let Some(current) = &pending {
            let size_changed = (run.font_size - current.font_size).abs() > tolerance;
            let paragraph_break = run.new_line && (ends_sentence(&current.text) || starts_block(&run.text));
            if (size_changed || paragraph_break)
                && let Some(done) = pending.take()
            {
                elements.push(done.finish());
            }
        }

        match pending.as_mut() {
            Some(current) => current.push(run),
            None => pending = Some(PendingElement::start(run)),
        }
    }

    if let Some(done) = pending {
        elements.push(done.finish());
    }
    elements
}
