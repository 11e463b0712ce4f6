//! Markdown emitter.
//!
//! Walks an element tree and produces Markdown element by element. Block
//! elements are separated by blank lines; runs of text and inline elements
//! between them are gathered into a single paragraph.
//!
//! # Example
//!
//! ```rust
//! use stash_core::{Document, MarkdownOptions, emit_markdown};
//!
//! let doc = Document::parse("<article><h1>Hi</h1><p>Hello <b>world</b>.</p></article>").unwrap();
//! let body = doc.body().unwrap();
//! assert_eq!(emit_markdown(body.element_ref(), &MarkdownOptions::default()), "# Hi\n\nHello **world**.");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

/// Options for the Markdown emitter.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Elements nested deeper than this below the starting element produce no output.
    pub max_depth: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self { max_depth: 50 }
    }
}

/// Never rendered, even when the tree was not sanitized.
pub(crate) const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "iframe", "object", "embed", "applet", "svg",
    "canvas", "form", "input", "button", "select", "textarea", "meta", "link",
];

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "center",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "html",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "ul",
];

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(script)").unwrap());
static SCRIPT_SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(javascript):").unwrap());
static ONERROR_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(onerror)=").unwrap());

/// Converts `root` and its descendants to normalized Markdown.
pub fn emit_markdown(root: ElementRef<'_>, options: &MarkdownOptions) -> String {
    let emitter = Emitter { max_depth: options.max_depth };
    finalize_markdown(&emitter.block(root, 0))
}

/// Collapses 3+ newlines to a single blank line, trims the result, and
/// neutralizes any script-looking text that survived as literal content.
pub fn finalize_markdown(markdown: &str) -> String {
    let collapsed = EXCESS_NEWLINES.replace_all(markdown, "\n\n");
    defang(collapsed.trim())
}

/// Rewrites `<script`, `javascript:` and `onerror=` occurrences in text so the
/// output can be embedded in HTML-capable Markdown renderers.
pub(crate) fn defang(markdown: &str) -> String {
    let out = SCRIPT_TAG.replace_all(markdown, "&lt;$1");
    let out = SCRIPT_SCHEME.replace_all(&out, "$1&#58;");
    ONERROR_ATTR.replace_all(&out, "$1&#61;").into_owned()
}

struct Emitter {
    max_depth: usize,
}

struct Part {
    text: String,
    is_list: bool,
}

impl Emitter {
    /// Output for an element in block position.
    fn block(&self, el: ElementRef<'_>, depth: usize) -> String {
        if depth > self.max_depth {
            return String::new();
        }

        let tag = el.value().name().to_ascii_lowercase();
        match tag.as_str() {
            t if SKIPPED_TAGS.contains(&t) => String::new(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = collapse_whitespace(&el.text().collect::<String>());
                let text = text.trim();
                if text.is_empty() { String::new() } else { format!("{} {}", "#".repeat(level), text) }
            }
            "p" => tidy_inline(&self.inline_children(el, depth)),
            "pre" => self.code_block(el),
            "ul" => self.list(el, false, depth),
            "ol" => self.list(el, true, depth),
            "blockquote" => {
                let inner = self.join_parts(self.parts(el, depth), "\n\n");
                inner
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "hr" => "---".to_string(),
            "br" => String::new(),
            "table" => self.table(el, depth),
            t if BLOCK_TAGS.contains(&t) => self.join_parts(self.parts(el, depth), "\n\n"),
            _ => tidy_inline(&self.inline(el, depth)),
        }
    }

    /// Splits children into block outputs, gathering inline runs into paragraphs.
    fn parts(&self, el: ElementRef<'_>, depth: usize) -> Vec<Part> {
        let mut parts = Vec::new();
        let mut run = String::new();

        for child in el.children() {
            match child.value() {
                Node::Text(text) => run.push_str(&collapse_whitespace(text)),
                Node::Element(child_el) => {
                    let Some(child_ref) = ElementRef::wrap(child) else { continue };
                    let name = child_el.name().to_ascii_lowercase();

                    if BLOCK_TAGS.contains(&name.as_str()) {
                        push_part(&mut parts, tidy_inline(&run), false);
                        run.clear();

                        let is_list = name == "ul" || name == "ol";
                        push_part(&mut parts, self.block(child_ref, depth + 1), is_list);
                    } else {
                        run.push_str(&self.inline(child_ref, depth + 1));
                    }
                }
                _ => {}
            }
        }
        push_part(&mut parts, tidy_inline(&run), false);

        parts
    }

    fn join_parts(&self, parts: Vec<Part>, separator: &str) -> String {
        parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(separator)
    }

    /// Output for an element in inline position.
    fn inline(&self, el: ElementRef<'_>, depth: usize) -> String {
        if depth > self.max_depth {
            return String::new();
        }

        let tag = el.value().name().to_ascii_lowercase();
        match tag.as_str() {
            t if SKIPPED_TAGS.contains(&t) => String::new(),
            "strong" | "b" => wrap_emphasis(&self.inline_children(el, depth), "**"),
            "em" | "i" => wrap_emphasis(&self.inline_children(el, depth), "*"),
            "code" | "kbd" | "samp" => inline_code(&collapse_whitespace(&el.text().collect::<String>())),
            "a" => self.link(el, depth),
            "img" => image(el).unwrap_or_default(),
            "br" => "\n".to_string(),
            _ => self.inline_children(el, depth),
        }
    }

    fn inline_children(&self, el: ElementRef<'_>, depth: usize) -> String {
        let mut out = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&collapse_whitespace(text)),
                Node::Element(_) => {
                    if let Some(child_ref) = ElementRef::wrap(child) {
                        out.push_str(&self.inline(child_ref, depth + 1));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn link(&self, el: ElementRef<'_>, depth: usize) -> String {
        let text = self.inline_children(el, depth);
        let label = text.trim();
        if label.is_empty() {
            return String::new();
        }

        match el.value().attr("href").map(str::trim) {
            Some(href) if is_linkable(href) => {
                let (lead, trail) = outer_whitespace(&text);
                format!("{}[{}]({}){}", lead, label, escape_url(href), trail)
            }
            _ => text,
        }
    }

    fn code_block(&self, el: ElementRef<'_>) -> String {
        let raw: String = el.text().collect();
        let body = raw.trim_matches('\n').trim_end();
        if body.trim().is_empty() {
            return String::new();
        }

        let language = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter_map(|d| d.value().attr("class"))
            .flat_map(str::split_whitespace)
            .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
            .unwrap_or("");

        let fence = "`".repeat(longest_backtick_run(body).max(2) + 1);
        format!("{fence}{language}\n{body}\n{fence}")
    }

    fn list(&self, el: ElementRef<'_>, ordered: bool, depth: usize) -> String {
        let mut counter: i64 = if ordered {
            el.value().attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1)
        } else {
            1
        };

        let mut items = Vec::new();
        for child in el.children().filter_map(ElementRef::wrap) {
            if !child.value().name().eq_ignore_ascii_case("li") || depth + 1 > self.max_depth {
                continue;
            }

            let mut content = String::new();
            for part in self.parts(child, depth + 1) {
                if !content.is_empty() {
                    content.push_str(if part.is_list { "\n" } else { "\n\n" });
                }
                content.push_str(&part.text);
            }
            if content.trim().is_empty() {
                continue;
            }

            let marker = if ordered { format!("{}. ", counter) } else { "- ".to_string() };
            let indent = " ".repeat(marker.len());
            counter += 1;

            let mut lines = content.lines();
            let mut item = format!("{}{}", marker, lines.next().unwrap_or_default());
            for line in lines {
                item.push('\n');
                if !line.is_empty() {
                    item.push_str(&indent);
                    item.push_str(line);
                }
            }
            items.push(item);
        }

        items.join("\n")
    }

    fn table(&self, table: ElementRef<'_>, depth: usize) -> String {
        let mut lines = Vec::new();
        let mut header_done = false;

        let rows = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name().eq_ignore_ascii_case("tr"))
            .filter(|tr| owning_table(*tr).is_some_and(|t| t.id() == table.id()));

        for tr in rows {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name().to_ascii_lowercase().as_str(), "td" | "th"))
                .map(|c| table_cell(&self.inline_children(c, depth + 1)))
                .collect();

            if cells.is_empty() {
                continue;
            }

            lines.push(format!("| {} |", cells.join(" | ")));

            let in_thead = tr
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|p| p.value().name().eq_ignore_ascii_case("thead"));
            let first_child = tr.prev_siblings().all(|s| !s.value().is_element());

            if !header_done && (in_thead || first_child) {
                lines.push(format!("|{}", " --- |".repeat(cells.len())));
                header_done = true;
            }
        }

        lines.join("\n")
    }
}

fn push_part(parts: &mut Vec<Part>, text: String, is_list: bool) {
    if !text.trim().is_empty() {
        parts.push(Part { text, is_list });
    }
}

fn owning_table(tr: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name().eq_ignore_ascii_case("table"))
}

fn image(el: ElementRef<'_>) -> Option<String> {
    let src = ["src", "data-src"]
        .iter()
        .filter_map(|a| el.value().attr(a))
        .map(str::trim)
        .find(|s| !s.is_empty())?;

    if !is_embeddable_image(src) {
        return None;
    }

    let alt: String = collapse_whitespace(el.value().attr("alt").unwrap_or_default())
        .trim()
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect();

    Some(format!("![{}]({})", alt, escape_url(src)))
}

/// True for `http(s)://` and root-relative hrefs.
pub fn is_linkable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !href.is_empty() && (lower.starts_with("http://") || lower.starts_with("https://") || href.starts_with('/'))
}

/// True for `http(s)://`, root-relative and `data:image/` sources that carry no markup.
pub fn is_embeddable_image(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    let allowed = lower.starts_with("http://")
        || lower.starts_with("https://")
        || src.starts_with('/')
        || lower.starts_with("data:image/");

    allowed && !src.chars().any(|c| matches!(c, '<' | '>' | '"') || c.is_whitespace())
}

fn escape_url(url: &str) -> String {
    url.replace(' ', "%20").replace('(', "%28").replace(')', "%29")
}

fn table_cell(content: &str) -> String {
    collapse_whitespace(&content.replace('\n', " ")).trim().replace('|', "\\|")
}

fn inline_code(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else if text.contains('`') {
        format!("`` {} ``", text)
    } else {
        format!("`{}`", text)
    }
}

/// Wraps the trimmed content in `marker`, keeping surrounding whitespace outside.
fn wrap_emphasis(content: &str, marker: &str) -> String {
    let inner = content.trim();
    if inner.is_empty() {
        return content.to_string();
    }
    let (lead, trail) = outer_whitespace(content);
    format!("{lead}{marker}{inner}{marker}{trail}")
}

fn outer_whitespace(s: &str) -> (&'static str, &'static str) {
    let lead = if s.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if s.ends_with(char::is_whitespace) { " " } else { "" };
    (lead, trail)
}

/// Trims each line of an inline run and the run as a whole.
fn tidy_inline(run: &str) -> String {
    run.lines().map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
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

fn longest_backtick_run(s: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in s.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
