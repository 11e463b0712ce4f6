use super::classify::{ElementType, ListKind, TextElement, list_marker};
use super::cleanup::rejoin_hyphenation;

/// Joins typed elements into Markdown.
///
/// Elements are separated by a blank line, except consecutive list items which
/// sit on adjacent lines.
pub fn assemble_markdown(elements: &[TextElement]) -> String {
    let mut out = String::new();
    let mut previous: Option<ElementType> = None;

    for element in elements {
        let formatted = format_element(element);
        if formatted.is_empty() {
            continue;
        }

        if let Some(prev) = previous {
            let tight = prev == ElementType::ListItem && element.element_type == ElementType::ListItem;
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        out.push_str(&formatted);
        previous = Some(element.element_type);
    }
    out
}

fn format_element(element: &TextElement) -> String {
    if let Some(level) = element.element_type.heading_level() {
        let text = single_line(&element.text);
        return if text.is_empty() { text } else { format!("{} {}", "#".repeat(level), text) };
    }

    match element.element_type {
        ElementType::ListItem => format_list_item(element),
        _ => format_paragraph(element),
    }
}

fn format_list_item(element: &TextElement) -> String {
    let Some(marker) = list_marker(&element.text) else {
        return format!("- {}", single_line(&element.text));
    };

    let content = single_line(&marker.content);
    let indent = "  ".repeat(marker.level);
    match marker.kind {
        ListKind::Bullet => format!("{}- {}", indent, content),
        ListKind::Numbered(n) => format!("{}{}. {}", indent, n, content),
        ListKind::Marker(label) => format!("{}- {} {}", indent, label, content),
    }
}

fn format_paragraph(element: &TextElement) -> String {
    let text = element
        .text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return text;
    }

    match (element.is_bold, element.is_italic) {
        (true, true) => format!("***{}***", text),
        (true, false) => format!("**{}**", text),
        (false, true) => format!("*{}*", text),
        (false, false) => text,
    }
}

/// Folds wrapped text onto one line, rejoining hyphenated breaks.
fn single_line(text: &str) -> String {
    rejoin_hyphenation(text).split_whitespace().collect::<Vec<_>>().join(" ")
}
