//! HTML sanitizer.
//!
//! Strips executable and irrelevant markup before any content heuristics run.
//! The input string is never modified; callers keep the original markup for
//! the extraction pipeline's regression guard.

use lol_html::{HtmlRewriter, Settings, element};

use crate::{ExtractError, Result};

/// Configuration for the sanitizer.
#[derive(Debug, Clone)]
pub struct SanitizeConfig {
    /// Elements removed together with their content.
    pub remove_tags: Vec<String>,
    /// Attributes stripped from every remaining element.
    pub strip_attributes: Vec<String>,
    /// Whether to strip `on*` event-handler attributes
    pub strip_event_handlers: bool,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        let remove_tags = [
            "script", "style", "iframe", "object", "embed", "applet", "form", "input", "button", "select",
            "textarea", "link", "meta",
        ];

        Self {
            remove_tags: remove_tags.iter().map(|t| t.to_string()).collect(),
            strip_attributes: ["style", "class", "id"].iter().map(|a| a.to_string()).collect(),
            strip_event_handlers: true,
        }
    }
}

/// Returns a cleaned copy of `html`.
///
/// Removes the configured elements, strips event handlers and the configured
/// attributes, and drops any attribute whose value is a `javascript:` URL.
///
/// # Errors
///
/// Returns [`ExtractError::HtmlParseError`] if the rewriter gives up on the input.
///
/// # Example
///
/// ```rust
/// use stash_core::{SanitizeConfig, sanitize_html};
///
/// let cleaned = sanitize_html(r#"<p onclick="x()" class="lead">Hi<script>bad()</script></p>"#,
///     &SanitizeConfig::default()).unwrap();
/// assert_eq!(cleaned, "<p>Hi</p>");
/// ```
pub fn sanitize_html(html: &str, config: &SanitizeConfig) -> Result<String> {
    let stripped: Vec<String> = config.strip_attributes.iter().map(|a| a.to_ascii_lowercase()).collect();
    let strip_handlers = config.strip_event_handlers;

    let mut handlers: Vec<_> = config
        .remove_tags
        .iter()
        .filter(|tag| is_tag_name(tag))
        .map(|tag| {
            element!(tag.as_str(), |el| {
                el.remove();
                Ok(())
            })
        })
        .collect();

    handlers.push(element!("*", |el| {
        let names: Vec<String> = el.attributes().iter().map(|attr| attr.name()).collect();
        for name in names {
            let lower = name.to_ascii_lowercase();
            let drop = (strip_handlers && lower.starts_with("on"))
                || stripped.contains(&lower)
                || el.get_attribute(&name).is_some_and(|value| is_script_url(&value));

            if drop {
                el.remove_attribute(&name);
            }
        }
        Ok(())
    }));

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings { element_content_handlers: handlers, ..Default::default() },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| ExtractError::HtmlParseError(format!("sanitizer rejected input: {}", e)))?;
    rewriter
        .end()
        .map_err(|e| ExtractError::HtmlParseError(format!("sanitizer rejected input: {}", e)))?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// True when a URL-ish attribute value would execute script.
///
/// Browsers ignore ASCII whitespace and control characters inside the scheme,
/// so those are skipped before comparing.
pub fn is_script_url(value: &str) -> bool {
    let scheme: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .take(11)
        .collect::<String>()
        .to_ascii_lowercase();

    scheme.starts_with("javascript:") || scheme.starts_with("vbscript:")
}

fn is_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        sanitize_html(html, &SanitizeConfig::default()).unwrap()
    }

    #[test]
    fn test_removes_dangerous_elements() {
        let html = r#"<div><script>a()</script><style>p{}</style><iframe src="x"></iframe><object></object><embed src="y"><p>Text</p></div>"#;
        assert_eq!(clean(html), "<div><p>Text</p></div>");
    }

    #[test]
    fn test_removes_form_controls_and_head_links() {
        let html = r#"<link rel="stylesheet" href="a.css"><meta name="x" content="y"><form><input name="q"><button>Go</button><select><option>1</option></select><textarea>t</textarea></form><p>ok</p>"#;
        assert_eq!(clean(html), "<p>ok</p>");
    }

    #[test]
    fn test_strips_event_handlers_and_presentation() {
        let html = r#"<p onclick="x()" ONMOUSEOVER="y()" style="color:red" class="c" id="i" title="keep">t</p>"#;
        assert_eq!(clean(html), r#"<p title="keep">t</p>"#);
    }

    #[test]
    fn test_strips_javascript_urls() {
        let html = r#"<a href="JavaScript:alert(1)">a</a><img src=" javascript:x()"><a href="https://ok.com">b</a>"#;
        let out = clean(html);
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(out.contains(r#"href="https://ok.com""#));
    }

    #[test]
    fn test_script_url_detection() {
        assert!(is_script_url("javascript:void(0)"));
        assert!(is_script_url("  JAVASCRIPT:x"));
        assert!(is_script_url("java\tscript:x"));
        assert!(is_script_url("vbscript:msgbox"));
        assert!(!is_script_url("https://example.com/javascript:"));
        assert!(!is_script_url("/path"));
    }

    #[test]
    fn test_custom_config_keeps_class() {
        let config = SanitizeConfig { strip_attributes: vec!["style".to_string()], ..Default::default() };
        let out = sanitize_html(r#"<p class="lead" style="x">t</p>"#, &config).unwrap();
        assert_eq!(out, r#"<p class="lead">t</p>"#);
    }

    #[test]
    fn test_invalid_tag_names_are_ignored() {
        let config = SanitizeConfig { remove_tags: vec!["<<".to_string(), "script".to_string()], ..Default::default() };
        let out = sanitize_html("<p>a</p><script>b</script>", &config).unwrap();
        assert_eq!(out, "<p>a</p>");
    }
}
