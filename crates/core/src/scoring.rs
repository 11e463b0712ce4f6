use crate::parse::Element;

/// Raw measurements of a main-content candidate.
///
/// Scoring works on these numbers only, so the heuristics can be exercised
/// without building a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandidateMetrics {
    /// Characters of trimmed text content
    pub text_len: usize,
    /// Descendant elements, excluding the candidate itself
    pub element_count: usize,
    /// Descendant `<a>` elements
    pub link_count: usize,
}

impl CandidateMetrics {
    /// Measures an element subtree.
    pub fn of(element: &Element<'_>) -> Self {
        Self {
            text_len: element.text_len(),
            element_count: element.descendant_element_count(),
            link_count: element.link_count(),
        }
    }
}

/// Text-density score of a candidate.
///
/// Favors much text under few tags, with a small bonus for absolute length
/// (capped at 1.0) and a penalty for links per hundred characters:
///
/// `text / max(elements, 1) + min(text / 1000, 1) - links / max(text / 100, 1)`
pub fn density_score(metrics: CandidateMetrics) -> f64 {
    let text = metrics.text_len as f64;
    let elements = metrics.element_count.max(1) as f64;
    let links = metrics.link_count as f64;

    text / elements + (text / 1000.0).min(1.0) - links / (text / 100.0).max(1.0)
}

/// Marker tables used to reject boilerplate candidates by class and id.
#[derive(Debug, Clone, Copy)]
pub struct ExclusionRules<'a> {
    /// Substrings that mark navigation and boilerplate
    pub markers: &'a [String],
    /// Markers that must match a whole class/id token (`ad` but not `header`)
    pub token_markers: &'a [String],
    /// Substrings that mark page-sized wrappers
    pub wrapper_markers: &'a [String],
    /// A wrapper is kept when its class/id also contains this
    pub wrapper_keep: &'a str,
}

/// Whether a candidate's class/id marks it as boilerplate or a page wrapper.
///
/// Matching is case-insensitive. Wrapper markers (`root`, `app`, `page`,
/// `container`) are forgiven when the same attributes mention the keep marker.
pub fn is_excluded(class: Option<&str>, id: Option<&str>, rules: &ExclusionRules<'_>) -> bool {
    let combined = format!("{} {}", class.unwrap_or_default(), id.unwrap_or_default()).to_lowercase();
    if combined.trim().is_empty() {
        return false;
    }

    if rules.markers.iter().any(|m| combined.contains(m.as_str())) {
        return true;
    }

    let mut tokens = combined.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty());
    if tokens.any(|t| rules.token_markers.iter().any(|m| m == t)) {
        return true;
    }

    rules.wrapper_markers.iter().any(|m| combined.contains(m.as_str())) && !combined.contains(rules.wrapper_keep)
}
