//! Main-content locator.
//!
//! Finds the subtree most likely to hold the article body in three phases,
//! first hit wins:
//!
//! 1. Semantic and CMS selectors, in priority order.
//! 2. Text-density scoring over block-ish candidates.
//! 3. The first large `div`, else the body itself.
//!
//! The selector and marker tables are plain data in [`LocatorConfig`] and can
//! be extended from a JSON file without code changes.

use std::fs;
use std::path::{Path, PathBuf};

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parse::{Document, Element};
use crate::scoring::{CandidateMetrics, ExclusionRules, density_score, is_excluded};
use crate::{ExtractError, Result};

/// Tables and thresholds for the main-content locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Selectors tried in order during the first phase
    pub selectors: Vec<String>,
    /// Tags scored during the density phase
    pub candidate_tags: Vec<String>,
    /// Class/id substrings that mark boilerplate
    pub exclude_markers: Vec<String>,
    /// Class/id tokens that mark boilerplate when they appear as a whole word
    pub exclude_tokens: Vec<String>,
    /// Class/id substrings that mark page-sized wrappers
    pub wrapper_markers: Vec<String>,
    /// Wrappers mentioning this are still considered
    pub wrapper_keep: String,
    /// A selector match must have more text than this
    pub min_selector_text: usize,
    /// Candidates with less text are ignored
    pub min_candidate_text: usize,
    /// Candidates with more text are ignored
    pub max_candidate_text: usize,
    /// Only candidates with more text than this can win
    pub min_winner_text: usize,
    /// The body joins the candidates, and a `div` is used as fallback, above this
    pub min_body_text: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let selectors = [
            "article",
            "main",
            "[role=main]",
            ".content",
            ".post",
            ".entry",
            ".post-content",
            ".article-content",
            ".entry-content",
            ".story-body",
            ".article-body",
            ".post-body",
            "#content",
            "#main",
            "#post",
            ".gh-content",
            ".post-full-content",
            ".kg-card-markdown",
        ];
        let exclude_markers = [
            "nav",
            "sidebar",
            "menu",
            "header",
            "footer",
            "widget",
            "social",
            "share",
            "comment",
            "related",
            "popup",
            "modal",
            "banner",
            "promo",
            "newsletter",
        ];

        Self {
            selectors: to_strings(&selectors),
            candidate_tags: to_strings(&["div", "section", "article", "p", "main", "span", "aside"]),
            exclude_markers: to_strings(&exclude_markers),
            exclude_tokens: to_strings(&["ad", "ads", "advert", "advertisement"]),
            wrapper_markers: to_strings(&["root", "app", "page", "container"]),
            wrapper_keep: "content".to_string(),
            min_selector_text: 100,
            min_candidate_text: 20,
            max_candidate_text: 100_000,
            min_winner_text: 50,
            min_body_text: 100,
        }
    }
}

/// On-disk shape of a locator table file.
///
/// Lists either replace the built-in tables or, with `extend: true`, are
/// appended to them. Missing fields keep their current values.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocatorFile {
    extend: bool,
    selectors: Option<Vec<String>>,
    candidate_tags: Option<Vec<String>>,
    exclude_markers: Option<Vec<String>>,
    exclude_tokens: Option<Vec<String>>,
    wrapper_markers: Option<Vec<String>>,
    wrapper_keep: Option<String>,
    min_selector_text: Option<usize>,
    min_candidate_text: Option<usize>,
    max_candidate_text: Option<usize>,
    min_winner_text: Option<usize>,
    min_body_text: Option<usize>,
}

impl LocatorConfig {
    /// Applies a JSON locator table on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigError`] if the JSON is malformed.
    pub fn merge_json(mut self, json: &str) -> Result<Self> {
        let file: LocatorFile =
            serde_json::from_str(json).map_err(|e| ExtractError::ConfigError(format!("Invalid locator table: {}", e)))?;

        let extend = file.extend;
        let merge = |current: &mut Vec<String>, incoming: Option<Vec<String>>| {
            if let Some(items) = incoming {
                if extend {
                    let fresh: Vec<String> = items.into_iter().filter(|i| !current.contains(i)).collect();
                    current.extend(fresh);
                } else {
                    *current = items;
                }
            }
        };

        merge(&mut self.selectors, file.selectors);
        merge(&mut self.candidate_tags, file.candidate_tags);
        merge(&mut self.exclude_markers, file.exclude_markers);
        merge(&mut self.exclude_tokens, file.exclude_tokens);
        merge(&mut self.wrapper_markers, file.wrapper_markers);

        if let Some(keep) = file.wrapper_keep {
            self.wrapper_keep = keep;
        }
        self.min_selector_text = file.min_selector_text.unwrap_or(self.min_selector_text);
        self.min_candidate_text = file.min_candidate_text.unwrap_or(self.min_candidate_text);
        self.max_candidate_text = file.max_candidate_text.unwrap_or(self.max_candidate_text);
        self.min_winner_text = file.min_winner_text.unwrap_or(self.min_winner_text);
        self.min_body_text = file.min_body_text.unwrap_or(self.min_body_text);

        Ok(self)
    }

    /// Loads the built-in tables merged with a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ExtractError::FileNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        Self::default().merge_json(&json)
    }

    /// Default location of the user's locator table: `<config_dir>/stash/locator.json`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stash").join("locator.json"))
    }

    /// Built-in tables, merged with the user's table when one exists.
    pub fn from_config_dir() -> Result<Self> {
        match Self::user_config_path() {
            Some(path) if path.exists() => Self::from_json_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn exclusion_rules(&self) -> ExclusionRules<'_> {
        ExclusionRules {
            markers: &self.exclude_markers,
            token_markers: &self.exclude_tokens,
            wrapper_markers: &self.wrapper_markers,
            wrapper_keep: &self.wrapper_keep,
        }
    }
}

/// Which phase of the locator produced the result.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatedBy {
    Selector(String),
    Density(f64),
    DivFallback,
    Body,
}

/// The located subtree and how it was found.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub element: Element<'a>,
    pub located_by: LocatedBy,
}

/// Returns the element most likely to contain the article body.
///
/// Never fails: degrades to the body (or the root element for fragments).
pub fn locate_main_content<'a>(doc: &'a Document, config: &LocatorConfig) -> Located<'a> {
    if let Some(located) = by_selectors(doc, config) {
        return located;
    }

    if let Some(located) = by_density(doc, config) {
        return located;
    }

    if let Some(div) = first_large_div(doc, config) {
        debug!("main content: falling back to first large div");
        return Located { element: div, located_by: LocatedBy::DivFallback };
    }

    debug!("main content: falling back to body");
    Located { element: doc.body_or_root(), located_by: LocatedBy::Body }
}

fn by_selectors<'a>(doc: &'a Document, config: &LocatorConfig) -> Option<Located<'a>> {
    for selector in &config.selectors {
        let Ok(sel) = Selector::parse(selector) else {
            debug!(selector = %selector, "skipping invalid locator selector");
            continue;
        };

        if let Some(el) = doc
            .html()
            .select(&sel)
            .map(Element::new)
            .find(|el| el.text_len() > config.min_selector_text)
        {
            debug!(selector = %selector, "main content: semantic selector matched");
            return Some(Located { element: el, located_by: LocatedBy::Selector(selector.clone()) });
        }
    }
    None
}

fn by_density<'a>(doc: &'a Document, config: &LocatorConfig) -> Option<Located<'a>> {
    let rules = config.exclusion_rules();
    let mut candidates: Vec<Element<'a>> = Vec::new();

    if let Some(body) = doc.body()
        && body.text_len() > config.min_body_text
    {
        candidates.push(body);
    }

    let tags = config.candidate_tags.join(", ");
    if let Ok(sel) = Selector::parse(&tags) {
        candidates.extend(doc.html().select(&sel).map(Element::new));
    }

    let mut best: Option<(Element<'a>, f64)> = None;
    for candidate in candidates {
        if is_excluded(candidate.attr("class"), candidate.attr("id"), &rules) {
            continue;
        }

        let metrics = CandidateMetrics::of(&candidate);
        if metrics.text_len < config.min_candidate_text || metrics.text_len > config.max_candidate_text {
            continue;
        }
        if metrics.text_len <= config.min_winner_text {
            continue;
        }

        let score = density_score(metrics);
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((candidate, score));
        }
    }

    best.map(|(element, score)| {
        debug!(tag = %element.tag_name(), score, "main content: density winner");
        Located { element, located_by: LocatedBy::Density(score) }
    })
}

fn first_large_div<'a>(doc: &'a Document, config: &LocatorConfig) -> Option<Element<'a>> {
    let root = doc.body_or_root();
    root.select("div")
        .ok()?
        .into_iter()
        .find(|div| div.text_len() > config.min_body_text)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
