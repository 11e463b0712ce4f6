//! Image URL collection for the located content subtree.

use url::Url;

use crate::parse::Element;

/// Resolves an image source to an absolute URL.
///
/// Sources that already carry a scheme are returned unchanged; anything else is
/// joined onto `base`. Relative sources without a base, and script URLs, yield
/// `None`.
///
/// # Example
///
/// ```rust
/// use stash_core::resolve_image_url;
/// use url::Url;
///
/// let base = Url::parse("https://a.com/dir/page.html").unwrap();
/// assert_eq!(resolve_image_url("../img/x.png", Some(&base)).as_deref(), Some("https://a.com/img/x.png"));
/// assert_eq!(resolve_image_url("x.png", None), None);
/// ```
pub fn resolve_image_url(src: &str, base: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || crate::sanitize::is_script_url(src) {
        return None;
    }

    match Url::parse(src) {
        Ok(_) => Some(src.to_string()),
        Err(_) => base.and_then(|b| b.join(src).ok()).map(|u| u.to_string()),
    }
}

/// Absolute URLs of every image inside `root`, in document order.
///
/// `data-src` stands in for a missing `src` on lazy-loaded images. Duplicates
/// are kept.
pub fn extract_image_urls(root: &Element<'_>, base: Option<&Url>) -> Vec<String> {
    let mut images: Vec<Element<'_>> = Vec::new();
    if root.tag_name() == "img" {
        images.push(*root);
    }
    images.extend(root.select("img").unwrap_or_default());

    images
        .iter()
        .filter_map(|img| {
            ["src", "data-src"]
                .iter()
                .filter_map(|attr| img.attr(attr))
                .find(|value| !value.trim().is_empty())
        })
        .filter_map(|src| resolve_image_url(src, base))
        .collect()
}
