use crate::Document;

/// Title used when nothing in the document or its URL names it.
pub const UNTITLED: &str = "Untitled Article";

impl Document {
    /// Extract title with priority fallback:
    /// 1. `<title>` element
    /// 2. Open Graph `og:title`
    /// 3. First `<h1>` element
    /// 4. Host of the base URL
    /// 5. `"Untitled Article"`
    ///
    /// Whitespace inside the winning candidate is collapsed.
    pub fn extract_title(&self) -> String {
        if let Some(title) = self.title().and_then(clean_title) {
            return title;
        }

        if let Some(title) = self.get_meta_title() {
            return title;
        }

        if let Ok(elements) = self.select("h1")
            && let Some(title) = elements.first().and_then(|h1| clean_title(h1.text()))
        {
            return title;
        }

        if let Some(host) = self.base_url().and_then(|u| u.host_str())
            && !host.is_empty()
        {
            return host.to_string();
        }

        UNTITLED.to_string()
    }

    fn get_meta_title(&self) -> Option<String> {
        self.meta_content("og:title").and_then(clean_title)
    }
}

fn clean_title(raw: String) -> Option<String> {
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn title_of(html: &str, base: Option<&str>) -> String {
        let base = base.map(|b| Url::parse(b).unwrap());
        Document::parse_with_base_url(html, base).unwrap().extract_title()
    }

    #[test]
    fn test_title_element_first() {
        let html = r#"<head><title> Page
            Title </title><meta property="og:title" content="OG"></head><body><h1>H</h1></body>"#;
        assert_eq!(title_of(html, None), "Page Title");
    }

    #[test]
    fn test_og_title_when_title_blank() {
        let html = r#"<head><title>  </title><meta property="og:title" content="OG Title"></head><body><h1>H</h1></body>"#;
        assert_eq!(title_of(html, None), "OG Title");
    }

    #[test]
    fn test_svg_title_does_not_beat_og_title() {
        let html = r#"<head><meta property="og:title" content="Real Headline"></head>
            <body><svg viewBox="0 0 10 10"><title>Search</title></svg><p>x</p></body>"#;
        assert_eq!(title_of(html, None), "Real Headline");
    }

    #[test]
    fn test_first_h1() {
        let html = "<body><h1> First </h1><h1>Second</h1></body>";
        assert_eq!(title_of(html, None), "First");
    }

    #[test]
    fn test_base_url_host() {
        assert_eq!(title_of("<body><p>x</p></body>", Some("https://news.example.org/a")), "news.example.org");
    }

    #[test]
    fn test_untitled() {
        assert_eq!(title_of("<body><p>x</p></body>", None), UNTITLED);
    }
}
