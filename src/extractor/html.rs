//! HTML helpers built on `scraper`.
//!
//! Everything here is synchronous and works on a parsed [`Html`] document.
//! `Html` is not `Send`, so callers parse, query and drop it between awaits.

use crate::error::SelectorError;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// Elements that never carry article text.
pub const DEFAULT_STRIP_SELECTORS: [&str; 10] = [
    "script",
    "style",
    "iframe",
    "figure",
    ".ad",
    ".advertisement",
    ".head_view",
    "nav",
    "footer",
    "aside",
];

/// Structural selectors that usually wrap the story, most specific first.
pub const DEFAULT_ARTICLE_SELECTORS: [&str; 12] = [
    "article",
    ".article-content",
    "#article-content",
    "#articleContent",
    ".news-content",
    ".article-body",
    "#articleBody",
    "#article-body",
    "main",
    ".post-content",
    ".entry-content",
    "[itemprop=\"articleBody\"]",
];

/// An ordered list of compiled CSS selectors that remembers their source.
#[derive(Clone)]
pub struct SelectorList {
    entries: Vec<(String, Selector)>,
}

impl SelectorList {
    /// Compile `selectors` in order.
    ///
    /// # Errors
    ///
    /// [`SelectorError`] naming the first selector that fails to parse.
    pub fn parse<S: AsRef<str>>(selectors: &[S]) -> Result<Self, SelectorError> {
        let entries = selectors
            .iter()
            .map(|s| {
                let s = s.as_ref();
                Selector::parse(s)
                    .map(|sel| (s.to_string(), sel))
                    .map_err(|e| SelectorError {
                        selector: s.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = &(String, Selector)> {
        self.entries.iter()
    }
}

impl fmt::Debug for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(s, _)| s))
            .finish()
    }
}

/// Detach every element matching any selector in `strip`.
pub fn strip_elements(document: &mut Html, strip: &SelectorList) {
    let ids: Vec<_> = strip
        .iter()
        .flat_map(|(_, sel)| document.select(sel).map(|el| el.id()).collect::<Vec<_>>())
        .collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Text of a stripped page under the first selector that yields enough of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText {
    pub selector: String,
    pub text: String,
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Try `selectors` in order and return the first whose matched text,
/// concatenated across all matches and trimmed, is longer than `min_chars`
/// characters.
pub fn extract_article_text(
    document: &Html,
    selectors: &SelectorList,
    min_chars: usize,
) -> Option<ArticleText> {
    selectors.iter().find_map(|(source, sel)| {
        let text = document
            .select(sel)
            .map(element_text)
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim();
        (text.chars().count() > min_chars).then(|| ArticleText {
            selector: source.clone(),
            text: text.to_string(),
        })
    })
}

/// Parse `html`, drop the `strip` elements, and try `selectors`.
pub fn clean_and_extract(
    html: &str,
    strip: &SelectorList,
    selectors: &SelectorList,
    min_chars: usize,
) -> Option<ArticleText> {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document, strip);
    extract_article_text(&document, selectors, min_chars)
}

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
pub fn meta_content(document: &Html, key: &str) -> Option<String> {
    let sel = Selector::parse(&format!(r#"meta[property="{key}"], meta[name="{key}"]"#)).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// First non-empty meta value among `keys`, in order.
pub fn meta_content_any(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta_content(document, key))
}

/// Page headline: `og:title`, then `twitter:title`, then `<title>`.
pub fn extract_title(document: &Html) -> Option<String> {
    meta_content_any(document, &["og:title", "twitter:title"]).or_else(|| {
        let sel = Selector::parse("title").ok()?;
        document
            .select(&sel)
            .map(|el| element_text(el).trim().to_string())
            .find(|t| !t.is_empty())
    })
}

/// Page description: `og:description`, `twitter:description`, `description`.
pub fn extract_description(document: &Html) -> Option<String> {
    meta_content_any(
        document,
        &["og:description", "twitter:description", "description"],
    )
}

/// Flatten an HTML fragment (such as a feed summary) to plain text with
/// collapsed whitespace.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return fragment.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let parsed = Html::parse_fragment(fragment);
    let text: String = parsed.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (SelectorList, SelectorList) {
        (
            SelectorList::parse(&DEFAULT_STRIP_SELECTORS).unwrap(),
            SelectorList::parse(&DEFAULT_ARTICLE_SELECTORS).unwrap(),
        )
    }

    #[test]
    fn default_selectors_compile() {
        let (strip, article) = defaults();
        assert_eq!(strip.len(), 10);
        assert_eq!(article.len(), 12);
    }

    #[test]
    fn invalid_selector_is_reported() {
        let err = SelectorList::parse(&["article", "div[[", "p(("]).unwrap_err();
        assert_eq!(err.selector, "div[[");
        assert!(err.to_string().starts_with("invalid selector \"div[[\""));
    }

    #[test]
    fn exactly_100_chars_is_rejected_101_accepted() {
        let (strip, article) = defaults();
        let html = |n: usize| format!("<html><body><article>{}</article></body></html>", "가".repeat(n));

        assert_eq!(clean_and_extract(&html(100), &strip, &article, 100), None);
        let found = clean_and_extract(&html(101), &strip, &article, 100).unwrap();
        assert_eq!(found.selector, "article");
        assert_eq!(found.text.chars().count(), 101);
    }

    #[test]
    fn later_selector_wins_when_earlier_is_too_short() {
        let strip = SelectorList::parse(&DEFAULT_STRIP_SELECTORS).unwrap();
        let selectors = SelectorList::parse(&[".short", ".article-content"]).unwrap();
        let html = format!(
            r#"<div class="short">짧은 내용</div><div class="article-content">{}</div>"#,
            "긴 본문 내용입니다. ".repeat(20)
        );
        let found = clean_and_extract(&html, &strip, &selectors, 100).unwrap();
        assert_eq!(found.selector, ".article-content");
        assert!(found.text.contains("긴 본문 내용입니다."));
    }

    #[test]
    fn stripped_elements_do_not_count_toward_length() {
        let (strip, article) = defaults();
        let html = format!(
            "<article><p>short body</p><script>{}</script><aside>{}</aside></article>",
            "var x = 1;".repeat(30),
            "related link ".repeat(30)
        );
        assert_eq!(clean_and_extract(&html, &strip, &article, 100), None);
    }

    #[test]
    fn ads_inside_article_are_removed() {
        let (strip, article) = defaults();
        let html = format!(
            r#"<article><div class="ad">BUY NOW</div><p>{}</p><footer>ⓒ news</footer></article>"#,
            "본문 내용입니다. ".repeat(20)
        );
        let found = clean_and_extract(&html, &strip, &article, 100).unwrap();
        assert!(!found.text.contains("BUY NOW"));
        assert!(!found.text.contains("ⓒ"));
    }

    #[test]
    fn nothing_matches_returns_none() {
        let (strip, article) = defaults();
        let html = format!("<div class=\"random\">{}</div>", "x".repeat(500));
        assert_eq!(clean_and_extract(&html, &strip, &article, 100), None);
    }

    #[test]
    fn title_prefers_open_graph() {
        let doc = Html::parse_document(
            r#"<html><head>
                <meta property="og:title" content="OG 제목">
                <meta name="twitter:title" content="Twitter 제목">
                <title>문서 제목</title>
            </head></html>"#,
        );
        assert_eq!(extract_title(&doc).as_deref(), Some("OG 제목"));
    }

    #[test]
    fn title_falls_back_to_title_tag() {
        let doc = Html::parse_document("<html><head><title> 문서 제목 </title></head></html>");
        assert_eq!(extract_title(&doc).as_deref(), Some("문서 제목"));
    }

    #[test]
    fn description_falls_back_to_meta_name() {
        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="기본 설명"></head></html>"#,
        );
        assert_eq!(extract_description(&doc).as_deref(), Some("기본 설명"));
        assert_eq!(meta_content(&doc, "og:description"), None);
    }

    #[test]
    fn html_to_text_flattens_markup() {
        assert_eq!(
            html_to_text(r##"<a href="https://x">금리 동결</a>&nbsp;<font color="#6f6f6f">연합뉴스</font>"##),
            "금리 동결 연합뉴스"
        );
        assert_eq!(html_to_text("  plain   text "), "plain text");
    }
}
