//! HTML parser for extracting links and the page title
//!
//! Links are collected from a configurable allowlist of `tag[attribute]`
//! rules. Every matching attribute value is resolved against the page URL;
//! values that cannot be resolved are skipped.

use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// One URL-bearing attribute on one tag, written `tag[attribute]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagRule {
    pub tag: String,
    pub attribute: String,
}

impl FromStr for TagRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTagRule(format!("'{}' (expected tag[attribute])", s));

        let rule = s.trim();
        let (tag, rest) = rule.split_once('[').ok_or_else(invalid)?;
        let attribute = rest.strip_suffix(']').ok_or_else(invalid)?;

        if !is_identifier(tag) || !is_identifier(attribute) {
            return Err(invalid());
        }

        Ok(Self {
            tag: tag.to_ascii_lowercase(),
            attribute: attribute.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for TagRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tag, self.attribute)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// The set of tag rules scanned for links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAllowlist {
    rules: Vec<TagRule>,
}

impl TagAllowlist {
    /// Parses a list of `tag[attribute]` rules, dropping repeats
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self, ConfigError> {
        let mut parsed: Vec<TagRule> = Vec::with_capacity(rules.len());
        for rule in rules {
            let rule: TagRule = rule.as_ref().parse()?;
            if !parsed.contains(&rule) {
                parsed.push(rule);
            }
        }

        if parsed.is_empty() {
            return Err(ConfigError::InvalidTagRule(
                "allowlist needs at least one rule".to_string(),
            ));
        }

        Ok(Self { rules: parsed })
    }

    /// Anchors only
    pub fn anchors() -> Self {
        Self {
            rules: vec![TagRule {
                tag: "a".to_string(),
                attribute: "href".to_string(),
            }],
        }
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    fn selector(&self) -> Option<Selector> {
        let css = self
            .rules
            .iter()
            .map(TagRule::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Selector::parse(&css).ok()
    }

    /// Values of every allowlisted attribute present on a matched element,
    /// in rule order
    fn attributes_for<'a>(&self, element: &ElementRef<'a>) -> Vec<&'a str> {
        let name = element.value().name();
        self.rules
            .iter()
            .filter(|rule| rule.tag == name)
            .filter_map(|rule| element.value().attr(&rule.attribute))
            .collect()
    }
}

/// A link found on a page, already resolved to absolute form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Absolute URL
    pub url: Url,

    /// Tag the link came from
    pub tag: String,

    /// Trimmed text content of the tag, if any
    pub text: Option<String>,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page, in document order
    pub links: Vec<LinkCandidate>,
}

/// Parses HTML content and extracts the title and allowlisted links
///
/// Repeated identical links are kept, once per occurrence.
///
/// # Example
///
/// ```
/// use linkrelay::crawler::{parse_html, TagAllowlist};
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, &TagAllowlist::anchors());
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url.as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url, allowlist: &TagAllowlist) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url, allowlist),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all resolvable links matching the allowlist
fn extract_links(document: &Html, base_url: &Url, allowlist: &TagAllowlist) -> Vec<LinkCandidate> {
    let Some(selector) = allowlist.selector() else {
        tracing::warn!("Tag allowlist did not compile to a selector: {:?}", allowlist.rules());
        return Vec::new();
    };

    let mut links = Vec::new();

    for element in document.select(&selector) {
        let values = allowlist.attributes_for(&element);
        if values.is_empty() {
            continue;
        }

        let text = element.text().collect::<String>().trim().to_string();
        let text = Some(text).filter(|t| !t.is_empty());

        for value in values {
            match base_url.join(value) {
                Ok(url) => links.push(LinkCandidate {
                    url,
                    tag: element.value().name().to_string(),
                    text: text.clone(),
                }),
                Err(e) => {
                    tracing::debug!("Skipping unresolvable link '{}' on {}: {}", value, base_url, e);
                }
            }
        }
    }

    links
}
