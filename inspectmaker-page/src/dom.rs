//! Selector matching against added markup.

use scraper::{Html, Selector};

/// A compiled CSS selector tested against the nodes of a DOM mutation.
///
/// An added node is matched as a child of an otherwise empty `<body>`, so
/// selectors anchored at `html` or `body` work. Ancestors the node has in the
/// real document are not modelled: `main > .card` never matches.
#[derive(Debug, Clone)]
pub struct NodeSelector {
    source: String,
    selector: Selector,
}

impl NodeSelector {
    pub fn parse(source: &str) -> Result<Self, String> {
        let selector =
            Selector::parse(source).map_err(|e| format!("Invalid selector '{source}': {e:?}"))?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the added node, or any of its descendants, matches.
    pub fn matches_markup(&self, markup: &str) -> bool {
        let document = Html::parse_document(&format!("<body>{markup}</body>"));
        document
            .select(&self.selector)
            .any(|element| !matches!(element.value().name(), "html" | "head" | "body"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_node_itself() {
        let selector = NodeSelector::parse("div.banner").unwrap();
        assert!(selector.matches_markup(r#"<div class="banner">hi</div>"#));
        assert!(!selector.matches_markup(r#"<div class="other"></div>"#));
    }

    #[test]
    fn test_matches_descendant() {
        let selector = NodeSelector::parse("button").unwrap();
        assert!(selector.matches_markup("<section><p><button>Buy</button></p></section>"));
        assert!(!selector.matches_markup("<section><p>text</p></section>"));
    }

    #[test]
    fn test_matches_selectors_anchored_at_body() {
        let selector = NodeSelector::parse("body div.card").unwrap();
        assert!(selector.matches_markup(r#"<div class="card"></div>"#));

        let child = NodeSelector::parse("body > section").unwrap();
        assert!(child.matches_markup("<section><p>x</p></section>"));
        assert!(!child.matches_markup("<div><section></section></div>"));
    }

    #[test]
    fn test_wrapper_elements_never_match() {
        let selector = NodeSelector::parse("body").unwrap();
        assert!(!selector.matches_markup("<div></div>"));
    }

    #[test]
    fn test_text_node_never_matches() {
        let selector = NodeSelector::parse("div").unwrap();
        assert!(!selector.matches_markup("just text"));
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        assert!(NodeSelector::parse("div[").is_err());
    }
}
