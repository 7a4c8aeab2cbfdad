///! Typed element locators
///!
///! A `Target` is a chain of lookups: each step is resolved relative to the
///! element its parent step picked, or to the document for the first step.
///! Scoping a query to an open modal is just building it as a child of the
///! modal root target.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum Locator {
    #[serde(rename = "css")]
    Css(String),
    /// Evaluated with the parent element as context node
    #[serde(rename = "xpath")]
    XPath(String),
    /// Elements whose own text nodes match this regex
    #[serde(rename = "own_text")]
    OwnText(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Pick {
    First,
    Last,
    Nth(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub parent: Option<Box<Target>>,
    pub locator: Locator,
    /// Regex the candidate's full text content has to match
    pub has_text: Option<String>,
    pub pick: Pick,
}

impl Target {
    fn root(locator: Locator) -> Self {
        Self {
            parent: None,
            locator,
            has_text: None,
            pick: Pick::First,
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::root(Locator::Css(selector.into()))
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::root(Locator::XPath(expr.into()))
    }

    pub fn own_text(pattern: impl Into<String>) -> Self {
        Self::root(Locator::OwnText(pattern.into()))
    }

    /// Re-root this target below `parent`
    pub fn within(mut self, parent: &Target) -> Self {
        self.parent = Some(Box::new(parent.clone()));
        self
    }

    pub fn child_css(&self, selector: impl Into<String>) -> Target {
        Target::css(selector).within(self)
    }

    pub fn child_xpath(&self, expr: impl Into<String>) -> Target {
        Target::xpath(expr).within(self)
    }

    pub fn child_own_text(&self, pattern: impl Into<String>) -> Target {
        Target::own_text(pattern).within(self)
    }

    /// The picked element's parent node
    pub fn parent_element(&self) -> Target {
        self.child_xpath("..")
    }

    pub fn with_text(mut self, pattern: impl Into<String>) -> Self {
        self.has_text = Some(pattern.into());
        self
    }

    pub fn first(mut self) -> Self {
        self.pick = Pick::First;
        self
    }

    pub fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.pick = Pick::Nth(index);
        self
    }

    pub fn to_json(&self) -> String {
        // Target holds only strings and integers
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{} >> ", parent)?;
        }
        match &self.locator {
            Locator::Css(s) => write!(f, "css={}", s)?,
            Locator::XPath(s) => write!(f, "xpath={}", s)?,
            Locator::OwnText(s) => write!(f, "text=/{}/", s)?,
        }
        if let Some(t) = &self.has_text {
            write!(f, " [has-text=/{}/]", t)?;
        }
        match self.pick {
            Pick::First => Ok(()),
            Pick::Last => write!(f, " (last)"),
            Pick::Nth(i) => write!(f, " (nth={})", i),
        }
    }
}

/// XPath that matches `tag` elements whose normalized text contains `text`,
/// ignoring case for ASCII and German umlauts
pub fn xpath_has_text(tag: &str, text: &str) -> String {
    const LOWER: &str = "abcdefghijklmnopqrstuvwxyzäöü";
    const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÜ";
    format!(
        ".//{}[contains(translate(normalize-space(.), '{}', '{}'), '{}')]",
        tag,
        LOWER,
        UPPER,
        text.to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_serializes_for_resolver() {
        let modal = Target::css("ngb-modal-window").last();
        let value = modal.child_own_text("^Heim").parent_element().child_css(".fw-700");
        let json: serde_json::Value = serde_json::from_str(&value.to_json()).unwrap();

        assert_eq!(json["locator"]["kind"], "css");
        assert_eq!(json["locator"]["value"], ".fw-700");
        assert_eq!(json["pick"]["kind"], "first");
        assert_eq!(json["parent"]["locator"]["kind"], "xpath");
        assert_eq!(json["parent"]["locator"]["value"], "..");
        assert_eq!(json["parent"]["parent"]["locator"]["kind"], "own_text");
        assert_eq!(json["parent"]["parent"]["parent"]["pick"]["kind"], "last");
    }

    #[test]
    fn test_nth_pick_serialization() {
        let item = Target::css("sria-matches-match-list-item").nth(3);
        let json: serde_json::Value = serde_json::from_str(&item.to_json()).unwrap();
        assert_eq!(json["pick"]["kind"], "nth");
        assert_eq!(json["pick"]["value"], 3);
        assert!(json["parent"].is_null());
    }

    #[test]
    fn test_display_is_readable() {
        let t = Target::css("#login").child_own_text("Anmelden").last();
        assert_eq!(t.to_string(), "css=#login >> text=/Anmelden/ (last)");
    }

    #[test]
    fn test_xpath_has_text_is_case_insensitive() {
        let x = xpath_has_text("button", "Anmelden");
        assert!(x.starts_with(".//button[contains(translate(normalize-space(.)"));
        assert!(x.ends_with("'ANMELDEN')]"));
    }
}
