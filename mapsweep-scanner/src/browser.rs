//! Browser-control boundary used by the walker.
//!
//! The walker only talks to a [`Browser`]; the WebDriver backend lives in
//! [`crate::webdriver`] and tests plug in a scripted fake. Every selector the
//! walker needs comes from a [`SelectorTable`], so a markup change on the map
//! site is a data change, not a code change.

use crate::error::{Result, SweepError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Locator::XPath(selector.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
        }
    }
}

/// DOM-coupled selectors for the map search UI (English locale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    /// "Accept all" button of the cookie-consent dialog.
    pub consent_button: Locator,
    pub search_box: Locator,
    /// Scrollable panel holding the result cards.
    pub results_panel: Locator,
    /// One result card inside the panel.
    pub result_card: Locator,
    /// Business name inside a card.
    pub card_title: Locator,
    pub address_aria_prefix: String,
    pub phone_aria_prefix: String,
    pub website_aria_prefix: String,
    pub rating_aria_suffix: String,
    pub reviews_aria_suffix: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            consent_button: Locator::xpath("//button/div[normalize-space()='Accept all']"),
            search_box: Locator::id("searchboxinput"),
            results_panel: Locator::xpath(r#"//*[@id="QA0Szd"]/div/div/div[1]/div[2]/div"#),
            result_card: Locator::css("div.Nv2PK"),
            card_title: Locator::css("div.fontBodyMedium div.fontHeadlineSmall, div.fontHeadlineSmall"),
            address_aria_prefix: "Address:".to_string(),
            phone_aria_prefix: "Phone:".to_string(),
            website_aria_prefix: "Website:".to_string(),
            rating_aria_suffix: "stars".to_string(),
            reviews_aria_suffix: "reviews".to_string(),
        }
    }
}

impl SelectorTable {
    /// Load overrides from a JSON file. Keys that are absent keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| {
            SweepError::Config(format!("Invalid selector file {}: {}", path.display(), e))
        })
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Element whose aria-label starts with `prefix`.
    pub fn aria_prefix(prefix: &str) -> Locator {
        Locator::css(format!(r#"*[aria-label^="{}"]"#, css_string(prefix)))
    }

    /// Element whose aria-label ends with `suffix`.
    pub fn aria_suffix(suffix: &str) -> Locator {
        Locator::css(format!(r#"*[aria-label$="{}"]"#, css_string(suffix)))
    }
}

// Escape a value for use inside a double-quoted CSS string.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// A live browser session. Element handles are opaque to callers.
///
/// Errors follow the transient/fatal split in [`crate::ErrorKind`]: stale or
/// missing elements and wait timeouts must be reported as
/// [`SweepError::StaleElement`], [`SweepError::ElementNotFound`] or
/// [`SweepError::Timeout`] so the walker can retry or skip them.
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until an element matching `locator` is present.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<Self::Element>;

    /// Wait until an element matching `locator` is present and clickable.
    async fn wait_for_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element>;

    /// Single page-level lookup, no waiting.
    async fn find(&self, locator: &Locator) -> Result<Self::Element>;

    async fn find_within(&self, parent: &Self::Element, locator: &Locator)
    -> Result<Self::Element>;

    async fn find_all_within(
        &self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>>;

    async fn text(&self, element: &Self::Element) -> Result<String>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn clear(&self, element: &Self::Element) -> Result<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> Result<()>;

    async fn press_enter(&self, element: &Self::Element) -> Result<()>;

    /// Scroll the element to the middle of the viewport.
    async fn scroll_into_view(&self, element: &Self::Element) -> Result<()>;

    /// Scroll a scrollable container to its bottom edge.
    async fn scroll_to_bottom(&self, element: &Self::Element) -> Result<()>;

    async fn current_url(&self) -> Result<String>;
}

/// Acquires and releases browser sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: Send + Sync;

    async fn launch(&self) -> Result<Self::Session>;

    /// Release the session. Failures are logged, never raised.
    async fn close(&self, session: Self::Session);
}
