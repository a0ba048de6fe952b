use crate::browser::{Browser, Locator, SessionLauncher};
use crate::error::{Result, SweepError};
use crate::pacing::Pacing;
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::{ChromeCapabilities, ChromiumLikeCapabilities};
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

const SCROLL_INTO_VIEW_JS: &str = "arguments[0].scrollIntoView({block: 'center'});";
const SCROLL_TO_BOTTOM_JS: &str = "arguments[0].scrollTop = arguments[0].scrollHeight;";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

// Automation hints off, no first-run UI.
const CHROME_FLAGS: [&str; 6] = [
    "--lang=en-US",
    "--start-maximized",
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
];

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Css(s) => By::Css(s.as_str()),
        Locator::XPath(s) => By::XPath(s.as_str()),
        Locator::Id(s) => By::Id(s.as_str()),
    }
}

fn map_err(err: WebDriverError, context: &str) -> SweepError {
    match err {
        WebDriverError::NoSuchElement(_) => SweepError::ElementNotFound(context.to_string()),
        WebDriverError::StaleElementReference(_) => SweepError::StaleElement(context.to_string()),
        other => SweepError::Browser(format!("{}: {}", context, other)),
    }
}

/// Chrome session driven through a WebDriver server (chromedriver).
pub struct WebDriverBrowser {
    driver: WebDriver,
}

impl WebDriverBrowser {
    pub fn new(driver: WebDriver) -> Self {
        Self { driver }
    }

    pub fn into_inner(self) -> WebDriver {
        self.driver
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = WebElement;

    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.driver
            .goto(url)
            .await
            .map_err(|e| SweepError::Browser(format!("navigation to {} failed: {}", url, e)))
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<WebElement> {
        self.driver
            .query(by(locator))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| match map_err(e, &locator.to_string()) {
                SweepError::ElementNotFound(what) => SweepError::Timeout(what),
                other => other,
            })
    }

    async fn wait_for_clickable(&self, locator: &Locator, timeout: Duration) -> Result<WebElement> {
        self.driver
            .query(by(locator))
            .and_clickable()
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| match map_err(e, &locator.to_string()) {
                SweepError::ElementNotFound(what) => SweepError::Timeout(what),
                other => other,
            })
    }

    async fn find(&self, locator: &Locator) -> Result<WebElement> {
        self.driver
            .find(by(locator))
            .await
            .map_err(|e| map_err(e, &locator.to_string()))
    }

    async fn find_within(&self, parent: &WebElement, locator: &Locator) -> Result<WebElement> {
        parent
            .find(by(locator))
            .await
            .map_err(|e| map_err(e, &locator.to_string()))
    }

    async fn find_all_within(&self, parent: &WebElement, locator: &Locator) -> Result<Vec<WebElement>> {
        parent
            .find_all(by(locator))
            .await
            .map_err(|e| map_err(e, &locator.to_string()))
    }

    async fn text(&self, element: &WebElement) -> Result<String> {
        element.text().await.map_err(|e| map_err(e, "element text"))
    }

    async fn attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>> {
        element.attr(name).await.map_err(|e| map_err(e, name))
    }

    async fn click(&self, element: &WebElement) -> Result<()> {
        element.click().await.map_err(|e| map_err(e, "click"))
    }

    async fn clear(&self, element: &WebElement) -> Result<()> {
        element.clear().await.map_err(|e| map_err(e, "clear"))
    }

    async fn type_text(&self, element: &WebElement, text: &str) -> Result<()> {
        element.send_keys(text).await.map_err(|e| map_err(e, "send keys"))
    }

    async fn press_enter(&self, element: &WebElement) -> Result<()> {
        element
            .send_keys(Key::Enter + "")
            .await
            .map_err(|e| map_err(e, "send enter"))
    }

    async fn scroll_into_view(&self, element: &WebElement) -> Result<()> {
        let arg = element.to_json().map_err(|e| map_err(e, "element handle"))?;
        self.driver
            .execute(SCROLL_INTO_VIEW_JS, vec![arg])
            .await
            .map_err(|e| map_err(e, "scroll into view"))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self, element: &WebElement) -> Result<()> {
        let arg = element.to_json().map_err(|e| map_err(e, "element handle"))?;
        self.driver
            .execute(SCROLL_TO_BOTTOM_JS, vec![arg])
            .await
            .map_err(|e| map_err(e, "scroll to bottom"))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.driver
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| map_err(e, "current url"))
    }
}

/// Starts visible Chrome sessions with an English UI.
pub struct WebDriverLauncher {
    server_url: String,
    chrome_binary: Option<String>,
    profile_dir: Option<PathBuf>,
    page_load_timeout: Duration,
    pacing: Pacing,
}

impl WebDriverLauncher {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            chrome_binary: None,
            profile_dir: None,
            page_load_timeout: Duration::from_secs(20),
            pacing: Pacing::default(),
        }
    }

    pub fn with_chrome_binary(mut self, binary: Option<String>) -> Self {
        self.chrome_binary = binary;
        self
    }

    /// Persistent profile directory; `~` is expanded.
    pub fn with_profile_dir(mut self, dir: Option<String>) -> Self {
        self.profile_dir = dir.map(|d| PathBuf::from(shellexpand::tilde(&d).into_owned()));
        self
    }

    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    fn capabilities(&self) -> Result<ChromeCapabilities> {
        let caps_err = |e: WebDriverError| SweepError::Config(format!("Chrome capabilities: {}", e));
        let mut caps = DesiredCapabilities::chrome();

        for flag in CHROME_FLAGS {
            caps.add_arg(flag).map_err(caps_err)?;
        }

        // Vary the window size on some runs
        let window = {
            let mut rng = rand::thread_rng();
            if rng.gen_bool(0.3) {
                Some((rng.gen_range(55..80) * 20, rng.gen_range(35..50) * 20))
            } else {
                None
            }
        };
        if let Some((w, h)) = window {
            caps.add_arg(&format!("--window-size={},{}", w, h))
                .map_err(caps_err)?;
        }

        caps.add_experimental_option(
            "prefs",
            serde_json::json!({ "intl.accept_languages": "en,en_US" }),
        )
        .map_err(caps_err)?;

        if let Some(ref dir) = self.profile_dir {
            std::fs::create_dir_all(dir)?;
            caps.add_arg(&format!("--user-data-dir={}", dir.display()))
                .map_err(caps_err)?;
        }

        if let Some(ref binary) = self.chrome_binary {
            caps.set_binary(binary).map_err(caps_err)?;
        }

        Ok(caps)
    }
}

#[async_trait]
impl SessionLauncher for WebDriverLauncher {
    type Session = WebDriverBrowser;

    async fn launch(&self) -> Result<WebDriverBrowser> {
        info!("Launching Chrome via {}", self.server_url);
        let caps = self.capabilities()?;
        let driver = WebDriver::new(&self.server_url, caps)
            .await
            .map_err(|e| SweepError::Browser(format!("could not start session: {}", e)))?;

        if let Err(e) = driver.set_page_load_timeout(self.page_load_timeout).await {
            warn!("Could not set page load timeout: {}", e);
        }

        debug!("Chrome session started");
        self.pacing.pause(self.pacing.action).await;
        Ok(WebDriverBrowser::new(driver))
    }

    async fn close(&self, session: WebDriverBrowser) {
        info!("Closing Chrome");
        self.pacing.pause(self.pacing.action).await;
        match session.into_inner().quit().await {
            Ok(()) => debug!("Chrome closed"),
            Err(e) => warn!("Failed to close Chrome cleanly: {}", e),
        }
    }
}
