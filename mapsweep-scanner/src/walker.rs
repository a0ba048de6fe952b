use crate::browser::{Browser, Locator, SelectorTable};
use crate::email::EmailLookup;
use crate::error::{Result, SweepError};
use crate::extract::find_first_phone;
use crate::pacing::Pacing;
use crate::record::{BusinessRecord, SearchTerm};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs one search and returns the records it found.
#[async_trait]
pub trait SearchScraper<B: Browser>: Send + Sync {
    /// `max_results` of `None` or `Some(0)` means no cap.
    async fn scrape(
        &self,
        browser: &B,
        term: &SearchTerm,
        max_results: Option<usize>,
    ) -> Result<Vec<BusinessRecord>>;
}

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub selectors: SelectorTable,
    /// Applied to every detail-panel lookup.
    pub dom_retry: RetryPolicy,
    pub pacing: Pacing,
    pub consent_timeout: Duration,
    pub element_timeout: Duration,
    pub maps_base_url: String,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorTable::default(),
            dom_retry: RetryPolicy::dom_default(),
            pacing: Pacing::default(),
            consent_timeout: Duration::from_secs(5),
            element_timeout: Duration::from_secs(15),
            maps_base_url: "https://www.google.com".to_string(),
        }
    }
}

/// Walks the infinite-scroll result list of a map search, opening each
/// card and reading its detail panel.
pub struct Walker<E: EmailLookup> {
    config: WalkerConfig,
    email: E,
}

impl<E: EmailLookup> Walker<E> {
    pub fn new(config: WalkerConfig, email: E) -> Self {
        Self { config, email }
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// `<base>/maps/place/<city country>?hl=en&gl=us`, query part form-encoded.
    pub fn search_url(&self, term: &SearchTerm) -> String {
        let place: String = url::form_urlencoded::byte_serialize(
            format!("{} {}", term.city, term.country).as_bytes(),
        )
        .collect();
        format!(
            "{}/maps/place/{}?hl=en&gl=us",
            self.config.maps_base_url.trim_end_matches('/'),
            place
        )
    }

    pub async fn scrape_search<B: Browser>(
        &self,
        browser: &B,
        term: &SearchTerm,
        max_results: Option<usize>,
    ) -> Result<Vec<BusinessRecord>> {
        let cap = max_results.filter(|&n| n > 0);
        let sel = &self.config.selectors;
        let pacing = &self.config.pacing;

        info!("Searching {}", term);
        browser.goto(&self.search_url(term)).await?;
        self.dismiss_consent(browser).await;
        self.submit_query(browser, &term.business_type).await?;

        let mut panel = browser
            .wait_for(&sel.results_panel, self.config.element_timeout)
            .await?;
        let mut records: Vec<BusinessRecord> = Vec::new();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut idx = 0;

        loop {
            let cards = self.list_cards(browser, &mut panel).await?;

            if idx >= cards.len() {
                let before = cards.len();
                if let Err(e) = browser.scroll_to_bottom(&panel).await {
                    if !e.is_transient_dom() {
                        return Err(e);
                    }
                    debug!("Scroll failed: {}", e);
                }
                pacing.pause(pacing.action).await;
                let after = self.list_cards(browser, &mut panel).await?.len();
                // A reflow can shrink the list; no growth means exhausted.
                if after <= before {
                    debug!("Result list exhausted after {} cards", before);
                    break;
                }
                debug!("Loaded {} more cards", after - before);
                continue;
            }

            let card = cards[idx].clone();
            idx += 1;

            let title = match self.card_title(browser, &card).await {
                Ok(title) => title,
                Err(e) if e.is_transient_dom() => {
                    debug!("Card {} has no title: {}", idx, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if title.is_empty()
                || title.eq_ignore_ascii_case("results")
                || !seen_titles.insert(title.clone())
            {
                continue;
            }

            match self.open_card(browser, &card).await {
                Ok(()) => {}
                Err(e) if e.is_transient_dom() => {
                    warn!("Skipping '{}': {}", title, e);
                    continue;
                }
                Err(e) => return Err(e),
            }
            pacing.pause(pacing.detail_settle).await;

            let record = self.read_detail(browser, term, title).await?;
            debug!("Collected '{}' ({})", record.name, record.maps_url);
            records.push(record);
            pacing.pause(pacing.after_record).await;

            if browser.click(&panel).await.is_err() {
                panel = browser
                    .wait_for(&sel.results_panel, self.config.element_timeout)
                    .await?;
            }

            if cap.is_some_and(|max| records.len() >= max) {
                debug!("Reached the cap of {} results", records.len());
                break;
            }
        }

        info!("{} result(s) for {}", records.len(), term);
        Ok(records)
    }

    async fn dismiss_consent<B: Browser>(&self, browser: &B) {
        let sel = &self.config.selectors;
        match browser
            .wait_for_clickable(&sel.consent_button, self.config.consent_timeout)
            .await
        {
            Ok(button) => match browser.click(&button).await {
                Ok(()) => {
                    debug!("Accepted cookie consent");
                    self.config.pacing.pause(self.config.pacing.action).await;
                }
                Err(e) => debug!("Consent click failed: {}", e),
            },
            Err(_) => debug!("No consent dialog"),
        }
    }

    async fn submit_query<B: Browser>(&self, browser: &B, query: &str) -> Result<()> {
        let pacing = &self.config.pacing;
        let search_box = browser
            .wait_for(&self.config.selectors.search_box, self.config.element_timeout)
            .await?;
        browser.clear(&search_box).await?;

        let mut buf = [0u8; 4];
        for ch in query.chars() {
            browser.type_text(&search_box, ch.encode_utf8(&mut buf)).await?;
            pacing.pause(pacing.keystroke).await;
        }

        browser.press_enter(&search_box).await?;
        pacing.pause(pacing.after_submit).await;
        Ok(())
    }

    // A stale panel is re-acquired once.
    async fn list_cards<B: Browser>(
        &self,
        browser: &B,
        panel: &mut B::Element,
    ) -> Result<Vec<B::Element>> {
        let sel = &self.config.selectors;
        match browser.find_all_within(panel, &sel.result_card).await {
            Ok(cards) => Ok(cards),
            Err(e) if e.is_transient_dom() => {
                debug!("Results panel lost ({}), re-acquiring", e);
                *panel = browser
                    .wait_for(&sel.results_panel, self.config.element_timeout)
                    .await?;
                browser.find_all_within(panel, &sel.result_card).await
            }
            Err(e) => Err(e),
        }
    }

    async fn card_title<B: Browser>(&self, browser: &B, card: &B::Element) -> Result<String> {
        let title = browser
            .find_within(card, &self.config.selectors.card_title)
            .await?;
        Ok(browser.text(&title).await?.trim().to_string())
    }

    async fn open_card<B: Browser>(&self, browser: &B, card: &B::Element) -> Result<()> {
        browser.scroll_into_view(card).await?;
        self.config.pacing.pause(self.config.pacing.scroll_settle).await;
        browser.click(card).await
    }

    async fn read_detail<B: Browser>(
        &self,
        browser: &B,
        term: &SearchTerm,
        name: String,
    ) -> Result<BusinessRecord> {
        let sel = &self.config.selectors;

        let address = self.prefixed_label(browser, &sel.address_aria_prefix).await?;
        let raw_phone = self.prefixed_label(browser, &sel.phone_aria_prefix).await?;
        let website = self.prefixed_label(browser, &sel.website_aria_prefix).await?;
        let reviews = self.review_summary(browser).await?;

        let phone = match find_first_phone(&raw_phone) {
            cleaned if cleaned.is_empty() => raw_phone,
            cleaned => cleaned,
        };

        let email = if website.is_empty() {
            String::new()
        } else {
            self.email.find_email(&website).await
        };

        let mut record = BusinessRecord::for_term(term, name);
        record.email = email;
        record.website = website;
        record.phone = phone;
        record.reviews = reviews;
        record.address = address;
        record.maps_url = browser.current_url().await?;
        Ok(record)
    }

    /// aria-label starting with `prefix`, prefix stripped. Empty when the
    /// label never shows up.
    async fn prefixed_label<B: Browser>(&self, browser: &B, prefix: &str) -> Result<String> {
        let locator = SelectorTable::aria_prefix(prefix);
        let locator = &locator;
        let outcome = self
            .config
            .dom_retry
            .run(|| aria_label(browser, locator), SweepError::is_transient_dom)
            .await;

        let label = give_up_empty(outcome, locator)?;
        let stripped = label.trim_start().strip_prefix(prefix).unwrap_or(label.as_str());
        Ok(stripped.trim().to_string())
    }

    /// `"<reviews label> <rating label>"`; both labels must be present.
    async fn review_summary<B: Browser>(&self, browser: &B) -> Result<String> {
        let sel = &self.config.selectors;
        let reviews = SelectorTable::aria_suffix(&sel.reviews_aria_suffix);
        let rating = SelectorTable::aria_suffix(&sel.rating_aria_suffix);
        let (reviews, rating) = (&reviews, &rating);

        let outcome = self
            .config
            .dom_retry
            .run(
                || async move {
                    let rating = aria_label(browser, rating).await?;
                    let reviews = aria_label(browser, reviews).await?;
                    Ok::<_, SweepError>(format!("{} {}", reviews, rating))
                },
                SweepError::is_transient_dom,
            )
            .await;

        give_up_empty(outcome, reviews)
    }
}

#[async_trait]
impl<B: Browser, E: EmailLookup> SearchScraper<B> for Walker<E> {
    async fn scrape(
        &self,
        browser: &B,
        term: &SearchTerm,
        max_results: Option<usize>,
    ) -> Result<Vec<BusinessRecord>> {
        self.scrape_search(browser, term, max_results).await
    }
}

async fn aria_label<B: Browser>(browser: &B, locator: &Locator) -> Result<String> {
    let element = browser.find(locator).await?;
    Ok(browser
        .attribute(&element, "aria-label")
        .await?
        .unwrap_or_default())
}

fn give_up_empty(outcome: Result<String>, locator: &Locator) -> Result<String> {
    match outcome {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient_dom() => {
            debug!("Giving up on {}: {}", locator, e);
            Ok(String::new())
        }
        Err(e) => Err(e),
    }
}
