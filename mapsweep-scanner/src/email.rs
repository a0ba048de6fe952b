use crate::error::{Result, SweepError};
use crate::extract::find_first_email;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Looks up a contact email on a business website.
#[async_trait]
pub trait EmailLookup: Send + Sync {
    /// Best effort: any failure yields an empty string.
    async fn find_email(&self, website: &str) -> String;
}

/// Fetches the landing page over HTTP and scans its visible text.
pub struct HttpEmailLookup {
    client: Client,
}

impl HttpEmailLookup {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_text(&self, website: &str) -> Result<String> {
        let url = normalize_website(website)?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(visible_text(&body))
    }
}

#[async_trait]
impl EmailLookup for HttpEmailLookup {
    async fn find_email(&self, website: &str) -> String {
        match self.fetch_text(website).await {
            Ok(text) => find_first_email(&text),
            Err(e) => {
                debug!("Email lookup failed for {}: {}", website, e);
                String::new()
            }
        }
    }
}

/// Accepts bare hosts such as `example.com` by assuming plain http.
pub fn normalize_website(website: &str) -> Result<url::Url> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return Err(SweepError::InvalidUrl(website.to_string()));
    }
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    url::Url::parse(&candidate).map_err(|e| SweepError::InvalidUrl(format!("{}: {}", website, e)))
}

// Text nodes outside script/style, joined by spaces.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let skip = ["script", "style", "noscript"];
    let body = Selector::parse("body").ok();

    let root = body
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?;
            let parent_name = parent.value().as_element().map(|e| e.name());
            if parent_name.is_some_and(|name| skip.contains(&name)) {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup() -> HttpEmailLookup {
        HttpEmailLookup::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_normalize_website() {
        assert_eq!(
            normalize_website("example.com").unwrap().as_str(),
            "http://example.com/"
        );
        assert_eq!(
            normalize_website(" https://shop.example.com/about ").unwrap().as_str(),
            "https://shop.example.com/about"
        );
        assert!(normalize_website("").is_err());
        assert!(normalize_website("   ").is_err());
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let html = r#"<html><head><style>a{}</style></head><body>
            <p>Hello</p><script>var e = "hidden@example.com";</script><span>World</span>
            </body></html>"#;
        let text = visible_text(html);
        assert_eq!(text, "Hello World");
    }

    #[tokio::test]
    async fn test_finds_email_on_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><footer>Contact: info@joes.example</footer></body></html>",
            ))
            .mount(&server)
            .await;

        assert_eq!(lookup().find_email(&server.uri()).await, "info@joes.example");
    }

    #[tokio::test]
    async fn test_bare_host_is_fetched_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<p>mail sales@bakery.example</p>"),
            )
            .mount(&server)
            .await;

        let bare = server.uri().trim_start_matches("http://").to_string();
        assert_eq!(lookup().find_email(&bare).await, "sales@bakery.example");
    }

    #[tokio::test]
    async fn test_error_status_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nobody@example.com"))
            .mount(&server)
            .await;

        assert_eq!(lookup().find_email(&server.uri()).await, "");
    }

    #[tokio::test]
    async fn test_page_without_email_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Open daily</p>"))
            .mount(&server)
            .await;

        assert_eq!(lookup().find_email(&server.uri()).await, "");
    }

    #[tokio::test]
    async fn test_unreachable_site_yields_empty() {
        assert_eq!(lookup().find_email("http://127.0.0.1:1").await, "");
        assert_eq!(lookup().find_email("not a url at all").await, "");
    }
}
