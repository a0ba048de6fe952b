//! Best-effort parsers for emails, phone numbers and review blobs.
//!
//! All functions are total: no match yields an empty string.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

// +1 555-123-4567, (555) 123-4567, 555.123.4567
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?:\+?\d{1,3}[\s.-]?)?       # country code
        (?:\(?\d{2,4}\)?[\s.-]?)?    # area code
        \d{2,4}                      # trunk
        (?:[\s./-]?\d{2,4}){1,3}     # remaining groups
        ",
    )
    .unwrap()
});

static REVIEWS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d[\d,]*)\s+reviews?").unwrap());
static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d(?:\.\d)?)\s+stars?").unwrap());
// "4.3 (178 reviews)"
static LEADING_RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d(?:\.\d)?)\s*\(").unwrap());

/// First email address in `text`, or an empty string.
pub fn find_first_email(text: &str) -> String {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// First phone-number-like run in `text`, or an empty string.
///
/// This is a heuristic: partial numbers and postcodes can match.
pub fn find_first_phone(text: &str) -> String {
    PHONE_RE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Split a combined review blob into `(reviews_count, rating)`.
pub fn parse_reviews_blob(blob: &str) -> (String, String) {
    let reviews = REVIEWS_RE
        .captures(blob)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_default();

    let rating = RATING_RE
        .captures(blob)
        .or_else(|| LEADING_RATING_RE.captures(blob))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    (reviews, rating)
}
