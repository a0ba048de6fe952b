use serde::{Deserialize, Serialize};

/// Column order of the output sheet. Row 1 of the sink must equal this list.
pub const OUTPUT_HEADER: [&str; 10] = [
    "country",
    "city",
    "business_type",
    "name",
    "email",
    "website",
    "phone",
    "reviews",
    "address",
    "maps_url",
];

/// One (country, city, business_type) triple read from the input sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub country: String,
    pub city: String,
    pub business_type: String,
}

impl SearchTerm {
    pub fn new(
        country: impl Into<String>,
        city: impl Into<String>,
        business_type: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
            business_type: business_type.into(),
        }
    }
}

impl std::fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.country, self.city, self.business_type)
    }
}

/// A single business scraped from the result list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub country: String,
    pub city: String,
    pub business_type: String,
    pub name: String,
    pub email: String,
    pub website: String,
    pub phone: String,
    /// Reviews label followed by the rating label, e.g. "178 reviews 4.3 stars".
    pub reviews: String,
    pub address: String,
    pub maps_url: String,
}

impl BusinessRecord {
    pub fn for_term(term: &SearchTerm, name: impl Into<String>) -> Self {
        Self {
            country: term.country.clone(),
            city: term.city.clone(),
            business_type: term.business_type.clone(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// `(name, phone)` normalized for duplicate detection.
    pub fn dedup_key(&self) -> (String, String) {
        dedup_key(&self.name, &self.phone)
    }

    /// Value of the named output column, empty for unknown columns.
    pub fn field(&self, column: &str) -> &str {
        match column {
            "country" => &self.country,
            "city" => &self.city,
            "business_type" => &self.business_type,
            "name" => &self.name,
            "email" => &self.email,
            "website" => &self.website,
            "phone" => &self.phone,
            "reviews" => &self.reviews,
            "address" => &self.address,
            "maps_url" => &self.maps_url,
            _ => "",
        }
    }

    /// Cells in [`OUTPUT_HEADER`] order.
    pub fn to_row(&self) -> Vec<String> {
        OUTPUT_HEADER
            .iter()
            .map(|column| self.field(column).to_string())
            .collect()
    }
}

pub fn dedup_key(name: &str, phone: &str) -> (String, String) {
    (name.trim().to_lowercase(), phone.trim().to_string())
}
