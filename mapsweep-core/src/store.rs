use crate::sheets::SheetClient;
use mapsweep_scanner::error::{Result, SweepError};
use mapsweep_scanner::record::{BusinessRecord, OUTPUT_HEADER, SearchTerm, dedup_key};
use mapsweep_scanner::retry::RetryPolicy;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// Rows per append request.
pub const APPEND_CHUNK_SIZE: usize = 500;

/// A tab inside a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub spreadsheet_id: String,
    pub tab: String,
}

impl SheetRef {
    pub fn new(spreadsheet_id: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            tab: tab.into(),
        }
    }

    fn range(&self, a1: &str) -> String {
        format!("{}!{}", self.tab, a1)
    }
}

/// Header names of the three search-term columns in the input sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumns {
    pub country: String,
    pub city: String,
    pub business_type: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            country: "country_name".to_string(),
            city: "city_name".to_string(),
            business_type: "business_type".to_string(),
        }
    }
}

/// Reads search terms from the input sheet and appends deduplicated
/// records to the output sheet.
pub struct RowStore<C: SheetClient> {
    client: C,
    input: SheetRef,
    output: SheetRef,
    columns: InputColumns,
    retry: RetryPolicy,
}

impl<C: SheetClient> RowStore<C> {
    pub fn new(client: C, input: SheetRef, output: SheetRef) -> Self {
        Self {
            client,
            input,
            output,
            columns: InputColumns::default(),
            retry: RetryPolicy::remote_default(),
        }
    }

    pub fn with_columns(mut self, columns: InputColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn fetch_search_terms(&self) -> Result<Vec<SearchTerm>> {
        let rows = self.read(&self.input, &self.input.range("A:Z")).await;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };

        let positions: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim(), idx))
            .collect();

        let required = [
            &self.columns.country,
            &self.columns.city,
            &self.columns.business_type,
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !positions.contains_key(name.as_str()))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SweepError::MissingColumn(missing));
        }

        let cell = |row: &Vec<String>, column: &String| -> String {
            row.get(positions[column.as_str()])
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let terms: Vec<SearchTerm> = data
            .iter()
            .filter(|row| row.iter().any(|v| !v.trim().is_empty()))
            .map(|row| {
                SearchTerm::new(
                    cell(row, &self.columns.country),
                    cell(row, &self.columns.city),
                    cell(row, &self.columns.business_type),
                )
            })
            .collect();

        info!("Read {} search term(s) from {}", terms.len(), self.input.tab);
        Ok(terms)
    }

    /// Make row 1 of the output tab equal [`OUTPUT_HEADER`].
    pub async fn ensure_output_header(&self) {
        let range = self.output.range("1:1");
        let first = self.read(&self.output, &range).await;
        let matches = first
            .first()
            .is_some_and(|row| row.iter().map(String::as_str).eq(OUTPUT_HEADER));
        if matches {
            debug!("Output header already in place");
            return;
        }

        info!("Writing header row to {}", self.output.tab);
        let header: Vec<Vec<String>> = vec![OUTPUT_HEADER.iter().map(|c| c.to_string()).collect()];
        let outcome = self
            .retry
            .run(
                || self.client.update_values(&self.output.spreadsheet_id, &range, &header),
                SweepError::is_retryable_remote,
            )
            .await;
        if let Err(e) = outcome {
            error!("Could not write output header: {}", e);
        }
    }

    /// Append records whose dedup key is not yet in the output tab.
    /// Returns the number of rows actually written.
    pub async fn append_results(&self, records: &[BusinessRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }

        self.ensure_output_header().await;

        let existing = self.read(&self.output, &self.output.range("A:Z")).await;
        let name_idx = column_index("name");
        let phone_idx = column_index("phone");
        let mut keys: HashSet<(String, String)> = existing
            .iter()
            .skip(1)
            .filter(|row| row.len() > phone_idx)
            .map(|row| dedup_key(&row[name_idx], &row[phone_idx]))
            .collect();

        let unique: Vec<Vec<String>> = records
            .iter()
            .filter(|record| keys.insert(record.dedup_key()))
            .map(BusinessRecord::to_row)
            .collect();

        if unique.is_empty() {
            info!("All {} record(s) already present", records.len());
            return 0;
        }
        debug!(
            "{} new of {} record(s), {} duplicate(s) dropped",
            unique.len(),
            records.len(),
            records.len() - unique.len()
        );

        let mut written = 0;
        for chunk in unique.chunks(APPEND_CHUNK_SIZE) {
            let outcome = self
                .retry
                .run(
                    || {
                        self.client
                            .append_values(&self.output.spreadsheet_id, &self.output.tab, chunk)
                    },
                    SweepError::is_retryable_remote,
                )
                .await;
            match outcome {
                Ok(()) => written += chunk.len(),
                Err(e) => error!("Dropped a batch of {} row(s): {}", chunk.len(), e),
            }
        }

        written
    }

    // Failed reads degrade to no rows.
    async fn read(&self, sheet: &SheetRef, range: &str) -> Vec<Vec<String>> {
        let outcome = self
            .retry
            .run(
                || self.client.get_values(&sheet.spreadsheet_id, range),
                |e| {
                    let retry = e.is_retryable_remote();
                    if retry {
                        warn!("Sheets API error ({}), retrying", e);
                    }
                    retry
                },
            )
            .await;
        outcome.unwrap_or_else(|e| {
            error!("Gave up reading {}: {}", range, e);
            Vec::new()
        })
    }
}

fn column_index(name: &str) -> usize {
    OUTPUT_HEADER
        .iter()
        .position(|c| *c == name)
        .unwrap_or_default()
}
