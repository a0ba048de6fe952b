// Run report generation

use crate::pipeline::RunSummary;
use mapsweep_scanner::extract::parse_reviews_blob;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_secs: i64,
    pub terms_processed: usize,
    pub terms_failed: usize,
    pub failures: Vec<FailureData>,
    pub records_collected: usize,
    pub rows_written: usize,
    pub records_with_website: usize,
    pub records_with_email: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureData {
    pub country: String,
    pub city: String,
    pub business_type: String,
    pub error: String,
}

pub fn gather_report_data(summary: &RunSummary) -> ReportData {
    let ratings: Vec<f64> = summary
        .records
        .iter()
        .filter_map(|r| parse_reviews_blob(&r.reviews).1.parse::<f64>().ok())
        .collect();
    let mean_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    ReportData {
        run_id: summary.run_id.clone(),
        started_at: summary.started_at.to_rfc3339(),
        finished_at: summary.finished_at.to_rfc3339(),
        duration_secs: summary.duration().num_seconds(),
        terms_processed: summary.terms,
        terms_failed: summary.failures.len(),
        failures: summary
            .failures
            .iter()
            .map(|f| FailureData {
                country: f.term.country.clone(),
                city: f.term.city.clone(),
                business_type: f.term.business_type.clone(),
                error: f.error.clone(),
            })
            .collect(),
        records_collected: summary.records.len(),
        rows_written: summary.rows_written,
        records_with_website: summary
            .records
            .iter()
            .filter(|r| !r.website.is_empty())
            .count(),
        records_with_email: summary
            .records
            .iter()
            .filter(|r| !r.email.is_empty())
            .count(),
        mean_rating,
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                           MAPSWEEP RUN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", data.run_id));
    report.push_str(&format!("Started:      {}\n", data.started_at));
    report.push_str(&format!("Duration:     {} seconds\n", data.duration_secs));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!(
        "Search terms:      {} processed, {} failed\n",
        data.terms_processed, data.terms_failed
    ));
    report.push_str(&format!("Records:           {}\n", data.records_collected));
    report.push_str(&format!("New rows written:  {}\n", data.rows_written));
    report.push_str(&format!("With website:      {}\n", data.records_with_website));
    report.push_str(&format!("With email:        {}\n", data.records_with_email));
    if let Some(rating) = data.mean_rating {
        report.push_str(&format!("Mean rating:       {:.2}\n", rating));
    }
    report.push('\n');

    if !data.failures.is_empty() {
        report.push_str(RULE);
        report.push_str("FAILED SEARCHES\n");
        report.push_str(RULE);
        report.push('\n');

        for (idx, failure) in data.failures.iter().enumerate() {
            report.push_str(&format!(
                "[{}] {} / {} / {}\n",
                idx + 1,
                failure.country,
                failure.city,
                failure.business_type
            ));
            report.push_str(&format!("    {}\n", failure.error));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                              End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

pub fn generate_run_report(
    summary: &RunSummary,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    let data = gather_report_data(summary);
    match format {
        ReportFormat::Text => Ok(generate_text_report(&data)),
        ReportFormat::Json => generate_json_report(&data),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
