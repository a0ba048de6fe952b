use crate::sheets::SheetClient;
use crate::store::RowStore;
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use mapsweep_scanner::browser::{Browser, SessionLauncher};
use mapsweep_scanner::error::Result;
use mapsweep_scanner::pacing::Pacing;
use mapsweep_scanner::record::{BusinessRecord, SearchTerm};
use mapsweep_scanner::walker::SearchScraper;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Options for a pipeline run
pub struct PipelineOptions {
    /// Per-search cap; `None` or `Some(0)` means unbounded.
    pub max_results: Option<usize>,
    pub show_progress: bool,
    pub pacing: Pacing,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_results: None,
            show_progress: false,
            pacing: Pacing::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ReadingTerms,
    NoTerms,
    PerTermLoop,
    Finalizing,
}

/// A search term whose scrape failed.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFailure {
    pub term: SearchTerm,
    pub error: String,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub terms: usize,
    pub failures: Vec<TermFailure>,
    pub records: Vec<BusinessRecord>,
    pub rows_written: usize,
}

impl RunSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn terms_succeeded(&self) -> usize {
        self.terms.saturating_sub(self.failures.len())
    }
}

struct StateTracker(PipelineState);

impl StateTracker {
    fn enter(&mut self, next: PipelineState) {
        debug!("Pipeline state: {:?} -> {:?}", self.0, next);
        self.0 = next;
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Starting...");
    pb
}

/// Read search terms, scrape each one in a single shared browser session,
/// then write the deduplicated results back.
///
/// Per-term failures are recorded in the summary and do not stop the run.
/// A missing input column or a browser that cannot be launched is fatal.
pub async fn run_pipeline<C, L, S>(
    store: &RowStore<C>,
    launcher: &L,
    scraper: &S,
    options: &PipelineOptions,
) -> Result<RunSummary>
where
    C: SheetClient,
    L: SessionLauncher,
    L::Session: Browser,
    S: SearchScraper<L::Session>,
{
    let run_id = Uuid::new_v4().to_string();
    let started_at = Local::now();
    let mut state = StateTracker(PipelineState::Idle);
    info!("Run {} started", run_id);

    state.enter(PipelineState::ReadingTerms);
    let terms = store.fetch_search_terms().await?;

    if terms.is_empty() {
        state.enter(PipelineState::NoTerms);
        warn!("Nothing to do: input sheet is empty");
        state.enter(PipelineState::Idle);
        return Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Local::now(),
            terms: 0,
            failures: Vec::new(),
            records: Vec::new(),
            rows_written: 0,
        });
    }

    state.enter(PipelineState::PerTermLoop);
    let progress = options.show_progress.then(spinner);
    let mut session: Option<L::Session> = None;
    let mut records: Vec<BusinessRecord> = Vec::new();
    let mut failures: Vec<TermFailure> = Vec::new();

    for (idx, term) in terms.iter().enumerate() {
        if session.is_none() {
            match launcher.launch().await {
                Ok(launched) => session = Some(launched),
                Err(e) => {
                    error!("Could not launch the browser: {}", e);
                    if let Some(ref pb) = progress {
                        pb.abandon_with_message("Browser launch failed");
                    }
                    return Err(e);
                }
            }
        }
        let Some(browser) = session.as_ref() else {
            break;
        };

        if let Some(ref pb) = progress {
            pb.set_message(format!("[{}/{}] {}", idx + 1, terms.len(), term));
        }
        info!(
            "Searching {:<15} | {:<15} | {}",
            term.country, term.city, term.business_type
        );

        match scraper.scrape(browser, term, options.max_results).await {
            Ok(found) => {
                info!("  {} businesses scraped", found.len());
                records.extend(found);
            }
            Err(e) => {
                error!(
                    "Scrape failed for {} / {} / {}: {}",
                    term.country, term.city, term.business_type, e
                );
                failures.push(TermFailure {
                    term: term.clone(),
                    error: e.to_string(),
                });
            }
        }

        if idx + 1 < terms.len() {
            options.pacing.pause(options.pacing.between_terms).await;
        }
    }

    state.enter(PipelineState::Finalizing);
    if let Some(ref pb) = progress {
        pb.set_message("Writing results...");
    }

    let rows_written = if records.is_empty() {
        warn!("No data collected, nothing written to the output sheet");
        0
    } else {
        let added = store.append_results(&records).await;
        info!("{} new row(s) saved to the output sheet", added);
        added
    };

    if let Some(browser) = session.take() {
        launcher.close(browser).await;
    }

    if let Some(ref pb) = progress {
        pb.finish_with_message(format!(
            "Done! {} record(s), {} new row(s)",
            records.len(),
            rows_written
        ));
    }

    state.enter(PipelineState::Idle);
    Ok(RunSummary {
        run_id,
        started_at,
        finished_at: Local::now(),
        terms: terms.len(),
        failures,
        records,
        rows_written,
    })
}
