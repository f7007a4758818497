//! Scrape orchestration: list, extract, download, summarize.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::jobs::{JobTracker, ScrapeJob, ScrapeOutcome};
use crate::models::Report;
use crate::pdf::{self, PdfTextExtractor};
use crate::scraper::{self, Fetcher, PdfLinkPredicate, SiteProfile};
use crate::store::ReportStore;
use crate::summarizer::Summarizer;

pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    pdf: Arc<dyn PdfTextExtractor>,
    pdf_links: Arc<dyn PdfLinkPredicate>,
    summarizer: Summarizer,
    site: SiteProfile,
    reports: ReportStore,
    max_pdf_pages: usize,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        pdf: Arc<dyn PdfTextExtractor>,
        pdf_links: Arc<dyn PdfLinkPredicate>,
        summarizer: Summarizer,
        site: SiteProfile,
        reports: ReportStore,
        max_pdf_pages: usize,
    ) -> Self {
        Pipeline {
            fetcher,
            pdf,
            pdf_links,
            summarizer,
            site,
            reports,
            max_pdf_pages,
        }
    }

    /// List once, then process the first `limit` reports concurrently.
    pub async fn run_scrape(&self, limit: usize) -> ScrapeOutcome {
        let start_time = Instant::now();
        let urls = scraper::list_report_urls(self.fetcher.as_ref(), &self.site).await;
        let discovered = urls.len();
        info!(discovered, limit, "Starting scrape");

        let outcomes = join_all(urls.iter().take(limit).map(|url| self.process_report(url))).await;
        let succeeded = outcomes.into_iter().flatten().count();

        info!(discovered, succeeded, elapsed = ?start_time.elapsed(), "Scrape finished");
        ScrapeOutcome {
            discovered,
            succeeded,
        }
    }

    /// One report, stages strictly in order. `None` when the detail page was unusable.
    pub async fn process_report(&self, url: &str) -> Option<Report> {
        let report = scraper::extract_report(self.fetcher.as_ref(), url, self.pdf_links.as_ref()).await?;
        let id = report.id.clone();
        self.reports.upsert(report.clone());
        info!(report_id = %id, title = %report.title, "Stored report");

        let Some(pdf_url) = report.pdf_links.first() else {
            warn!(report_id = %id, url = %url, "No full-report PDF link found");
            return Some(report);
        };

        let bytes = match self.fetcher.fetch_bytes(pdf_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(report_id = %id, pdf_url = %pdf_url, error = %e, "Failed to download PDF");
                return Some(report);
            }
        };

        let text = self.extract_text(bytes).await;
        let summary = self.summarizer.summarize(&report.title, &text).await;
        self.reports.attach_summary(&id, summary);
        info!(report_id = %id, "Summary attached");

        self.reports.get(&id).map(|stored| stored.report)
    }

    async fn extract_text(&self, bytes: Vec<u8>) -> String {
        let extractor = Arc::clone(&self.pdf);
        let max_pages = self.max_pdf_pages;
        match tokio::task::spawn_blocking(move || pdf::extract_text(extractor.as_ref(), &bytes, max_pages)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "PDF extraction task aborted");
                String::new()
            }
        }
    }

    /// Register a job and run the scrape in the background. Returns immediately.
    pub fn spawn_scrape(self: &Arc<Self>, jobs: &JobTracker, limit: usize) -> ScrapeJob {
        let job = jobs.create(limit);
        let job_id = job.id.clone();
        let pipeline = Arc::clone(self);
        let jobs = jobs.clone();

        tokio::spawn(async move {
            jobs.mark_running(&job_id);
            let run = tokio::spawn(async move { pipeline.run_scrape(limit).await });
            match run.await {
                Ok(outcome) => jobs.mark_done(&job_id, outcome),
                Err(e) => {
                    let err = AppError::Internal(format!("scrape task aborted: {}", e));
                    error!(job_id = %job_id, error = %err, "Scrape task failed");
                    jobs.mark_failed(&job_id, err.public_message());
                }
            }
        });

        job
    }
}
