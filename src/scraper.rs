use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Report;

const USER_AGENT: &str = concat!("report-digest/", env!("CARGO_PKG_VERSION"));

/// Network access used by the Lister, the Report extractor and the PDF download.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        Ok(html)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Decides which links on a detail page point at the authoritative PDF.
pub trait PdfLinkPredicate: Send + Sync {
    fn accepts(&self, url: &str) -> bool;
}

/// Keeps `.pdf` links whose URL mentions "fullreport", skipping fact sheets and annexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullReportLinks;

impl PdfLinkPredicate for FullReportLinks {
    fn accepts(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        lower.ends_with(".pdf") && lower.contains("fullreport")
    }
}

static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.report-card").expect("Failed to parse card selector")
});

static CARD_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a").expect("Failed to parse card link selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1").expect("Failed to parse title selector")
});

static DATE_META_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="publication_date"], meta[property="article:published_time"]"#)
        .expect("Failed to parse date meta selector")
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to parse anchor selector")
});

/// The fixed source site: where the listing lives and how relative links resolve.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub base_url: Url,
    pub listing_url: String,
}

impl SiteProfile {
    pub fn new(base_url: &str, listing_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid source base URL: {}", e)))?;
        Ok(SiteProfile {
            base_url,
            listing_url: listing_url.to_string(),
        })
    }
}

/// Pull report detail-page URLs out of the listing page, in page order.
pub fn parse_listing(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(&CARD_SELECTOR)
        .filter_map(|card| {
            let href = card
                .select(&CARD_LINK_SELECTOR)
                .find_map(|anchor| anchor.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty());
            match href {
                Some(href) => base_url.join(href).ok().map(String::from),
                None => {
                    debug!("Skipping report card without a link");
                    None
                }
            }
        })
        .collect()
}

/// Fields parsed from a report detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPage {
    pub title: String,
    pub date: String,
    pub pdf_links: Vec<String>,
}

/// Parse a detail page. `None` when the title is missing.
pub fn parse_report_page(
    html: &str,
    page_url: &Url,
    today: NaiveDate,
    pdf_links: &dyn PdfLinkPredicate,
) -> Option<ReportPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty())?;

    let date = document
        .select(&DATE_META_SELECTOR)
        .find_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    let mut links: Vec<String> = Vec::new();
    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = page_url.join(href.trim()) else {
            continue;
        };
        let resolved = String::from(resolved);
        if pdf_links.accepts(&resolved) && !links.contains(&resolved) {
            links.push(resolved);
        }
    }

    Some(ReportPage {
        title,
        date,
        pdf_links: links,
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lister: fetch the listing page and return report URLs. Failures give an empty list.
pub async fn list_report_urls(fetcher: &dyn Fetcher, site: &SiteProfile) -> Vec<String> {
    let html = match fetcher.fetch_html(&site.listing_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %site.listing_url, error = %e, "Failed to fetch report listing");
            return Vec::new();
        }
    };

    let urls = parse_listing(&html, &site.base_url);
    debug!(count = urls.len(), "Parsed report listing");
    urls
}

/// Report extractor: fetch one detail page. `None` means skip this URL.
pub async fn extract_report(
    fetcher: &dyn Fetcher,
    url: &str,
    pdf_links: &dyn PdfLinkPredicate,
) -> Option<Report> {
    let page_url = match Url::parse(url) {
        Ok(page_url) => page_url,
        Err(e) => {
            warn!(url = %url, error = %e, "Invalid report URL");
            return None;
        }
    };

    let html = match fetcher.fetch_html(url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to fetch report page");
            return None;
        }
    };

    let today = Utc::now().date_naive();
    match parse_report_page(&html, &page_url, today, pdf_links) {
        Some(page) => Some(Report::new(page.title, page.date, url.to_string(), page.pdf_links)),
        None => {
            warn!(url = %url, "Report page has no title, skipping");
            None
        }
    }
}
