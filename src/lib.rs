pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod scraper;
pub mod store;
pub mod summarizer;

use std::sync::Arc;

use crate::chat::ChatRelay;
use crate::config::Config;
use crate::error::Result;
use crate::jobs::JobTracker;
use crate::llm::{ChatCompletion, OpenRouterClient};
use crate::pdf::{PdfExtractBackend, PdfTextExtractor};
use crate::pipeline::Pipeline;
use crate::scraper::{Fetcher, FullReportLinks, HttpFetcher, SiteProfile};
use crate::store::{ConversationStore, ReportStore};
use crate::summarizer::Summarizer;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reports: ReportStore,
    pub conversations: ConversationStore,
    pub jobs: JobTracker,
    pub pipeline: Arc<Pipeline>,
    pub chat: Arc<ChatRelay>,
}

impl AppState {
    /// Wire the real HTTP, PDF and LLM backends.
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let llm = OpenRouterClient::new(
            client,
            config.openrouter_api_key.clone(),
            config.llm_api_url.clone(),
            config.llm_model.clone(),
        )
        .with_site_url(config.source_base_url.clone());

        let fetcher = HttpFetcher::new(config.http_timeout)?;
        Self::with_backends(config, Arc::new(fetcher), Arc::new(PdfExtractBackend), Arc::new(llm))
    }

    /// Build the state around the given collaborators.
    pub fn with_backends(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        pdf: Arc<dyn PdfTextExtractor>,
        llm: Arc<dyn ChatCompletion>,
    ) -> Result<Self> {
        let site = SiteProfile::new(&config.source_base_url, &config.source_listing_url)?;
        let reports = ReportStore::new();
        let conversations = ConversationStore::new(config.max_sessions, config.max_session_messages);

        let pipeline = Pipeline::new(
            fetcher,
            pdf,
            Arc::new(FullReportLinks),
            Summarizer::new(Arc::clone(&llm), config.summary_char_budget),
            site,
            reports.clone(),
            config.max_pdf_pages,
        );
        let chat = ChatRelay::new(llm, conversations.clone(), reports.clone());

        Ok(AppState {
            config: Arc::new(config),
            reports,
            conversations,
            jobs: JobTracker::new(),
            pipeline: Arc::new(pipeline),
            chat: Arc::new(chat),
        })
    }
}
