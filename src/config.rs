use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "deepseek/deepseek-chat-v3-0324";
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://www.ipcc.ch";
pub const DEFAULT_SOURCE_LISTING_URL: &str = "https://www.ipcc.ch/reports/";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Missing keys are tolerated here; every LLM call then degrades.
    pub openrouter_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub source_base_url: String,
    pub source_listing_url: String,
    pub scrape_limit: usize,
    pub max_pdf_pages: usize,
    pub summary_char_budget: usize,
    pub http_timeout: Duration,
    pub max_sessions: usize,
    pub max_session_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            openrouter_api_key: None,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            source_base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            source_listing_url: DEFAULT_SOURCE_LISTING_URL.to_string(),
            scrape_limit: 3,
            max_pdf_pages: 10,
            summary_char_budget: 5000,
            http_timeout: Duration::from_secs(60),
            max_sessions: 1000,
            max_session_messages: 100,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let openrouter_api_key = env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let server_addr = SocketAddr::new(ip, port);

        Ok(Config {
            server_addr,
            openrouter_api_key,
            llm_api_url: env::var("LLM_API_URL").unwrap_or(defaults.llm_api_url),
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            source_base_url: env::var("SOURCE_BASE_URL").unwrap_or(defaults.source_base_url),
            source_listing_url: env::var("SOURCE_LISTING_URL").unwrap_or(defaults.source_listing_url),
            scrape_limit: parse_var("SCRAPE_LIMIT", defaults.scrape_limit)?,
            max_pdf_pages: parse_var("MAX_PDF_PAGES", defaults.max_pdf_pages)?,
            summary_char_budget: parse_var("SUMMARY_CHAR_BUDGET", defaults.summary_char_budget)?,
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())?),
            max_sessions: parse_var("MAX_SESSIONS", defaults.max_sessions)?,
            max_session_messages: parse_var("MAX_SESSION_MESSAGES", defaults.max_session_messages)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
