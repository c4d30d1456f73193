use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::browser::{Browser, BrowserError};
use crate::config::ScrapeConfig;
use crate::parser::{
    BODY_CSS, TABLE_CSS, TABLE_OR_BANNER_CSS, has_element, has_not_found_banner,
    parse_portrait, parse_portrait_links,
};
use crate::types::{ResultSet, SubjectRecord};
use crate::utils::RunStats;

const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Browser error: {0}")]
    BrowserError(#[from] BrowserError),
    #[error("Page not found: {0}")]
    NotFound(String),
    #[error("Timed out after {waited:?} waiting for '{selector}' on {url}")]
    Timeout {
        url: String,
        selector: &'static str,
        waited: Duration,
    },
}

/// How a portrait page is judged loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Wait for the profile table only. Missing portraits run into the timeout.
    /// Used when following links discovered on the listing page.
    Table,
    /// Wait for the table or the error banner, and fail fast on "not found".
    /// Used for guessed, name-derived URLs.
    TableOrBanner,
}

impl WaitMode {
    fn selector(self) -> &'static str {
        match self {
            WaitMode::Table => TABLE_CSS,
            WaitMode::TableOrBanner => TABLE_OR_BANNER_CSS,
        }
    }
}

pub struct PortraitScraper {
    browser: Box<dyn Browser>,
    config: ScrapeConfig,
    stats: RunStats,
}

impl PortraitScraper {
    pub fn new(browser: Box<dyn Browser>, config: ScrapeConfig) -> Self {
        Self {
            browser,
            config,
            stats: RunStats::default(),
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Portrait hrefs found on the listing page after it stopped growing.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn discover_links(&mut self, listing_url: &str) -> Vec<String> {
        match self.fetch_links(listing_url).await {
            Ok(links) => links,
            Err(ScraperError::Timeout { .. }) => {
                log::error!("Timeout waiting for page to load");
                Vec::new()
            }
            Err(e) => {
                log::error!("Error discovering portrait links: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_links(&mut self, listing_url: &str) -> Result<Vec<String>, ScraperError> {
        log::info!("Navigating to {}", listing_url);
        self.browser.navigate(listing_url).await?;
        self.wait_for(listing_url, BODY_CSS, self.config.page_timeout)
            .await?;
        log::info!("Page loaded successfully");

        if self.browser.renders_scripts() {
            self.scroll_until_stable().await?;
        }

        let html = self.browser.page_source().await?;
        Ok(parse_portrait_links(
            &html,
            &self.config.link_filter,
            &self.config.sentinel_href,
        ))
    }

    /// Scrolls to the bottom until the height stops changing or the cap is hit.
    /// Returns the number of scrolls performed.
    async fn scroll_until_stable(&mut self) -> Result<u32, ScraperError> {
        let mut last_height = self.scroll_height().await?;

        for scroll in 1..=self.config.max_scrolls {
            self.browser.execute(SCROLL_TO_BOTTOM_SCRIPT).await?;
            sleep(self.config.scroll_pause).await;

            let new_height = self.scroll_height().await?;
            log::debug!("Scroll {}: height {} -> {}", scroll, last_height, new_height);
            if new_height == last_height {
                return Ok(scroll);
            }
            last_height = new_height;
        }

        log::warn!(
            "Page height still changing after {} scrolls, continuing with what is loaded",
            self.config.max_scrolls
        );
        Ok(self.config.max_scrolls)
    }

    async fn scroll_height(&mut self) -> Result<u64, ScraperError> {
        let value = self.browser.execute(SCROLL_HEIGHT_SCRIPT).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|f| f as u64))
            .ok_or_else(|| unexpected_height(&value))
    }

    /// Polls the page source until `selector` matches or `timeout` elapses.
    async fn wait_for(
        &mut self,
        url: &str,
        selector: &'static str,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        let started = Instant::now();
        loop {
            let html = self.browser.page_source().await?;
            if has_element(&html, selector) {
                return Ok(html);
            }
            if !self.browser.renders_scripts() || started.elapsed() >= timeout {
                return Err(ScraperError::Timeout {
                    url: url.to_string(),
                    selector,
                    waited: started.elapsed(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    pub async fn fetch_portrait(
        &mut self,
        url: &str,
        mode: WaitMode,
    ) -> Result<SubjectRecord, ScraperError> {
        log::info!("Scraping portrait: {}", url);
        self.browser.navigate(url).await?;

        let html = self
            .wait_for(url, mode.selector(), self.config.detail_timeout)
            .await?;
        log::debug!("Page source length: {}", html.len());

        if mode == WaitMode::TableOrBanner
            && has_not_found_banner(&html, &self.config.not_found_phrase)
        {
            return Err(ScraperError::NotFound(url.to_string()));
        }

        let record = parse_portrait(&html, &self.config.placeholder_name);
        log::info!("Successfully scraped data for {}", record.name());
        Ok(record)
    }

    /// [`PortraitScraper::fetch_portrait`] with every failure logged and mapped to `None`.
    pub async fn scrape_portrait(&mut self, url: &str, mode: WaitMode) -> Option<SubjectRecord> {
        match self.fetch_portrait(url, mode).await {
            Ok(record) => Some(record),
            Err(ScraperError::NotFound(url)) => {
                log::warn!("Page not found: {}", url);
                None
            }
            Err(ScraperError::Timeout { url, .. }) => {
                log::error!("Timeout waiting for portrait details on {}", url);
                self.log_page_excerpt().await;
                None
            }
            Err(e) => {
                log::error!("Error scraping portrait {}: {}", url, e);
                self.log_page_excerpt().await;
                None
            }
        }
    }

    async fn log_page_excerpt(&mut self) {
        if let Ok(html) = self.browser.page_source().await {
            let excerpt: String = html.chars().take(500).collect();
            log::debug!("Current page source: {}...", excerpt);
        }
    }

    /// Tries each URL in order and returns the first portrait that loads.
    pub async fn scrape_candidates(
        &mut self,
        urls: &[String],
        mode: WaitMode,
    ) -> Option<SubjectRecord> {
        for url in urls {
            if let Some(record) = self.scrape_portrait(url, mode).await {
                return Some(record);
            }
        }
        None
    }

    pub async fn scrape_name(&mut self, name: &str) -> Option<SubjectRecord> {
        let urls = self.config.name_candidates(name);
        if urls.is_empty() {
            log::warn!("Skipping empty name");
            return None;
        }
        self.scrape_candidates(&urls, WaitMode::TableOrBanner).await
    }

    /// Listing-driven run: discover links, then scrape each one in turn.
    pub async fn run_discovery(&mut self, limit: Option<usize>) -> ResultSet {
        let listing_url = self.config.listing_url();
        let mut links = self.discover_links(&listing_url).await;
        log::info!("Found {} portrait links", links.len());

        if links.is_empty() {
            log::warn!("No portrait links found. The website structure might have changed.");
            return ResultSet::new();
        }
        if let Some(limit) = limit {
            links.truncate(limit);
        }

        let mut results = ResultSet::new();
        for link in links {
            let url = self.config.resolve(&link);
            let record = self.scrape_portrait(&url, WaitMode::Table).await;
            self.stats.record(record.is_some());
            if let Some(record) = record {
                results.push(record);
            }
            sleep(self.config.request_delay).await;
        }
        results
    }

    /// Name-list run: derive candidate URLs per name and keep the first hit.
    pub async fn run_name_list(&mut self, names: &[String]) -> ResultSet {
        let mut results = ResultSet::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let record = self.scrape_name(name).await;
            self.stats.record(record.is_some());
            match record {
                Some(record) => results.push(record),
                None => log::warn!("Failed to scrape data for {}", name),
            }
            sleep(self.config.request_delay).await;
        }
        results
    }

    /// Releases the browser session. Call once the run is over, whatever its outcome.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.browser.close().await
    }
}

fn unexpected_height(value: &Value) -> ScraperError {
    ScraperError::BrowserError(BrowserError::UnexpectedResponse(format!(
        "scroll height was {value}"
    )))
}
