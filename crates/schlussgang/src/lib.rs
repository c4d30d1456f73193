pub mod browser;
pub mod chart;
pub mod config;
pub mod csv_out;
pub mod normalize;
mod parser;
pub mod scraper;
pub mod stats;
pub mod types;
pub mod utils;

pub use browser::{Browser, BrowserError, HttpBrowser, WebDriverBrowser};
pub use config::ScrapeConfig;
pub use scraper::{PortraitScraper, ScraperError, WaitMode};
pub use types::{ResultSet, SubjectRecord};

pub(crate) const SITE_ROOT: &str = "https://www.schlussgang.ch";
