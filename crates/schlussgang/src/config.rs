use std::time::Duration;

use crate::SITE_ROOT;
use crate::utils::{MAX_CANDIDATES, candidate_urls, slugify};

/// Settings shared by every scrape pipeline stage.
///
/// `Default` mirrors the live site; the CLI overrides individual fields.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub site_root: String,
    pub listing_path: String,
    pub link_filter: String,
    pub sentinel_href: String,
    pub not_found_phrase: String,
    pub placeholder_name: String,
    /// Bounded wait for the listing page body.
    pub page_timeout: Duration,
    /// Bounded wait for a portrait table or error banner.
    pub detail_timeout: Duration,
    pub poll_interval: Duration,
    pub scroll_pause: Duration,
    pub max_scrolls: u32,
    /// Courtesy pause after every portrait, successful or not.
    pub request_delay: Duration,
    /// Tried in order after the bare slug; `""` means the slug itself.
    pub name_suffixes: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            site_root: SITE_ROOT.to_string(),
            listing_path: "/portraet".to_string(),
            link_filter: "portraet".to_string(),
            sentinel_href: "/portraet".to_string(),
            not_found_phrase: "Seite nicht gefunden".to_string(),
            placeholder_name: "N/A".to_string(),
            page_timeout: Duration::from_secs(30),
            detail_timeout: Duration::from_secs(45),
            poll_interval: Duration::from_millis(500),
            scroll_pause: Duration::from_secs(5),
            max_scrolls: 50,
            request_delay: Duration::from_secs(1),
            name_suffixes: vec![String::new(), "-0".to_string()],
        }
    }
}

impl ScrapeConfig {
    pub fn listing_url(&self) -> String {
        self.resolve(&self.listing_path)
    }

    /// Base every name-derived portrait URL is built on, always ending in `/`.
    pub fn portrait_base(&self) -> String {
        format!("{}/", self.resolve(&self.listing_path).trim_end_matches('/'))
    }

    /// Turns a site-relative href into an absolute URL; absolute ones pass through.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!(
                "{}/{}",
                self.site_root.trim_end_matches('/'),
                href.trim_start_matches('/')
            )
        }
    }

    pub fn name_candidates(&self, name: &str) -> Vec<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Vec::new();
        }
        candidate_urls(&self.portrait_base(), &slug, &self.name_suffixes)
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.max_scrolls == 0 {
            return Err("Scroll cap must be greater than 0".to_string());
        }
        if self.name_suffixes.is_empty() {
            return Err("At least one URL suffix is required".to_string());
        }
        if self.name_suffixes.len() > MAX_CANDIDATES {
            return Err(format!(
                "At most {MAX_CANDIDATES} URL suffixes are allowed, got {}",
                self.name_suffixes.len()
            ));
        }
        if self.link_filter.is_empty() {
            return Err("Link filter must not be empty".to_string());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = ScrapeConfig::default();
        assert_eq!(
            config.resolve("/portraet/hans-muller"),
            "https://www.schlussgang.ch/portraet/hans-muller"
        );
        assert_eq!(
            config.resolve("portraet/hans-muller"),
            "https://www.schlussgang.ch/portraet/hans-muller"
        );
        assert_eq!(
            config.resolve("https://example.org/portraet/x"),
            "https://example.org/portraet/x"
        );
    }

    #[test]
    fn test_listing_and_portrait_base() {
        let config = ScrapeConfig::default();
        assert_eq!(config.listing_url(), "https://www.schlussgang.ch/portraet");
        assert_eq!(config.portrait_base(), "https://www.schlussgang.ch/portraet/");
    }

    #[test]
    fn test_name_candidates_default_suffixes() {
        let config = ScrapeConfig::default();
        assert_eq!(
            config.name_candidates("Hans Müller"),
            vec![
                "https://www.schlussgang.ch/portraet/hans-muller".to_string(),
                "https://www.schlussgang.ch/portraet/hans-muller-0".to_string(),
            ]
        );
        assert!(config.name_candidates("   ").is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = ScrapeConfig {
            max_scrolls: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScrapeConfig {
            name_suffixes: (0..6).map(|i| format!("-{i}")).collect(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(ScrapeConfig::default().validate().is_ok());
    }
}
