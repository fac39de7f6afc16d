use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

use crate::{rankings::RankingsLayout, results_page::ResultsLayout};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 6055 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapingConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
    pub poll_interval_secs: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; MatchAlerts/1.0)".to_string(),
            request_timeout_secs: 30,
            requests_per_second: 4,
            poll_interval_secs: 30,
        }
    }
}

impl ScrapingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// A named division page, e.g. `Pocono=http://.../Rankings_championship_2.html`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DivisionUrl {
    pub division: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfig {
    /// Results pages; the position in this list is the division index in match ids.
    pub results_urls: Vec<String>,
    pub ranking_urls: Vec<DivisionUrl>,
    pub match_list_urls: Vec<DivisionUrl>,
    pub results_layout: ResultsLayout,
    pub rankings_layout: RankingsLayout,
    pub ranking_top_n: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            results_urls: Vec::new(),
            ranking_urls: Vec::new(),
            match_list_urls: Vec::new(),
            results_layout: ResultsLayout::default(),
            rankings_layout: RankingsLayout::default(),
            ranking_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub registered_numbers: PathBuf,
    pub recorded_matches: PathBuf,
    pub matches_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registered_numbers: PathBuf::from("registered-numbers.json"),
            recorded_matches: PathBuf::from("recorded-matches.json"),
            matches_dir: PathBuf::from("matches"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsConfig {
    pub from_number: String,
    pub sign_off: String,
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub account_file: PathBuf,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            from_number: String::new(),
            sign_off: "Good luck!".to_string(),
            api_base: "https://api.twilio.com".to_string(),
            account_sid: None,
            auth_token: None,
            account_file: PathBuf::from("twilio-account.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertConfig {
    pub server: ServerConfig,
    pub scraping: ScrapingConfig,
    pub event: EventConfig,
    pub storage: StorageConfig,
    pub sms: SmsConfig,
}

impl AlertConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup`; values that fail to parse keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }

        if let Some(user_agent) = lookup("SCRAPER_USER_AGENT") {
            config.scraping.user_agent = user_agent;
        }
        if let Some(timeout) = lookup("SCRAPER_TIMEOUT_SECS").and_then(|t| t.parse().ok()) {
            config.scraping.request_timeout_secs = timeout;
        }
        if let Some(rps) = lookup("RATE_LIMIT_RPS").and_then(|r| r.parse().ok()) {
            config.scraping.requests_per_second = rps;
        }
        if let Some(interval) = lookup("MATCH_CHECK_INTERVAL_SECS").and_then(|i| i.parse().ok()) {
            config.scraping.poll_interval_secs = interval;
        }

        if let Some(urls) = lookup("MATCH_RESULTS_URLS") {
            config.event.results_urls = split_list(&urls).map(str::to_string).collect();
        }
        if let Some(urls) = lookup("RANKING_URLS") {
            config.event.ranking_urls = parse_division_urls(&urls);
        }
        if let Some(urls) = lookup("MATCH_LIST_URLS") {
            config.event.match_list_urls = parse_division_urls(&urls);
        }
        if let Some(layout) = lookup("RESULTS_COLUMNS").and_then(|l| ResultsLayout::parse(&l)) {
            config.event.results_layout = layout;
        }
        if let Some(layout) = lookup("RANKING_COLUMNS").and_then(|l| RankingsLayout::parse(&l)) {
            config.event.rankings_layout = layout;
        }
        if let Some(top_n) = lookup("RANKING_TOP_N").and_then(|n| n.parse().ok()) {
            config.event.ranking_top_n = top_n;
        }

        if let Some(path) = lookup("REGISTERED_NUMBERS") {
            config.storage.registered_numbers = path.into();
        }
        if let Some(path) = lookup("MATCH_SCORES") {
            config.storage.recorded_matches = path.into();
        }
        if let Some(path) = lookup("MATCHES_DIR") {
            config.storage.matches_dir = path.into();
        }

        if let Some(number) = lookup("SMS_FROM_NUMBER") {
            config.sms.from_number = number;
        }
        if let Some(sign_off) = lookup("SMS_SIGN_OFF") {
            config.sms.sign_off = sign_off;
        }
        if let Some(base) = lookup("TWILIO_API_BASE") {
            config.sms.api_base = base;
        }
        config.sms.account_sid = lookup("TWILIO_ACCOUNT_SID").filter(|s| !s.is_empty());
        config.sms.auth_token = lookup("TWILIO_AUTH_TOKEN").filter(|s| !s.is_empty());
        if let Some(path) = lookup("TWILIO_ACCOUNT_FILE") {
            config.sms.account_file = path.into();
        }

        config
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parses `Name=url,Name=url`. Entries without a `=` are ignored.
fn parse_division_urls(list: &str) -> Vec<DivisionUrl> {
    split_list(list)
        .filter_map(|entry| {
            let (division, url) = entry.split_once('=')?;
            Some(DivisionUrl {
                division: division.trim().to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}
