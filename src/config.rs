use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use anyhow::{Result, Context};

use crate::models::{Query, RoomType};

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Which search page to watch
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_view")]
    pub view: String,
}

impl TargetConfig {
    pub fn query(&self, room: RoomType) -> Query {
        Query {
            room,
            location: self.location.clone(),
            sort_field: self.sort_field.clone(),
            sort_order: self.sort_order.clone(),
            view: self.view.clone(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            location: default_location(),
            sort_field: default_sort_field(),
            sort_order: default_sort_order(),
            view: default_view(),
        }
    }
}

/// A set of request headers tried as one unit
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HeaderProfile {
    pub name: String,
    pub headers: Vec<(String, String)>,
}

/// A substring whose presence marks a response as a block page
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BlockMarker {
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Inclusive range of whole seconds; equal bounds give a fixed delay
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    /// Request timeout; `None` waits indefinitely
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: Option<u64>,
    /// Tried in order until one returns a page that is not blocked
    #[serde(default = "default_header_profiles")]
    pub profiles: Vec<HeaderProfile>,
    #[serde(default = "default_block_markers")]
    pub block_markers: Vec<BlockMarker>,
    /// Sleep before every request attempt
    #[serde(default = "default_attempt_jitter")]
    pub attempt_jitter: Option<DelayRange>,
    /// Sleep between consecutive room types
    #[serde(default = "default_room_delay")]
    pub room_delay: Option<DelayRange>,
    /// JSON cookie export (array of `{name, value}`) loaded into the client
    #[serde(default)]
    pub cookies_file: Option<String>,
    /// Directory receiving `debug_response_<room>.html` for every fetched page
    #[serde(default)]
    pub debug_dir: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            profiles: default_header_profiles(),
            block_markers: default_block_markers(),
            attempt_jitter: default_attempt_jitter(),
            room_delay: default_room_delay(),
            cookies_file: None,
            debug_dir: None,
        }
    }
}

/// What a matched container with zero cards and no "no results" marker means
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContainerPolicy {
    /// Report it like any other empty search
    #[default]
    NoListings,
    /// Warn that the page structure may have changed
    StructureWarning,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Most specific first; the first selector matching an element wins
    #[serde(default = "default_container_selectors")]
    pub container_selectors: Vec<String>,
    #[serde(default = "default_card_selector")]
    pub card_selector: String,
    #[serde(default = "default_no_results_selector")]
    pub no_results_selector: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_detail_selector")]
    pub detail_selector: String,
    #[serde(default = "default_label_selector")]
    pub label_selector: String,
    #[serde(default = "default_value_selector")]
    pub value_selector: String,
    #[serde(default = "default_price_keyword")]
    pub price_keyword: String,
    #[serde(default = "default_unit_keyword")]
    pub unit_keyword: String,
    #[serde(default = "default_room_type_keyword")]
    pub room_type_keyword: String,
    /// Labels that are never the free-text location field
    #[serde(default = "default_known_labels")]
    pub known_labels: Vec<String>,
    #[serde(default)]
    pub empty_container: EmptyContainerPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            container_selectors: default_container_selectors(),
            card_selector: default_card_selector(),
            no_results_selector: default_no_results_selector(),
            title_selector: default_title_selector(),
            detail_selector: default_detail_selector(),
            label_selector: default_label_selector(),
            value_selector: default_value_selector(),
            price_keyword: default_price_keyword(),
            unit_keyword: default_unit_keyword(),
            room_type_keyword: default_room_type_keyword(),
            known_labels: default_known_labels(),
            empty_container: EmptyContainerPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Login name; falls back to the sender address when empty
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default = "default_smtp_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl EmailConfig {
    pub fn login(&self) -> &str {
        if self.username.is_empty() {
            &self.sender
        } else {
            &self.username
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            recipient: String::new(),
            timeout_seconds: default_smtp_timeout_seconds(),
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://www.wasl.ae/en/search/residential".to_string()
}

fn default_location() -> String {
    "muhaisnah-fourth".to_string()
}

fn default_sort_field() -> String {
    "Price".to_string()
}

fn default_sort_order() -> String {
    "Asc".to_string()
}

fn default_view() -> String {
    "grid".to_string()
}

fn default_timeout_seconds() -> Option<u64> {
    Some(30)
}

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn default_header_profiles() -> Vec<HeaderProfile> {
    vec![
        HeaderProfile {
            name: "chrome-desktop".to_string(),
            headers: vec![
                header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
                header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
                header("Accept-Language", "en-US,en;q=0.9,ar;q=0.8"),
                header("Accept-Encoding", "gzip, deflate, br"),
                header("Connection", "keep-alive"),
                header("Upgrade-Insecure-Requests", "1"),
                header("Sec-Fetch-Dest", "document"),
                header("Sec-Fetch-Mode", "navigate"),
                header("Sec-Fetch-Site", "none"),
                header("Sec-Fetch-User", "?1"),
                header("Cache-Control", "max-age=0"),
            ],
        },
        HeaderProfile {
            name: "firefox-desktop".to_string(),
            headers: vec![
                header("User-Agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0"),
                header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                header("Accept-Language", "en-US,en;q=0.5"),
                header("Accept-Encoding", "gzip, deflate, br"),
                header("DNT", "1"),
                header("Connection", "keep-alive"),
                header("Referer", "https://www.wasl.ae/en/"),
            ],
        },
        HeaderProfile {
            name: "minimal".to_string(),
            headers: vec![header("User-Agent", "Mozilla/5.0")],
        },
    ]
}

fn default_block_markers() -> Vec<BlockMarker> {
    vec![
        BlockMarker { pattern: "DataDome".to_string(), case_sensitive: true },
        BlockMarker { pattern: "hcaptcha".to_string(), case_sensitive: false },
    ]
}

fn default_attempt_jitter() -> Option<DelayRange> {
    Some(DelayRange { min_secs: 1, max_secs: 3 })
}

fn default_room_delay() -> Option<DelayRange> {
    Some(DelayRange { min_secs: 15, max_secs: 20 })
}

fn default_container_selectors() -> Vec<String> {
    vec![
        "div.all-units-section.cs_search_card.search-content".to_string(),
        "div.all-units-section".to_string(),
        "div.cs_search_card".to_string(),
        "div.search-content".to_string(),
    ]
}

fn default_card_selector() -> String {
    "section.all-units-cards".to_string()
}

fn default_no_results_selector() -> String {
    "section.no-search-found".to_string()
}

fn default_title_selector() -> String {
    "h3".to_string()
}

fn default_detail_selector() -> String {
    "div.card-details".to_string()
}

fn default_label_selector() -> String {
    "span".to_string()
}

fn default_value_selector() -> String {
    "i".to_string()
}

fn default_price_keyword() -> String {
    "Price".to_string()
}

fn default_unit_keyword() -> String {
    "Unit No.".to_string()
}

fn default_room_type_keyword() -> String {
    "Type:".to_string()
}

fn default_known_labels() -> Vec<String> {
    ["Price", "Unit No.", "Size", "Type", "Parking"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_seconds() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracing_level: default_tracing_level(),
            target: TargetConfig::default(),
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl Config {
    /// Load the YAML file at `path` (defaults when it does not exist), apply
    /// environment overrides and validate the result.
    pub fn load(path: &str) -> Result<Self> {
        let mut config: Config = if Path::new(path).exists() {
            let config_str = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path))?;
            serde_yaml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file {}", path))?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(location) = env::var("TARGET_LOCATION") {
            self.target.location = location;
        }

        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        if let Ok(dir) = env::var("DEBUG_HTML_DIR") {
            self.fetch.debug_dir = Some(dir);
        }

        if let Ok(server) = env::var("SMTP_SERVER") {
            self.email.smtp_server = server;
        }

        if let Ok(port) = env::var("SMTP_PORT") {
            self.email.smtp_port = port.parse()
                .context("Failed to parse SMTP_PORT environment variable")?;
        }

        if let Ok(username) = env::var("SMTP_USERNAME") {
            self.email.username = username;
        }

        if let Ok(password) = env::var("SMTP_PASSWORD") {
            self.email.password = password;
        }

        if let Ok(sender) = env::var("EMAIL_SENDER") {
            self.email.sender = sender;
        }

        if let Ok(recipient) = env::var("EMAIL_RECIPIENT") {
            self.email.recipient = recipient;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.location.trim().is_empty() {
            anyhow::bail!("target.location is required (set via config file or TARGET_LOCATION env var)");
        }

        if self.target.base_url.trim().is_empty() {
            anyhow::bail!("target.base_url must not be empty");
        }

        if self.fetch.profiles.is_empty() {
            anyhow::bail!("At least one header profile is required in fetch.profiles");
        }

        for (name, range) in [("fetch.attempt_jitter", self.fetch.attempt_jitter), ("fetch.room_delay", self.fetch.room_delay)] {
            if let Some(range) = range {
                if range.min_secs > range.max_secs {
                    anyhow::bail!("{}: min_secs ({}) is greater than max_secs ({})", name, range.min_secs, range.max_secs);
                }
            }
        }

        if self.extraction.container_selectors.is_empty() {
            anyhow::bail!("At least one selector is required in extraction.container_selectors");
        }

        if self.email.enabled {
            if self.email.smtp_server.is_empty() {
                anyhow::bail!("email.smtp_server is required when email is enabled");
            }
            if self.email.sender.is_empty() {
                anyhow::bail!("email.sender is required when email is enabled (or EMAIL_SENDER env var)");
            }
            if self.email.recipient.is_empty() {
                anyhow::bail!("email.recipient is required when email is enabled (or EMAIL_RECIPIENT env var)");
            }
            if self.email.password.is_empty() {
                anyhow::bail!("email.password is required when email is enabled (or SMTP_PASSWORD env var)");
            }
        }

        Ok(())
    }

    /// Write the default configuration to `path`, creating parent directories
    pub fn create_default(path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write(path, config_str)
            .with_context(|| format!("Failed to write config file {}", path))?;
        Ok(())
    }
}
