use crate::config::{BlockMarker, DelayRange, FetchConfig, HeaderProfile};
use crate::http_client;
use crate::models::{FetchOutcome, Query, RoomType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Anything that can produce the search page for a query
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns the name of the source, for logs
    fn name(&self) -> &str;

    /// Fetches the results page. Faults are reported in the outcome, never raised.
    async fn fetch(&self, query: &Query) -> FetchOutcome;
}

/// Fetches search pages over HTTP, rotating through header profiles while blocked
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    profiles: Vec<(String, HeaderMap)>,
    block_markers: Vec<BlockMarker>,
    attempt_jitter: Option<DelayRange>,
    debug_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn with_config(base_url: &str, config: &FetchConfig) -> Result<Self> {
        reqwest::Url::parse(base_url).with_context(|| format!("Invalid search URL '{}'", base_url))?;

        let cookie_jar = Arc::new(Jar::default());

        if let Some(path) = &config.cookies_file {
            if Path::new(path).exists() {
                match http_client::load_cookies_from_file(&cookie_jar, path, base_url) {
                    Ok(_) => tracing::info!("Successfully loaded cookies from {}", path),
                    Err(e) => tracing::warn!("Failed to load cookies from {}: {}", path, e),
                }
            } else {
                tracing::warn!("Cookie file {} not found, continuing without cookies", path);
            }
        }

        let client = http_client::create_http_client(
            config.timeout_seconds.map(Duration::from_secs),
            Some(cookie_jar),
        )?;

        let profiles = config
            .profiles
            .iter()
            .map(|profile: &HeaderProfile| Ok((profile.name.clone(), http_client::header_map(profile)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            profiles,
            block_markers: config.block_markers.clone(),
            attempt_jitter: config.attempt_jitter,
            debug_dir: config.debug_dir.as_ref().map(PathBuf::from),
        })
    }

    /// Single request with one header profile. Any 200 body is dumped before the block check.
    async fn attempt(&self, profile_index: usize, url: &str, room: RoomType) -> FetchOutcome {
        let (profile_name, headers) = &self.profiles[profile_index];

        if let Some(jitter) = self.attempt_jitter {
            sleep_within(jitter).await;
        }

        tracing::debug!("GET {} with profile '{}'", url, profile_name);

        let response = match self.client.get(url).headers(headers.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransportError(e.to_string()),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return FetchOutcome::HttpError(status.as_u16());
        }

        match response.text().await {
            Ok(body) => {
                tracing::debug!("Fetched {} bytes with profile '{}'", body.len(), profile_name);
                self.dump_response(room, &body).await;
                if is_blocked(&body, &self.block_markers) {
                    FetchOutcome::Blocked
                } else {
                    FetchOutcome::Success(body)
                }
            }
            Err(e) => FetchOutcome::TransportError(e.to_string()),
        }
    }

    async fn dump_response(&self, room: RoomType, body: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let path = dir.join(format!("debug_response_{}.html", room.code()));
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Failed to create debug directory {}: {}", dir.display(), e);
            return;
        }

        match tokio::fs::write(&path, body).await {
            Ok(()) => tracing::info!("📄 Saved HTML response to {}", path.display()),
            Err(e) => tracing::warn!("Failed to write debug HTML {}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, query: &Query) -> FetchOutcome {
        let search_url = match query.search_url(&self.base_url) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::TransportError(format!("invalid search URL: {}", e)),
        };
        let profile_names: Vec<&str> = self.profiles.iter().map(|(name, _)| name.as_str()).collect();

        let url = search_url.as_str();
        first_unblocked(&profile_names, |index| self.attempt(index, url, query.room)).await
    }
}

/// Runs `attempt` for each profile in order and returns the first page that
/// came back 200 and unblocked.
///
/// Blocked pages and HTTP errors move on to the next profile; a transport
/// error ends the chain immediately. Once several profiles have all failed
/// the result is `Blocked`; with a single profile its own outcome is returned.
pub async fn first_unblocked<F, Fut>(profile_names: &[&str], mut attempt: F) -> FetchOutcome
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let mut last = FetchOutcome::Blocked;

    for (index, name) in profile_names.iter().enumerate() {
        let outcome = attempt(index).await;
        match &outcome {
            FetchOutcome::Success(_) => {
                if index > 0 {
                    tracing::info!("✓ Profile '{}' got through after {} failed attempt(s)", name, index);
                }
                return outcome;
            }
            FetchOutcome::Blocked => {
                tracing::warn!("Profile '{}' hit a CAPTCHA / block page", name);
            }
            FetchOutcome::HttpError(status) => {
                tracing::warn!("Profile '{}' got HTTP status {}", name, status);
            }
            FetchOutcome::TransportError(message) => {
                tracing::warn!("Profile '{}' failed: {}", name, message);
                return outcome;
            }
        }
        last = outcome;
    }

    if profile_names.len() > 1 {
        tracing::warn!("All {} header profiles failed, treating the page as blocked", profile_names.len());
        FetchOutcome::Blocked
    } else {
        last
    }
}

/// True when the body contains any of the configured block markers
pub fn is_blocked(body: &str, markers: &[BlockMarker]) -> bool {
    let mut lower_body: Option<String> = None;

    markers.iter().any(|marker| {
        if marker.case_sensitive {
            body.contains(&marker.pattern)
        } else {
            let lower = lower_body.get_or_insert_with(|| body.to_lowercase());
            lower.contains(&marker.pattern.to_lowercase())
        }
    })
}

/// Picks a whole number of seconds in the inclusive range
pub fn pick_delay(range: DelayRange) -> Duration {
    if range.min_secs >= range.max_secs {
        return Duration::from_secs(range.min_secs);
    }
    Duration::from_secs(rand::thread_rng().gen_range(range.min_secs..=range.max_secs))
}

pub async fn sleep_within(range: DelayRange) {
    let delay = pick_delay(range);
    if !delay.is_zero() {
        tracing::debug!("Sleeping {}s", delay.as_secs());
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn default_markers() -> Vec<BlockMarker> {
        FetchConfig::default().block_markers
    }

    #[test]
    fn test_vendor_marker_is_case_sensitive() {
        let markers = default_markers();
        assert!(is_blocked("<script src=\"https://js.DataDome.co/tags.js\"></script>", &markers));
        assert!(!is_blocked("<p>datadome is just a word here</p>", &markers));
    }

    #[test]
    fn test_hcaptcha_marker_is_case_insensitive() {
        let markers = default_markers();
        assert!(is_blocked("<div class=\"h-captcha\" data-src=\"HCaptcha\"></div>", &markers));
        assert!(is_blocked("<iframe src=\"https://newassets.hcaptcha.com/\"></iframe>", &markers));
    }

    #[test]
    fn test_regular_page_is_not_blocked() {
        let markers = default_markers();
        assert!(!is_blocked("<div class=\"all-units-section\"></div>", &markers));
        assert!(!is_blocked("", &markers));
    }

    #[test]
    fn test_pick_delay_respects_range() {
        for _ in 0..50 {
            let delay = pick_delay(DelayRange { min_secs: 15, max_secs: 20 });
            assert!((15..=20).contains(&delay.as_secs()));
        }
        assert_eq!(pick_delay(DelayRange { min_secs: 10, max_secs: 10 }), Duration::from_secs(10));
    }

    async fn run_chain(names: &[&str], outcomes: Vec<FetchOutcome>) -> (FetchOutcome, usize) {
        let calls = Mutex::new(0usize);
        let outcome = first_unblocked(names, |index| {
            *calls.lock().unwrap() += 1;
            let outcome = outcomes[index].clone();
            async move { outcome }
        })
        .await;
        let count = *calls.lock().unwrap();
        (outcome, count)
    }

    #[tokio::test]
    async fn test_first_profile_success_stops_chain() {
        let (outcome, calls) = run_chain(
            &["a", "b", "c"],
            vec![
                FetchOutcome::Success("<html></html>".to_string()),
                FetchOutcome::Blocked,
                FetchOutcome::Blocked,
            ],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Success("<html></html>".to_string()));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_blocked_profile_falls_through_to_next() {
        let (outcome, calls) = run_chain(
            &["a", "b", "c"],
            vec![
                FetchOutcome::Blocked,
                FetchOutcome::HttpError(403),
                FetchOutcome::Success("page".to_string()),
            ],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Success("page".to_string()));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_exhausted_profiles_report_blocked() {
        let (outcome, calls) = run_chain(
            &["a", "b", "c"],
            vec![FetchOutcome::Blocked, FetchOutcome::HttpError(403), FetchOutcome::Blocked],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Blocked);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_transport_error_stops_chain() {
        let (outcome, calls) = run_chain(
            &["a", "b"],
            vec![
                FetchOutcome::TransportError("connection refused".to_string()),
                FetchOutcome::Success("page".to_string()),
            ],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::TransportError("connection refused".to_string()));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_single_profile_keeps_http_status() {
        let (outcome, _) = run_chain(&["only"], vec![FetchOutcome::HttpError(503)]).await;
        assert_eq!(outcome, FetchOutcome::HttpError(503));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = FetchConfig {
            timeout_seconds: Some(2),
            attempt_jitter: None,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::with_config("http://127.0.0.1:9/search", &config).unwrap();
        let query = crate::config::TargetConfig::default().query(RoomType::OneBedroom);

        match fetcher.fetch(&query).await {
            FetchOutcome::TransportError(_) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    /// Answers a single request with a canned response and returns the base URL to hit
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/search", addr)
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aptwatch-fetcher-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn single_profile_fetcher(base_url: &str, debug_dir: Option<&Path>) -> HttpFetcher {
        let defaults = FetchConfig::default();
        let config = FetchConfig {
            timeout_seconds: Some(5),
            profiles: vec![defaults.profiles[defaults.profiles.len() - 1].clone()],
            attempt_jitter: None,
            debug_dir: debug_dir.map(|dir| dir.to_string_lossy().into_owned()),
            ..defaults
        };
        HttpFetcher::with_config(base_url, &config).unwrap()
    }

    fn query(room: RoomType) -> Query {
        crate::config::TargetConfig::default().query(room)
    }

    #[tokio::test]
    async fn test_ok_page_is_success_and_dumped() {
        let page = "<html><body><div class=\"all-units-section\"></div></body></html>";
        let base_url = serve_once("200 OK", page).await;
        let dir = scratch_dir("ok");
        let fetcher = single_profile_fetcher(&base_url, Some(&dir));

        assert_eq!(fetcher.fetch(&query(RoomType::TwoBedroom)).await, FetchOutcome::Success(page.to_string()));
        assert_eq!(std::fs::read_to_string(dir.join("debug_response_2.html")).unwrap(), page);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_ok_block_page_is_blocked_and_still_dumped() {
        let page = "<html><body><iframe src=\"https://newassets.hcaptcha.com/captcha\"></iframe></body></html>";
        let base_url = serve_once("200 OK", page).await;
        let dir = scratch_dir("blocked");
        let fetcher = single_profile_fetcher(&base_url, Some(&dir));

        assert_eq!(fetcher.fetch(&query(RoomType::OneBedroom)).await, FetchOutcome::Blocked);
        assert_eq!(std::fs::read_to_string(dir.join("debug_response_1.html")).unwrap(), page);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_forbidden_is_http_error_without_dump() {
        let base_url = serve_once("403 Forbidden", "<html>denied</html>").await;
        let dir = scratch_dir("forbidden");
        let fetcher = single_profile_fetcher(&base_url, Some(&dir));

        assert_eq!(fetcher.fetch(&query(RoomType::ThreeBedroom)).await, FetchOutcome::HttpError(403));
        assert!(!dir.join("debug_response_3.html").exists());
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_http_error() {
        let base_url = serve_once("203 Non-Authoritative Information", "<html></html>").await;
        let fetcher = single_profile_fetcher(&base_url, None);

        assert_eq!(fetcher.fetch(&query(RoomType::OneBedroom)).await, FetchOutcome::HttpError(203));
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        assert!(HttpFetcher::with_config("/en/search/residential", &FetchConfig::default()).is_err());
    }
}
