use reqwest::{Client, header, cookie::Jar};
use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HeaderProfile;

/// Creates the HTTP client shared by every request of a run.
/// Headers are not set here; each request carries its own profile.
pub fn create_http_client(timeout: Option<Duration>, cookie_jar: Option<Arc<Jar>>) -> Result<Client> {
    let mut builder = Client::builder();

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    // Add cookie jar if provided, otherwise keep an in-memory store
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    } else {
        builder = builder.cookie_store(true);
    }

    let client = builder.build().context("Failed to create HTTP client")?;

    Ok(client)
}

/// Converts a configured profile into request headers
pub fn header_map(profile: &HeaderProfile) -> Result<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();

    for (name, value) in &profile.headers {
        let header_name = header::HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{}' in profile '{}'", name, profile.name))?;
        let header_value = header::HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{}' in profile '{}'", name, profile.name))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Load cookies from a JSON file exported from a browser into `jar`.
/// Expected format: array of objects with "name" and "value" fields
/// (what extensions like "EditThisCookie" produce).
pub fn load_cookies_from_file(jar: &Jar, path: &str, site_url: &str) -> Result<usize> {
    let cookie_data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookie file {}", path))?;
    let cookies: Vec<serde_json::Value> = serde_json::from_str(&cookie_data)
        .with_context(|| format!("Failed to parse cookie file {}", path))?;

    let parsed_url = site_url.parse::<reqwest::Url>()?;
    let origin = format!("{}://{}", parsed_url.scheme(), parsed_url.host_str().unwrap_or(""));
    let cookie_url = origin.parse::<reqwest::Url>()?;

    let mut loaded_count = 0;
    for cookie in &cookies {
        if let (Some(name), Some(value)) = (
            cookie.get("name").and_then(|v| v.as_str()),
            cookie.get("value").and_then(|v| v.as_str()),
        ) {
            jar.add_cookie_str(&format!("{}={}", name, value), &cookie_url);
            tracing::debug!("Loaded cookie: {}", name);
            loaded_count += 1;
        }
    }

    tracing::info!("Loaded {} cookies from {}", loaded_count, path);
    Ok(loaded_count)
}
