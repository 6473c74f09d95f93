mod checker;
mod config;
mod extractor;
mod fetcher;
mod filter;
mod http_client;
mod mailer;
mod models;
mod reporter;
#[cfg(test)]
mod test_fixtures;

use anyhow::Result;
use checker::Checker;
use clap::Parser;
use config::{Config, DEFAULT_CONFIG_PATH};
use extractor::Extractor;
use fetcher::HttpFetcher;
use mailer::Mailer;

#[derive(Parser, Debug)]
#[command(name = "aptwatch")]
#[command(about = "Checks residential search results for available apartments and emails a summary", long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Write a default config file to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Print the report without sending the email
    #[arg(long)]
    no_email: bool,

    /// Save every fetched results page into this directory
    #[arg(long)]
    dump_html: Option<String>,

    /// Test URL fetching - fetch a URL with the first header profile and report on it
    #[arg(long)]
    test_url: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        Config::create_default(&args.config)?;
        eprintln!("Wrote default configuration to {}", args.config);
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    if let Some(dir) = args.dump_html {
        config.fetch.debug_dir = Some(dir);
    }

    init_logging(&config);

    if let Some(url) = args.test_url {
        return test_url_fetch(&url, args.save_html.as_deref(), &config).await;
    }

    let fetcher = HttpFetcher::with_config(&config.target.base_url, &config.fetch)?;
    let extractor = Extractor::new(&config.extraction)?;
    let checker = Checker::new(Box::new(fetcher), extractor, config.target.clone())
        .with_room_delay(config.fetch.room_delay);

    let report = checker.run().await;
    print!("{}", reporter::render(&report));
    tracing::info!("Run finished with {} matching listing(s)", report.total_matches());

    if config.email.enabled && !args.no_email {
        let mailer = Mailer::new(config.email.clone());
        mailer
            .notify(&reporter::email_subject(&report), &reporter::email_body(&report))
            .await;
    } else {
        tracing::debug!("Email delivery disabled, skipping");
    }

    Ok(())
}

/// Use RUST_LOG when set, otherwise the configured level
fn init_logging(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::debug!("Logging level set from RUST_LOG environment variable");
    } else {
        let level = config.tracing_level.to_lowercase();
        let max_level = match level.as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Invalid tracing level '{}', using 'info'", level);
                tracing::Level::INFO
            }
        };

        tracing_subscriber::fmt()
            .with_max_level(max_level)
            .init();

        tracing::debug!("Logging level set to: {}", level);
    }
}

/// Fetches one URL with the first header profile and prints what came back
async fn test_url_fetch(url: &str, save_path: Option<&str>, config: &Config) -> Result<()> {
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));

    let profile = &config.fetch.profiles[0];
    println!("Header profile: {}", profile.name);

    let client = http_client::create_http_client(
        config.fetch.timeout_seconds.map(std::time::Duration::from_secs),
        None,
    )?;
    let headers = http_client::header_map(profile)?;

    println!("Sending request...");
    let response = client.get(url).headers(headers).send().await?;

    println!("Status: {}", response.status());
    println!("\nResponse Headers:");
    for (name, value) in response.headers() {
        println!("  {}: {:?}", name, value);
    }

    println!("{}", "=".repeat(80));

    let body = response.text().await?;

    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
    } else {
        println!("{}", body);
    }
    println!("{}", "=".repeat(80));

    println!("Total length: {} bytes", body.len());

    if fetcher::is_blocked(&body, &config.fetch.block_markers) {
        println!("\n⚠️  WARNING: Response contains a CAPTCHA / block marker!");
        println!("Consider:");
        println!("  - Raising fetch.room_delay / fetch.attempt_jitter in config");
        println!("  - Reordering fetch.profiles");
        println!("  - Exporting browser cookies into fetch.cookies_file");
    } else {
        match Extractor::new(&config.extraction)?.extract(&body) {
            Ok(listings) => println!("Found {} listing card(s)", listings.len()),
            Err(e) => println!("No listing cards: {}", e),
        }
    }

    Ok(())
}
