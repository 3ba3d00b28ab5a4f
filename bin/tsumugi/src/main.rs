use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::Parser;
use fake_user_agent::get_chrome_rua;
use hina::{util::http::sanitize_headers, HlsDownloader, HttpClient};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

#[derive(Parser, Debug, Clone)]
struct TsumugiArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Concurrent segment fetches
    #[clap(long, default_value = "5")]
    threads: NonZeroU32,

    /// Output file path
    #[clap(short, long, default_value = "./output.ts")]
    output: PathBuf,

    /// Cookies used to download
    ///
    /// Seeded into the cookie store for the playlist's origin.
    #[clap(long)]
    cookies: Option<String>,

    /// HTTP header used to download
    ///
    /// Custom header. eg. "X-Playback-Token: xxxxx". Credential-sensitive
    /// headers (Cookie, Referer, User-Agent, ...) are stripped.
    #[clap(short = 'H', long = "header")]
    headers: Vec<String>,

    /// m3u8 URL
    m3u8: String,
}

impl TsumugiArgs {
    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let (key, value) = header.split_once(':').context("Invalid header")?;
            headers.insert(
                HeaderName::from_str(key.trim()).context("Invalid header name")?,
                HeaderValue::from_str(value.trim()).context("Invalid header value")?,
            );
        }

        let client = HttpClient::new(
            reqwest::Client::builder()
                .default_headers(sanitize_headers(&headers))
                .user_agent(get_chrome_rua())
                .timeout(Duration::from_secs(60)),
        );
        if let Some(cookies) = &self.cookies {
            client.add_cookies(
                cookies.split("; ").map(str::to_string).collect(),
                &self.m3u8,
            );
        }
        Ok(client)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = TsumugiArgs::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if args.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let downloader =
        HlsDownloader::with_client(args.client()?).with_concurrency(args.threads);

    // First ctrl-c stops the job, second one force exits.
    let cancel = downloader.cancellation_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Ctrl-C received, stopping download.");
        cancel.cancel();

        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Ctrl-C received again, force exit.");
        std::process::exit(1);
    });

    let stream = downloader.download(&args.m3u8).await?;
    tokio::fs::write(&args.output, stream.as_ref()).await?;
    tracing::info!(
        "Saved {} bytes to {}.",
        stream.len(),
        args.output.display()
    );

    Ok(())
}
