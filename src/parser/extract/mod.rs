pub mod download;
pub mod latest_versions;
pub mod pep;
pub mod whats_new;

use std::path::PathBuf;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::fetcher::{CachePolicy, Fetcher, Page};

pub type Row = Vec<String>;

/// Tabular output of one extractor run. The header stays apart from the data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Results {
    pub header: Option<Row>,
    pub rows: Vec<Row>,
}

impl Results {
    pub fn with_header(header: &[&str], rows: Vec<Row>) -> Self {
        Results {
            header: Some(header.iter().map(|s| s.to_string()).collect()),
            rows,
        }
    }

    pub fn without_header(rows: Vec<Row>) -> Self {
        Results { header: None, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    WhatsNew,
    LatestVersions,
    Download,
    Pep,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::WhatsNew => "whats-new",
            Mode::LatestVersions => "latest-versions",
            Mode::Download => "download",
            Mode::Pep => "pep",
        }
    }
}

/// What a detail-page loop does when one page cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave the item out and keep going.
    Skip,
    /// Fail the whole run.
    Abort,
}

/// Everything an extractor needs from the outside world.
pub struct Context {
    pub fetcher: Fetcher,
    pub docs_url: Url,
    pub pep_url: Url,
    pub downloads_dir: PathBuf,
}

pub async fn run(mode: Mode, ctx: &Context) -> Result<Option<Results>> {
    match mode {
        Mode::WhatsNew => whats_new::run(ctx).await,
        Mode::LatestVersions => latest_versions::run(ctx).await,
        Mode::Download => download::run(ctx).await,
        Mode::Pep => pep::run(ctx).await,
    }
}

pub async fn fetch_detail(fetcher: &Fetcher, url: &Url, policy: FailurePolicy) -> Result<Option<Page>> {
    match fetcher.fetch(url, CachePolicy::Cached).await {
        Some(page) => Ok(Some(page)),
        None => match policy {
            FailurePolicy::Skip => {
                warn!(%url, "Skipping unavailable page");
                Ok(None)
            }
            FailurePolicy::Abort => Err(ScrapeError::Unavailable(url.to_string())),
        },
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use wiremock::MockServer;

    #[test]
    fn mode_names_match_cli_values() {
        for mode in Mode::value_variants() {
            let value = mode.to_possible_value().unwrap();
            assert_eq!(value.get_name(), mode.name());
        }
    }

    #[tokio::test]
    async fn skip_policy_yields_none() {
        let server = MockServer::start().await;
        serve_status(&server, "/gone.html", 404).await;
        let ctx = context(&server, PathBuf::from("unused"));
        let url = ctx.docs_url.join("gone.html").unwrap();

        let page = fetch_detail(&ctx.fetcher, &url, FailurePolicy::Skip).await.unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn abort_policy_is_an_error() {
        let server = MockServer::start().await;
        serve_status(&server, "/gone.html", 404).await;
        let ctx = context(&server, PathBuf::from("unused"));
        let url = ctx.docs_url.join("gone.html").unwrap();

        let err = fetch_detail(&ctx.fetcher, &url, FailurePolicy::Abort).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Unavailable(u) if u.ends_with("/gone.html")));
    }

    #[tokio::test]
    async fn detail_pages_use_the_cache() {
        let server = MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/a.html"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("a"))
            .expect(1)
            .mount(&server)
            .await;
        let ctx = context(&server, PathBuf::from("unused"));
        let url = ctx.docs_url.join("a.html").unwrap();

        for _ in 0..2 {
            let page = fetch_detail(&ctx.fetcher, &url, FailurePolicy::Abort).await.unwrap();
            assert_eq!(page.unwrap().body, "a");
        }
    }
}
