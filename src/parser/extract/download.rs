use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::info;
use url::Url;

use super::{Context, Results};
use crate::error::{Result, ScrapeError};
use crate::fetcher::{CachePolicy, Page};
use crate::parser::locator::{find_tag, require_attr, TagQuery};

static PDF_A4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".+pdf-a4\.zip$").unwrap());

const DOWNLOAD_PATH: &str = "download.html";

/// Saves the A4 PDF archive into the downloads dir. Produces no rows.
pub async fn run(ctx: &Context) -> Result<Option<Results>> {
    download_archive(ctx).await?;
    Ok(None)
}

/// Path of the written archive, or `None` when the download page is unavailable.
pub async fn download_archive(ctx: &Context) -> Result<Option<PathBuf>> {
    let downloads_url = ctx.docs_url.join(DOWNLOAD_PATH)?;
    let Some(page) = ctx.fetcher.fetch(&downloads_url, CachePolicy::Cached).await else {
        return Ok(None);
    };

    let archive_url = find_archive_link(&page)?;
    let filename = archive_filename(&archive_url)?;

    std::fs::create_dir_all(&ctx.downloads_dir)?;
    let archive_path = ctx.downloads_dir.join(filename);

    let bytes = ctx
        .fetcher
        .fetch_bytes(&archive_url, CachePolicy::Bypass)
        .await
        .ok_or_else(|| ScrapeError::Unavailable(archive_url.to_string()))?;
    std::fs::write(&archive_path, &bytes)?;

    info!(path = %archive_path.display(), bytes = bytes.len(), "Archive downloaded and saved");
    Ok(Some(archive_path))
}

/// Absolute URL of the `*-pdf-a4.zip` link in the main docutils table.
pub fn find_archive_link(page: &Page) -> Result<Url> {
    let doc = Html::parse_document(&page.body);
    let main = find_tag(doc.root_element(), &TagQuery::new("div").attr("role", "main"))?;
    let table = find_tag(main, &TagQuery::new("table").attr("class", "docutils"))?;
    let a = find_tag(
        table,
        &TagQuery::new("a").attr_matching("href", PDF_A4_RE.clone()),
    )?;
    Ok(page.url.join(require_attr(&a, "href")?)?)
}

fn archive_filename(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::StructureNotFound(format!("no file name in {url}")))
}
