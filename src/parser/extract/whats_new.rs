use scraper::Html;
use tracing::info;
use url::Url;

use super::{fetch_detail, progress_bar, Context, FailurePolicy, Results};
use crate::error::Result;
use crate::fetcher::{CachePolicy, Page};
use crate::parser::locator::{find_all, find_tag, node_text, require_attr, TagQuery};

const WHATS_NEW_PATH: &str = "whatsnew/";
const HEADER: [&str; 3] = ["Link", "Title", "Editor/Author"];

/// One row per "What's New" article: link, heading, editor/author block.
///
/// Articles whose page cannot be fetched are left out; a page missing its
/// heading or field list fails the run.
pub async fn run(ctx: &Context) -> Result<Option<Results>> {
    let index_url = ctx.docs_url.join(WHATS_NEW_PATH)?;
    let Some(index) = ctx.fetcher.fetch(&index_url, CachePolicy::Cached).await else {
        return Ok(None);
    };

    let links = parse_index(&index)?;
    info!(articles = links.len(), "Found What's New articles");

    let pb = progress_bar(links.len());
    let mut rows = Vec::with_capacity(links.len());
    for link in links {
        pb.inc(1);
        let Some(page) = fetch_detail(&ctx.fetcher, &link, FailurePolicy::Skip).await? else {
            continue;
        };
        let (title, authors) = parse_article(&page.body)?;
        rows.push(vec![link.to_string(), title, authors]);
    }
    pb.finish_and_clear();

    Ok(Some(Results::with_header(&HEADER, rows)))
}

/// Absolute URLs of the top-level toctree entries on the index page.
pub fn parse_index(page: &Page) -> Result<Vec<Url>> {
    let doc = Html::parse_document(&page.body);
    let section = find_tag(
        doc.root_element(),
        &TagQuery::new("section").attr("id", "what-s-new-in-python"),
    )?;
    let wrapper = find_tag(section, &TagQuery::new("div").attr("class", "toctree-wrapper"))?;

    find_all(wrapper, &TagQuery::new("li").attr("class", "toctree-l1"))
        .into_iter()
        .map(|li| -> Result<Url> {
            let a = find_tag(li, &TagQuery::new("a"))?;
            Ok(page.url.join(require_attr(&a, "href")?)?)
        })
        .collect()
}

/// `(h1 text, first <dl> text)` of an article, newlines in the list flattened.
pub fn parse_article(html: &str) -> Result<(String, String)> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    let h1 = find_tag(root, &TagQuery::new("h1"))?;
    let dl = find_tag(root, &TagQuery::new("dl"))?;
    Ok((node_text(&h1), node_text(&dl).replace('\n', " ")))
}
