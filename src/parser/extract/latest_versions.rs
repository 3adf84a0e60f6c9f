use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::{Context, Results, Row};
use crate::error::{Result, ScrapeError};
use crate::fetcher::CachePolicy;
use crate::parser::locator::{find_all, find_tag, node_text, require_attr, TagQuery};

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Python (?P<version>\d\.\d+) \((?P<status>.*)\)").unwrap());

const ALL_VERSIONS: &str = "All versions";
const HEADER: [&str; 3] = ["Link", "Version", "Status"];

pub async fn run(ctx: &Context) -> Result<Option<Results>> {
    let Some(page) = ctx.fetcher.fetch(&ctx.docs_url, CachePolicy::Cached).await else {
        return Ok(None);
    };
    let rows = parse_sidebar(&page.body)?;
    Ok(Some(Results::with_header(&HEADER, rows)))
}

/// `(link, version, status)` for every anchor of the sidebar's version list.
pub fn parse_sidebar(html: &str) -> Result<Vec<Row>> {
    let doc = Html::parse_document(html);
    let sidebar = find_tag(
        doc.root_element(),
        &TagQuery::new("div").attr("class", "sphinxsidebarwrapper"),
    )?;

    let versions = find_all(sidebar, &TagQuery::new("ul"))
        .into_iter()
        .find(|ul| node_text(ul).contains(ALL_VERSIONS))
        .ok_or_else(|| {
            ScrapeError::StructureNotFound(format!("no sidebar list containing {ALL_VERSIONS:?}"))
        })?;

    find_all(versions, &TagQuery::new("a"))
        .into_iter()
        .map(|a| -> Result<Row> {
            let link = require_attr(&a, "href")?.to_string();
            let (version, status) = parse_version(&node_text(&a));
            Ok(vec![link, version, status])
        })
        .collect()
}

/// `"Python 3.10 (in development)"` → `("3.10", "in development")`; anything
/// else comes back whole with an empty status.
pub fn parse_version(text: &str) -> (String, String) {
    match VERSION_RE.captures(text) {
        Some(caps) => (caps["version"].to_string(), caps["status"].to_string()),
        None => (text.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use wiremock::MockServer;

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn version_with_status() {
        assert_eq!(parse_version("Python 3.10 (in development)"), pair("3.10", "in development"));
        assert_eq!(parse_version("Python 2.7 (EOL)"), pair("2.7", "EOL"));
    }

    #[test]
    fn version_without_status_falls_back_to_text() {
        assert_eq!(parse_version("Python 3.5"), pair("Python 3.5", ""));
        assert_eq!(parse_version("All versions"), pair("All versions", ""));
    }

    #[test]
    fn sidebar_picks_the_all_versions_list() {
        let rows = parse_sidebar(&fixture("docs_index.html")).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], vec!["https://docs.python.org/3.14/", "3.14", "in development"]);
        assert_eq!(rows[3], vec!["https://docs.python.org/2.7/", "2.7", "EOL"]);
        assert_eq!(rows[4], vec!["https://www.python.org/doc/versions/", "All versions", ""]);
    }

    #[test]
    fn missing_version_list_is_a_structure_error() {
        let html = r#"<div class="sphinxsidebarwrapper"><ul><li><a href="/">Home</a></li></ul></div>"#;
        assert!(matches!(parse_sidebar(html), Err(ScrapeError::StructureNotFound(_))));
    }

    #[test]
    fn missing_sidebar_is_tag_not_found() {
        assert!(matches!(
            parse_sidebar("<p>nothing here</p>"),
            Err(ScrapeError::TagNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn run_prefixes_header() {
        let server = MockServer::start().await;
        serve(&server, "/", fixture("docs_index.html")).await;
        let ctx = context(&server, "unused".into());

        let results = run(&ctx).await.unwrap().unwrap();
        assert_eq!(
            results.header,
            Some(vec!["Link".to_string(), "Version".into(), "Status".into()])
        );
        assert_eq!(results.rows.len(), 5);
        assert_eq!(results.rows[1][2], "stable");
    }
}
