use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::{info, warn};
use url::Url;

use super::{fetch_detail, progress_bar, Context, FailurePolicy, Results, Row};
use crate::error::{Result, ScrapeError};
use crate::fetcher::CachePolicy;
use crate::parser::locator::{find_all, find_optional, find_tag, node_text, require_attr, TagQuery};

static PEP_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pep.+").unwrap());

/// Status letters counted on every run, in output order.
pub const STATUS_CODES: [char; 7] = ['A', 'D', 'F', 'P', 'R', 'S', 'W'];
pub const AMOUNT_KEY: &str = "Amount";

// ── Index ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PepRecord {
    pub link: String,
    pub index_status: Option<char>,
}

/// PEP links in document order. Re-inserting a link replaces its status but
/// keeps its original position.
#[derive(Debug, Default)]
pub struct PepIndex {
    records: Vec<PepRecord>,
    positions: HashMap<String, usize>,
}

impl PepIndex {
    pub fn insert(&mut self, link: String, index_status: Option<char>) {
        match self.positions.get(&link) {
            Some(&i) => self.records[i].index_status = index_status,
            None => {
                self.positions.insert(link.clone(), self.records.len());
                self.records.push(PepRecord { link, index_status });
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PepRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build the link → listed status index from every `pep*` table on the page.
///
/// The abbreviation cell shows a type letter followed by a status letter
/// (`SA`, `IF`, ...); only the trailing status letter is kept. A missing or
/// single-letter abbreviation means the index gives no status.
pub fn parse_index(html: &str) -> Result<PepIndex> {
    let doc = Html::parse_document(html);
    let tables = find_all(
        doc.root_element(),
        &TagQuery::new("table").attr_matching("class", PEP_TABLE_RE.clone()),
    );

    let mut index = PepIndex::default();
    for table in tables {
        let tbody = find_tag(table, &TagQuery::new("tbody"))?;
        for tr in find_all(tbody, &TagQuery::new("tr")) {
            let index_status = find_optional(tr, &TagQuery::new("abbr"))
                .map(|abbr| node_text(&abbr))
                .filter(|text| text.chars().count() > 1)
                .and_then(|text| text.chars().last());
            let a = find_tag(tr, &TagQuery::new("a"))?;
            index.insert(require_attr(&a, "href")?.to_string(), index_status);
        }
    }
    Ok(index)
}

/// First letter of the first abbreviation on a PEP page (`Active` → `A`).
pub fn parse_detail_status(html: &str, url: &Url) -> Result<char> {
    let doc = Html::parse_document(html);
    let abbr = find_tag(doc.root_element(), &TagQuery::new("abbr"))?;
    node_text(&abbr)
        .chars()
        .next()
        .ok_or_else(|| ScrapeError::EmptyStatus(url.to_string()))
}

// ── Tally ──

/// Counts per status letter plus the derived `Amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(char, usize)>,
    amount: usize,
}

impl Default for Tally {
    fn default() -> Self {
        Tally {
            counts: STATUS_CODES.iter().map(|&c| (c, 0)).collect(),
            amount: 0,
        }
    }
}

impl Tally {
    pub fn add(&mut self, status: char) {
        match self.counts.iter_mut().find(|(c, _)| *c == status) {
            Some((_, n)) => *n += 1,
            None => {
                warn!(%status, "Unexpected PEP status letter");
                self.counts.push((status, 1));
            }
        }
    }

    /// Recompute `Amount` from the per-status counts.
    pub fn finish(&mut self) {
        self.amount = self.counts.iter().map(|&(_, n)| n).sum();
    }

    pub fn amount(&self) -> usize {
        self.amount
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.counts
            .into_iter()
            .map(|(c, n)| vec![c.to_string(), n.to_string()])
            .chain(std::iter::once(vec![AMOUNT_KEY.to_string(), self.amount.to_string()]))
            .collect()
    }
}

// ── Reconciliation ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub url: Url,
    pub index_status: char,
    pub detail_status: char,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status mismatch: index lists *{}*, PEP page says *{}*, PEP: {}",
            self.index_status, self.detail_status, self.url
        )
    }
}

#[derive(Debug)]
pub struct Reconciliation {
    pub tally: Tally,
    pub mismatches: Vec<Mismatch>,
}

/// Compares listed statuses with the ones found on the PEP pages. The page
/// always wins: its status is what gets counted.
#[derive(Debug, Default)]
pub struct Reconciler {
    tally: Tally,
    mismatches: Vec<Mismatch>,
}

impl Reconciler {
    pub fn record(&mut self, index_status: Option<char>, detail_status: char, url: &Url) {
        if let Some(listed) = index_status {
            if listed != detail_status {
                let mismatch = Mismatch {
                    url: url.clone(),
                    index_status: listed,
                    detail_status,
                };
                info!("{}", mismatch);
                self.mismatches.push(mismatch);
            }
        }
        self.tally.add(detail_status);
    }

    pub fn finish(mut self) -> Reconciliation {
        self.tally.finish();
        Reconciliation {
            tally: self.tally,
            mismatches: self.mismatches,
        }
    }
}

/// Status counts over every PEP in the index, as `(status, count)` rows
/// ending with `Amount`. Any PEP page that is unavailable or lacks its status
/// abbreviation aborts the run: a partial tally is never emitted.
pub async fn run(ctx: &Context) -> Result<Option<Results>> {
    let Some(page) = ctx.fetcher.fetch(&ctx.pep_url, CachePolicy::Cached).await else {
        return Ok(None);
    };
    let index = parse_index(&page.body)?;
    if index.is_empty() {
        warn!(url = %ctx.pep_url, "PEP index lists no PEPs");
    }
    info!(peps = index.len(), "Parsed PEP index");

    let Reconciliation { tally, mismatches } = reconcile(ctx, &index).await?;
    info!(total = tally.amount(), mismatches = mismatches.len(), "PEP statuses reconciled");
    Ok(Some(Results::without_header(tally.into_rows())))
}

/// Fetches every PEP page of `index` and checks its status against the listing.
pub async fn reconcile(ctx: &Context, index: &PepIndex) -> Result<Reconciliation> {
    let pb = progress_bar(index.len());
    let mut reconciler = Reconciler::default();
    for record in index.iter() {
        pb.inc(1);
        let url = ctx.pep_url.join(&record.link)?;
        let Some(detail) = fetch_detail(&ctx.fetcher, &url, FailurePolicy::Abort).await? else {
            return Err(ScrapeError::Unavailable(url.to_string()));
        };
        let detail_status = parse_detail_status(&detail.body, &url)?;
        reconciler.record(record.index_status, detail_status, &url);
    }
    pb.finish_and_clear();
    Ok(reconciler.finish())
}
