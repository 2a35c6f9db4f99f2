//! # Record search
//! Relevance-scored search across normalized records. Pure: callers acquire
//! the records they want searched, this module only flattens and scores.
//!
//! Scoring blends query-token coverage with string similarity against the
//! document title, so both "hearing" and a near-miss like "herring" find
//! notice titles, with exact token hits ranked first.

use serde::Serialize;
use strsim::jaro_winkler;

use crate::model::{DataKind, NormalizedRecord, RecordBody};

/// Results below this relevance are dropped.
const MIN_RELEVANCE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub kind: DataKind,
    pub relevance: f64,
}

struct Doc {
    title: String,
    content: String,
    url: Option<String>,
    kind: DataKind,
}

pub fn search_records(
    records: &[NormalizedRecord],
    query: &str,
    limit: usize,
) -> Vec<SearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let tokens: Vec<&str> = query.split_whitespace().collect();

    let mut results: Vec<SearchResult> = records
        .iter()
        .flat_map(flatten)
        .filter_map(|doc| {
            let relevance = score(&doc, &query, &tokens);
            (relevance >= MIN_RELEVANCE).then_some(SearchResult {
                title: doc.title,
                content: doc.content,
                url: doc.url,
                kind: doc.kind,
                relevance,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}

fn flatten(record: &NormalizedRecord) -> Vec<Doc> {
    match &record.body {
        RecordBody::Statistics(stats) => vec![Doc {
            title: "Affordable housing statistics".to_string(),
            content: format!(
                "{} affordable units across {} projects; county funding ${:.1}M, federal funding ${:.1}M",
                stats.total_affordable_units,
                stats.total_projects,
                stats.county_funding_millions,
                stats.federal_funding_millions
            ),
            url: None,
            kind: DataKind::Statistics,
        }],
        RecordBody::IncomeLimits { rows } => rows
            .iter()
            .map(|row| Doc {
                title: format!(
                    "Income limits {}, {}-person household",
                    row.year, row.family_size
                ),
                content: format!(
                    "30% AMI {}; 50% AMI {}; 80% AMI {}; 120% AMI {}",
                    fmt_band(row.ami_30_percent),
                    fmt_band(row.ami_50_percent),
                    fmt_band(row.ami_80_percent),
                    fmt_band(row.ami_120_percent),
                ),
                url: None,
                kind: DataKind::IncomeLimits,
            })
            .collect(),
        RecordBody::Notices { notices } => notices
            .iter()
            .map(|notice| Doc {
                title: notice.title.clone(),
                content: notice
                    .summary
                    .clone()
                    .unwrap_or_else(|| notice.title.clone()),
                url: Some(notice.content_url.clone()),
                kind: DataKind::Notices,
            })
            .collect(),
        RecordBody::FundingDetails(funding) => vec![Doc {
            title: "Housing funding details".to_string(),
            content: format!(
                "county ${:.1}M, federal ${:.1}M{}",
                funding.county_funding_millions,
                funding.federal_funding_millions,
                funding
                    .description
                    .as_deref()
                    .map(|d| format!("; {d}"))
                    .unwrap_or_default()
            ),
            url: None,
            kind: DataKind::FundingDetails,
        }],
    }
}

fn score(doc: &Doc, query: &str, tokens: &[&str]) -> f64 {
    let title = doc.title.to_lowercase();
    let content = doc.content.to_lowercase();

    let hits = tokens
        .iter()
        .filter(|t| title.contains(**t) || content.contains(**t))
        .count();
    let coverage = hits as f64 / tokens.len() as f64;
    let similarity = jaro_winkler(query, &title);

    0.65 * coverage + 0.35 * similarity
}

fn fmt_band(band: Option<f64>) -> String {
    band.map(|v| format!("${v:.0}"))
        .unwrap_or_else(|| "n/a".to_string())
}
