use crate::{PaperIndex, PaperRecord, PaperSummary};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Client for the arXiv Atom query API
pub struct ArxivClient {
    http_client: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn default_base_url() -> String {
        "http://export.arxiv.org/api/query".to_string()
    }

    pub fn new(base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl PaperIndex for ArxivClient {
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<PaperSummary>> {
        debug!("Querying arXiv for '{}' (max_results: {})", topic, max_results);

        let max_results = max_results.to_string();
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("search_query", topic),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .context("Failed to reach the arXiv API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read arXiv response")?;
        if !status.is_success() {
            return Err(anyhow!("arXiv API returned {status}: {body}"));
        }

        parse_atom_feed(&body)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{css}': {e:?}"))
}

fn first_text(element: &ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>())
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn an entry URL like `http://arxiv.org/abs/2412.07992v3` into `2412.07992v3`
fn short_id(entry_id: &str) -> String {
    entry_id
        .trim()
        .rsplit("arxiv.org/abs/")
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Parse an arXiv Atom feed into search hits, keeping feed order
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperSummary>> {
    let document = Html::parse_document(xml);

    let entry_selector = selector("entry")?;
    let id_selector = selector("id")?;
    let title_selector = selector("title")?;
    let summary_selector = selector("summary")?;
    let author_selector = selector("author > name")?;
    let link_selector = selector("link")?;
    let published_selector = selector("published")?;

    let mut papers = Vec::new();
    for entry in document.select(&entry_selector) {
        let entry_id = first_text(&entry, &id_selector);

        // The API reports malformed queries as a single pseudo-entry
        if entry_id.contains("/api/errors") {
            let message = collapse_whitespace(&first_text(&entry, &summary_selector));
            return Err(anyhow!("arXiv API error: {message}"));
        }

        let pdf_url = entry
            .select(&link_selector)
            .find(|link| link.value().attr("title") == Some("pdf"))
            .and_then(|link| link.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let published = first_text(&entry, &published_selector);
        let published = published.trim().chars().take(10).collect::<String>();

        papers.push(PaperSummary {
            id: short_id(&entry_id),
            record: PaperRecord {
                title: collapse_whitespace(&first_text(&entry, &title_selector)),
                authors: entry
                    .select(&author_selector)
                    .map(|name| name.text().collect::<String>().trim().to_string())
                    .collect(),
                summary: first_text(&entry, &summary_selector).trim().to_string(),
                pdf_url,
                published,
            },
        });
    }

    Ok(papers)
}
