use serde::{Deserialize, Serialize};

/// Metadata persisted for one paper inside a topic partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub pdf_url: String,
    /// Publication date as `YYYY-MM-DD`
    pub published: String,
}

/// One search hit from a paper index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperSummary {
    /// Short identifier including version, e.g. `2412.07992v3`
    pub id: String,
    pub record: PaperRecord,
}
