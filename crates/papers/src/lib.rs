//! Paper index access and the on-disk paper store
//!
//! - `PaperIndex` abstracts the remote search index, `ArxivClient` implements it
//! - `PaperStore` keeps one JSON partition per topic under a root directory

mod arxiv;
mod record;
mod store;


pub use arxiv::{parse_atom_feed, ArxivClient};
pub use record::{PaperRecord, PaperSummary};
pub use store::{topic_dir_name, PaperStore, Partition, PARTITION_FILE_NAME};

use anyhow::Result;
use async_trait::async_trait;

/// A searchable source of paper metadata
#[async_trait]
pub trait PaperIndex: Send + Sync {
    /// Search by topic, returning at most `max_results` papers in relevance order
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<PaperSummary>>;
}
