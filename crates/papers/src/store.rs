use crate::{PaperRecord, PaperSummary};
use anyhow::{Context, Result};
use fs2::FileExt;
use indexmap::IndexMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File holding the records of one topic partition
pub const PARTITION_FILE_NAME: &str = "papers_info.json";

/// Records of one topic keyed by paper id, in insertion order
pub type Partition = IndexMap<String, PaperRecord>;

/// Directory name for a topic: lower-cased, spaces and slashes become underscores
pub fn topic_dir_name(topic: &str) -> String {
    topic.to_lowercase().replace([' ', '/'], "_")
}

/// Flat-file paper store with one JSON partition per topic directory
#[derive(Debug, Clone)]
pub struct PaperStore {
    root_dir: PathBuf,
}

impl PaperStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root_dir.join(topic_dir_name(topic))
    }

    pub fn partition_path(&self, topic: &str) -> PathBuf {
        self.topic_dir(topic).join(PARTITION_FILE_NAME)
    }

    /// Read a topic partition. Missing or corrupt files yield an empty mapping.
    pub fn load_partition(&self, topic: &str) -> Result<Partition> {
        read_partition(&self.partition_path(topic))
    }

    /// Merge search hits into the topic partition, overwriting entries with the same id.
    ///
    /// The whole read-modify-write cycle runs under an exclusive lock on the
    /// partition file so concurrent sessions cannot drop each other's results.
    pub fn merge(&self, topic: &str, papers: &[PaperSummary]) -> Result<PathBuf> {
        let topic_dir = self.topic_dir(topic);
        fs::create_dir_all(&topic_dir)
            .with_context(|| format!("Failed to create {}", topic_dir.display()))?;

        let path = topic_dir.join(PARTITION_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Failed to lock {}", path.display()))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut partition = parse_partition(&content, &path);

        for paper in papers {
            debug!("Adding paper {} - {}", paper.id, paper.record.title);
            partition.insert(paper.id.clone(), paper.record.clone());
        }

        let json = serde_json::to_string_pretty(&partition)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        file.flush()?;

        Ok(path)
    }

    /// Look for a paper id in every partition under the root directory.
    /// Returns the first match together with the partition file it came from.
    pub fn find(&self, paper_id: &str) -> Result<Option<(PathBuf, PaperRecord)>> {
        if !self.root_dir.exists() {
            warn!("Paper directory {} does not exist", self.root_dir.display());
            return Ok(None);
        }

        let mut topic_dirs: Vec<PathBuf> = fs::read_dir(&self.root_dir)
            .with_context(|| format!("Failed to list {}", self.root_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        topic_dirs.sort();

        for dir in topic_dirs {
            let path = dir.join(PARTITION_FILE_NAME);
            if !path.is_file() {
                continue;
            }
            match read_partition(&path) {
                Ok(mut partition) => {
                    if let Some(record) = partition.shift_remove(paper_id) {
                        debug!("Found paper {} in {}", paper_id, path.display());
                        return Ok(Some((path, record)));
                    }
                }
                Err(e) => {
                    warn!("Error reading {}: {}", path.display(), e);
                    continue;
                }
            }
        }

        Ok(None)
    }
}

fn read_partition(path: &Path) -> Result<Partition> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Partition::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };
    FileExt::lock_shared(&file).with_context(|| format!("Failed to lock {}", path.display()))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_partition(&content, path))
}

/// Undecodable bytes, including invalid UTF-8, count as an empty partition
fn parse_partition(content: &[u8], path: &Path) -> Partition {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Partition::new();
    }
    serde_json::from_slice(content).unwrap_or_else(|e| {
        warn!("Ignoring corrupt partition {}: {}", path.display(), e);
        Partition::new()
    })
}
