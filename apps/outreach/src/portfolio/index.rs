//! Portfolio index: a persistent, similarity-searchable catalog of
//! (tech-stack description -> portfolio link) entries.
//!
//! Built once at startup from the catalog CSV. A build against an index that
//! already holds entries is a no-op, so the catalog is NOT re-synced when the
//! CSV changes; delete the snapshot file to rebuild.
//!
//! Queries take `&self` and never mutate, so the index can be shared across
//! concurrent requests behind an `Arc` once built.

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::portfolio::{CatalogRow, PortfolioEntry, PortfolioHit};
use crate::portfolio::embedder::{EmbedError, Embedder};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("similarity query text must not be empty")]
    EmptyQuery,

    #[error("Embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("Snapshot at {path} was built with embedder '{found}', current embedder is '{expected}'")]
    EmbedderMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Vector dimension mismatch: index holds {expected}D vectors, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedder returned {actual} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, actual: usize },

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    entry: PortfolioEntry,
    vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    embedder: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

/// Similarity lookup over the portfolio. Implemented by [`PortfolioIndex`];
/// callers depend on this trait so matching can be exercised without a snapshot.
#[async_trait]
pub trait PortfolioSearch: Send + Sync {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<PortfolioHit>, IndexError>;
}

pub struct PortfolioIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    entries: Vec<StoredEntry>,
    dimensions: Option<usize>,
    created_at: Option<DateTime<Utc>>,
}

impl PortfolioIndex {
    /// Opens the snapshot at `path`, or starts an empty index if none exists yet.
    pub fn open(path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let path = path.into();

        if !path.exists() {
            debug!("No portfolio snapshot at {}; starting empty", path.display());
            return Ok(Self {
                path,
                embedder,
                entries: Vec::new(),
                dimensions: None,
                created_at: None,
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;

        let expected = embedder.id();
        if snapshot.embedder != expected {
            return Err(IndexError::EmbedderMismatch {
                path: path.display().to_string(),
                expected,
                found: snapshot.embedder,
            });
        }

        info!(
            "Loaded portfolio snapshot with {} entries from {}",
            snapshot.entries.len(),
            path.display()
        );

        Ok(Self {
            path,
            embedder,
            entries: snapshot.entries,
            dimensions: Some(snapshot.dimensions),
            created_at: Some(snapshot.created_at),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PortfolioEntry> {
        self.entries.iter().map(|s| &s.entry)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Inserts one entry per catalog row and persists the snapshot, but only when
    /// the index is empty. Returns the number of entries inserted.
    pub async fn build(&mut self, rows: &[CatalogRow]) -> Result<usize, IndexError> {
        if !self.is_empty() {
            info!(
                "Portfolio index already holds {} entries; skipping build",
                self.len()
            );
            return Ok(0);
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = rows.iter().map(|r| r.description.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != rows.len() {
            return Err(IndexError::VectorCountMismatch {
                expected: rows.len(),
                actual: vectors.len(),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let entries: Vec<StoredEntry> = rows
            .iter()
            .zip(vectors)
            .map(|(row, vector)| StoredEntry {
                entry: PortfolioEntry {
                    id: Uuid::new_v4().to_string(),
                    description: row.description.clone(),
                    link: row.link.clone(),
                },
                vector,
            })
            .collect();

        let snapshot = Snapshot {
            embedder: self.embedder.id(),
            dimensions,
            created_at: Utc::now(),
            entries,
        };
        write_snapshot(&self.path, &snapshot)?;

        let inserted = snapshot.entries.len();
        self.entries = snapshot.entries;
        self.dimensions = Some(dimensions);
        self.created_at = Some(snapshot.created_at);

        info!(
            "Built portfolio index with {} entries at {}",
            inserted,
            self.path.display()
        );
        Ok(inserted)
    }

    /// Returns up to `k` entries most similar to `text`, best first. Ties keep
    /// insertion order. Empty `text` is rejected before anything is embedded.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<PortfolioHit>, IndexError> {
        if text.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let query = vectors.pop().ok_or(IndexError::VectorCountMismatch {
            expected: 1,
            actual: 0,
        })?;

        if let Some(expected) = self.dimensions {
            if query.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut hits: Vec<PortfolioHit> = self
            .entries
            .iter()
            .map(|stored| PortfolioHit {
                id: stored.entry.id.clone(),
                link: stored.entry.link.clone(),
                score: cosine_similarity(&query, &stored.vector),
            })
            .collect();

        // Stable sort: equal scores stay in insertion order.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl PortfolioSearch for PortfolioIndex {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<PortfolioHit>, IndexError> {
        PortfolioIndex::query(self, text, k).await
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Writes the snapshot to a temp file beside `path`, then renames it into place.
fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), IndexError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer(&mut tmp, snapshot)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::portfolio::embedder::tests::minilm_paths;
    use crate::portfolio::embedder::{OnnxEmbedder, MINILM_MODEL_NAME};

    /// Two-topic embedder: technology vocabulary on axis 0, art vocabulary on axis 1.
    struct TopicEmbedder {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl TopicEmbedder {
        fn new() -> Self {
            Self::named("topic-test")
        }

        fn named(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicUsize::new(0),
            }
        }
    }

    const TECH: &[&str] = &[
        "backend", "engineer", "distributed", "systems", "python", "django", "postgresql",
        "api", "apis",
    ];
    const ART: &[&str] = &["watercolor", "painting", "canvas"];

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn id(&self) -> String {
            self.name.to_string()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32, 0.0];
                    for word in t
                        .split(|c: char| !c.is_alphanumeric())
                        .map(str::to_lowercase)
                    {
                        if TECH.contains(&word.as_str()) {
                            v[0] += 1.0;
                        } else if ART.contains(&word.as_str()) {
                            v[1] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn row(description: &str, link: &str) -> CatalogRow {
        CatalogRow {
            description: description.to_string(),
            link: link.to_string(),
        }
    }

    fn catalog() -> Vec<CatalogRow> {
        vec![
            row("Python, Django, PostgreSQL", "https://x/1"),
            row("watercolor painting", "https://x/2"),
        ]
    }

    #[tokio::test]
    async fn test_related_entry_ranks_above_unrelated() {
        let dir = TempDir::new().unwrap();
        let mut index =
            PortfolioIndex::open(dir.path().join("p.json"), Arc::new(TopicEmbedder::new()))
                .unwrap();
        index.build(&catalog()).await.unwrap();

        let hits = index
            .query("Backend Engineer distributed systems", 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://x/1");
        assert_eq!(hits[1].link, "https://x/2");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    #[ignore] // Needs the all-MiniLM-L6-v2 ONNX export under MINILM_DIR
    async fn test_minilm_ranks_related_entry_first() {
        let (model, tokenizer) = minilm_paths();
        let embedder = OnnxEmbedder::new(MINILM_MODEL_NAME, &model, &tokenizer).unwrap();
        let dir = TempDir::new().unwrap();
        let mut index = PortfolioIndex::open(dir.path().join("p.json"), Arc::new(embedder)).unwrap();
        // Unrelated entry first so insertion order cannot decide the ranking.
        index
            .build(&[
                row("watercolor painting", "https://x/2"),
                row("Python, Django, PostgreSQL", "https://x/1"),
            ])
            .await
            .unwrap();

        let hits = index
            .query("Backend Engineer distributed systems", 2)
            .await
            .unwrap();

        assert_eq!(hits[0].link, "https://x/1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_build_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        let embedder: Arc<dyn Embedder> = Arc::new(TopicEmbedder::new());

        let mut index = PortfolioIndex::open(&path, embedder.clone()).unwrap();
        assert_eq!(index.build(&catalog()).await.unwrap(), 2);
        let count_after_first = index.len();

        assert_eq!(index.build(&catalog()).await.unwrap(), 0);
        assert_eq!(index.len(), count_after_first);

        // Reopening from disk and building again is also a no-op.
        let mut reopened = PortfolioIndex::open(&path, embedder).unwrap();
        assert_eq!(reopened.len(), count_after_first);
        assert_eq!(reopened.build(&catalog()).await.unwrap(), 0);
        assert_eq!(reopened.len(), count_after_first);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_ids_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("p.json");
        let embedder: Arc<dyn Embedder> = Arc::new(TopicEmbedder::new());

        let mut index = PortfolioIndex::open(&path, embedder.clone()).unwrap();
        index.build(&catalog()).await.unwrap();
        let before: Vec<PortfolioEntry> = index.entries().cloned().collect();

        let reopened = PortfolioIndex::open(&path, embedder).unwrap();
        let after: Vec<PortfolioEntry> = reopened.entries().cloned().collect();

        assert_eq!(before, after);
        assert_ne!(after[0].id, after[1].id);
        assert!(reopened.created_at().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_from_other_embedder_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");

        let mut index = PortfolioIndex::open(&path, Arc::new(TopicEmbedder::new())).unwrap();
        index.build(&catalog()).await.unwrap();

        let result = PortfolioIndex::open(&path, Arc::new(TopicEmbedder::named("other-test")));
        assert!(matches!(result, Err(IndexError::EmbedderMismatch { .. })));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_without_embedding() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(TopicEmbedder::new());
        let mut index = PortfolioIndex::open(dir.path().join("p.json"), embedder.clone()).unwrap();
        index.build(&catalog()).await.unwrap();
        let calls_after_build = embedder.calls.load(AtomicOrdering::SeqCst);

        let err = index.query("   ", 2).await.unwrap_err();

        assert!(matches!(err, IndexError::EmptyQuery));
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), calls_after_build);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut index =
            PortfolioIndex::open(dir.path().join("p.json"), Arc::new(TopicEmbedder::new()))
                .unwrap();
        index
            .build(&[
                row("Python", "https://first"),
                row("Django", "https://second"),
                row("PostgreSQL", "https://third"),
            ])
            .await
            .unwrap();

        let hits = index.query("backend", 3).await.unwrap();
        let links: Vec<&str> = hits.iter().map(|h| h.link.as_str()).collect();

        assert_eq!(links, vec!["https://first", "https://second", "https://third"]);
    }

    #[tokio::test]
    async fn test_query_on_empty_index_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let index =
            PortfolioIndex::open(dir.path().join("p.json"), Arc::new(TopicEmbedder::new()))
                .unwrap();

        assert!(index.query("python", 2).await.unwrap().is_empty());
    }

    #[test]
    fn test_cosine_similarity_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
