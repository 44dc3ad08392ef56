//! In-memory catalog of title records with binary persistence.
//!
//! The store keeps records in their original build order (filters and
//! tie-breaks downstream rely on that ordering being stable) plus an id map
//! for O(1) lookup after ranking. It is built once offline and read-only at
//! query time, so sharing across request threads needs no locking.

pub mod ingest;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::TitleRecord;

/// On-disk shape of the catalog blob (MessagePack). The embedder identity
/// travels with the records so a load against the wrong embedding space
/// fails loudly instead of producing garbage similarities.
#[derive(Serialize, Deserialize)]
struct CatalogFile {
    embedder_id: String,
    dimension: u32,
    records: Vec<TitleRecord>,
}

pub fn catalog_path(data_dir: &Path, embedder_id: &str) -> PathBuf {
    data_dir.join(format!("catalog-{embedder_id}.bin"))
}

pub struct CatalogStore {
    embedder_id: String,
    dimension: usize,
    records: Vec<TitleRecord>,
    by_id: HashMap<String, usize>,
}

impl CatalogStore {
    /// Build a store from records carrying embeddings of the given space.
    pub fn new(
        embedder_id: impl Into<String>,
        dimension: usize,
        records: Vec<TitleRecord>,
    ) -> Result<Self> {
        if dimension == 0 {
            bail!("dimension must be non-zero");
        }
        let mut by_id = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if record.embedding.len() != dimension {
                bail!(
                    "record {:?} embedding dimension mismatch: expected {dimension}, got {}",
                    record.id,
                    record.embedding.len()
                );
            }
            if by_id.insert(record.id.clone(), pos).is_some() {
                bail!("duplicate record id in catalog: {:?}", record.id);
            }
        }
        Ok(Self {
            embedder_id: embedder_id.into(),
            dimension,
            records,
            by_id,
        })
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in stable original order.
    pub fn records(&self) -> &[TitleRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&TitleRecord> {
        self.by_id.get(id).map(|pos| &self.records[*pos])
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create catalog directory {parent:?}"))?;

        let temp_path = path.with_extension("bin.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("create temp catalog file {temp_path:?}"))?;
        let mut writer = BufWriter::new(file);
        let blob = CatalogFile {
            embedder_id: self.embedder_id.clone(),
            dimension: self.dimension as u32,
            records: self.records.clone(),
        };
        rmp_serde::encode::write(&mut writer, &blob).context("encode catalog blob")?;
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush catalog blob: {e}"))?
            .sync_all()
            .context("fsync catalog temp file")?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("rename catalog temp file {temp_path:?}"))?;
        tracing::info!(?path, count = self.len(), "saved catalog");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open catalog file {path:?}"))?;
        let blob: CatalogFile =
            rmp_serde::decode::from_read(BufReader::new(file)).context("decode catalog blob")?;
        Self::new(blob.embedder_id, blob.dimension as usize, blob.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TitleKind;
    use tempfile::tempdir;

    fn record(id: &str, embedding: Vec<f32>) -> TitleRecord {
        TitleRecord {
            id: id.to_string(),
            title: format!("title {id}"),
            kind: TitleKind::Movie,
            director: "Unknown".into(),
            cast: String::new(),
            country: String::new(),
            release_year: Some(2020),
            rating: "PG".into(),
            duration_minutes: 90.0,
            listed_in: "Dramas".into(),
            description: String::new(),
            embedding,
        }
    }

    #[test]
    fn lookup_by_id_after_build() {
        let store = CatalogStore::new(
            "fnv1a-384",
            2,
            vec![record("s1", vec![1.0, 0.0]), record("s2", vec![0.0, 1.0])],
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("s2").unwrap().id, "s2");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn mismatched_embedding_dimension_is_rejected() {
        let err = CatalogStore::new("fnv1a-384", 3, vec![record("s1", vec![1.0, 0.0])]);
        assert!(err.is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = CatalogStore::new(
            "fnv1a-384",
            1,
            vec![record("dup", vec![1.0]), record("dup", vec![0.0])],
        );
        assert!(err.is_err());
    }

    #[test]
    fn save_load_round_trip_preserves_records_and_order() {
        let dir = tempdir().unwrap();
        let path = catalog_path(dir.path(), "fnv1a-384");
        let store = CatalogStore::new(
            "fnv1a-384",
            2,
            vec![record("s1", vec![1.0, 0.0]), record("s2", vec![0.6, 0.8])],
        )
        .unwrap();
        store.save(&path).unwrap();

        let loaded = CatalogStore::load(&path).unwrap();
        assert_eq!(loaded.embedder_id(), "fnv1a-384");
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records()[1].embedding, vec![0.6, 0.8]);
        assert_eq!(loaded.records()[0].id, "s1");
    }
}
