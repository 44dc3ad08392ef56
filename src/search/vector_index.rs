//! TVIX (title vector index) binary format and exact inner-product search.
//!
//! Format overview (little-endian):
//!
//! Header (variable size):
//!   Magic: "TVIX" (4 bytes)
//!   Version: u16
//!   EmbedderID length: u16
//!   EmbedderID: bytes
//!   Dimension: u32
//!   Count: u32
//!   HeaderCRC32: u32 (CRC32 of header bytes before this field)
//!
//! ID table (variable size):
//!   Count × (u16 length + UTF-8 record id)
//!
//! Vector slab:
//!   Count × Dimension × 4 bytes, contiguous f32, slot order.
//!
//! Slot i of the slab belongs to the i-th id in the table, so positions map
//! bijectively onto record identifiers. Vectors are stored unit-normalized,
//! making the dot product below a cosine similarity. Search is an exact
//! full scan with a bounded heap, which at catalog scale (tens of
//! thousands of rows) is well under a millisecond.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use memmap2::Mmap;

pub const TVIX_MAGIC: [u8; 4] = *b"TVIX";
pub const TVIX_VERSION: u16 = 1;

pub fn index_path(data_dir: &Path, embedder_id: &str) -> PathBuf {
    data_dir.join(format!("index-{embedder_id}.tvix"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvixHeader {
    pub version: u16,
    pub embedder_id: String,
    pub dimension: u32,
    pub count: u32,
}

impl TvixHeader {
    pub fn new(embedder_id: impl Into<String>, dimension: u32, count: u32) -> Result<Self> {
        let header = Self {
            version: TVIX_VERSION,
            embedder_id: embedder_id.into(),
            dimension,
            count,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedder_id.len() > u16::MAX as usize {
            bail!("embedder_id is too long: {}", self.embedder_id.len());
        }
        if self.dimension == 0 {
            bail!("dimension must be non-zero");
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.validate()?;
        let mut buf = Vec::new();

        buf.extend_from_slice(&TVIX_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());

        let id_bytes = self.embedder_id.as_bytes();
        let id_len =
            u16::try_from(id_bytes.len()).map_err(|_| anyhow!("embedder_id length out of range"))?;
        buf.extend_from_slice(&id_len.to_le_bytes());
        buf.extend_from_slice(id_bytes);

        buf.extend_from_slice(&self.dimension.to_le_bytes());
        buf.extend_from_slice(&self.count.to_le_bytes());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();

        writer.write_all(&buf)?;
        writer.write_all(&crc.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut header_bytes = Vec::new();

        let magic =
            read_exact_array::<4, _>(&mut reader, &mut header_bytes).context("read TVIX magic")?;
        if magic != TVIX_MAGIC {
            bail!("invalid TVIX magic: {magic:?}");
        }

        let version = read_u16_le(&mut reader, &mut header_bytes).context("read TVIX version")?;
        if version != TVIX_VERSION {
            bail!("unsupported TVIX version: {version}");
        }

        let id_len =
            read_u16_le(&mut reader, &mut header_bytes).context("read embedder id length")? as usize;
        let id_bytes =
            read_exact_vec(&mut reader, id_len, &mut header_bytes).context("read embedder id")?;
        let embedder_id = String::from_utf8(id_bytes).context("embedder id is not valid UTF-8")?;

        let dimension = read_u32_le(&mut reader, &mut header_bytes).context("read dimension")?;
        let count = read_u32_le(&mut reader, &mut header_bytes).context("read count")?;

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes).context("read header crc")?;
        let crc_expected = u32::from_le_bytes(crc_bytes);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes);
        let crc_actual = hasher.finalize();
        if crc_actual != crc_expected {
            bail!("header CRC mismatch (expected {crc_expected:#010x}, got {crc_actual:#010x})");
        }

        let header = Self {
            version,
            embedder_id,
            dimension,
            count,
        };
        header.validate()?;
        Ok(header)
    }
}

/// One nearest-neighbor result: positional slot plus similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub slot: usize,
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    header: TvixHeader,
    ids: Vec<String>,
    // Contiguous slab, slot-major: slot i occupies [i*dim, (i+1)*dim).
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from (record id, unit-normalized vector) pairs in
    /// catalog order. Duplicate ids and dimension disagreements are build
    /// errors, never silently dropped.
    pub fn from_embeddings<I>(embedder_id: &str, dimension: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        if dimension == 0 {
            bail!("dimension must be non-zero");
        }
        let dimension_u32 =
            u32::try_from(dimension).map_err(|_| anyhow!("dimension out of range"))?;

        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        let mut seen = HashSet::new();
        for (id, vector) in entries {
            if vector.len() != dimension {
                bail!(
                    "vector dimension mismatch for {id:?}: expected {dimension}, got {}",
                    vector.len()
                );
            }
            if !seen.insert(id.clone()) {
                bail!("duplicate record id in index: {id:?}");
            }
            ids.push(id);
            vectors.extend_from_slice(&vector);
        }

        let count = u32::try_from(ids.len()).map_err(|_| anyhow!("entry count out of range"))?;
        let header = TvixHeader::new(embedder_id, dimension_u32, count)?;
        Ok(Self {
            header,
            ids,
            vectors,
        })
    }

    pub fn header(&self) -> &TvixHeader {
        &self.header
    }

    pub fn dimension(&self) -> usize {
        self.header.dimension as usize
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record id owning the given slot.
    pub fn id_at(&self, slot: usize) -> Result<&str> {
        self.ids
            .get(slot)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("slot {slot} out of bounds"))
    }

    pub fn vector_at(&self, slot: usize) -> Result<&[f32]> {
        let dim = self.dimension();
        let start = slot
            .checked_mul(dim)
            .ok_or_else(|| anyhow!("vector slice overflow"))?;
        self.vectors
            .get(start..start + dim)
            .ok_or_else(|| anyhow!("slot {slot} out of bounds"))
    }

    /// Exact top-k inner-product search over every slot. Results come back
    /// sorted by descending score; ties break toward the lower slot, which
    /// is catalog insertion order.
    pub fn search_top_k(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dimension() {
            bail!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension(),
                query.len()
            );
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        for slot in 0..self.len() {
            let score = dot_product(self.vector_at(slot)?, query);
            heap.push(std::cmp::Reverse(ScoredSlot { score, slot }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut results: Vec<IndexHit> = heap
            .into_iter()
            .map(|entry| IndexHit {
                slot: entry.0.slot,
                score: entry.0.score,
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.slot.cmp(&b.slot))
        });
        Ok(results)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create index directory {parent:?}"))?;

        let temp_path = path.with_extension("tvix.tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("create temp TVIX file {temp_path:?}"))?;
        self.write_to(&mut file)?;
        file.sync_all().context("fsync TVIX temp file")?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("rename TVIX temp file {temp_path:?}"))?;
        tracing::info!(?path, count = self.len(), "saved vector index");
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.header.write_to(&mut writer)?;

        for id in &self.ids {
            let id_bytes = id.as_bytes();
            let id_len = u16::try_from(id_bytes.len())
                .map_err(|_| anyhow!("record id too long: {id:?}"))?;
            writer.write_all(&id_len.to_le_bytes())?;
            writer.write_all(id_bytes)?;
        }

        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open TVIX file {path:?}"))?;
        let metadata = file.metadata().context("read TVIX metadata")?;
        if metadata.len() == 0 {
            bail!("TVIX file is empty");
        }

        let mmap = unsafe { Mmap::map(&file).context("mmap TVIX file")? };
        let mut cursor = Cursor::new(&mmap[..]);
        let header = TvixHeader::read_from(&mut cursor).context("read TVIX header")?;

        let count = header.count as usize;
        let dimension = header.dimension as usize;

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let mut len_bytes = [0u8; 2];
            cursor.read_exact(&mut len_bytes).context("read id length")?;
            let mut id_bytes = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
            cursor.read_exact(&mut id_bytes).context("read record id")?;
            ids.push(String::from_utf8(id_bytes).context("record id is not valid UTF-8")?);
        }

        let slab_offset = cursor.position() as usize;
        let slab_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| anyhow!("vector slab size overflow"))?;
        let remaining = mmap.len() - slab_offset;
        if remaining != slab_len {
            bail!("TVIX slab size mismatch (expected {slab_len}, got {remaining})");
        }

        let slab_bytes = &mmap[slab_offset..];
        let mut vectors = Vec::with_capacity(count * dimension);
        for chunk in slab_bytes.chunks_exact(4) {
            vectors.push(f32::from_le_bytes(chunk.try_into()?));
        }

        Ok(Self {
            header,
            ids,
            vectors,
        })
    }
}

struct ScoredSlot {
    score: f32,
    slot: usize,
}

// Ordering for the bounded min-heap: a higher score is "greater"; on equal
// scores the lower slot wins, so eviction drops the later catalog entry.
impl Ord for ScoredSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

impl PartialOrd for ScoredSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoredSlot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredSlot {}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn read_exact_array<const N: usize, R: Read>(
    reader: &mut R,
    accum: &mut Vec<u8>,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    accum.extend_from_slice(&buf);
    Ok(buf)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize, accum: &mut Vec<u8>) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    accum.extend_from_slice(&buf);
    Ok(buf)
}

fn read_u16_le<R: Read>(reader: &mut R, accum: &mut Vec<u8>) -> Result<u16> {
    let bytes = read_exact_array::<2, _>(reader, accum)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32_le<R: Read>(reader: &mut R, accum: &mut Vec<u8>) -> Result<u32> {
    let bytes = read_exact_array::<4, _>(reader, accum)?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_index() -> VectorIndex {
        VectorIndex::from_embeddings(
            "fnv1a-384",
            3,
            vec![
                ("s1".to_string(), vec![1.0, 0.0, 0.0]),
                ("s2".to_string(), vec![0.0, 1.0, 0.0]),
                ("s3".to_string(), vec![0.0, 0.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn search_orders_by_descending_score() {
        let index = sample_index();
        let hits = index.search_top_k(&[0.9, 0.3, 0.1], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(index.id_at(hits[0].slot).unwrap(), "s1");
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn ties_break_toward_lower_slot() {
        let index = VectorIndex::from_embeddings(
            "fnv1a-384",
            2,
            vec![
                ("a".to_string(), vec![1.0, 0.0]),
                ("b".to_string(), vec![1.0, 0.0]),
                ("c".to_string(), vec![1.0, 0.0]),
            ],
        )
        .unwrap();
        let hits = index.search_top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].slot, 0);
        assert_eq!(hits[1].slot, 1);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = sample_index();
        assert_eq!(index.search_top_k(&[1.0, 0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search_top_k(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_mismatch_is_rejected() {
        let index = sample_index();
        assert!(index.search_top_k(&[1.0, 0.0], 3).is_err());
    }

    #[test]
    fn duplicate_ids_are_a_build_error() {
        let err = VectorIndex::from_embeddings(
            "fnv1a-384",
            1,
            vec![("dup".to_string(), vec![1.0]), ("dup".to_string(), vec![0.5])],
        );
        assert!(err.is_err());
    }

    #[test]
    fn save_load_round_trip_preserves_search_results() {
        let dir = tempdir().unwrap();
        let path = index_path(dir.path(), "fnv1a-384");
        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.header(), index.header());

        let query = [0.3, 0.5, 0.2];
        let before = index.search_top_k(&query, 3).unwrap();
        let after = loaded.search_top_k(&query, 3).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tvix");
        let mut bytes = Vec::new();
        sample_index().write_to(&mut bytes).unwrap();
        bytes[0] = b'X';
        std::fs::write(&path, &bytes).unwrap();
        let err = VectorIndex::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("magic"));
    }

    #[test]
    fn header_corruption_fails_crc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crc.tvix");
        let mut bytes = Vec::new();
        sample_index().write_to(&mut bytes).unwrap();
        // Flip a bit inside the embedder id, leaving magic/version intact.
        bytes[9] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();
        assert!(VectorIndex::load(&path).is_err());
    }

    #[test]
    fn truncated_slab_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trunc.tvix");
        let mut bytes = Vec::new();
        sample_index().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();
        let err = VectorIndex::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("slab size mismatch"));
    }
}
