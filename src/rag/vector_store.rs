use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::IndexError;
use crate::models::Chunk;

const MAGIC: &[u8; 4] = b"TVIX";
const FORMAT_VERSION: u32 = 2;
/// magic, version, dimension, entry count, chunk section length
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;

/// Vectors and chunk metadata live in one file so a save is a single rename.
pub const INDEX_FILE: &str = "index.bin";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Exact nearest-neighbour index over squared L2 distance.
///
/// Entries are append-only; vectors are stored contiguously so a query is a
/// single linear scan.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorIndex {
    /// Builds an index from a non-empty set of equally sized vectors.
    pub fn create(entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        let dimension = entries.first().ok_or(IndexError::Empty)?.vector.len();
        let mut index = Self {
            dimension,
            vectors: Vec::new(),
            chunks: Vec::new(),
        };
        index.add(entries)?;
        Ok(index)
    }

    /// Appends entries. Nothing is added unless every vector has the index dimension.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        self.vectors.reserve(entries.len() * self.dimension);
        self.chunks.reserve(entries.len());
        for entry in entries {
            self.vectors.extend_from_slice(&entry.vector);
            self.chunks.push(entry.chunk);
        }
        Ok(())
    }

    /// Drops every entry past `len`. Used to roll back a merge that could not be persisted.
    pub fn truncate(&mut self, len: usize) {
        self.chunks.truncate(len);
        self.vectors.truncate(len * self.dimension);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn vector(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }

    /// The `k` nearest entries, nearest first. Equal distances keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| (i, squared_l2(self.vector(i), vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| SearchResult {
                chunk: self.chunks[i].clone(),
                distance,
            })
            .collect())
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Writes the index into `dir`, replacing any previous copy with a single rename.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;

        let chunks = serde_json::to_vec(&self.chunks)?;

        let mut blob = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4 + chunks.len());
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        blob.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        blob.extend_from_slice(&(self.len() as u64).to_le_bytes());
        blob.extend_from_slice(&(chunks.len() as u64).to_le_bytes());
        for v in &self.vectors {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob.extend_from_slice(&chunks);

        write_atomic(&dir.join(INDEX_FILE), &blob)
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let corrupt = |reason: &str| IndexError::Corrupt {
            path: dir.to_path_buf(),
            reason: reason.to_string(),
        };

        let blob = fs::read(dir.join(INDEX_FILE))?;
        if blob.len() < HEADER_LEN || &blob[0..4] != MAGIC {
            return Err(corrupt("bad index file header"));
        }

        let version = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported format version {}", version)));
        }
        let dimension = u32::from_le_bytes([blob[8], blob[9], blob[10], blob[11]]) as usize;
        let count = read_u64(&blob[12..20]);
        let chunks_len = read_u64(&blob[20..28]);

        let vectors_len = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(dimension))
            .and_then(|floats| floats.checked_mul(4))
            .ok_or_else(|| corrupt("entry count overflows"))?;
        let chunks_len = usize::try_from(chunks_len).map_err(|_| corrupt("chunk section too large"))?;

        let body = &blob[HEADER_LEN..];
        if dimension == 0 || vectors_len.checked_add(chunks_len) != Some(body.len()) {
            return Err(corrupt("section lengths do not match header"));
        }
        let (vector_bytes, chunk_bytes) = body.split_at(vectors_len);

        let vectors: Vec<f32> = vector_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let chunks: Vec<Chunk> = serde_json::from_slice(chunk_bytes)?;
        if chunks.len() as u64 != count {
            return Err(corrupt("chunk count does not match vector count"));
        }

        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let tmp: PathBuf = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
