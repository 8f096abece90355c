use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use memmap2::Mmap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};
use crate::models::{PaperMetadata, SparseVector};

const MATRIX_MAGIC: [u8; 4] = *b"BSMM";
const MATRIX_VERSION: u32 = 1;
/// magic + version + num_features + num_rows
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
/// u32 term id + f32 weight
const ENTRY_LEN: usize = 8;

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

fn read_u64(buf: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap())
}

/// A read-only memory-mapped sparse document matrix.
///
/// Layout: header, then `num_rows + 1` little-endian u64 byte offsets into
/// the data region, then per-row `(u32 term id, f32 weight)` pairs sorted by
/// term id. The offset table makes row access O(1); a full scan reads the
/// data region sequentially.
pub struct SparseMatrix {
    mmap: Mmap,
    num_rows: usize,
    num_features: u32,
    data_start: usize,
}

impl std::fmt::Debug for SparseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseMatrix")
            .field("num_rows", &self.num_rows)
            .field("num_features", &self.num_features)
            .field("data_start", &self.data_start)
            .finish()
    }
}

impl SparseMatrix {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SearchError::config(format!("cannot open matrix {}: {e}", path.display()))
        })?;
        // Read-only map; the file is written once by the offline builder and
        // never mutated afterwards.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmap failed for {}", path.display()))?;
        if mmap.len() < HEADER_LEN || mmap[0..4] != MATRIX_MAGIC {
            return Err(SearchError::config(format!(
                "{} is not a sparse matrix file",
                path.display()
            )));
        }
        let version = read_u32(&mmap, 4);
        if version != MATRIX_VERSION {
            return Err(SearchError::config(format!(
                "unsupported matrix version {version} in {}",
                path.display()
            )));
        }
        let num_features = read_u32(&mmap, 8);
        let num_rows = read_u64(&mmap, 12) as usize;
        let data_start = HEADER_LEN + (num_rows + 1) * 8;
        if mmap.len() < data_start {
            return Err(SearchError::config(format!(
                "truncated matrix file {}",
                path.display()
            )));
        }
        Ok(SparseMatrix {
            mmap,
            num_rows,
            num_features,
            data_start,
        })
    }

    pub fn len(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn num_features(&self) -> u32 {
        self.num_features
    }

    fn offset(&self, k: usize) -> u64 {
        read_u64(&self.mmap, HEADER_LEN + k * 8)
    }

    /// Decodes row `k` into a sparse vector.
    pub fn row(&self, k: usize) -> Result<SparseVector> {
        if k >= self.num_rows {
            return Err(SearchError::Internal(anyhow::anyhow!(
                "row {k} out of bounds ({} rows)",
                self.num_rows
            )));
        }
        let start = self.data_start + self.offset(k) as usize;
        let end = self.data_start + self.offset(k + 1) as usize;
        if end > self.mmap.len() || start > end || (end - start) % ENTRY_LEN != 0 {
            return Err(SearchError::Internal(anyhow::anyhow!(
                "corrupt row extent for row {k}"
            )));
        }
        let mut entries = Vec::with_capacity((end - start) / ENTRY_LEN);
        let mut pos = start;
        while pos < end {
            let id = read_u32(&self.mmap, pos);
            let weight = f32::from_le_bytes(self.mmap[pos + 4..pos + 8].try_into().unwrap());
            entries.push((id, weight));
            pos += ENTRY_LEN;
        }
        Ok(SparseVector(entries))
    }
}

/// Manifest written last by the offline builder, after the matrix and
/// metadata files are in place. Readers trust its row count, so a shard can
/// never be observed with a mismatched matrix/metadata pair.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShardManifest {
    pub category: String,
    pub rows: u64,
    pub matrix: String,
    pub metadata: String,
}

/// One category's searchable content: the document matrix plus the
/// positionally aligned metadata stream.
pub struct Shard {
    name: String,
    matrix: SparseMatrix,
    meta_path: PathBuf,
    line_offsets: OnceCell<Vec<u64>>,
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("name", &self.name)
            .field("matrix", &self.matrix)
            .field("meta_path", &self.meta_path)
            .finish()
    }
}

impl Shard {
    /// Opens a shard by category name. Fails with a config error when the
    /// manifest is missing or its row count disagrees with the matrix.
    pub fn open(dir: &Path, category: &str) -> Result<Self> {
        let manifest_path = dir.join(format!("{category}.manifest.json"));
        let bytes = std::fs::read(&manifest_path).map_err(|e| {
            SearchError::config(format!(
                "cannot read shard manifest {}: {e}",
                manifest_path.display()
            ))
        })?;
        let manifest: ShardManifest = serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::config(format!("malformed manifest for {category}: {e}")))?;
        let matrix = SparseMatrix::open(&dir.join(&manifest.matrix))?;
        if matrix.len() as u64 != manifest.rows {
            return Err(SearchError::config(format!(
                "shard {category}: manifest says {} rows, matrix has {}",
                manifest.rows,
                matrix.len()
            )));
        }
        Ok(Shard {
            name: category.to_string(),
            matrix,
            meta_path: dir.join(&manifest.metadata),
            line_offsets: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn num_features(&self) -> u32 {
        self.matrix.num_features()
    }

    pub fn row(&self, k: usize) -> Result<SparseVector> {
        self.matrix.row(k)
    }

    /// Byte offsets of every metadata line, built on first access. The
    /// one-shot cell means concurrent first touches do not duplicate the
    /// scan. Line count must equal the matrix row count.
    fn offsets(&self) -> Result<&Vec<u64>> {
        self.line_offsets.get_or_try_init(|| {
            let mut file = File::open(&self.meta_path)
                .with_context(|| format!("cannot open metadata {}", self.meta_path.display()))?;
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .with_context(|| format!("cannot read metadata {}", self.meta_path.display()))?;
            let mut offsets = vec![0u64];
            for (pos, &byte) in contents.iter().enumerate() {
                if byte == b'\n' {
                    offsets.push(pos as u64 + 1);
                }
            }
            // Drop the phantom line after a trailing newline
            if offsets.last() == Some(&(contents.len() as u64)) {
                offsets.pop();
            }
            offsets.push(contents.len() as u64);
            let lines = offsets.len() - 1;
            if lines != self.matrix.len() {
                return Err(SearchError::config(format!(
                    "shard {}: {} metadata lines but {} matrix rows",
                    self.name,
                    lines,
                    self.matrix.len()
                )));
            }
            Ok(offsets)
        })
    }

    /// Raw bytes of the k-th metadata line, without the trailing newline.
    /// The file is reopened per retrieval so the handle stays stateless.
    pub fn meta_line(&self, k: usize) -> Result<String> {
        let offsets = self.offsets()?;
        if k + 1 >= offsets.len() {
            return Err(SearchError::Internal(anyhow::anyhow!(
                "metadata line {k} out of bounds"
            )));
        }
        let start = offsets[k];
        let end = offsets[k + 1];
        let mut file = File::open(&self.meta_path)
            .with_context(|| format!("cannot open metadata {}", self.meta_path.display()))?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf)?;
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }
        String::from_utf8(buf)
            .map_err(|e| SearchError::Internal(anyhow::anyhow!("metadata line {k}: {e}")))
    }

    /// Parsed metadata for the k-th document.
    pub fn meta(&self, k: usize) -> Result<PaperMetadata> {
        let line = self.meta_line(k)?;
        serde_json::from_str(&line).map_err(|e| {
            SearchError::Internal(anyhow::anyhow!(
                "shard {}: bad metadata at line {k}: {e}",
                self.name
            ))
        })
    }
}

/// Writes one shard's `(matrix, metadata, manifest)` triple. Both payload
/// files go to temp names first and the manifest is renamed into place last,
/// so readers only ever see complete, aligned pairs.
pub fn write_shard(
    dir: &Path,
    category: &str,
    num_features: u32,
    docs: &[(PaperMetadata, SparseVector)],
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create shard dir {}", dir.display()))?;
    let matrix_name = format!("{category}_corpus.mm");
    let meta_name = format!("index_{category}.jsonl");

    let matrix_tmp = dir.join(format!("{matrix_name}.tmp"));
    {
        let file = File::create(&matrix_tmp)
            .with_context(|| format!("cannot create {}", matrix_tmp.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&MATRIX_MAGIC)?;
        writer.write_all(&MATRIX_VERSION.to_le_bytes())?;
        writer.write_all(&num_features.to_le_bytes())?;
        writer.write_all(&(docs.len() as u64).to_le_bytes())?;
        let mut offset = 0u64;
        for (_, vector) in docs {
            writer.write_all(&offset.to_le_bytes())?;
            offset += (vector.len() * ENTRY_LEN) as u64;
        }
        writer.write_all(&offset.to_le_bytes())?;
        for (_, vector) in docs {
            for &(id, weight) in vector.iter() {
                writer.write_all(&id.to_le_bytes())?;
                writer.write_all(&weight.to_le_bytes())?;
            }
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    let meta_tmp = dir.join(format!("{meta_name}.tmp"));
    {
        let file = File::create(&meta_tmp)
            .with_context(|| format!("cannot create {}", meta_tmp.display()))?;
        let mut writer = BufWriter::new(file);
        for (meta, _) in docs {
            serde_json::to_writer(&mut writer, meta)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    std::fs::rename(&matrix_tmp, dir.join(&matrix_name))?;
    std::fs::rename(&meta_tmp, dir.join(&meta_name))?;

    let manifest = ShardManifest {
        category: category.to_string(),
        rows: docs.len() as u64,
        matrix: matrix_name,
        metadata: meta_name,
    };
    let manifest_tmp = dir.join(format!("{category}.manifest.json.tmp"));
    std::fs::write(&manifest_tmp, serde_json::to_vec_pretty(&manifest)?)?;
    std::fs::rename(
        &manifest_tmp,
        dir.join(format!("{category}.manifest.json")),
    )?;
    Ok(())
}

/// All shards under one directory, opened read-only at startup and shared
/// immutably for the process lifetime.
pub struct ShardStore {
    shards: BTreeMap<String, Shard>,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("shards", &self.shards)
            .finish()
    }
}

impl ShardStore {
    /// Scans the directory for shard manifests and opens every shard. An
    /// empty directory is a config error: a bundle without shards cannot
    /// serve queries.
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            SearchError::config(format!("cannot read shard dir {}: {e}", dir.display()))
        })?;
        let mut shards = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| SearchError::config(e.to_string()))?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(category) = name.strip_suffix(".manifest.json") {
                let shard = Shard::open(dir, category)?;
                shards.insert(category.to_string(), shard);
            }
        }
        if shards.is_empty() {
            return Err(SearchError::config(format!(
                "no shards found in {}",
                dir.display()
            )));
        }
        Ok(ShardStore { shards })
    }

    pub fn get(&self, category: &str) -> Option<&Shard> {
        self.shards.get(category)
    }

    /// Shard names in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.shards.keys().map(String::as_str)
    }

    /// Every shard must agree on the number of features; returns it, or a
    /// config error naming the first shard that disagrees.
    pub fn num_features(&self) -> Result<u32> {
        let mut expected: Option<(u32, &str)> = None;
        for (name, shard) in &self.shards {
            match expected {
                None => expected = Some((shard.num_features(), name)),
                Some((features, first)) if features != shard.num_features() => {
                    return Err(SearchError::config(format!(
                        "shard {name} has {} features but {first} has {features}",
                        shard.num_features()
                    )));
                }
                Some(_) => {}
            }
        }
        expected
            .map(|(features, _)| features)
            .ok_or_else(|| SearchError::config("shard store is empty"))
    }

    /// Expands a category name into its physical shards: the exact name when
    /// it exists, or the numbered sub-shards (`medicine1..medicineN`) of an
    /// oversized category, sorted numerically. Unknown names are an input
    /// error.
    pub fn expand(&self, category: &str) -> Result<Vec<String>> {
        if self.shards.contains_key(category) {
            return Ok(vec![category.to_string()]);
        }
        let mut numbered: Vec<(u32, String)> = Vec::new();
        for name in self.shards.keys() {
            if let Some(rest) = name.strip_prefix(category) {
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                    if let Ok(n) = rest.parse::<u32>() {
                        numbered.push((n, name.clone()));
                    }
                }
            }
        }
        if numbered.is_empty() {
            return Err(SearchError::input(format!("unknown category: {category}")));
        }
        numbered.sort();
        Ok(numbered.into_iter().map(|(_, name)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(doi: &str, title: &str) -> PaperMetadata {
        PaperMetadata {
            doi: doi.to_string(),
            title: title.to_string(),
            doi_url: format!("https://doi.org/{doi}"),
            journal_name: "Test Journal".to_string(),
            year: 2021,
            category: "testing".to_string(),
            ..PaperMetadata::default()
        }
    }

    fn sample_docs() -> Vec<(PaperMetadata, SparseVector)> {
        vec![
            (
                paper("10.1/a", "first"),
                SparseVector::new(vec![(0, 0.6), (2, 0.8)]),
            ),
            (paper("10.1/b", "second"), SparseVector::default()),
            (
                paper("10.1/c", "third"),
                SparseVector::new(vec![(1, 1.0)]),
            ),
        ]
    }

    #[test]
    fn test_write_then_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "testing", 4, &sample_docs()).unwrap();

        let shard = Shard::open(dir.path(), "testing").unwrap();
        assert_eq!(shard.len(), 3);
        assert_eq!(shard.num_features(), 4);
        assert_eq!(shard.row(0).unwrap().0, vec![(0, 0.6), (2, 0.8)]);
        assert!(shard.row(1).unwrap().is_empty());
        assert_eq!(shard.row(2).unwrap().0, vec![(1, 1.0)]);
        assert!(shard.row(3).is_err());
    }

    #[test]
    fn test_meta_positionally_aligned() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "testing", 4, &sample_docs()).unwrap();

        let shard = Shard::open(dir.path(), "testing").unwrap();
        assert_eq!(shard.meta(0).unwrap().title, "first");
        assert_eq!(shard.meta(2).unwrap().title, "third");
        assert!(shard.meta_line(3).is_err());
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Shard::open(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn test_row_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "testing", 4, &sample_docs()).unwrap();
        // Truncate the metadata stream to break alignment
        std::fs::write(
            dir.path().join("index_testing.jsonl"),
            serde_json::to_string(&paper("10.1/a", "only")).unwrap() + "\n",
        )
        .unwrap();

        let shard = Shard::open(dir.path(), "testing").unwrap();
        let err = shard.meta(0).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn test_store_expand_sub_shards() {
        let dir = tempfile::tempdir().unwrap();
        let docs = sample_docs();
        for name in ["virology", "medicine1", "medicine2", "medicine10"] {
            write_shard(dir.path(), name, 4, &docs).unwrap();
        }
        let store = ShardStore::open(dir.path()).unwrap();

        assert_eq!(store.expand("virology").unwrap(), vec!["virology"]);
        assert_eq!(
            store.expand("medicine").unwrap(),
            vec!["medicine1", "medicine2", "medicine10"]
        );
        assert!(matches!(
            store.expand("astrology").unwrap_err(),
            SearchError::Input(_)
        ));
    }

    #[test]
    fn test_store_agrees_on_features() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "one", 4, &sample_docs()).unwrap();
        write_shard(dir.path(), "two", 4, &sample_docs()).unwrap();
        let store = ShardStore::open(dir.path()).unwrap();
        assert_eq!(store.num_features().unwrap(), 4);

        write_shard(dir.path(), "three", 9, &sample_docs()).unwrap();
        let store = ShardStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.num_features().unwrap_err(),
            SearchError::Config(_)
        ));
    }
}
