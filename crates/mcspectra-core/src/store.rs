//! Hierarchical path-addressed array store.
//!
//! Groups and datasets are addressed by slash-delimited paths
//! (`modelA/scheme1/spectra/maskX/dust`). Creation is idempotent: requiring a
//! group or dataset that already exists returns the existing one, and writing
//! to an existing dataset overwrites it in place.
//!
//! Two backends:
//! - [`MemoryStore`]: in-process map, used by tests and dry runs.
//! - [`DirStore`]: one directory per group, a JSON header plus a raw
//!   little-endian `f64` payload per dataset.
//!
//! # On-disk layout ([`DirStore`])
//!
//! ```text
//! <root>/modelA/scheme1/spectra/maskX/
//!     .attrs.json        group attributes
//!     dust.json          {"shape": [2, 4, 8], "dtype": "<f8"}
//!     dust.bin           row-major payload
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Group attribute map.
pub type Attrs = BTreeMap<String, String>;

const ATTRS_FILE: &str = ".attrs.json";
const DTYPE_F64: &str = "<f8";

/// Errors raised by [`ArrayStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no group or dataset at '{0}'")]
    NotFound(String),

    #[error("dataset '{path}' exists with shape {existing:?}, requested {requested:?}")]
    ShapeConflict {
        path: String,
        existing: Vec<usize>,
        requested: Vec<usize>,
    },

    #[error("'{0}' is a dataset, not a group")]
    NotAGroup(String),

    #[error("'{0}' is a group, not a dataset")]
    NotADataset(String),

    #[error("invalid store path '{0}'")]
    InvalidPath(String),

    #[error("corrupt dataset '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key/attribute/array store addressed by slash-delimited paths.
pub trait ArrayStore: Send + Sync {
    /// Create the group (and its parents) if absent.
    fn require_group(&self, path: &str) -> StoreResult<()>;

    /// Merge `attrs` into the group's attribute map.
    fn set_attrs(&self, group: &str, attrs: &Attrs) -> StoreResult<()>;

    /// Attribute map of a group.
    fn attrs(&self, group: &str) -> StoreResult<Attrs>;

    /// Create a zero-filled dataset of `shape` if absent. An existing dataset
    /// with a different shape is a [`StoreError::ShapeConflict`].
    fn require_dataset(&self, path: &str, shape: &[usize]) -> StoreResult<()>;

    /// Overwrite the whole contents of an existing dataset.
    fn write(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()>;

    /// Read a whole dataset.
    fn read(&self, path: &str) -> StoreResult<ArrayD<f64>>;

    /// Shape of a dataset.
    fn shape(&self, path: &str) -> StoreResult<Vec<usize>>;

    /// Whether a group or dataset exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Every dataset path under `prefix` (all datasets for `""`), sorted.
    fn list_datasets(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Read slab `index` along the leading axis.
    fn read_leading(&self, path: &str, index: usize) -> StoreResult<ArrayD<f64>> {
        let data = self.read(path)?;
        let len = data.shape().first().copied().unwrap_or(0);
        if index >= len {
            return Err(StoreError::NotFound(format!("{path}[{index}]")));
        }
        Ok(data.index_axis(Axis(0), index).to_owned())
    }

    /// Create-or-overwrite `path` with `data` in one step.
    ///
    /// Missing parent groups are created. An existing dataset of another shape
    /// is a [`StoreError::ShapeConflict`]. If the call fails the dataset is
    /// either absent or holds its previous contents; it is never left
    /// zero-filled.
    fn put(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()>;
}

/// Split and validate a store path. Empty, `.` and `..` segments are rejected.
fn segments(path: &str) -> StoreResult<Vec<&str>> {
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || *p == "." || *p == ".." || p.starts_with('.'))
    {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

fn canonical(path: &str) -> StoreResult<String> {
    Ok(segments(path)?.join("/"))
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

// ---------------------------------------------------------------------------
// Path locks
// ---------------------------------------------------------------------------

/// Per-path writer locks: at most one writer per path, no coordination across
/// distinct paths.
#[derive(Default)]
pub struct PathLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// Run `f` while holding the lock for `path`.
    ///
    /// The entry for `path` is dropped once no caller holds or waits on it.
    pub fn with<R>(&self, path: &str, f: impl FnOnce() -> R) -> R {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(path.to_string()).or_default())
        };
        let out = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here: nobody else is queued.
        if Arc::strong_count(&slot) == 2 {
            table.remove(path);
        }
        out
    }

    /// Number of paths currently locked or waited on.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Group(Attrs),
    Dataset(ArrayD<f64>),
}

/// Thread-safe in-memory [`ArrayStore`].
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_groups(nodes: &mut BTreeMap<String, Node>, parts: &[&str]) -> StoreResult<()> {
        for depth in 1..=parts.len() {
            let key = parts[..depth].join("/");
            match nodes.get(&key) {
                Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup(key)),
                Some(Node::Group(_)) => {}
                None => {
                    nodes.insert(key, Node::Group(Attrs::new()));
                }
            }
        }
        Ok(())
    }
}

impl ArrayStore for MemoryStore {
    fn require_group(&self, path: &str) -> StoreResult<()> {
        let parts = segments(path)?;
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_groups(&mut nodes, &parts)
    }

    fn set_attrs(&self, group: &str, attrs: &Attrs) -> StoreResult<()> {
        let key = canonical(group)?;
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get_mut(&key) {
            Some(Node::Group(existing)) => {
                existing.extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            Some(Node::Dataset(_)) => Err(StoreError::NotAGroup(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn attrs(&self, group: &str) -> StoreResult<Attrs> {
        let key = canonical(group)?;
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&key) {
            Some(Node::Group(attrs)) => Ok(attrs.clone()),
            Some(Node::Dataset(_)) => Err(StoreError::NotAGroup(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn require_dataset(&self, path: &str, shape: &[usize]) -> StoreResult<()> {
        let parts = segments(path)?;
        let key = parts.join("/");
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_groups(&mut nodes, &parts[..parts.len() - 1])?;
        match nodes.get(&key) {
            Some(Node::Dataset(existing)) if existing.shape() == shape => Ok(()),
            Some(Node::Dataset(existing)) => Err(StoreError::ShapeConflict {
                path: key,
                existing: existing.shape().to_vec(),
                requested: shape.to_vec(),
            }),
            Some(Node::Group(_)) => Err(StoreError::NotADataset(key)),
            None => {
                nodes.insert(key, Node::Dataset(ArrayD::zeros(IxDyn(shape))));
                Ok(())
            }
        }
    }

    fn write(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()> {
        let key = canonical(path)?;
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get_mut(&key) {
            Some(Node::Dataset(existing)) if existing.shape() == data.shape() => {
                existing.assign(data);
                Ok(())
            }
            Some(Node::Dataset(existing)) => Err(StoreError::ShapeConflict {
                path: key,
                existing: existing.shape().to_vec(),
                requested: data.shape().to_vec(),
            }),
            Some(Node::Group(_)) => Err(StoreError::NotADataset(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn put(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()> {
        let parts = segments(path)?;
        let key = parts.join("/");
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&key) {
            Some(Node::Dataset(existing)) if existing.shape() != data.shape() => {
                return Err(StoreError::ShapeConflict {
                    path: key,
                    existing: existing.shape().to_vec(),
                    requested: data.shape().to_vec(),
                });
            }
            Some(Node::Group(_)) => return Err(StoreError::NotADataset(key)),
            _ => {}
        }
        Self::ensure_groups(&mut nodes, &parts[..parts.len() - 1])?;
        nodes.insert(key, Node::Dataset(data.clone()));
        Ok(())
    }

    fn read(&self, path: &str) -> StoreResult<ArrayD<f64>> {
        let key = canonical(path)?;
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&key) {
            Some(Node::Dataset(data)) => Ok(data.clone()),
            Some(Node::Group(_)) => Err(StoreError::NotADataset(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn read_leading(&self, path: &str, index: usize) -> StoreResult<ArrayD<f64>> {
        let key = canonical(path)?;
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&key) {
            Some(Node::Dataset(data)) if data.ndim() > 0 && index < data.shape()[0] => {
                Ok(data.index_axis(Axis(0), index).to_owned())
            }
            Some(Node::Dataset(_)) => Err(StoreError::NotFound(format!("{key}[{index}]"))),
            Some(Node::Group(_)) => Err(StoreError::NotADataset(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn shape(&self, path: &str) -> StoreResult<Vec<usize>> {
        let key = canonical(path)?;
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&key) {
            Some(Node::Dataset(data)) => Ok(data.shape().to_vec()),
            Some(Node::Group(_)) => Err(StoreError::NotADataset(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn exists(&self, path: &str) -> bool {
        canonical(path)
            .map(|key| {
                self.nodes
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .contains_key(&key)
            })
            .unwrap_or(false)
    }

    fn list_datasets(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = if prefix.trim_matches('/').is_empty() {
            String::new()
        } else {
            canonical(prefix)?
        };
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(nodes
            .iter()
            .filter(|(k, n)| matches!(n, Node::Dataset(_)) && under_prefix(k, &prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Directory-backed store
// ---------------------------------------------------------------------------

/// Dataset header written next to each payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetHeader {
    pub shape: Vec<usize>,
    pub dtype: String,
}

impl DatasetHeader {
    fn f64(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            dtype: DTYPE_F64.to_string(),
        }
    }

    fn len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Directory-backed [`ArrayStore`].
///
/// Payload writes go through a temporary file in the target directory and are
/// renamed into place, so readers never observe a partially written dataset.
pub struct DirStore {
    root: PathBuf,
    locks: PathLocks,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: PathLocks::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, parts: &[&str]) -> PathBuf {
        parts.iter().fold(self.root.clone(), |p, s| p.join(s))
    }

    /// (directory, header path, payload path) for a dataset.
    fn dataset_files(&self, parts: &[&str]) -> (PathBuf, PathBuf, PathBuf) {
        let (name, parents) = match parts.split_last() {
            Some((name, parents)) => (*name, parents),
            None => ("", &[][..]),
        };
        let dir = self.group_dir(parents);
        let header = dir.join(format!("{name}.json"));
        let payload = dir.join(format!("{name}.bin"));
        (dir, header, payload)
    }

    fn ensure_groups(&self, parts: &[&str]) -> StoreResult<PathBuf> {
        for depth in 1..=parts.len() {
            let (_, header, _) = self.dataset_files(&parts[..depth]);
            if header.exists() {
                return Err(StoreError::NotAGroup(parts[..depth].join("/")));
            }
        }
        let dir = self.group_dir(parts);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn read_header(&self, key: &str, header: &Path) -> StoreResult<DatasetHeader> {
        let raw = fs::read_to_string(header)?;
        let parsed: DatasetHeader =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: key.to_string(),
                reason: format!("bad header: {e}"),
            })?;
        if parsed.dtype != DTYPE_F64 {
            return Err(StoreError::Corrupt {
                path: key.to_string(),
                reason: format!("unsupported dtype {}", parsed.dtype),
            });
        }
        Ok(parsed)
    }

    fn lookup(&self, path: &str) -> StoreResult<(String, DatasetHeader, PathBuf)> {
        let parts = segments(path)?;
        let key = parts.join("/");
        let (_, header, payload) = self.dataset_files(&parts);
        if !header.exists() {
            return Err(if self.group_dir(&parts).is_dir() {
                StoreError::NotADataset(key)
            } else {
                StoreError::NotFound(key)
            });
        }
        let parsed = self.read_header(&key, &header)?;
        Ok((key, parsed, payload))
    }

    fn atomic_write(dir: &Path, target: &Path, bytes: &[u8]) -> StoreResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn encode(data: impl Iterator<Item = f64>, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(len * 8);
        for v in data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    fn decode(key: &str, bytes: &[u8], expected: usize) -> StoreResult<Vec<f64>> {
        if bytes.len() != expected * 8 {
            return Err(StoreError::Corrupt {
                path: key.to_string(),
                reason: format!("payload is {} bytes, expected {}", bytes.len(), expected * 8),
            });
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b)
            })
            .collect())
    }

    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<String>) -> StoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let child = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.walk(&entry.path(), &child, out)?;
            } else if let Some(stem) = child.strip_suffix(".json") {
                out.push(stem.to_string());
            }
        }
        Ok(())
    }
}

impl ArrayStore for DirStore {
    fn require_group(&self, path: &str) -> StoreResult<()> {
        let parts = segments(path)?;
        let key = parts.join("/");
        self.locks.with(&key, || self.ensure_groups(&parts).map(|_| ()))
    }

    fn set_attrs(&self, group: &str, attrs: &Attrs) -> StoreResult<()> {
        let parts = segments(group)?;
        let key = parts.join("/");
        let dir = self.group_dir(&parts);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(key));
        }
        self.locks.with(&key, || {
            let mut merged = self.attrs(&key)?;
            merged.extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
            let json = serde_json::to_vec_pretty(&merged)
                .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
            Self::atomic_write(&dir, &dir.join(ATTRS_FILE), &json)
        })
    }

    fn attrs(&self, group: &str) -> StoreResult<Attrs> {
        let parts = segments(group)?;
        let key = parts.join("/");
        let dir = self.group_dir(&parts);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(key));
        }
        let file = dir.join(ATTRS_FILE);
        if !file.exists() {
            return Ok(Attrs::new());
        }
        let raw = fs::read_to_string(file)?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: key,
            reason: format!("bad attributes: {e}"),
        })
    }

    fn require_dataset(&self, path: &str, shape: &[usize]) -> StoreResult<()> {
        let parts = segments(path)?;
        let key = parts.join("/");
        self.locks.with(&key, || {
            let dir = self.ensure_groups(&parts[..parts.len() - 1])?;
            let (_, header, payload) = self.dataset_files(&parts);
            if self.group_dir(&parts).is_dir() {
                return Err(StoreError::NotADataset(key.clone()));
            }
            if header.exists() {
                let existing = self.read_header(&key, &header)?;
                if existing.shape != shape {
                    return Err(StoreError::ShapeConflict {
                        path: key.clone(),
                        existing: existing.shape,
                        requested: shape.to_vec(),
                    });
                }
                return Ok(());
            }
            let head = DatasetHeader::f64(shape);
            let zeros = Self::encode(std::iter::repeat_n(0.0, head.len()), head.len());
            Self::atomic_write(&dir, &payload, &zeros)?;
            let json = serde_json::to_vec(&head)
                .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
            Self::atomic_write(&dir, &header, &json)
        })
    }

    fn write(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()> {
        let (key, header, payload) = self.lookup(path)?;
        if header.shape != data.shape() {
            return Err(StoreError::ShapeConflict {
                path: key,
                existing: header.shape,
                requested: data.shape().to_vec(),
            });
        }
        let dir = payload
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let bytes = Self::encode(data.iter().copied(), data.len());
        self.locks
            .with(&key, || Self::atomic_write(&dir, &payload, &bytes))
    }

    fn put(&self, path: &str, data: &ArrayD<f64>) -> StoreResult<()> {
        let parts = segments(path)?;
        let key = parts.join("/");
        self.locks.with(&key, || {
            if self.group_dir(&parts).is_dir() {
                return Err(StoreError::NotADataset(key.clone()));
            }
            let dir = self.ensure_groups(&parts[..parts.len() - 1])?;
            let (_, header, payload) = self.dataset_files(&parts);
            let existing = if header.exists() {
                Some(self.read_header(&key, &header)?)
            } else {
                None
            };
            if let Some(existing) = &existing {
                if existing.shape != data.shape() {
                    return Err(StoreError::ShapeConflict {
                        path: key.clone(),
                        existing: existing.shape.clone(),
                        requested: data.shape().to_vec(),
                    });
                }
            }
            // Payload first: a dataset is only visible once its header exists.
            let bytes = Self::encode(data.iter().copied(), data.len());
            Self::atomic_write(&dir, &payload, &bytes)?;
            if existing.is_none() {
                let json = serde_json::to_vec(&DatasetHeader::f64(data.shape()))
                    .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
                Self::atomic_write(&dir, &header, &json)?;
            }
            Ok(())
        })
    }

    fn read(&self, path: &str) -> StoreResult<ArrayD<f64>> {
        let (key, header, payload) = self.lookup(path)?;
        let bytes = fs::read(payload)?;
        let values = Self::decode(&key, &bytes, header.len())?;
        ArrayD::from_shape_vec(IxDyn(&header.shape), values).map_err(|e| StoreError::Corrupt {
            path: key,
            reason: e.to_string(),
        })
    }

    fn read_leading(&self, path: &str, index: usize) -> StoreResult<ArrayD<f64>> {
        let (key, header, payload) = self.lookup(path)?;
        let Some((&leading, rest)) = header.shape.split_first() else {
            return Err(StoreError::NotFound(format!("{key}[{index}]")));
        };
        if index >= leading {
            return Err(StoreError::NotFound(format!("{key}[{index}]")));
        }
        let slab: usize = rest.iter().product();
        let mut file = File::open(payload)?;
        let file_len = file.metadata()?.len();
        if file_len != (header.len() * 8) as u64 {
            return Err(StoreError::Corrupt {
                path: key,
                reason: format!("payload is {file_len} bytes, expected {}", header.len() * 8),
            });
        }
        file.seek(SeekFrom::Start((index * slab * 8) as u64))?;
        let mut bytes = vec![0u8; slab * 8];
        file.read_exact(&mut bytes)?;
        let values = Self::decode(&key, &bytes, slab)?;
        ArrayD::from_shape_vec(IxDyn(rest), values).map_err(|e| StoreError::Corrupt {
            path: key,
            reason: e.to_string(),
        })
    }

    fn shape(&self, path: &str) -> StoreResult<Vec<usize>> {
        self.lookup(path).map(|(_, header, _)| header.shape)
    }

    fn exists(&self, path: &str) -> bool {
        let Ok(parts) = segments(path) else {
            return false;
        };
        let (_, header, _) = self.dataset_files(&parts);
        header.exists() || self.group_dir(&parts).is_dir()
    }

    fn list_datasets(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut out = Vec::new();
        self.walk(&self.root, "", &mut out)?;
        let prefix = if prefix.trim_matches('/').is_empty() {
            String::new()
        } else {
            canonical(prefix)?
        };
        out.retain(|p| under_prefix(p, &prefix));
        out.sort();
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
