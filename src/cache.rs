use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Content-addressed memo of completion results.
//
// Storage layout:  <cache path> (JSON)
//   { "entries": { "<sha256 hex of descriptor>": "<result text>" } }
//
// Loaded once when the store is opened, rewritten in full after every
// `store`. No eviction, no locking: concurrent writers race and the last
// write wins.
// ---------------------------------------------------------------------------

/// Exact parameters of one completion call. Two equal descriptors always map
/// to the same cache entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub model: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub n: u32,
    pub stop: Option<String>,
    pub temperature: f32,
}

impl RequestDescriptor {
    /// Deterministic string form; field order is fixed.
    pub fn canonical(&self) -> String {
        let tuple = (
            &self.model,
            &self.prompt,
            self.max_tokens,
            self.n,
            &self.stop,
            self.temperature,
        );
        serde_json::to_string(&tuple).unwrap_or_else(|_| format!("{tuple:?}"))
    }

    pub fn cache_key(&self) -> String {
        let digest = Sha256::digest(self.canonical().as_bytes());
        format!("{digest:x}")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, String>,
}

impl CacheFile {
    fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return Self::default(), // cold cache
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "completion cache unreadable, starting empty");
                Self::default()
            }
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
            }
        }
        let text = serde_json::to_string(self)?;
        std::fs::write(path, text).with_context(|| format!("Failed to write cache {}", path.display()))
    }
}

/// Process-wide memo of completion results.
///
/// Open it once at startup and hand it to the compressor; every `store`
/// flushes the whole mapping to disk.
#[derive(Debug)]
pub struct CompletionCache {
    path: Option<PathBuf>,
    file: CacheFile,
}

impl CompletionCache {
    pub fn open(path: &Path) -> Self {
        let file = CacheFile::load(path);
        debug!(path = %path.display(), entries = file.entries.len(), "completion cache loaded");
        Self {
            path: Some(path.to_path_buf()),
            file,
        }
    }

    /// A cache that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: CacheFile::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    pub fn lookup(&self, descriptor: &RequestDescriptor) -> Option<&str> {
        self.file
            .entries
            .get(&descriptor.cache_key())
            .map(String::as_str)
    }

    /// Record a result and persist. A failed write is logged, not returned:
    /// the in-memory entry still serves this process.
    pub fn store(&mut self, descriptor: &RequestDescriptor, result: &str) {
        self.file
            .entries
            .insert(descriptor.cache_key(), result.to_string());

        if let Some(path) = self.path.as_ref() {
            if let Err(e) = self.file.save(path) {
                warn!(error = %format!("{e:#}"), "failed to persist completion cache");
            }
        }
    }
}
