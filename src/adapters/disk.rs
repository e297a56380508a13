//! Disk-Backed Store
//!
//! Persistent store backend: one directory per namespace. Each entry is
//! a `<key>.json` sidecar carrying status, headers, the insertion
//! sequence the trimmer's ordering contract rests on, and the name of
//! the body file it pairs with. Body files are stamped per write
//! (`<key>.<stamp>.bin`, LZ4-compressed when that makes it smaller), so
//! a replacing write lands its new body under a fresh name and the old
//! sidecar keeps pointing at the old body until the sidecar rename
//! commits. A reader or a crash in mid-replace therefore observes the
//! prior entry, never a torn pair; orphan bodies left by a crash are
//! swept on the next open.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::ErrorKind;
use tracing::{debug, warn};

use crate::domain::ports::StoreBackend;
use crate::error::{Error, Result};
use crate::fetch::{FetchResponse, ResponseKind};

/// Disk store configuration
#[derive(Debug, Clone)]
pub struct DiskStoreConfig {
    /// Root directory; namespaces are subdirectories
    pub root: PathBuf,
    /// Bodies below this size are stored uncompressed
    pub compression_min_size: usize,
}

impl Default for DiskStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/cache/tilevault"),
            compression_min_size: 1024,
        }
    }
}

/// Sidecar record persisted per entry
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    /// Full request URL the entry is keyed by
    key: String,
    /// Insertion sequence; a replacing write reuses the original
    seq: u64,
    status: u16,
    headers: Vec<(String, String)>,
    kind: ResponseKind,
    /// Whether the body file is LZ4-compressed
    compressed: bool,
    /// Name of the body file this sidecar commits to
    body: String,
    stored_at: DateTime<Utc>,
}

/// Disk-backed store backend
pub struct DiskStore {
    config: DiskStoreConfig,
    /// Monotonic stamp: insertion sequence for first writes, body
    /// generation for every write. Recovered from sidecars on open.
    stamp: AtomicU64,
    /// Serializes operations on the same key
    key_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl DiskStore {
    /// Open a store rooted at `config.root`, creating the directory,
    /// recovering the write stamp from existing sidecars, and sweeping
    /// body files no sidecar references (leftovers of interrupted
    /// replaces).
    pub async fn open(config: DiskStoreConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.root).await?;

        let mut max_stamp = 0u64;
        let mut namespaces = tokio::fs::read_dir(&config.root).await?;
        while let Some(ns_entry) = namespaces.next_entry().await? {
            if !ns_entry.file_type().await?.is_dir() {
                continue;
            }

            let mut referenced: HashSet<String> = HashSet::new();
            let mut bodies: Vec<PathBuf> = Vec::new();
            let mut entries = tokio::fs::read_dir(ns_entry.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some("json") => match Self::read_record(&path).await {
                        Ok(record) => {
                            max_stamp = max_stamp
                                .max(record.seq + 1)
                                .max(Self::body_stamp(&record.body).map_or(0, |s| s + 1));
                            referenced.insert(record.body);
                        }
                        Err(err) => {
                            // An unreadable sidecar makes its entry invisible;
                            // it will be overwritten or purged with the namespace
                            warn!(path = %path.display(), error = %err, "skipping unreadable sidecar");
                        }
                    },
                    Some("bin") => {
                        // Orphans count toward stamp recovery too, so a
                        // later write never reuses a stale body name
                        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                            if let Some(stamp) = Self::body_stamp(name) {
                                max_stamp = max_stamp.max(stamp + 1);
                            }
                        }
                        bodies.push(path);
                    }
                    _ => {}
                }
            }

            for body in bodies {
                let name = body.file_name().map(|n| n.to_string_lossy().into_owned());
                if name.map_or(true, |n| !referenced.contains(&n)) {
                    debug!(path = %body.display(), "removing orphan body file");
                    if let Err(err) = tokio::fs::remove_file(&body).await {
                        warn!(path = %body.display(), error = %err, "failed to remove orphan body");
                    }
                }
            }
        }

        debug!(root = %config.root.display(), stamp = max_stamp, "opened disk store");
        Ok(Self {
            config,
            stamp: AtomicU64::new(max_stamp),
            key_locks: DashMap::new(),
        })
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.config
            .root
            .join(urlencoding::encode(namespace).into_owned())
    }

    fn sidecar_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.json", urlencoding::encode(key)))
    }

    fn body_file_name(key: &str, stamp: u64) -> String {
        format!("{}.{stamp}.bin", urlencoding::encode(key))
    }

    /// Recover the stamp from a body file name (`<key>.<stamp>.bin`).
    fn body_stamp(name: &str) -> Option<u64> {
        name.strip_suffix(".bin")?.rsplit('.').next()?.parse().ok()
    }

    fn key_lock(&self, namespace: &str, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.key_locks
            .entry(Self::lock_key(namespace, key))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn lock_key(namespace: &str, key: &str) -> String {
        format!("{namespace}\u{0}{key}")
    }

    /// Drop a lock entry nobody holds. Callers release their own clone
    /// first; a contended entry stays and the loser cleans up later.
    fn release_key_lock(&self, namespace: &str, key: &str) {
        self.key_locks
            .remove_if(&Self::lock_key(namespace, key), |_, lock| {
                Arc::strong_count(lock) == 1
            });
    }

    async fn read_record(path: &Path) -> Result<EntryRecord> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Compress when the body clears the size floor and LZ4 actually
    /// shrinks it; otherwise store raw.
    fn encode_body(&self, body: &[u8]) -> (Vec<u8>, bool) {
        if body.len() < self.config.compression_min_size {
            return (body.to_vec(), false);
        }
        match lz4::block::compress(body, None, true) {
            Ok(compressed) if compressed.len() < body.len() => (compressed, true),
            Ok(_) => (body.to_vec(), false),
            Err(err) => {
                warn!(error = %err, "compression failed, storing raw");
                (body.to_vec(), false)
            }
        }
    }

    fn decode_body(&self, key: &str, raw: Vec<u8>, compressed: bool) -> Result<Bytes> {
        if !compressed {
            return Ok(Bytes::from(raw));
        }
        lz4::block::decompress(&raw, None)
            .map(Bytes::from)
            .map_err(|err| Error::Decompression {
                key: key.to_string(),
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl StoreBackend for DiskStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>> {
        // Taking the key lock keeps a read from interleaving with the
        // commit or deletion of the pair it is about to load
        let lock = self.key_lock(namespace, key);
        let guard = lock.lock().await;

        let record = match Self::read_record(&self.sidecar_path(namespace, key)).await {
            Ok(record) => record,
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => {
                drop(guard);
                drop(lock);
                self.release_key_lock(namespace, key);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let raw = tokio::fs::read(self.namespace_dir(namespace).join(&record.body)).await?;
        let body = self.decode_body(key, raw, record.compressed)?;

        Ok(Some(match record.kind {
            ResponseKind::Normal => FetchResponse::new(record.status, record.headers, body),
            ResponseKind::OpaqueError => FetchResponse::error(),
        }))
    }

    async fn put(&self, namespace: &str, key: &str, response: FetchResponse) -> Result<()> {
        let lock = self.key_lock(namespace, key);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(self.namespace_dir(namespace)).await?;
        let sidecar = self.sidecar_path(namespace, key);

        let existing = match Self::read_record(&sidecar).await {
            Ok(record) => Some(record),
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };

        // A replacing write keeps the original insertion sequence so the
        // entry keeps its position in the order listing; the body always
        // lands under a fresh stamp so the committed old pair stays
        // readable until the sidecar rename below
        let stamp = self.stamp.fetch_add(1, Ordering::Relaxed);
        let seq = existing.as_ref().map_or(stamp, |record| record.seq);

        let body_name = Self::body_file_name(key, stamp);
        let (encoded, compressed) = self.encode_body(response.body());
        tokio::fs::write(self.namespace_dir(namespace).join(&body_name), encoded).await?;

        let record = EntryRecord {
            key: key.to_string(),
            seq,
            status: response.status(),
            headers: response.headers().to_vec(),
            kind: response.kind(),
            compressed,
            body: body_name,
            stored_at: Utc::now(),
        };

        // Sidecar rename is the commit point
        let tmp = sidecar.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&record)?).await?;
        tokio::fs::rename(&tmp, &sidecar).await?;

        // The old body is unreachable once the new sidecar has landed
        if let Some(prev) = existing {
            if prev.body != record.body {
                match tokio::fs::remove_file(self.namespace_dir(namespace).join(&prev.body)).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let lock = self.key_lock(namespace, key);
        let guard = lock.lock().await;

        let record = match Self::read_record(&self.sidecar_path(namespace, key)).await {
            Ok(record) => Some(record),
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };

        let deleted = match record {
            Some(record) => {
                tokio::fs::remove_file(self.sidecar_path(namespace, key)).await?;
                match tokio::fs::remove_file(self.namespace_dir(namespace).join(&record.body)).await
                {
                    Ok(()) => {}
                    // Sidecar existed without a body; the entry was invisible anyway
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
                true
            }
            None => false,
        };

        drop(guard);
        drop(lock);
        self.release_key_lock(namespace, key);
        Ok(deleted)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records: Vec<(u64, String)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => records.push((record.seq, record.key)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable sidecar");
                }
            }
        }

        records.sort_by_key(|(seq, _)| *seq);
        Ok(records.into_iter().map(|(_, key)| key).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.config.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let encoded = entry.file_name().to_string_lossy().into_owned();
            let decoded = urlencoding::decode(&encoded)
                .map_err(|err| Error::Store(format!("undecodable namespace directory: {err}")))?;
            names.push(decoded.into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let existed = match tokio::fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => return Err(err.into()),
        };

        // Shed the purged namespace's idle lock entries
        let prefix = Self::lock_key(namespace, "");
        self.key_locks
            .retain(|k, lock| !(k.starts_with(&prefix) && Arc::strong_count(lock) == 1));
        Ok(existed)
    }
}

// =============================================================================
// Tests
// =============================================================================
