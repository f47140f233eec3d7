//! Object storage with prefix listing and opaque pagination cursors.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::StoreError;

/// Listing entry for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub uploaded: DateTime<Utc>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    /// Opaque cursor for the next page; pass back verbatim.
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Blob store used for signup records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`. Keys are write-once: an existing key is a conflict.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    /// List up to `limit` objects under `prefix` in lexical key order,
    /// continuing after `cursor` when given.
    async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError>;

    /// Fetch one object, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

fn encode_cursor(last_key: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(last_key)
}

/// Recover the last key of the previous page. Cursors minted for another
/// prefix are rejected rather than silently widening the listing.
fn decode_cursor(cursor: &str, prefix: &str) -> Result<String, StoreError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| StoreError::InvalidCursor)?;
    let key = String::from_utf8(bytes).map_err(|_| StoreError::InvalidCursor)?;
    if key.starts_with(prefix) {
        Ok(key)
    } else {
        Err(StoreError::InvalidCursor)
    }
}

/// Cut a page from objects already sorted by key and positioned after the cursor.
fn paginate<I>(objects: I, limit: usize) -> ListPage
where
    I: IntoIterator<Item = ObjectMeta>,
{
    let limit = limit.max(1);
    let mut objects: Vec<ObjectMeta> = objects.into_iter().take(limit + 1).collect();
    let has_more = objects.len() > limit;
    objects.truncate(limit);
    let cursor = if has_more {
        objects.last().map(|o| encode_cursor(&o.key))
    } else {
        None
    };
    ListPage {
        objects,
        cursor,
        has_more,
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    uploaded: DateTime<Utc>,
}

/// Process-local object store.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StoreError::Conflict(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                uploaded: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError> {
        let start = match cursor {
            Some(c) => Bound::Excluded(decode_cursor(c, prefix)?),
            None => Bound::Included(prefix.to_string()),
        };

        let objects = self.objects.read().await;
        let matching = objects
            .range::<String, _>((start, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| ObjectMeta {
                key: k.clone(),
                size: o.body.len() as u64,
                uploaded: o.uploaded,
            });
        Ok(paginate(matching, limit))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.objects.read().await.get(key).map(|o| o.body.clone()))
    }
}

/// One file per object beneath a root directory. `/` in keys maps to
/// subdirectories.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// A hidden temp file next to its final location. Removed on drop, so a
/// failed write or link leaves nothing behind.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    async fn write(dir: &Path, body: &[u8]) -> Result<Self, StoreError> {
        let staged = Self {
            path: dir.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple())),
        };
        tokio::fs::write(&staged.path, body).await?;
        Ok(staged)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key.len() <= 512
        && key.split('/').all(|seg| {
            !seg.is_empty()
                && seg != "."
                && seg != ".."
                && !seg.starts_with('.')
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        });
    if ok {
        Ok(())
    } else {
        Err(StoreError::Unavailable(format!("invalid object key: {key}")))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        let staged = StagedFile::write(&parent, &body).await?;
        // hard_link refuses to replace an existing file, which keeps keys write-once.
        match tokio::fs::hard_link(staged.path(), &path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(key.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError> {
        let after = cursor.map(|c| decode_cursor(c, prefix)).transpose()?;

        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.root.join(dir_part)
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ListPage::default()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        // Names and the cursor are enough to order candidates; only the
        // entries that can land on this page are stat'd.
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !name.starts_with(name_prefix) {
                continue;
            }
            let key = if dir_part.is_empty() {
                name
            } else {
                format!("{dir_part}/{name}")
            };
            if after.as_deref().is_some_and(|a| key.as_str() <= a) {
                continue;
            }
            candidates.push((key, entry.path()));
        }
        candidates.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let wanted = limit.max(1) + 1;
        let mut found = Vec::with_capacity(wanted.min(candidates.len()));
        for (key, path) in candidates {
            if found.len() == wanted {
                break;
            }
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let uploaded = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            found.push(ObjectMeta {
                key,
                size: metadata.len(),
                uploaded,
            });
        }
        Ok(paginate(found, limit))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
