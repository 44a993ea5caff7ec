//! Property index and its cache
//!
//! Some atomic types take their values from an index of known property names
//! that is expensive to build (typically by scanning project metadata). The
//! [`PropertyIndexCache`] keeps one index snapshot per project key:
//!
//! - at most one build runs per key; a caller that waited for a build and
//!   finds a fresher snapshot installed does not build again
//! - readers always get the installed snapshot, also while a rebuild runs
//! - entries idle for longer than the TTL are evicted by a background task
//!   that sleeps until the next deadline

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{IndexError, ValueParseError};
use crate::renderable::Renderable;

use super::context::DynamicSchemaContext;
use super::types::{atomic, YType, YValueHint};

/// What the index knows about one property.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyInfo {
    pub ty: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

/// Read access to a property index. Absence of data is never an error.
pub trait PropertyLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<PropertyInfo>;

    fn names(&self) -> Vec<String>;

    fn is_available(&self) -> bool {
        true
    }
}

/// A lookup without data; index-backed types degrade to accepting anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl PropertyLookup for NoIndex {
    fn lookup(&self, _: &str) -> Option<PropertyInfo> {
        None
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// An immutable index snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyIndex {
    properties: BTreeMap<String, PropertyInfo>,
}

impl PropertyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, info: PropertyInfo) {
        self.properties.insert(name.into(), info);
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl FromIterator<(String, PropertyInfo)> for PropertyIndex {
    fn from_iter<I: IntoIterator<Item = (String, PropertyInfo)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

impl PropertyLookup for PropertyIndex {
    fn lookup(&self, name: &str) -> Option<PropertyInfo> {
        self.properties.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// Cooperative cancellation for index builds.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builds the index for a project key. Runs on the blocking pool.
pub trait IndexBuilder: Send + Sync + 'static {
    fn build(&self, key: &str, cancel: &CancelToken) -> Result<PropertyIndex, IndexError>;
}

impl<F> IndexBuilder for F
where
    F: Fn(&str, &CancelToken) -> Result<PropertyIndex, IndexError> + Send + Sync + 'static,
{
    fn build(&self, key: &str, cancel: &CancelToken) -> Result<PropertyIndex, IndexError> {
        self(key, cancel)
    }
}

/// Builds the index from a JSON property metadata file. The project key is
/// the path of the file.
///
/// ```json
/// {"properties": [
///   {"name": "server.port", "type": "int", "description": "Server HTTP port."},
///   {"name": "server.old", "deprecation": {"replacement": "server.port"}}
/// ]}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFileBuilder;

#[derive(Debug, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    properties: Vec<MetadataProperty>,
}

#[derive(Debug, Deserialize)]
struct MetadataProperty {
    name: String,
    #[serde(rename = "type", default)]
    ty: String,
    description: Option<String>,
    deprecation: Option<MetadataDeprecation>,
}

#[derive(Debug, Deserialize)]
struct MetadataDeprecation {
    reason: Option<String>,
    replacement: Option<String>,
}

impl IndexBuilder for MetadataFileBuilder {
    fn build(&self, key: &str, cancel: &CancelToken) -> Result<PropertyIndex, IndexError> {
        let text = std::fs::read_to_string(key)
            .map_err(|e| IndexError::Failed(format!("{key}: {e}")))?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let file: MetadataFile = serde_json::from_str(&text)
            .map_err(|e| IndexError::Failed(format!("{key}: {e}")))?;

        Ok(file
            .properties
            .into_iter()
            .map(|p| {
                let deprecation = p.deprecation.map(|d| match (d.reason, d.replacement) {
                    (Some(reason), _) => reason,
                    (None, Some(replacement)) => format!("Use '{replacement}' instead"),
                    (None, None) => format!("'{}' is deprecated", p.name),
                });
                let info = PropertyInfo {
                    ty: p.ty,
                    description: p.description,
                    deprecation,
                };
                (p.name, info)
            })
            .collect())
    }
}

struct Entry {
    snapshot: Option<Arc<PropertyIndex>>,
    /// Bumped on every install.
    generation: u64,
    build_lock: Arc<tokio::sync::Mutex<()>>,
    deadline: Instant,
}

struct CacheInner {
    builder: Arc<dyn IndexBuilder>,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    deadlines: Mutex<BinaryHeap<Reverse<(Instant, String)>>>,
    wake: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panic while holding the lock cannot leave the maps half-updated
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CacheInner {
    fn entry<'m>(&self, entries: &'m mut HashMap<String, Entry>, key: &str) -> &'m mut Entry {
        let ttl = self.ttl;
        entries.entry(key.to_string()).or_insert_with(|| {
            let deadline = Instant::now() + ttl;
            lock(&self.deadlines).push(Reverse((deadline, key.to_string())));
            self.wake.notify_one();
            Entry {
                snapshot: None,
                generation: 0,
                build_lock: Arc::new(tokio::sync::Mutex::new(())),
                deadline,
            }
        })
    }

    fn next_deadline(&self) -> Option<Instant> {
        lock(&self.deadlines).peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Removes entries whose deadline passed. Entries touched since their
    /// deadline was queued are queued again with the new deadline.
    fn evict_expired(&self, now: Instant) {
        let mut entries = lock(&self.entries);
        let mut deadlines = lock(&self.deadlines);
        while let Some(Reverse((deadline, _))) = deadlines.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, key))) = deadlines.pop() else {
                break;
            };
            let Some(entry) = entries.get(&key) else {
                continue;
            };
            if entry.build_lock.try_lock().is_err() {
                deadlines.push(Reverse((now + self.ttl, key)));
            } else if entry.deadline <= now {
                debug!("Evicting idle property index for {}", key);
                entries.remove(&key);
            } else {
                deadlines.push(Reverse((entry.deadline, key)));
            }
        }
    }
}

/// Per-project cache of [`PropertyIndex`] snapshots.
pub struct PropertyIndexCache {
    inner: Arc<CacheInner>,
    sweeper: JoinHandle<()>,
}

impl PropertyIndexCache {
    /// Creates the cache and starts its eviction task. Must be called from
    /// within a tokio runtime.
    pub fn new(builder: impl IndexBuilder, ttl: Duration) -> Self {
        let inner = Arc::new(CacheInner {
            builder: Arc::new(builder),
            ttl,
            entries: Mutex::new(HashMap::new()),
            deadlines: Mutex::new(BinaryHeap::new()),
            wake: Notify::new(),
        });
        let sweeper = tokio::spawn(sweep(Arc::clone(&inner)));
        info!("Property index cache started, idle TTL {:?}", ttl);
        Self { inner, sweeper }
    }

    /// The installed snapshot for `key`, if any. Counts as an access.
    pub fn get(&self, key: &str) -> Option<Arc<PropertyIndex>> {
        let mut entries = lock(&self.inner.entries);
        let entry = entries.get_mut(key)?;
        entry.deadline = Instant::now() + self.inner.ttl;
        entry.snapshot.clone()
    }

    /// Installs a snapshot directly.
    pub fn put(&self, key: &str, index: PropertyIndex) {
        let mut entries = lock(&self.inner.entries);
        let entry = self.inner.entry(&mut entries, key);
        entry.snapshot = Some(Arc::new(index));
        entry.generation += 1;
        entry.deadline = Instant::now() + self.inner.ttl;
    }

    pub fn invalidate(&self, key: &str) {
        lock(&self.inner.entries).remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.inner.entries).contains_key(key)
    }

    /// Returns the installed snapshot, building one first if there is none.
    pub async fn get_or_build(
        &self,
        key: &str,
        cancel: &CancelToken,
    ) -> Result<Arc<PropertyIndex>, IndexError> {
        let (seen_generation, build_lock) = {
            let mut entries = lock(&self.inner.entries);
            let entry = self.inner.entry(&mut entries, key);
            if let Some(snapshot) = &entry.snapshot {
                entry.deadline = Instant::now() + self.inner.ttl;
                return Ok(Arc::clone(snapshot));
            }
            (entry.generation, Arc::clone(&entry.build_lock))
        };
        self.build_locked(key, cancel, seen_generation, build_lock)
            .await
    }

    /// Builds a fresh snapshot for `key` and installs it. Concurrent callers
    /// for the same key wait for the running build and share its result.
    pub async fn rebuild(
        &self,
        key: &str,
        cancel: &CancelToken,
    ) -> Result<Arc<PropertyIndex>, IndexError> {
        let (seen_generation, build_lock) = {
            let mut entries = lock(&self.inner.entries);
            let entry = self.inner.entry(&mut entries, key);
            (entry.generation, Arc::clone(&entry.build_lock))
        };
        self.build_locked(key, cancel, seen_generation, build_lock)
            .await
    }

    async fn build_locked(
        &self,
        key: &str,
        cancel: &CancelToken,
        seen_generation: u64,
        build_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Result<Arc<PropertyIndex>, IndexError> {
        let _guard = build_lock.lock().await;

        {
            let entries = lock(&self.inner.entries);
            if let Some(entry) = entries.get(key) {
                if entry.generation > seen_generation {
                    if let Some(snapshot) = &entry.snapshot {
                        debug!("Property index for {} was rebuilt while waiting", key);
                        return Ok(Arc::clone(snapshot));
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        debug!("Building property index for {}", key);
        let builder = Arc::clone(&self.inner.builder);
        let build_key = key.to_string();
        let build_cancel = cancel.clone();
        let built = tokio::task::spawn_blocking(move || builder.build(&build_key, &build_cancel))
            .await
            .map_err(|e| IndexError::Failed(e.to_string()))?;
        let index = match built {
            Ok(index) => Arc::new(index),
            Err(e) => {
                warn!("Property index build for {} failed: {}", key, e);
                return Err(e);
            }
        };
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut entries = lock(&self.inner.entries);
        let entry = self.inner.entry(&mut entries, key);
        entry.snapshot = Some(Arc::clone(&index));
        entry.generation += 1;
        entry.deadline = Instant::now() + self.inner.ttl;
        info!("Installed property index for {} ({} properties)", key, index.len());
        Ok(index)
    }

    /// A lookup that reads whatever snapshot is installed for `key`.
    pub fn lookup_for(self: &Arc<Self>, key: &str) -> CachedLookup {
        CachedLookup {
            cache: Arc::clone(self),
            key: key.to_string(),
        }
    }
}

impl Drop for PropertyIndexCache {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

async fn sweep(inner: Arc<CacheInner>) {
    loop {
        match inner.next_deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => inner.evict_expired(Instant::now()),
                    _ = inner.wake.notified() => {}
                }
            }
            None => inner.wake.notified().await,
        }
    }
}

/// [`PropertyLookup`] over the current snapshot of one cache entry. Reports
/// itself unavailable while no snapshot is installed.
#[derive(Clone)]
pub struct CachedLookup {
    cache: Arc<PropertyIndexCache>,
    key: String,
}

impl PropertyLookup for CachedLookup {
    fn lookup(&self, name: &str) -> Option<PropertyInfo> {
        self.cache.get(&self.key)?.lookup(name)
    }

    fn names(&self) -> Vec<String> {
        self.cache
            .get(&self.key)
            .map(|index| index.names())
            .unwrap_or_default()
    }

    fn is_available(&self) -> bool {
        self.cache.get(&self.key).is_some()
    }
}

/// An atomic type whose values are the property names of an index. Without
/// index data the type accepts anything and suggests nothing.
pub fn indexed_type(name: impl Into<String>, lookup: Arc<dyn PropertyLookup>) -> YType {
    let hints_from = Arc::clone(&lookup);
    atomic(name)
        .with_hint_provider(move |_: &DynamicSchemaContext<'_>| {
            hints_from
                .names()
                .into_iter()
                .filter_map(|name| {
                    let info = hints_from.lookup(&name)?;
                    if info.deprecation.is_some() {
                        return None;
                    }
                    let mut hint = YValueHint::new(name);
                    if let Some(description) = info.description {
                        hint = hint.with_documentation(Renderable::text(description));
                    }
                    Some(hint)
                })
                .collect()
        })
        .parse_with(
            move |value: &str, _: &DynamicSchemaContext<'_>| -> Result<(), ValueParseError> {
                if !lookup.is_available() {
                    return Ok(());
                }
                match lookup.lookup(value) {
                    None => Err(ValueParseError::new(format!("Unknown property '{value}'"))),
                    Some(PropertyInfo {
                        deprecation: Some(message),
                        ..
                    }) => Err(ValueParseError::deprecated(message, None)),
                    Some(_) => Ok(()),
                }
            },
        )
}
