//! Concrete record sources and an in-memory catalog.
//!
//! - [`FolderSource`] scans a mods directory for `mod.json` manifests.
//! - [`StaticSource`] serves a fixed record list.
//! - [`InMemoryCatalog`] implements [`CatalogClient`] over a fixed item list,
//!   loadable from a [`CatalogSnapshot`] file.

use crate::cancel::run_blocking;
use crate::error::{Error, Result};
use crate::fetcher::{CatalogClient, RecordSource, SubscribedPage};
use crate::identity::{DependencyHint, ModUid, RemoteId, SourceKind};
use crate::record::ModRecord;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use walkdir::WalkDir;

/// File name of the per-folder mod manifest.
pub const MANIFEST_FILE: &str = "mod.json";

/// The `mod.json` manifest found in a local or legacy mod folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModManifest {
    /// Author-declared stable key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Catalog id this folder was copied from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workshop_id: Option<RemoteId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Scans one directory level for mod folders carrying a [`MANIFEST_FILE`].
///
/// The folder name becomes the uid key. Folders without a manifest are
/// ignored and folders with an unreadable manifest are skipped with a warning.
#[derive(Debug, Clone)]
pub struct FolderSource {
    root: Utf8PathBuf,
    kind: SourceKind,
}

impl FolderSource {
    pub fn local(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            kind: SourceKind::Local,
        }
    }

    pub fn legacy(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            kind: SourceKind::Legacy,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl RecordSource for FolderSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn list_records(&self) -> Result<Vec<ModRecord>> {
        let root = self.root.clone();
        let kind = self.kind;
        run_blocking(move || scan_folder(&root, kind)).await
    }
}

fn scan_folder(root: &Utf8Path, kind: SourceKind) -> Result<Vec<ModRecord>> {
    if !root.is_dir() {
        return Err(Error::InvalidSourceDir(root.to_path_buf()));
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(root.as_std_path())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(Error::Io(e.into())),
            Err(e) => {
                tracing::warn!(root = %root, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(folder) = entry.file_name().to_str() else {
            tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 folder name");
            continue;
        };

        match read_mod_folder(entry.path(), folder, kind) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => tracing::debug!(folder, "No manifest, skipping"),
            Err(e) => tracing::warn!(folder, error = %e, "Failed to read mod folder, skipping"),
        }
    }

    tracing::debug!(root = %root, kind = %kind, count = records.len(), "Scanned mod folder");
    Ok(records)
}

fn read_mod_folder(dir: &Path, folder: &str, kind: SourceKind) -> Result<Option<ModRecord>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&manifest_path)?;
    let manifest: ModManifest = serde_json::from_str(&contents)?;
    let metadata = std::fs::metadata(dir)?;

    let size = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();

    let mut record = ModRecord::new(ModUid::new(kind, folder), manifest.name);
    record.id = manifest.id;
    record.workshop_id = manifest.workshop_id;
    record.dependencies = manifest.dependencies;
    record.authors = manifest.authors;
    record.tags = manifest.tags;
    record.description = manifest.description;
    record.preview = manifest.preview;
    record.size = Some(size);
    record.created_at = metadata.created().ok().map(DateTime::<Utc>::from);
    record.updated_at = metadata.modified().ok().map(DateTime::<Utc>::from);
    Ok(Some(record))
}

/// A [`RecordSource`] over a fixed list of records.
#[derive(Debug, Clone)]
pub struct StaticSource {
    kind: SourceKind,
    records: Vec<ModRecord>,
    fail: bool,
}

impl StaticSource {
    pub fn new(kind: SourceKind, records: Vec<ModRecord>) -> Self {
        Self {
            kind,
            records,
            fail: false,
        }
    }

    /// A source whose listing always fails.
    pub fn failing(kind: SourceKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl RecordSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn list_records(&self) -> Result<Vec<ModRecord>> {
        if self.fail {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} source unavailable", self.kind),
            )));
        }
        Ok(self.records.clone())
    }
}

/// Serialized form of an [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub items: Vec<ModRecord>,
    /// Subscribed remote ids, in listing order.
    #[serde(default)]
    pub subscribed: Vec<RemoteId>,
    #[serde(default)]
    pub submitters: BTreeMap<u64, String>,
}

#[derive(Debug, Default)]
struct CallLog {
    pages: u32,
    details: Vec<Vec<RemoteId>>,
    lookups: u32,
}

/// A [`CatalogClient`] serving a fixed set of items.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: HashMap<RemoteId, ModRecord>,
    subscribed: Vec<RemoteId>,
    submitters: HashMap<u64, String>,
    failing_details: BTreeSet<RemoteId>,
    fail_listing: bool,
    lookup_delay: Option<Duration>,
    calls: Mutex<CallLog>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut catalog = Self::new();
        for item in snapshot.items {
            catalog = catalog.with_item(item);
        }
        for id in snapshot.subscribed {
            catalog = catalog.subscribe(id);
        }
        catalog.submitters = snapshot.submitters.into_iter().collect();
        catalog
    }

    /// Load a [`CatalogSnapshot`] JSON file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&contents)?;
        tracing::debug!(path = %path, items = snapshot.items.len(), "Loaded catalog snapshot");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Add an item. Non-remote records are ignored.
    pub fn with_item(mut self, record: ModRecord) -> Self {
        match record.remote_id().filter(|_| record.is_remote()) {
            Some(id) => {
                self.items.insert(id, record);
            }
            None => tracing::warn!(uid = %record.uid, "Ignoring non-remote catalog item"),
        }
        self
    }

    pub fn subscribe(mut self, id: RemoteId) -> Self {
        if !self.subscribed.contains(&id) {
            self.subscribed.push(id);
        }
        self
    }

    pub fn with_submitter(mut self, user_id: u64, name: impl Into<String>) -> Self {
        self.submitters.insert(user_id, name.into());
        self
    }

    /// Every detail call that includes `id` fails.
    pub fn fail_details_for(mut self, id: RemoteId) -> Self {
        self.failing_details.insert(id);
        self
    }

    /// Every listing call fails.
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn pages_listed(&self) -> u32 {
        self.log().pages
    }

    /// Ids requested by each detail call, in call order.
    pub fn detail_calls(&self) -> Vec<Vec<RemoteId>> {
        self.log().details.clone()
    }

    pub fn submitter_lookups(&self) -> u32 {
        self.log().lookups
    }

    fn log(&self) -> std::sync::MutexGuard<'_, CallLog> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_subscribed(&self, id: RemoteId) -> bool {
        self.subscribed.contains(&id)
    }
}

#[async_trait::async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn list_subscribed_page(&self, page: u32, page_size: u32) -> Result<SubscribedPage> {
        self.log().pages += 1;
        if self.fail_listing {
            return Err(Error::Catalog("subscription listing unavailable".into()));
        }

        let size = page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1).saturating_mul(size);
        let items: Vec<ModRecord> = self
            .subscribed
            .iter()
            .skip(start)
            .take(size)
            .map(|id| {
                let name = self
                    .items
                    .get(id)
                    .map(|item| item.name.clone())
                    .unwrap_or_default();
                let mut listing = ModRecord::remote(*id, name);
                listing.state.subscribed = true;
                listing
            })
            .collect();

        Ok(SubscribedPage {
            total_items: self.subscribed.len() as u64,
            num_returned: items.len() as u64,
            items,
        })
    }

    async fn fetch_details(&self, ids: &[RemoteId]) -> Result<Vec<ModRecord>> {
        self.log().details.push(ids.to_vec());
        if let Some(id) = ids.iter().find(|id| self.failing_details.contains(id)) {
            return Err(Error::Catalog(format!("detail call failed for {}", id)));
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.items.get(id))
            .map(|item| {
                let mut item = item.clone();
                if let Some(id) = item.remote_id() {
                    item.state.subscribed = self.is_subscribed(id);
                }
                item
            })
            .collect())
    }

    async fn lookup_submitter(&self, user_id: u64) -> Result<String> {
        self.log().lookups += 1;
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        self.submitters
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("unknown user {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, folder: &str, manifest: &ModManifest) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(manifest).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_folder_source_reads_manifests() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            "Roads",
            &ModManifest {
                id: Some("roads".into()),
                name: "Better Roads".into(),
                workshop_id: Some(RemoteId(12)),
                dependencies: vec![DependencyHint::StableKey("core".into())],
                ..Default::default()
            },
        );
        std::fs::create_dir_all(temp.path().join("NoManifest")).unwrap();
        let broken = temp.path().join("Broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join(MANIFEST_FILE), "{ not json").unwrap();

        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let records = FolderSource::legacy(root).list_records().await.unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.uid, ModUid::legacy("Roads"));
        assert_eq!(record.source_type, SourceKind::Legacy);
        assert_eq!(record.stable_key(), Some("roads"));
        assert_eq!(record.workshop_id, Some(RemoteId(12)));
        assert!(record.size.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_folder_source_missing_root_is_error() {
        let source = FolderSource::local("/definitely/not/here");
        let err = source.list_records().await.unwrap_err();
        assert!(matches!(err, Error::InvalidSourceDir(_)));
    }

    #[tokio::test]
    async fn test_catalog_pages_and_details() {
        let catalog = InMemoryCatalog::new()
            .with_item(ModRecord::remote(RemoteId(1), "One"))
            .with_item(ModRecord::remote(RemoteId(2), "Two"))
            .subscribe(RemoteId(2))
            .subscribe(RemoteId(1));

        let first = catalog.list_subscribed_page(1, 1).await.unwrap();
        assert_eq!(first.total_items, 2);
        assert_eq!(first.items[0].uid, ModUid::remote(RemoteId(2)));
        let third = catalog.list_subscribed_page(3, 1).await.unwrap();
        assert!(third.items.is_empty());

        let details = catalog
            .fetch_details(&[RemoteId(1), RemoteId(77)])
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert!(details[0].state.subscribed);
    }

    #[test]
    fn test_snapshot_round_trip_into_catalog() {
        let json = r#"{
            "items": [{ "uid": "remote:5", "sourceType": "remote", "name": "Five", "submitterId": 9 }],
            "subscribed": [5],
            "submitters": { "9": "Bob" }
        }"#;
        let snapshot: CatalogSnapshot = serde_json::from_str(json).unwrap();
        let catalog = InMemoryCatalog::from_snapshot(snapshot);
        assert!(catalog.is_subscribed(RemoteId(5)));
        assert_eq!(catalog.submitters.get(&9).map(String::as_str), Some("Bob"));
    }
}
