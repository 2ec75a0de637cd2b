//! Descriptor resolution and the dependency graph.
//!
//! [`resolve_registry`] turns the full record set of a load cycle into a
//! [`Registry`]: the canonical [`ModDescriptor`]s plus the forward
//! (`depends_on`) and backward (`dependency_for`) edge indexes.
//!
//! # Resolution Algorithm
//!
//! 1. Apply user [`ModOverride`]s to each record's stable key.
//! 2. Remote records (sorted by uid) find-or-create a descriptor by stable key,
//!    then register both their remote id and stable key.
//! 3. Local and legacy records (sorted by uid) join the descriptor of their
//!    stable key, or create one. Keyless records become singletons identified
//!    only by their own uid.
//! 4. Every declared dependency hint of every record is resolved against the
//!    registry. Hits become edges on the owning descriptor, misses are kept as
//!    `unresolved_dependencies` and only surface at validation time.
//!
//! Identity is never patched incrementally. Any change to the record set (new
//! load cycle, or a record becoming installed) rebuilds it from scratch. Only
//! remote state flags are patched in place, see [`RegistryCell::apply_state`].

use crate::cancel::{run_blocking, Generation, Ticket};
use crate::descriptor::{DescriptorId, ModDescriptor, ModOverride};
use crate::error::{Error, Result};
use crate::identity::{DependencyHint, ModUid, RemoteId, SourceKind};
use crate::record::{ModRecord, RemoteStatePatch, StateTransition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// User-entered identity corrections, keyed by record uid.
pub type Overrides = HashMap<ModUid, ModOverride>;

/// The resolved registry for one load cycle.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: BTreeMap<ModUid, ModRecord>,
    descriptors: Vec<ModDescriptor>,
    by_uid: HashMap<ModUid, DescriptorId>,
    by_remote: HashMap<RemoteId, DescriptorId>,
    by_key: HashMap<String, DescriptorId>,
    /// Non-remote records that declare a workshop id. Only used to satisfy
    /// remote-id dependency hints, never to merge identities.
    workshop_aliases: HashMap<RemoteId, DescriptorId>,
    depends_on: Vec<BTreeSet<DescriptorId>>,
    dependency_for: Vec<BTreeSet<DescriptorId>>,
    overrides: Overrides,
}

/// Build a [`Registry`] from the full record set and the user override map.
///
/// Fails with [`Error::Internal`] on a malformed record (a record whose
/// `source_type` disagrees with its uid, or a remote record without a remote id).
pub fn resolve_registry(records: Vec<ModRecord>, overrides: &Overrides) -> Result<Registry> {
    let mut unique: BTreeMap<ModUid, ModRecord> = BTreeMap::new();
    for record in records {
        validate_record(&record)?;
        match unique.entry(record.uid.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                tracing::warn!(uid = %record.uid, "Duplicate record uid, keeping the higher ranked one");
                if duplicate_rank(&record) > duplicate_rank(slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }

    let mut registry = Registry {
        overrides: overrides.clone(),
        ..Registry::default()
    };

    // Pass 1: remote-anchored identities
    for record in unique.values().filter(|r| r.is_remote()) {
        let key = registry.effective_key(record);
        let remote_id = record
            .remote_id()
            .ok_or_else(|| Error::Internal(format!("Remote record {} has no remote id", record.uid)))?;

        let descriptor = key
            .as_deref()
            .and_then(|k| registry.by_key.get(k).copied())
            .or_else(|| registry.by_remote.get(&remote_id).copied())
            .unwrap_or_else(|| registry.push_descriptor(key.clone()));

        registry.by_remote.insert(remote_id, descriptor);
        if let Some(key) = key {
            registry.by_key.insert(key, descriptor);
        }
        registry.attach(descriptor, &record.uid);
    }

    // Pass 2: local and legacy records
    for record in unique.values().filter(|r| !r.is_remote()) {
        let key = registry.effective_key(record);
        let descriptor = match key {
            Some(key) => match registry.by_key.get(&key) {
                Some(existing) => *existing,
                None => {
                    let created = registry.push_descriptor(Some(key.clone()));
                    registry.by_key.insert(key, created);
                    created
                }
            },
            None => registry.push_descriptor(None),
        };
        registry.attach(descriptor, &record.uid);

        if let Some(workshop_id) = record.workshop_id {
            registry.workshop_aliases.entry(workshop_id).or_insert(descriptor);
        }
    }

    registry.records = unique;
    registry.name_descriptors();
    registry.build_edges();

    tracing::debug!(
        records = registry.records.len(),
        descriptors = registry.descriptors.len(),
        "Resolved registry"
    );

    Ok(registry)
}

/// Total order between records sharing a uid: a stable key beats none, then
/// the newer `updated_at`, then the serialized content.
fn duplicate_rank(record: &ModRecord) -> (bool, Option<DateTime<Utc>>, String) {
    (
        record.stable_key().is_some(),
        record.updated_at,
        serde_json::to_string(record).unwrap_or_default(),
    )
}

fn validate_record(record: &ModRecord) -> Result<()> {
    if record.source_type != record.uid.source {
        return Err(Error::Internal(format!(
            "Record {} declares source '{}' but its uid is '{}'",
            record.uid, record.source_type, record.uid.source
        )));
    }
    if record.is_remote() && record.remote_id().is_none() {
        return Err(Error::Internal(format!(
            "Remote record {} has no remote id",
            record.uid
        )));
    }
    Ok(())
}

impl Registry {
    /// Stable key after applying a user override. An empty override forces `None`.
    fn effective_key(&self, record: &ModRecord) -> Option<String> {
        match self
            .overrides
            .get(&record.uid)
            .and_then(|o| o.id_override.as_deref())
        {
            Some(forced) => Some(forced.trim())
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            None => record.stable_key().map(str::to_string),
        }
    }

    fn push_descriptor(&mut self, mod_id: Option<String>) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len());
        self.descriptors.push(ModDescriptor {
            id,
            mod_id,
            name: String::new(),
            member_uids: BTreeSet::new(),
            unresolved_dependencies: BTreeSet::new(),
        });
        self.depends_on.push(BTreeSet::new());
        self.dependency_for.push(BTreeSet::new());
        id
    }

    fn attach(&mut self, descriptor: DescriptorId, uid: &ModUid) {
        self.descriptors[descriptor.0].member_uids.insert(uid.clone());
        self.by_uid.insert(uid.clone(), descriptor);
    }

    /// Best-effort display name: a remote member's name wins, then any other
    /// member's, then the stable key, then the first uid.
    fn name_descriptors(&mut self) {
        for descriptor in &mut self.descriptors {
            let mut members: Vec<&ModRecord> = descriptor
                .member_uids
                .iter()
                .filter_map(|uid| self.records.get(uid))
                .collect();
            members.sort_by_key(|r| (!r.is_remote(), r.uid.clone()));

            descriptor.name = members
                .iter()
                .map(|r| r.name.trim())
                .find(|name| !name.is_empty())
                .map(str::to_string)
                .or_else(|| descriptor.mod_id.clone())
                .or_else(|| descriptor.member_uids.iter().next().map(|uid| uid.to_string()))
                .unwrap_or_default();
        }
    }

    fn build_edges(&mut self) {
        for record in self.records.values() {
            let Some(&owner) = self.by_uid.get(&record.uid) else {
                continue;
            };
            for hint in &record.dependencies {
                match self.resolve_hint(hint) {
                    Some(target) if target == owner => {}
                    Some(target) => {
                        self.depends_on[owner.0].insert(target);
                        self.dependency_for[target.0].insert(owner);
                    }
                    None => {
                        self.descriptors[owner.0]
                            .unresolved_dependencies
                            .insert(hint.clone());
                    }
                }
            }
        }
    }

    /// The descriptor a dependency hint points at, if it is present.
    pub fn resolve_hint(&self, hint: &DependencyHint) -> Option<DescriptorId> {
        match hint {
            DependencyHint::RemoteId(id) => self
                .by_remote
                .get(id)
                .or_else(|| self.workshop_aliases.get(id))
                .copied(),
            DependencyHint::StableKey(key) => self.by_key.get(key.trim()).copied(),
        }
    }

    pub fn get_by_uid(&self, uid: &ModUid) -> Option<&ModDescriptor> {
        self.by_uid.get(uid).map(|id| &self.descriptors[id.0])
    }

    pub fn get_by_remote_id(&self, id: RemoteId) -> Option<&ModDescriptor> {
        self.by_remote.get(&id).map(|id| &self.descriptors[id.0])
    }

    pub fn get_by_stable_key(&self, key: &str) -> Option<&ModDescriptor> {
        self.by_key.get(key).map(|id| &self.descriptors[id.0])
    }

    /// Descriptor for a record, preferring the stable-key mapping and falling
    /// back to the remote-identity mapping. A record may carry a stale or
    /// absent stable key while still being remote-identifiable.
    pub fn get_descriptor(&self, record: &ModRecord) -> Option<&ModDescriptor> {
        if let Some(found) = self
            .effective_key(record)
            .and_then(|key| self.by_key.get(&key))
        {
            return Some(&self.descriptors[found.0]);
        }
        if record.is_remote() {
            if let Some(found) = record.remote_id().and_then(|id| self.by_remote.get(&id)) {
                return Some(&self.descriptors[found.0]);
            }
        }
        self.get_by_uid(&record.uid)
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<&ModDescriptor> {
        self.descriptors.get(id.0)
    }

    pub fn descriptors(&self) -> &[ModDescriptor] {
        &self.descriptors
    }

    pub fn depends_on(&self, id: DescriptorId) -> &BTreeSet<DescriptorId> {
        &self.depends_on[id.0]
    }

    pub fn dependency_for(&self, id: DescriptorId) -> &BTreeSet<DescriptorId> {
        &self.dependency_for[id.0]
    }

    pub fn record(&self, uid: &ModUid) -> Option<&ModRecord> {
        self.records.get(uid)
    }

    pub fn records(&self) -> impl Iterator<Item = &ModRecord> {
        self.records.values()
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Patch a record's remote state in place.
    ///
    /// Returns `None` for an unknown uid. When the returned transition
    /// [`requires_rebuild`](StateTransition::requires_rebuild), the caller should
    /// rebuild the registry from [`into_records`](Self::into_records).
    pub fn apply_state(&mut self, uid: &ModUid, patch: RemoteStatePatch) -> Option<StateTransition> {
        self.records.get_mut(uid).map(|record| record.apply_state(patch))
    }

    /// Take the record set back out, e.g. to rebuild.
    pub fn into_records(self) -> Vec<ModRecord> {
        self.records.into_values().collect()
    }

    /// Searchable row projection, one row per record.
    pub fn rows(&self, filter: &RowFilter) -> Vec<ModRow> {
        let query = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<ModRow> = self
            .records
            .values()
            .filter(|r| filter.source.map_or(true, |s| s == r.source_type))
            .filter_map(|record| {
                let descriptor_id = *self.by_uid.get(&record.uid)?;
                let descriptor = &self.descriptors[descriptor_id.0];
                if filter.conflicts_only && !descriptor.has_conflict() {
                    return None;
                }
                let row = self.project_row(record, descriptor);
                match &query {
                    Some(q) if !row.matches(q) => None,
                    _ => Some(row),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.uid.cmp(&b.uid))
        });
        rows
    }

    fn project_row(&self, record: &ModRecord, descriptor: &ModDescriptor) -> ModRow {
        let tags = match self
            .overrides
            .get(&record.uid)
            .and_then(|o| o.tag_override.as_deref())
        {
            Some(forced) => forced
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            None => record.tags.clone(),
        };

        ModRow {
            uid: record.uid.clone(),
            name: record.display_name().to_string(),
            source: record.source_type,
            descriptor: descriptor.id,
            stable_key: descriptor.mod_id.clone(),
            authors: record.authors.clone(),
            tags,
            has_conflict: descriptor.has_conflict(),
            dependency_count: self.depends_on[descriptor.id.0].len(),
            dependent_count: self.dependency_for[descriptor.id.0].len(),
            subscribed: record.state.subscribed,
            installed: record.state.installed,
        }
    }
}

/// Filter for [`Registry::rows`].
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    /// Case-insensitive text matched against name, uid, stable key, authors and tags.
    pub query: Option<String>,
    pub source: Option<SourceKind>,
    pub conflicts_only: bool,
}

/// A flat, display-ready view of one record and its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRow {
    pub uid: ModUid,
    pub name: String,
    pub source: SourceKind,
    pub descriptor: DescriptorId,
    pub stable_key: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub has_conflict: bool,
    pub dependency_count: usize,
    pub dependent_count: usize,
    pub subscribed: bool,
    pub installed: bool,
}

impl ModRow {
    fn matches(&self, lowercase_query: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(lowercase_query);
        hit(&self.name)
            || hit(&self.uid.to_string())
            || self.stable_key.as_deref().is_some_and(hit)
            || self.authors.iter().any(|a| hit(a.as_str()))
            || self.tags.iter().any(|t| hit(t.as_str()))
    }
}

/// Holds the current registry and drops superseded rebuilds.
#[derive(Debug, Default)]
pub struct RegistryCell {
    generation: Generation,
    current: Mutex<Arc<Registry>>,
}

impl RegistryCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<Registry> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the registry off the async runtime and install it.
    ///
    /// If another rebuild starts before this one finishes, this one returns
    /// [`Error::Cancelled`] and leaves the newer registry in place.
    pub async fn rebuild(&self, records: Vec<ModRecord>, overrides: Overrides) -> Result<Arc<Registry>> {
        let ticket = self.generation.next();
        self.rebuild_for(ticket, records, overrides).await
    }

    async fn rebuild_for(
        &self,
        ticket: Ticket,
        records: Vec<ModRecord>,
        overrides: Overrides,
    ) -> Result<Arc<Registry>> {
        let registry = run_blocking(move || resolve_registry(records, &overrides)).await?;
        let registry = Arc::new(registry);

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.check(ticket)?;
        *current = registry.clone();
        Ok(registry)
    }

    /// Apply a remote state notification to the current registry.
    ///
    /// Returns `Ok(None)` for a uid the registry does not know. A transition
    /// that [`requires_rebuild`](StateTransition::requires_rebuild) rebuilds the
    /// registry from the patched record set. Any other change swaps in a patched
    /// copy without touching identities.
    pub async fn apply_state(
        &self,
        uid: &ModUid,
        patch: RemoteStatePatch,
    ) -> Result<Option<StateTransition>> {
        let mut patched = Registry::clone(&self.current());
        let Some(transition) = patched.apply_state(uid, patch) else {
            tracing::debug!(%uid, "State change for unknown record ignored");
            return Ok(None);
        };

        if transition.requires_rebuild() {
            tracing::info!(%uid, "Record identity may have changed, rebuilding registry");
            let overrides = patched.overrides().clone();
            self.rebuild(patched.into_records(), overrides).await?;
        } else if transition.changed() {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            // Carry the flags over to whatever registry is current now
            let mut latest = Registry::clone(&current);
            latest.apply_state(uid, RemoteStatePatch::from(transition.after));
            *current = Arc::new(latest);
        }
        Ok(Some(transition))
    }
}
