//! Named collections persisted in a single `collections.json` index.

use crate::error::{Error, Result};
use crate::json::{read_json_or_default, write_json_pretty};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use modset_core::{Collection, ModUid, RemoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const COLLECTIONS_FILE: &str = "collections.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionIndex {
    #[serde(default)]
    collections: Vec<Collection>,
}

impl CollectionIndex {
    fn find(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// A trimmed name not used by any collection other than `except_id`.
    fn validate_name(&self, name: &str, except_id: Option<&str>) -> Result<String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if self
            .collections
            .iter()
            .any(|c| Some(c.id.as_str()) != except_id && c.name == name)
        {
            return Err(Error::DuplicateName(name));
        }
        Ok(name)
    }
}

/// Reads and writes collections under one data directory.
///
/// Every operation loads the index, applies the change and saves it again.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    root: Utf8PathBuf,
}

impl CollectionStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn index_path(&self) -> Utf8PathBuf {
        self.root.join(COLLECTIONS_FILE)
    }

    fn load(&self) -> Result<CollectionIndex> {
        let mut index: CollectionIndex = read_json_or_default(&self.index_path())?;
        for collection in &mut index.collections {
            collection.dedup();
        }
        Ok(index)
    }

    fn save(&self, index: &CollectionIndex) -> Result<()> {
        write_json_pretty(&self.index_path(), index)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn list_collection_names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.collections.into_iter().map(|c| c.name).collect())
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.load()?.collections)
    }

    pub fn read_collection(&self, name: &str) -> Result<Option<Collection>> {
        Ok(self.load()?.find(name.trim()).cloned())
    }

    /// Insert or replace a collection by id.
    ///
    /// Returns `false` without writing when the name is empty or belongs to a
    /// different collection.
    pub fn write_collection(&self, collection: &Collection) -> Result<bool> {
        let mut index = self.load()?;
        let name = match index.validate_name(&collection.name, Some(&collection.id)) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(id = %collection.id, error = %e, "Rejected collection write");
                return Ok(false);
            }
        };

        let mut collection = collection.clone();
        collection.name = name;
        collection.dedup();
        match index.collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection,
            None => index.collections.push(collection),
        }
        self.save(&index)?;
        Ok(true)
    }

    pub fn create(&self, name: &str) -> Result<Collection> {
        let mut index = self.load()?;
        let name = index.validate_name(name, None)?;

        let collection = Collection::new(Uuid::new_v4().to_string(), name);
        index.collections.push(collection.clone());
        self.save(&index)?;

        tracing::info!("Created collection: {} (id={})", collection.name, collection.id);
        Ok(collection)
    }

    pub fn rename(&self, name: &str, new_name: &str) -> Result<Collection> {
        let mut index = self.load()?;
        let id = index
            .find(name.trim())
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let new_name = index.validate_name(new_name, Some(&id))?;

        let collection = index.find_mut(name.trim())?;
        collection.name = new_name;
        collection.updated_at = Utc::now();
        let result = collection.clone();
        self.save(&index)?;

        tracing::info!("Renamed collection {} to: {}", id, result.name);
        Ok(result)
    }

    /// Copy the members of `name` into a new collection called `new_name`.
    pub fn duplicate(&self, name: &str, new_name: &str) -> Result<Collection> {
        let mut index = self.load()?;
        let source = index
            .find(name.trim())
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let new_name = index.validate_name(new_name, None)?;

        let copy = Collection::new(Uuid::new_v4().to_string(), new_name)
            .with_members(source.members().iter().cloned());
        index.collections.push(copy.clone());
        self.save(&index)?;

        tracing::info!("Duplicated collection {} as: {}", source.name, copy.name);
        Ok(copy)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let mut index = self.load()?;
        let before = index.collections.len();
        index.collections.retain(|c| c.name != name.trim());
        if index.collections.len() == before {
            return Err(Error::NotFound(name.to_string()));
        }
        self.save(&index)?;

        tracing::info!("Deleted collection: {}", name.trim());
        Ok(())
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn add_member(&self, name: &str, uid: ModUid) -> Result<bool> {
        let mut index = self.load()?;
        let added = index.find_mut(name.trim())?.insert(uid);
        if added {
            self.save(&index)?;
        }
        Ok(added)
    }

    /// Remove a member. Returns `false` if it was not present.
    pub fn remove_member(&self, name: &str, uid: &ModUid) -> Result<bool> {
        let mut index = self.load()?;
        let removed = index.find_mut(name.trim())?.remove(uid);
        if removed {
            self.save(&index)?;
        }
        Ok(removed)
    }

    /// Every remote id referenced by any saved collection.
    ///
    /// This is the seed set for the dependency fetcher, so that members which
    /// are no longer subscribed are still resolved.
    pub fn seed_identities(&self) -> Result<BTreeSet<RemoteId>> {
        Ok(self
            .load()?
            .collections
            .iter()
            .flat_map(|c| c.members().iter().filter_map(ModUid::remote_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CollectionStore) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, CollectionStore::new(root))
    }

    #[test]
    fn test_create_validates_names() {
        let (_temp, store) = store();
        store.create("  Main  ").unwrap();
        assert_eq!(store.list_collection_names().unwrap(), vec!["Main".to_string()]);

        assert!(matches!(store.create("   "), Err(Error::EmptyName)));
        assert!(matches!(store.create("Main"), Err(Error::DuplicateName(_))));
    }

    #[test]
    fn test_rename_keeps_id_and_members() {
        let (_temp, store) = store();
        let created = store.create("Main").unwrap();
        store.add_member("Main", ModUid::local("a")).unwrap();
        store.create("Other").unwrap();

        assert!(matches!(
            store.rename("Main", "Other"),
            Err(Error::DuplicateName(_))
        ));
        let renamed = store.rename("Main", "Renamed").unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.members(), &[ModUid::local("a")]);
        assert!(store.read_collection("Main").unwrap().is_none());

        // Renaming to its own name is allowed
        store.rename("Renamed", "Renamed").unwrap();
    }

    #[test]
    fn test_duplicate_and_delete() {
        let (_temp, store) = store();
        store.create("Main").unwrap();
        store.add_member("Main", ModUid::remote(RemoteId(5))).unwrap();

        let copy = store.duplicate("Main", "Copy").unwrap();
        assert_eq!(copy.members(), &[ModUid::remote(RemoteId(5))]);
        assert_ne!(copy.id, store.read_collection("Main").unwrap().unwrap().id);

        store.delete("Main").unwrap();
        assert!(matches!(store.delete("Main"), Err(Error::NotFound(_))));
        assert_eq!(store.list_collection_names().unwrap(), vec!["Copy".to_string()]);
    }

    #[test]
    fn test_write_collection_rejects_name_clash() {
        let (_temp, store) = store();
        store.create("Main").unwrap();

        let clash = Collection::new("other-id", "Main");
        assert!(!store.write_collection(&clash).unwrap());

        let fresh = Collection::new("other-id", "Fresh").with_members([ModUid::local("x")]);
        assert!(store.write_collection(&fresh).unwrap());
        assert_eq!(store.read_collection("Fresh").unwrap().unwrap(), fresh);
    }

    #[test]
    fn test_members_and_seed_identities() {
        let (_temp, store) = store();
        store.create("A").unwrap();
        store.create("B").unwrap();

        assert!(store.add_member("A", ModUid::remote(RemoteId(1))).unwrap());
        assert!(!store.add_member("A", ModUid::remote(RemoteId(1))).unwrap());
        store.add_member("A", ModUid::local("folder")).unwrap();
        store.add_member("B", ModUid::remote(RemoteId(2))).unwrap();
        store.add_member("B", ModUid::remote(RemoteId(1))).unwrap();

        assert_eq!(
            store.seed_identities().unwrap(),
            BTreeSet::from([RemoteId(1), RemoteId(2)])
        );

        assert!(store.remove_member("B", &ModUid::remote(RemoteId(2))).unwrap());
        assert!(!store.remove_member("B", &ModUid::remote(RemoteId(2))).unwrap());
        assert!(matches!(
            store.add_member("Missing", ModUid::local("x")),
            Err(Error::NotFound(_))
        ));
    }
}
