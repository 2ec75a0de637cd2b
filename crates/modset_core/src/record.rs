//! Raw mod records as observed by a single source.
//!
//! A [`ModRecord`] is immutable after a load cycle except for its
//! [`RemoteState`], which asynchronous state-change notifications patch in place
//! through [`ModRecord::apply_state`].

use crate::identity::{DependencyHint, ModUid, RemoteId, SourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Installation state of a remote item as reported by the host client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteState {
    pub subscribed: bool,
    pub installed: bool,
    pub downloading: bool,
    pub download_pending: bool,
    pub needs_update: bool,
}

/// A partial update of [`RemoteState`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_update: Option<bool>,
    /// Stable key read from the installed files, when an install reveals one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<RemoteState> for RemoteStatePatch {
    fn from(state: RemoteState) -> Self {
        Self {
            subscribed: Some(state.subscribed),
            installed: Some(state.installed),
            downloading: Some(state.downloading),
            download_pending: Some(state.download_pending),
            needs_update: Some(state.needs_update),
            id: None,
        }
    }
}

/// Outcome of applying a [`RemoteStatePatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub before: RemoteState,
    pub after: RemoteState,
    /// The patch replaced the record's stable key.
    pub key_changed: bool,
}

impl StateTransition {
    pub fn changed(&self) -> bool {
        self.before != self.after || self.key_changed
    }

    /// A record that becomes installed for the first time may now expose a
    /// stable key, so the registry must be rebuilt in full.
    pub fn requires_rebuild(&self) -> bool {
        (!self.before.installed && self.after.installed) || self.key_changed
    }
}

/// One observation of a mod from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRecord {
    pub uid: ModUid,
    /// Author-declared stable key. Empty strings are treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workshop_id: Option<RemoteId>,
    pub source_type: SourceKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyHint>,
    #[serde(default)]
    pub state: RemoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Catalog user id of the submitter, resolved into `authors` during fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl ModRecord {
    /// Create a bare record from a local or legacy folder.
    pub fn new(uid: ModUid, name: impl Into<String>) -> Self {
        let source_type = uid.source;
        Self {
            uid,
            id: None,
            workshop_id: None,
            source_type,
            dependencies: Vec::new(),
            state: RemoteState::default(),
            size: None,
            created_at: None,
            updated_at: None,
            name: name.into(),
            authors: Vec::new(),
            submitter_id: None,
            tags: Vec::new(),
            description: String::new(),
            preview: None,
        }
    }

    /// Create a bare record for a remote catalog item.
    pub fn remote(id: RemoteId, name: impl Into<String>) -> Self {
        let mut record = Self::new(ModUid::remote(id), name);
        record.workshop_id = Some(id);
        record
    }

    pub fn with_stable_key(mut self, key: impl Into<String>) -> Self {
        self.id = Some(key.into());
        self
    }

    pub fn with_dependency(mut self, hint: DependencyHint) -> Self {
        self.dependencies.push(hint);
        self
    }

    pub fn with_state(mut self, state: RemoteState) -> Self {
        self.state = state;
        self
    }

    pub fn is_remote(&self) -> bool {
        self.source_type == SourceKind::Remote
    }

    /// The author-declared stable key, ignoring empty and whitespace-only values.
    pub fn stable_key(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// The remote identity, taken from the explicit field or from a remote uid.
    pub fn remote_id(&self) -> Option<RemoteId> {
        self.workshop_id.or_else(|| self.uid.remote_id())
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.stable_key().unwrap_or(&self.uid.key)
        } else {
            &self.name
        }
    }

    /// Remote ids this record depends on.
    pub fn remote_dependencies(&self) -> impl Iterator<Item = RemoteId> + '_ {
        self.dependencies.iter().filter_map(|hint| match hint {
            DependencyHint::RemoteId(id) => Some(*id),
            DependencyHint::StableKey(_) => None,
        })
    }

    /// Patch the remote state flags in place.
    pub fn apply_state(&mut self, patch: RemoteStatePatch) -> StateTransition {
        let before = self.state;
        let state = &mut self.state;
        if let Some(v) = patch.subscribed {
            state.subscribed = v;
        }
        if let Some(v) = patch.installed {
            state.installed = v;
        }
        if let Some(v) = patch.downloading {
            state.downloading = v;
        }
        if let Some(v) = patch.download_pending {
            state.download_pending = v;
        }
        if let Some(v) = patch.needs_update {
            state.needs_update = v;
        }

        let mut key_changed = false;
        if let Some(key) = patch.id {
            let key = key.trim().to_string();
            if !key.is_empty() && self.stable_key() != Some(key.as_str()) {
                self.id = Some(key);
                key_changed = true;
            }
        }

        StateTransition {
            before,
            after: self.state,
            key_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_key_ignores_blank() {
        let record = ModRecord::new(ModUid::local("a"), "A").with_stable_key("  ");
        assert_eq!(record.stable_key(), None);

        let record = ModRecord::new(ModUid::local("a"), "A").with_stable_key(" core ");
        assert_eq!(record.stable_key(), Some("core"));
    }

    #[test]
    fn test_remote_record_identity() {
        let record = ModRecord::remote(RemoteId(99), "Roads");
        assert_eq!(record.uid, ModUid::remote(RemoteId(99)));
        assert_eq!(record.remote_id(), Some(RemoteId(99)));
        assert!(record.is_remote());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let record = ModRecord::new(ModUid::local("folder"), "");
        assert_eq!(record.display_name(), "folder");
        let record = record.with_stable_key("key");
        assert_eq!(record.display_name(), "key");
    }

    #[test]
    fn test_apply_state_first_install_requires_rebuild() {
        let mut record = ModRecord::remote(RemoteId(1), "A");
        let transition = record.apply_state(RemoteStatePatch {
            subscribed: Some(true),
            ..Default::default()
        });
        assert!(transition.changed());
        assert!(!transition.requires_rebuild());

        let transition = record.apply_state(RemoteStatePatch {
            installed: Some(true),
            ..Default::default()
        });
        assert!(transition.requires_rebuild());
        assert!(record.state.subscribed);
        assert!(record.state.installed);

        let transition = record.apply_state(RemoteStatePatch {
            needs_update: Some(true),
            ..Default::default()
        });
        assert!(!transition.requires_rebuild());

        let transition = record.apply_state(RemoteStatePatch {
            id: Some("roads".into()),
            ..Default::default()
        });
        assert!(transition.key_changed && transition.requires_rebuild());
        assert_eq!(record.stable_key(), Some("roads"));

        // Same key again is not a change
        let transition = record.apply_state(RemoteStatePatch {
            id: Some(" roads ".into()),
            ..Default::default()
        });
        assert!(!transition.changed());
    }

    #[test]
    fn test_record_json_is_flat() {
        let record = ModRecord::remote(RemoteId(5), "Trees")
            .with_stable_key("trees")
            .with_dependency(DependencyHint::RemoteId(RemoteId(6)));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["uid"], "remote:5");
        assert_eq!(json["id"], "trees");
        assert_eq!(json["workshopId"], 5);
        assert_eq!(json["sourceType"], "remote");

        let back: ModRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
