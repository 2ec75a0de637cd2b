//! User collections and per-member validation results.

use crate::descriptor::DescriptorId;
use crate::identity::{DependencyHint, ModUid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A named, ordered set of member uids chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Unique identifier (UUID), stable across renames.
    pub id: String,
    pub name: String,
    /// Member uids in user order, without duplicates.
    members: Vec<ModUid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            members: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_members<I: IntoIterator<Item = ModUid>>(mut self, members: I) -> Self {
        for uid in members {
            self.insert(uid);
        }
        self
    }

    pub fn members(&self) -> &[ModUid] {
        &self.members
    }

    pub fn member_set(&self) -> BTreeSet<&ModUid> {
        self.members.iter().collect()
    }

    pub fn contains(&self, uid: &ModUid) -> bool {
        self.members.contains(uid)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a member. Returns `false` if it was already present.
    pub fn insert(&mut self, uid: ModUid) -> bool {
        if self.contains(&uid) {
            return false;
        }
        self.members.push(uid);
        self.updated_at = Utc::now();
        true
    }

    /// Remove a member. Returns `false` if it was not present.
    pub fn remove(&mut self, uid: &ModUid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != uid);
        let removed = self.members.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Drop duplicate members that may have slipped into a hand-edited file,
    /// keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = BTreeSet::new();
        self.members.retain(|m| seen.insert(m.clone()));
    }
}

/// Kinds of per-member validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidId,
    NotSubscribed,
    NotInstalled,
    NeedsUpdate,
    MissingDependency,
    IncompatibleMod,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidId => "invalidId",
            ErrorKind::NotSubscribed => "notSubscribed",
            ErrorKind::NotInstalled => "notInstalled",
            ErrorKind::NeedsUpdate => "needsUpdate",
            ErrorKind::MissingDependency => "missingDependency",
            ErrorKind::IncompatibleMod => "incompatibleMod",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "invalidid" => Ok(ErrorKind::InvalidId),
            "notsubscribed" => Ok(ErrorKind::NotSubscribed),
            "notinstalled" => Ok(ErrorKind::NotInstalled),
            "needsupdate" => Ok(ErrorKind::NeedsUpdate),
            "missingdependency" => Ok(ErrorKind::MissingDependency),
            "incompatiblemod" | "incompatiblemods" => Ok(ErrorKind::IncompatibleMod),
            _ => Err(format!("Unknown error kind '{}'", s)),
        }
    }
}

/// A dependency of a member that has no member present in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MissingDependency {
    /// A descriptor that exists in the registry but is not in the collection.
    Descriptor {
        id: DescriptorId,
        name: String,
        /// Stable key, or the first member uid for keyless descriptors.
        label: String,
    },
    /// A declared dependency that matched nothing the fetcher could resolve.
    Unresolved { hint: DependencyHint },
}

impl MissingDependency {
    /// The offending id used by the ignored-errors allow-list.
    pub fn offending_id(&self) -> String {
        match self {
            MissingDependency::Descriptor { label, .. } => label.clone(),
            MissingDependency::Unresolved { hint } => hint.to_string(),
        }
    }
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingDependency::Descriptor { name, .. } => f.write_str(name),
            MissingDependency::Unresolved { hint } => write!(f, "{} (unavailable)", hint),
        }
    }
}

/// Validation errors for one collection member. Always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModErrorSet {
    #[serde(default)]
    pub invalid_id: bool,
    #[serde(default)]
    pub not_subscribed: bool,
    #[serde(default)]
    pub not_installed: bool,
    #[serde(default)]
    pub needs_update: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_dependencies: Vec<MissingDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incompatible_mods: Vec<ModUid>,
}

impl ModErrorSet {
    pub fn is_empty(&self) -> bool {
        self.instances().is_empty()
    }

    /// Every individual error as `(kind, offending id)`.
    pub fn instances(&self) -> Vec<(ErrorKind, Option<String>)> {
        let mut out = Vec::new();
        if self.invalid_id {
            out.push((ErrorKind::InvalidId, None));
        }
        if self.not_subscribed {
            out.push((ErrorKind::NotSubscribed, None));
        }
        if self.not_installed {
            out.push((ErrorKind::NotInstalled, None));
        }
        if self.needs_update {
            out.push((ErrorKind::NeedsUpdate, None));
        }
        for dep in &self.missing_dependencies {
            out.push((ErrorKind::MissingDependency, Some(dep.offending_id())));
        }
        for other in &self.incompatible_mods {
            out.push((ErrorKind::IncompatibleMod, Some(other.to_string())));
        }
        out
    }

    /// Error instances of `member` that are not suppressed by `ignored`.
    pub fn unsuppressed(
        &self,
        member: &ModUid,
        ignored: &IgnoredErrors,
    ) -> Vec<(ErrorKind, Option<String>)> {
        self.instances()
            .into_iter()
            .filter(|(kind, offending)| !ignored.contains(*kind, member, offending.as_deref()))
            .collect()
    }
}

/// One suppressed error instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredError {
    pub kind: ErrorKind,
    pub member: ModUid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offending: Option<String>,
}

/// The persisted allow-list of error instances the user chose to ignore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoredErrors(BTreeSet<IgnoredError>);

impl IgnoredErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: IgnoredError) -> bool {
        self.0.insert(entry)
    }

    pub fn remove(&mut self, entry: &IgnoredError) -> bool {
        self.0.remove(entry)
    }

    pub fn contains(&self, kind: ErrorKind, member: &ModUid, offending: Option<&str>) -> bool {
        self.0.contains(&IgnoredError {
            kind,
            member: member.clone(),
            offending: offending.map(str::to_string),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &IgnoredError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<IgnoredError> for IgnoredErrors {
    fn from_iter<T: IntoIterator<Item = IgnoredError>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RemoteId;

    #[test]
    fn test_collection_rejects_duplicates_and_keeps_order() {
        let mut collection = Collection::new("id", "Main").with_members([
            ModUid::local("b"),
            ModUid::local("a"),
            ModUid::local("b"),
        ]);
        assert_eq!(collection.members(), &[ModUid::local("b"), ModUid::local("a")]);

        assert!(!collection.insert(ModUid::local("a")));
        assert!(collection.remove(&ModUid::local("b")));
        assert!(!collection.remove(&ModUid::local("b")));
        assert_eq!(collection.members(), &[ModUid::local("a")]);
    }

    #[test]
    fn test_error_kind_parsing_is_lenient() {
        assert_eq!("missing-dependency".parse::<ErrorKind>().unwrap(), ErrorKind::MissingDependency);
        assert_eq!("incompatibleMods".parse::<ErrorKind>().unwrap(), ErrorKind::IncompatibleMod);
        assert_eq!("NOT_INSTALLED".parse::<ErrorKind>().unwrap(), ErrorKind::NotInstalled);
        assert!("whatever".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_unsuppressed_filters_exact_instances() {
        let member = ModUid::remote(RemoteId(1));
        let errors = ModErrorSet {
            not_installed: true,
            incompatible_mods: vec![ModUid::local("x"), ModUid::local("y")],
            ..Default::default()
        };
        assert_eq!(errors.instances().len(), 3);

        let ignored: IgnoredErrors = [
            IgnoredError {
                kind: ErrorKind::IncompatibleMod,
                member: member.clone(),
                offending: Some("local:x".into()),
            },
            IgnoredError {
                kind: ErrorKind::NotInstalled,
                member: ModUid::local("someone-else"),
                offending: None,
            },
        ]
        .into_iter()
        .collect();

        let left = errors.unsuppressed(&member, &ignored);
        assert_eq!(
            left,
            vec![
                (ErrorKind::NotInstalled, None),
                (ErrorKind::IncompatibleMod, Some("local:y".to_string())),
            ]
        );
    }
}
