//! Canonical mod identities.

use crate::identity::{DependencyHint, ModUid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Index of a descriptor inside one [`Registry`](crate::Registry).
///
/// Only meaningful for the registry that produced it; a rebuild renumbers
/// descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorId(pub usize);

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The resolved identity that one or more [`ModRecord`](crate::ModRecord)s collapse into.
///
/// More than one member uid means several sources provide the same logical mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModDescriptor {
    pub id: DescriptorId,
    /// The shared stable key. `None` for keyless singletons.
    #[serde(rename = "modID")]
    pub mod_id: Option<String>,
    pub name: String,
    #[serde(rename = "memberUIDs")]
    pub member_uids: BTreeSet<ModUid>,
    /// Declared dependencies that matched no descriptor in the registry.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_dependencies: BTreeSet<DependencyHint>,
}

impl ModDescriptor {
    pub fn has_conflict(&self) -> bool {
        self.member_uids.len() > 1
    }

    /// Identifier used when this descriptor is the offending side of an error:
    /// the stable key, or the first member uid for keyless descriptors.
    pub fn label(&self) -> String {
        match (&self.mod_id, self.member_uids.iter().next()) {
            (Some(key), _) => key.clone(),
            (None, Some(uid)) => uid.to_string(),
            (None, None) => self.name.clone(),
        }
    }
}

/// A manual correction of automatic identity resolution for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModOverride {
    /// Replaces the record's stable key. An empty string forces the record into
    /// a keyless singleton.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_override: Option<String>,
    /// Replaces the record's tags in row projections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_override: Option<String>,
}

impl ModOverride {
    pub fn is_empty(&self) -> bool {
        self.id_override.is_none() && self.tag_override.is_none()
    }
}
