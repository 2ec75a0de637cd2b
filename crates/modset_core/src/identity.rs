//! Source-qualified mod identities.
//!
//! Every observation of a mod carries a [`ModUid`], an explicit pair of
//! [`SourceKind`] and source-local key. The string form `<source>:<key>` is only
//! used at the serialization boundary; code never infers the source by looking
//! at a prefix.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a mod record was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A folder in the game's local mods directory.
    Local,
    /// An item published on the remote workshop catalog.
    Remote,
    /// A package in the legacy package format.
    Legacy,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Remote => "remote",
            SourceKind::Legacy => "legacy",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SourceKind::Local),
            "remote" => Ok(SourceKind::Remote),
            "legacy" => Ok(SourceKind::Legacy),
            other => Err(Error::InvalidUid(other.to_string())),
        }
    }
}

/// Numeric identity of a published item on the remote catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RemoteId(pub u64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(RemoteId)
            .map_err(|_| Error::InvalidUid(s.to_string()))
    }
}

/// Source-qualified identity of one mod record.
///
/// Serialized as the string `<source>:<key>`, e.g. `remote:2881031511` or
/// `local:BetterRoads`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModUid {
    pub source: SourceKind,
    pub key: String,
}

impl ModUid {
    pub fn new(source: SourceKind, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
        }
    }

    pub fn local(key: impl Into<String>) -> Self {
        Self::new(SourceKind::Local, key)
    }

    pub fn legacy(key: impl Into<String>) -> Self {
        Self::new(SourceKind::Legacy, key)
    }

    /// The uid a remote record always carries.
    pub fn remote(id: RemoteId) -> Self {
        Self::new(SourceKind::Remote, id.to_string())
    }

    /// Remote identity encoded in this uid, if it is a remote uid.
    pub fn remote_id(&self) -> Option<RemoteId> {
        match self.source {
            SourceKind::Remote => self.key.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ModUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.key)
    }
}

impl FromStr for ModUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, key) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidUid(s.to_string()))?;
        let source = source
            .parse::<SourceKind>()
            .map_err(|_| Error::InvalidUid(s.to_string()))?;
        if key.is_empty() {
            return Err(Error::InvalidUid(s.to_string()));
        }
        if source == SourceKind::Remote && key.parse::<u64>().is_err() {
            return Err(Error::InvalidUid(s.to_string()));
        }
        Ok(ModUid::new(source, key))
    }
}

impl Serialize for ModUid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModUid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A declared dependency, as written by the mod author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyHint {
    /// Depends on a published catalog item.
    RemoteId(RemoteId),
    /// Depends on whatever mod declares this stable key.
    StableKey(String),
}

impl fmt::Display for DependencyHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyHint::RemoteId(id) => write!(f, "{}", ModUid::remote(*id)),
            DependencyHint::StableKey(key) => f.write_str(key),
        }
    }
}
