//! Collection validation against a resolved [`Registry`].
//!
//! [`validate_collection`] computes a [`ModErrorSet`] for every member of a
//! collection. It is a pure function of `(registry, collection)`: running it
//! twice without a mutation in between yields identical results.
//!
//! Conflicts are only reported, never resolved. When several members of one
//! collection share a descriptor, the host game loads just one of them by its
//! own source priority, but every such member is flagged here.

use crate::cancel::{run_blocking, Generation, Ticket};
use crate::collection::{Collection, IgnoredErrors, MissingDependency, ModErrorSet};
use crate::error::Result;
use crate::identity::ModUid;
use crate::resolver::Registry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Per-member error sets for one collection, keyed by member uid.
pub type ErrorMap = BTreeMap<ModUid, ModErrorSet>;

/// Compute the error set of every member of `collection`.
pub fn validate_collection(registry: &Registry, collection: &Collection) -> ErrorMap {
    let members: BTreeSet<&ModUid> = collection.member_set();
    let mut errors = ErrorMap::new();

    for uid in collection.members() {
        errors.insert(uid.clone(), validate_member(registry, collection, &members, uid));
    }

    errors
}

fn validate_member(
    registry: &Registry,
    collection: &Collection,
    members: &BTreeSet<&ModUid>,
    uid: &ModUid,
) -> ModErrorSet {
    let mut set = ModErrorSet::default();

    let Some(descriptor) = registry.get_by_uid(uid) else {
        set.invalid_id = true;
        return set;
    };

    // Identity conflict: other members of this collection sharing the descriptor
    set.incompatible_mods = collection
        .members()
        .iter()
        .filter(|other| *other != uid && descriptor.member_uids.contains(*other))
        .cloned()
        .collect();

    for dependency in registry.depends_on(descriptor.id) {
        let Some(target) = registry.descriptor(*dependency) else {
            continue;
        };
        let present = target.member_uids.iter().any(|m| members.contains(m));
        if !present {
            set.missing_dependencies.push(MissingDependency::Descriptor {
                id: target.id,
                name: target.name.clone(),
                label: target.label(),
            });
        }
    }
    for hint in &descriptor.unresolved_dependencies {
        set.missing_dependencies
            .push(MissingDependency::Unresolved { hint: hint.clone() });
    }

    if let Some(record) = registry.record(uid).filter(|r| r.is_remote()) {
        set.not_subscribed = !record.state.subscribed;
        set.not_installed = !record.state.installed;
        set.needs_update = record.state.needs_update;
    }

    set
}

/// Result of one validation pass, with the aggregate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub collection: String,
    pub errors: ErrorMap,
    /// `true` iff no member has an error instance outside the ignored list.
    pub success: bool,
    /// Error instances present in `errors` but suppressed by the ignored list.
    pub suppressed: usize,
}

impl ValidationReport {
    pub fn new(collection: &Collection, errors: ErrorMap, ignored: &IgnoredErrors) -> Self {
        let mut failing = 0;
        let mut suppressed = 0;
        for (uid, set) in &errors {
            let total = set.instances().len();
            let left = set.unsuppressed(uid, ignored).len();
            failing += left;
            suppressed += total - left;
        }

        Self {
            collection: collection.name.clone(),
            errors,
            success: failing == 0,
            suppressed,
        }
    }

    /// Members with at least one error, suppressed or not.
    pub fn failing_members(&self) -> impl Iterator<Item = (&ModUid, &ModErrorSet)> {
        self.errors.iter().filter(|(_, set)| !set.is_empty())
    }
}

/// Runs validation passes and keeps the last good report per collection.
///
/// Starting a pass supersedes any pass still in flight. A superseded pass
/// returns [`Error::Cancelled`](crate::Error::Cancelled), and a failed pass
/// leaves the previous report in place.
#[derive(Debug, Default)]
pub struct ValidationService {
    generation: Generation,
    reports: Mutex<HashMap<String, Arc<ValidationReport>>>,
}

impl ValidationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate off the async runtime and store the report if still current.
    pub async fn validate(
        &self,
        registry: Arc<Registry>,
        collection: Collection,
        ignored: IgnoredErrors,
    ) -> Result<Arc<ValidationReport>> {
        let ticket = self.begin();
        tracing::debug!(collection = %collection.name, members = collection.len(), "Validating collection");

        let report = run_blocking(move || {
            let errors = validate_collection(&registry, &collection);
            Ok(ValidationReport::new(&collection, errors, &ignored))
        })
        .await;

        match report {
            Ok(report) => self.apply(ticket, report),
            Err(e) => {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Validation failed, keeping previous report");
                }
                Err(e)
            }
        }
    }

    /// Start a pass by hand. Prefer [`validate`](Self::validate).
    pub fn begin(&self) -> Ticket {
        self.generation.next()
    }

    /// Store `report` if `ticket` is still the newest pass.
    pub fn apply(&self, ticket: Ticket, report: ValidationReport) -> Result<Arc<ValidationReport>> {
        let mut reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.generation.check(ticket) {
            tracing::debug!(collection = %report.collection, "Dropping superseded validation result");
            return Err(e);
        }
        let report = Arc::new(report);
        reports.insert(report.collection.clone(), report.clone());
        Ok(report)
    }

    pub fn last_report(&self, collection: &str) -> Option<Arc<ValidationReport>> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }
}
