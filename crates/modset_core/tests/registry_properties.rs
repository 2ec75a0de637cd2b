use modset_core::{
    resolve_registry, validate_collection, Collection, DependencyFetcher, DependencyHint, ErrorKind,
    FetchConfig, IgnoredError, IgnoredErrors, InMemoryCatalog, MissingDependency, ModRecord,
    ModUid, Overrides, Registry, RemoteId, RetryPolicy, ValidationReport,
};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn remote(id: u64, key: Option<&str>) -> ModRecord {
    let record = ModRecord::remote(RemoteId(id), format!("Remote {}", id));
    match key {
        Some(k) => record.with_stable_key(k),
        None => record,
    }
}

fn local(folder: &str, key: Option<&str>) -> ModRecord {
    let record = ModRecord::new(ModUid::local(folder), folder);
    match key {
        Some(k) => record.with_stable_key(k),
        None => record,
    }
}

fn sample_records() -> Vec<ModRecord> {
    vec![
        remote(1, Some("core")),
        remote(2, Some("roads")).with_dependency(DependencyHint::StableKey("core".into())),
        remote(3, None).with_dependency(DependencyHint::RemoteId(RemoteId(2))),
        local("core-dev", Some("core")),
        local("trees", Some("trees")).with_dependency(DependencyHint::RemoteId(RemoteId(1))),
        ModRecord::new(ModUid::legacy("trees-old"), "Trees (legacy)").with_stable_key("trees"),
        local("loose", None),
    ]
}

/// One record drawn from small pools, so uids, stable keys and dependency
/// targets collide often.
#[derive(Debug, Clone, Arbitrary)]
struct RecordSeed {
    #[proptest(strategy = "0u8..3")]
    source: u8,
    #[proptest(strategy = "0u64..6")]
    key: u64,
    #[proptest(strategy = "proptest::option::of(0u8..4)")]
    stable_key: Option<u8>,
    #[proptest(strategy = "0u8..3")]
    name: u8,
    #[proptest(strategy = "proptest::collection::vec(0u64..8, 0..3)")]
    remote_deps: Vec<u64>,
    #[proptest(strategy = "proptest::option::of(0u8..5)")]
    key_dep: Option<u8>,
}

impl RecordSeed {
    fn build(&self) -> ModRecord {
        let name = format!("Mod {}", self.name);
        let mut record = match self.source {
            0 => ModRecord::remote(RemoteId(self.key), name),
            1 => ModRecord::new(ModUid::local(format!("m{}", self.key)), name),
            _ => ModRecord::new(ModUid::legacy(format!("m{}", self.key)), name),
        };
        if let Some(key) = self.stable_key {
            record = record.with_stable_key(format!("k{}", key));
        }
        for dep in &self.remote_deps {
            record = record.with_dependency(DependencyHint::RemoteId(RemoteId(*dep)));
        }
        if let Some(key) = self.key_dep {
            record = record.with_dependency(DependencyHint::StableKey(format!("k{}", key)));
        }
        record
    }
}

/// A generated record set and a shuffled copy of it.
fn records_and_shuffle() -> impl Strategy<Value = (Vec<ModRecord>, Vec<ModRecord>)> {
    proptest::collection::vec(any::<RecordSeed>(), 0..12).prop_flat_map(|seeds| {
        let records: Vec<ModRecord> = seeds.iter().map(RecordSeed::build).collect();
        (Just(records.clone()), Just(records).prop_shuffle())
    })
}

/// The descriptor partition, with each part's stable key.
fn partition(registry: &Registry) -> BTreeSet<(Option<String>, BTreeSet<ModUid>)> {
    registry
        .descriptors()
        .iter()
        .map(|d| (d.mod_id.clone(), d.member_uids.clone()))
        .collect()
}

/// Forward edges expressed by member sets, independent of descriptor ids.
fn edges(registry: &Registry) -> BTreeSet<(BTreeSet<ModUid>, BTreeSet<ModUid>)> {
    registry
        .descriptors()
        .iter()
        .flat_map(|from| {
            registry.depends_on(from.id).iter().filter_map(move |to| {
                let to = registry.descriptor(*to)?;
                Some((from.member_uids.clone(), to.member_uids.clone()))
            })
        })
        .collect()
}

proptest! {
    #[test]
    fn test_merge_is_independent_of_arrival_order((records, shuffled) in records_and_shuffle()) {
        let expected = resolve_registry(records, &Overrides::new()).unwrap();
        let actual = resolve_registry(shuffled, &Overrides::new()).unwrap();

        prop_assert_eq!(partition(&actual), partition(&expected));
        prop_assert_eq!(edges(&actual), edges(&expected));
        let expected_records: Vec<&ModRecord> = expected.records().collect();
        let actual_records: Vec<&ModRecord> = actual.records().collect();
        prop_assert_eq!(actual_records, expected_records);
    }

    #[test]
    fn test_edges_are_symmetric((records, _) in records_and_shuffle()) {
        let registry = resolve_registry(records, &Overrides::new()).unwrap();
        for a in registry.descriptors() {
            prop_assert!(!registry.depends_on(a.id).contains(&a.id));
            for b in registry.descriptors() {
                prop_assert_eq!(
                    registry.depends_on(a.id).contains(&b.id),
                    registry.dependency_for(b.id).contains(&a.id)
                );
            }
        }
    }
}

fn sample_registry_edges() -> usize {
    let registry = resolve_registry(sample_records(), &Overrides::new()).unwrap();
    registry
        .descriptors()
        .iter()
        .map(|d| registry.depends_on(d.id).len())
        .sum()
}

#[test]
fn test_sample_registry_has_expected_edges() {
    // roads -> core, remote 3 -> roads, trees -> core
    assert_eq!(sample_registry_edges(), 3);
}

#[test]
fn test_validation_is_idempotent() {
    let registry = resolve_registry(sample_records(), &Overrides::new()).unwrap();
    let collection = Collection::new("c", "Main").with_members([
        ModUid::remote(RemoteId(1)),
        ModUid::local("core-dev"),
        ModUid::remote(RemoteId(3)),
        ModUid::local("ghost"),
    ]);

    let first = validate_collection(&registry, &collection);
    let second = validate_collection(&registry, &collection);
    assert_eq!(first, second);
    assert_eq!(first.len(), collection.len());
}

#[test]
fn test_conflicting_members_flag_each_other() {
    let registry = resolve_registry(sample_records(), &Overrides::new()).unwrap();
    let a = ModUid::remote(RemoteId(1));
    let b = ModUid::local("core-dev");
    let collection = Collection::new("c", "Main").with_members([a.clone(), b.clone()]);

    let errors = validate_collection(&registry, &collection);
    assert_eq!(errors[&a].incompatible_mods, vec![b.clone()]);
    assert_eq!(errors[&b].incompatible_mods, vec![a.clone()]);

    let ignore = |member: &ModUid, other: &ModUid| IgnoredError {
        kind: ErrorKind::IncompatibleMod,
        member: member.clone(),
        offending: Some(other.to_string()),
    };
    // Remote member is also neither subscribed nor installed
    let flags = [ErrorKind::NotSubscribed, ErrorKind::NotInstalled].map(|kind| IgnoredError {
        kind,
        member: a.clone(),
        offending: None,
    });

    let one_side: IgnoredErrors = flags.iter().cloned().chain([ignore(&a, &b)]).collect();
    assert!(!ValidationReport::new(&collection, errors.clone(), &one_side).success);

    let both: IgnoredErrors = flags
        .iter()
        .cloned()
        .chain([ignore(&a, &b), ignore(&b, &a)])
        .collect();
    let report = ValidationReport::new(&collection, errors, &both);
    assert!(report.success);
    assert_eq!(report.errors[&a].incompatible_mods, vec![b]);
}

#[test]
fn test_missing_dependency_clears_when_added() {
    let registry = resolve_registry(
        vec![
            local("x", Some("x")).with_dependency(DependencyHint::StableKey("y".into())),
            local("y", Some("y")),
            ModRecord::new(ModUid::legacy("y-old"), "Y (legacy)").with_stable_key("y"),
        ],
        &Overrides::new(),
    )
    .unwrap();
    let x = ModUid::local("x");
    let y = registry.get_by_stable_key("y").unwrap();

    let mut collection = Collection::new("c", "Main").with_members([x.clone()]);
    let errors = validate_collection(&registry, &collection);
    assert_eq!(
        errors[&x].missing_dependencies,
        vec![MissingDependency::Descriptor {
            id: y.id,
            name: y.name.clone(),
            label: "y".into(),
        }]
    );

    // Any member of Y satisfies the dependency
    collection.insert(ModUid::legacy("y-old"));
    let errors = validate_collection(&registry, &collection);
    assert!(errors[&x].missing_dependencies.is_empty());
    assert!(errors.values().all(|set| set.is_empty()));
}

#[test]
fn test_empty_collection_succeeds() {
    let registry = resolve_registry(sample_records(), &Overrides::new()).unwrap();
    let collection = Collection::new("c", "Empty");
    let errors = validate_collection(&registry, &collection);
    assert!(errors.is_empty());
    assert!(ValidationReport::new(&collection, errors, &IgnoredErrors::new()).success);
}

#[test]
fn test_unresolved_hint_is_reported_as_missing() {
    let registry = resolve_registry(
        vec![remote(1, None).with_dependency(DependencyHint::RemoteId(RemoteId(404)))],
        &Overrides::new(),
    )
    .unwrap();
    let member = ModUid::remote(RemoteId(1));
    let collection = Collection::new("c", "Main").with_members([member.clone()]);
    let errors = validate_collection(&registry, &collection);
    assert_eq!(
        errors[&member].missing_dependencies,
        vec![MissingDependency::Unresolved {
            hint: DependencyHint::RemoteId(RemoteId(404)),
        }]
    );
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        page_size: 3,
        chunk_size: 2,
        retry: RetryPolicy::none(),
        lookup_timeout: Duration::from_millis(50),
    }
}

/// Ids reachable from `seeds`, where ids missing from `graph` have no edges.
fn reachable(graph: &BTreeMap<u64, Vec<u64>>, seeds: &BTreeSet<u64>) -> BTreeSet<u64> {
    let mut seen: BTreeSet<u64> = seeds.clone();
    let mut queue: VecDeque<u64> = seeds.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for next in graph.get(&id).into_iter().flatten() {
            if seen.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    seen
}

fn fetch_graph(
    graph: &BTreeMap<u64, Vec<u64>>,
    seeds: &BTreeSet<u64>,
) -> (modset_core::FetchOutcome, Vec<RemoteId>) {
    let catalog = graph.iter().fold(InMemoryCatalog::new(), |catalog, (id, deps)| {
        let record = deps.iter().fold(remote(*id, None), |r, dep| {
            r.with_dependency(DependencyHint::RemoteId(RemoteId(*dep)))
        });
        catalog.with_item(record)
    });
    let catalog = Arc::new(catalog);
    let seeds: BTreeSet<RemoteId> = seeds.iter().copied().map(RemoteId).collect();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let fetcher = DependencyFetcher::new(fetch_config(), catalog.clone());
    let outcome = runtime.block_on(fetcher.fetch_all(&seeds));
    let requested = catalog.detail_calls().into_iter().flatten().collect();
    (outcome, requested)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Ids 1..12 may exist in the catalog, 12..16 never do. Self references and
    /// cycles come up naturally.
    #[test]
    fn test_bfs_attempts_every_reachable_id_once(
        graph in proptest::collection::btree_map(
            1u64..12,
            proptest::collection::vec(1u64..16, 0..4),
            1..10,
        ),
        seeds in proptest::collection::btree_set(1u64..16, 1..4),
    ) {
        let (outcome, requested) = fetch_graph(&graph, &seeds);
        let expected = reachable(&graph, &seeds);

        let unique: BTreeSet<u64> = requested.iter().map(|id| id.0).collect();
        prop_assert_eq!(requested.len(), unique.len());
        prop_assert_eq!(&unique, &expected);

        let loaded: BTreeSet<u64> = outcome
            .records
            .iter()
            .filter_map(|r| r.remote_id())
            .map(|id| id.0)
            .collect();
        let present: BTreeSet<u64> = expected
            .iter()
            .copied()
            .filter(|id| graph.contains_key(id))
            .collect();
        let missing: BTreeSet<u64> = expected.difference(&present).copied().collect();
        prop_assert_eq!(loaded, present);
        prop_assert_eq!(outcome.invalid.iter().map(|id| id.0).collect::<BTreeSet<_>>(), missing);
    }
}

#[test]
fn test_bfs_terminates_on_self_and_mutual_references() {
    // 1 -> 1 (self), 1 <-> 2, 2 -> 3 -> 4 -> 2, 4 -> 500 (missing)
    let graph = BTreeMap::from([
        (1, vec![1, 2]),
        (2, vec![1, 3]),
        (3, vec![4]),
        (4, vec![2, 500]),
    ]);
    let (outcome, requested) = fetch_graph(&graph, &BTreeSet::from([1]));

    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.invalid, BTreeSet::from([RemoteId(500)]));
    assert_eq!(requested.len(), 5);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes_once() {
    let mut catalog = InMemoryCatalog::new();
    for id in 1..=7 {
        let next = id + 10;
        catalog = catalog
            .with_item(remote(id, None).with_dependency(DependencyHint::RemoteId(RemoteId(next))))
            .with_item(remote(next, None))
            .subscribe(RemoteId(id));
    }

    let fractions = Arc::new(Mutex::new(Vec::new()));
    let sink = fractions.clone();
    let fetcher = DependencyFetcher::new(fetch_config(), Arc::new(catalog))
        .with_progress(move |p| sink.lock().unwrap().push(p.fraction));
    let outcome = fetcher.fetch_all(&BTreeSet::new()).await;
    assert_eq!(outcome.records.len(), 14);

    let fractions = fractions.lock().unwrap();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.iter().filter(|f| **f >= 1.0).count(), 1);
    assert_eq!(*fractions.last().unwrap(), 1.0);
}

#[tokio::test]
async fn test_progress_completes_with_nothing_to_load() {
    let fractions = Arc::new(Mutex::new(Vec::new()));
    let sink = fractions.clone();
    let fetcher = DependencyFetcher::new(fetch_config(), Arc::new(InMemoryCatalog::new()))
        .with_progress(move |p| sink.lock().unwrap().push(p.fraction));
    let outcome = fetcher.fetch_all(&BTreeSet::new()).await;

    assert!(outcome.records.is_empty());
    assert_eq!(*fractions.lock().unwrap(), vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_listing_failure_keeps_local_and_seeds() {
    let catalog = InMemoryCatalog::new()
        .with_item(remote(9, None))
        .subscribe(RemoteId(9))
        .fail_listing();
    let fetcher = DependencyFetcher::new(fetch_config(), Arc::new(catalog));
    let outcome = fetcher.fetch_all(&BTreeSet::from([RemoteId(9)])).await;
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].state.subscribed);
}
