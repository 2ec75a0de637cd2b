use crate::errors::CliResult;
use crate::println_pad;
use camino::Utf8PathBuf;
use colored::Colorize;
use modset_core::{DependencyFetcher, FetchProgress, FetchTask, FolderSource, InMemoryCatalog};
use modset_store::{DataDir, RecordSnapshot, Settings};
use std::sync::Arc;

pub struct FetchModsArgs {
    pub catalog: Option<Utf8PathBuf>,
    pub local: Option<Utf8PathBuf>,
    pub legacy: Option<Utf8PathBuf>,
}

/// Paths for one load cycle. Command-line flags win over `config.toml`.
#[derive(Debug, PartialEq)]
struct FetchPaths {
    catalog: Option<Utf8PathBuf>,
    local: Option<Utf8PathBuf>,
    legacy: Option<Utf8PathBuf>,
}

impl FetchPaths {
    fn merge(args: FetchModsArgs, settings: &Settings) -> Self {
        Self {
            catalog: args.catalog.or_else(|| settings.catalog_snapshot_path.clone()),
            local: args.local.or_else(|| settings.local_mods_path.clone()),
            legacy: args.legacy.or_else(|| settings.legacy_mods_path.clone()),
        }
    }
}

pub async fn fetch_mods(data_dir: &DataDir, args: FetchModsArgs) -> CliResult<()> {
    data_dir.ensure()?;
    let settings = data_dir.settings();
    let paths = FetchPaths::merge(args, &settings);

    let catalog = match &paths.catalog {
        Some(path) => InMemoryCatalog::load(path)?,
        None => {
            tracing::warn!("No catalog snapshot configured, only local mods will be loaded");
            InMemoryCatalog::new()
        }
    };

    let mut fetcher =
        DependencyFetcher::new(settings.fetch_config(), Arc::new(catalog)).with_progress(print_progress);
    if let Some(root) = &paths.local {
        fetcher = fetcher.with_source(Arc::new(FolderSource::local(root.clone())));
    }
    if let Some(root) = &paths.legacy {
        fetcher = fetcher.with_source(Arc::new(FolderSource::legacy(root.clone())));
    }

    let seeds = data_dir.collections().seed_identities()?;
    let outcome = fetcher.fetch_all(&seeds).await;
    let snapshot = RecordSnapshot::from(outcome);
    data_dir.snapshot().save(&snapshot)?;

    tracing::info!(
        records = snapshot.records.len(),
        invalid = snapshot.invalid.len(),
        "Saved record snapshot"
    );

    println_pad!(
        "{} {}",
        "📥 Loaded:".bright_green().bold(),
        format!("{} mod(s)", snapshot.records.len()).bright_white().bold()
    );
    if !snapshot.invalid.is_empty() {
        let ids = snapshot
            .invalid
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println_pad!("{} {}", "⚠️ Unavailable:".bright_yellow(), ids.dimmed());
    }

    Ok(())
}

fn print_progress(progress: FetchProgress) {
    if progress.task == FetchTask::Complete {
        eprintln!("{:>4.0}% {}", progress.fraction * 100.0, progress.message.green());
    } else {
        eprintln!("{:>4.0}% {}", progress.fraction * 100.0, progress.message.dimmed());
    }
}
