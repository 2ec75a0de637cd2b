use crate::errors::{CliError, CliResult};
use crate::println_pad;
use crate::utils::{display_name, load_registry};
use colored::Colorize;
use modset_core::{ErrorKind, IgnoredErrors, ModErrorSet, ModUid, Registry, ValidationService};
use modset_store::DataDir;

pub struct ValidateCollectionArgs {
    pub collection: String,
    pub json: bool,
}

pub async fn validate_collection(data_dir: &DataDir, args: ValidateCollectionArgs) -> CliResult<()> {
    let collection = data_dir
        .collections()
        .read_collection(&args.collection)?
        .ok_or_else(|| CliError::collection_not_found(&args.collection))?;
    let registry = load_registry(data_dir).await?;
    let ignored = data_dir.ignored_errors().load()?;

    let service = ValidationService::new();
    let report = service
        .validate(registry.clone(), collection, ignored.clone())
        .await?;

    if args.json {
        let json = serde_json::to_string_pretty(report.as_ref())
            .map_err(modset_core::Error::from)?;
        println!("{}", json);
    } else {
        println_pad!(
            "{} {}",
            "🔎 Collection:".bright_blue().bold(),
            report.collection.bright_cyan().bold()
        );
        for (uid, set) in report.failing_members() {
            print_member(&registry, uid, set, &ignored);
        }
        if report.suppressed > 0 {
            println_pad!(
                "{}",
                format!("{} error(s) ignored", report.suppressed).dimmed()
            );
        }
    }

    if report.success {
        if !args.json {
            println_pad!("{}", "✅ No errors".bright_green().bold());
        }
        return Ok(());
    }

    let failing = report
        .errors
        .iter()
        .filter(|(uid, set)| !set.unsuppressed(uid, &ignored).is_empty())
        .count();
    Err(CliError::ValidationFailed {
        collection: report.collection.clone(),
        failing,
    })
}

fn print_member(registry: &Registry, uid: &ModUid, set: &ModErrorSet, ignored: &IgnoredErrors) {
    println_pad!(
        "\n{} {}",
        display_name(Some(registry), uid).bright_white().bold(),
        format!("({})", uid).dimmed()
    );
    for (kind, offending) in set.instances() {
        let line = describe(registry, kind, offending.as_deref());
        if ignored.contains(kind, uid, offending.as_deref()) {
            println_pad!("   {} {} {}", "•".dimmed(), line.dimmed(), "(ignored)".dimmed());
        } else {
            println_pad!("   {} {}", "•".bright_red(), line);
        }
    }
}

fn describe(registry: &Registry, kind: ErrorKind, offending: Option<&str>) -> String {
    match (kind, offending) {
        (ErrorKind::InvalidId, _) => "Not found in any source".to_string(),
        (ErrorKind::NotSubscribed, _) => "Not subscribed".to_string(),
        (ErrorKind::NotInstalled, _) => "Not installed".to_string(),
        (ErrorKind::NeedsUpdate, _) => "Needs an update".to_string(),
        (ErrorKind::MissingDependency, Some(id)) => format!("Missing dependency: {}", id),
        (ErrorKind::IncompatibleMod, Some(other)) => {
            let name = other
                .parse::<ModUid>()
                .map(|uid| display_name(Some(registry), &uid))
                .unwrap_or_else(|_| other.to_string());
            format!("Same mod as {} ({})", name, other)
        }
        (kind, None) => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modset_core::{resolve_registry, ModRecord, Overrides, RemoteId};

    #[test]
    fn test_describe_uses_display_names() {
        let registry = resolve_registry(
            vec![ModRecord::remote(RemoteId(7), "Better Roads")],
            &Overrides::new(),
        )
        .unwrap();

        assert_eq!(
            describe(&registry, ErrorKind::IncompatibleMod, Some("remote:7")),
            "Same mod as Better Roads (remote:7)"
        );
        assert_eq!(
            describe(&registry, ErrorKind::MissingDependency, Some("sign-lib")),
            "Missing dependency: sign-lib"
        );
        assert_eq!(
            describe(&registry, ErrorKind::NotSubscribed, None),
            "Not subscribed"
        );
    }
}
