use crate::errors::{CliError, CliResult};
use crate::println_pad;
use crate::utils::parse_uid;
use colored::Colorize;
use modset_core::{ErrorKind, IgnoredError};
use modset_store::DataDir;

pub struct IgnoreErrorArgs {
    pub kind: String,
    pub member: String,
    pub offending: Option<String>,
    pub remove: bool,
}

fn build_entry(args: &IgnoreErrorArgs) -> CliResult<IgnoredError> {
    let kind: ErrorKind = args.kind.parse().map_err(|_| CliError::InvalidErrorKind {
        value: args.kind.clone(),
    })?;
    let member = parse_uid(&args.member)?;
    let offending = match kind {
        ErrorKind::MissingDependency | ErrorKind::IncompatibleMod => args
            .offending
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        // Flag errors have no offending id
        _ => None,
    };

    Ok(IgnoredError {
        kind,
        member,
        offending,
    })
}

pub fn ignore_error(data_dir: &DataDir, args: IgnoreErrorArgs) -> CliResult<()> {
    data_dir.ensure()?;
    let entry = build_entry(&args)?;
    let store = data_dir.ignored_errors();
    let label = match &entry.offending {
        Some(offending) => format!("{} {} ({})", entry.kind, entry.member, offending),
        None => format!("{} {}", entry.kind, entry.member),
    };

    if args.remove {
        if store.unignore(&entry)? {
            println_pad!("{} {}", "🔔 No longer ignored:".bright_green(), label);
        } else {
            println_pad!("{}", format!("{} was not ignored", label).dimmed());
        }
    } else if store.ignore(entry)? {
        println_pad!("{} {}", "🔕 Ignored:".bright_green(), label);
    } else {
        println_pad!("{}", format!("{} is already ignored", label).dimmed());
    }
    Ok(())
}
