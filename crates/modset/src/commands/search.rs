use crate::errors::{CliError, CliResult};
use crate::println_pad;
use crate::utils::load_registry;
use colored::Colorize;
use modset_core::{ModRow, RowFilter, SourceKind};
use modset_store::DataDir;

pub struct SearchModsArgs {
    pub query: Option<String>,
    pub source: Option<String>,
    pub conflicts: bool,
    pub json: bool,
}

pub async fn search_mods(data_dir: &DataDir, args: SearchModsArgs) -> CliResult<()> {
    let source = args
        .source
        .as_deref()
        .map(|s| {
            s.parse::<SourceKind>().map_err(|_| CliError::InvalidSource {
                value: s.to_string(),
            })
        })
        .transpose()?;
    let filter = RowFilter {
        query: args.query,
        source,
        conflicts_only: args.conflicts,
    };

    let registry = load_registry(data_dir).await?;
    let rows = registry.rows(&filter);

    if args.json {
        let json = serde_json::to_string_pretty(&rows).map_err(modset_core::Error::from)?;
        println!("{}", json);
        return Ok(());
    }

    if rows.is_empty() {
        println_pad!("{}", "No matching mods".dimmed());
        return Ok(());
    }
    for row in &rows {
        println_pad!("{}", format_row(row));
    }
    println_pad!("\n{}", format!("{} mod(s)", rows.len()).dimmed());
    Ok(())
}

fn format_row(row: &ModRow) -> String {
    let mut line = format!(
        "{} {}",
        row.name.bright_white().bold(),
        format!("({})", row.uid).dimmed()
    );
    if let Some(key) = &row.stable_key {
        line.push_str(&format!(" {}", format!("[{}]", key).cyan()));
    }
    if row.has_conflict {
        line.push_str(&format!(" {}", "conflict".bright_red()));
    }
    if row.source == SourceKind::Remote {
        let state = match (row.subscribed, row.installed) {
            (true, true) => "installed".green(),
            (true, false) => "subscribed".yellow(),
            _ => "not subscribed".dimmed(),
        };
        line.push_str(&format!(" {}", state));
    }
    if row.dependency_count > 0 || row.dependent_count > 0 {
        line.push_str(&format!(
            " {}",
            format!("deps {} / used by {}", row.dependency_count, row.dependent_count).dimmed()
        ));
    }
    line
}
