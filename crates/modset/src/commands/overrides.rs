use crate::errors::{CliError, CliResult};
use crate::println_pad;
use crate::utils::parse_uid;
use colored::Colorize;
use modset_core::ModOverride;
use modset_store::DataDir;

pub struct SetOverrideArgs {
    pub uid: String,
    pub id: Option<String>,
    pub tag: Option<String>,
    pub clear: bool,
}

/// Apply the requested fields on top of the existing override.
fn merge_override(existing: Option<ModOverride>, args: &SetOverrideArgs) -> ModOverride {
    if args.clear {
        return ModOverride::default();
    }
    let mut merged = existing.unwrap_or_default();
    if let Some(id) = &args.id {
        merged.id_override = Some(id.trim().to_string());
    }
    if let Some(tag) = &args.tag {
        merged.tag_override = Some(tag.clone());
    }
    merged
}

pub fn set_override(data_dir: &DataDir, args: SetOverrideArgs) -> CliResult<()> {
    if !args.clear && args.id.is_none() && args.tag.is_none() {
        return Err(CliError::EmptyOverride { uid: args.uid });
    }
    data_dir.ensure()?;
    let uid = parse_uid(&args.uid)?;
    let store = data_dir.overrides();
    let existing = store.load()?.remove(&uid);
    let merged = merge_override(existing, &args);

    store.set(uid.clone(), merged.clone())?;
    if merged.is_empty() {
        println_pad!("{} {}", "🧹 Cleared override:".bright_green(), uid);
    } else {
        println_pad!("{} {}", "📌 Override:".bright_green(), uid.to_string().bold());
        if let Some(id) = &merged.id_override {
            let shown = if id.is_empty() { "(none)" } else { id.as_str() };
            println_pad!("   {} {}", "id:".bright_cyan(), shown);
        }
        if let Some(tag) = &merged.tag_override {
            println_pad!("   {} {}", "tags:".bright_cyan(), tag);
        }
    }
    println_pad!("{}", "Identity changes apply on the next command".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(id: Option<&str>, tag: Option<&str>, clear: bool) -> SetOverrideArgs {
        SetOverrideArgs {
            uid: "local:Roads".into(),
            id: id.map(str::to_string),
            tag: tag.map(str::to_string),
            clear,
        }
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let existing = ModOverride {
            id_override: Some("roads".into()),
            tag_override: Some("maps".into()),
        };

        let merged = merge_override(Some(existing.clone()), &args(None, Some("roads, fixes"), false));
        assert_eq!(merged.id_override.as_deref(), Some("roads"));
        assert_eq!(merged.tag_override.as_deref(), Some("roads, fixes"));

        // An empty id forces a keyless singleton rather than clearing
        let merged = merge_override(Some(existing.clone()), &args(Some(" "), None, false));
        assert_eq!(merged.id_override.as_deref(), Some(""));

        assert!(merge_override(Some(existing), &args(Some("x"), None, true)).is_empty());
    }
}
