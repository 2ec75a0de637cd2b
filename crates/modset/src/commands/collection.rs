use crate::errors::{CliError, CliResult};
use crate::println_pad;
use crate::utils::{display_name, load_registry, parse_uid};
use colored::Colorize;
use modset_core::Registry;
use modset_store::{DataDir, Error as StoreError};

pub enum CollectionAction {
    List,
    Show { name: String },
    Create { name: String },
    Rename { name: String, new_name: String },
    Duplicate { name: String, new_name: String },
    Delete { name: String },
    Add { name: String, uid: String },
    Remove { name: String, uid: String },
}

pub async fn manage_collection(data_dir: &DataDir, action: CollectionAction) -> CliResult<()> {
    data_dir.ensure()?;
    let store = data_dir.collections();

    match action {
        CollectionAction::List => {
            let collections = store.list_collections()?;
            if collections.is_empty() {
                println_pad!("{}", "No collections yet".dimmed());
            }
            for collection in collections {
                println_pad!(
                    "{} {}",
                    collection.name.bright_cyan().bold(),
                    format!("({} mod(s))", collection.len()).dimmed()
                );
            }
        }
        CollectionAction::Show { name } => {
            let collection = store
                .read_collection(&name)?
                .ok_or_else(|| CliError::collection_not_found(&name))?;
            // Names are best effort; a missing snapshot only loses display names
            let registry = match load_registry(data_dir).await {
                Ok(registry) => Some(registry),
                Err(CliError::NoSnapshot { .. }) => None,
                Err(e) => return Err(e),
            };
            let registry: Option<&Registry> = registry.as_deref();

            println_pad!(
                "{} {}",
                "📚 Collection:".bright_blue().bold(),
                collection.name.bright_cyan().bold()
            );
            for uid in collection.members() {
                println_pad!(
                    "   {} {} {}",
                    "•".bright_cyan(),
                    display_name(registry, uid).bright_white(),
                    format!("({})", uid).dimmed()
                );
            }
        }
        CollectionAction::Create { name } => {
            let collection = store.create(&name).map_err(map_not_found)?;
            println_pad!("{} {}", "✨ Created:".bright_green(), collection.name.bold());
        }
        CollectionAction::Rename { name, new_name } => {
            let collection = store.rename(&name, &new_name).map_err(map_not_found)?;
            println_pad!(
                "{} {} → {}",
                "✏️ Renamed:".bright_green(),
                name,
                collection.name.bold()
            );
        }
        CollectionAction::Duplicate { name, new_name } => {
            let collection = store.duplicate(&name, &new_name).map_err(map_not_found)?;
            println_pad!(
                "{} {} → {}",
                "📋 Duplicated:".bright_green(),
                name,
                collection.name.bold()
            );
        }
        CollectionAction::Delete { name } => {
            store.delete(&name).map_err(map_not_found)?;
            println_pad!("{} {}", "🗑️ Deleted:".bright_green(), name.bold());
        }
        CollectionAction::Add { name, uid } => {
            let uid = parse_uid(&uid)?;
            if store.add_member(&name, uid.clone()).map_err(map_not_found)? {
                println_pad!("{} {} → {}", "➕ Added:".bright_green(), uid, name.bold());
            } else {
                println_pad!("{}", format!("{} is already in {}", uid, name).dimmed());
            }
        }
        CollectionAction::Remove { name, uid } => {
            let uid = parse_uid(&uid)?;
            if store.remove_member(&name, &uid).map_err(map_not_found)? {
                println_pad!("{} {} ← {}", "➖ Removed:".bright_green(), uid, name.bold());
            } else {
                println_pad!("{}", format!("{} is not in {}", uid, name).dimmed());
            }
        }
    }

    Ok(())
}

fn map_not_found(error: StoreError) -> CliError {
    match error {
        StoreError::NotFound(name) => CliError::collection_not_found(name),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use modset_core::{ModUid, RemoteId};
    use tempfile::TempDir;

    fn data_dir(temp: &TempDir) -> DataDir {
        DataDir::new(Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap())
    }

    #[tokio::test]
    async fn test_collection_actions_update_the_store() {
        let temp = TempDir::new().unwrap();
        let data_dir = data_dir(&temp);

        manage_collection(&data_dir, CollectionAction::Create { name: "Main".into() })
            .await
            .unwrap();
        manage_collection(
            &data_dir,
            CollectionAction::Add {
                name: "Main".into(),
                uid: "remote:5".into(),
            },
        )
        .await
        .unwrap();
        manage_collection(
            &data_dir,
            CollectionAction::Duplicate {
                name: "Main".into(),
                new_name: "Copy".into(),
            },
        )
        .await
        .unwrap();
        // Show works without a snapshot
        manage_collection(&data_dir, CollectionAction::Show { name: "Copy".into() })
            .await
            .unwrap();

        let copy = data_dir.collections().read_collection("Copy").unwrap().unwrap();
        assert_eq!(copy.members(), &[ModUid::remote(RemoteId(5))]);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_reported() {
        let temp = TempDir::new().unwrap();
        let data_dir = data_dir(&temp);

        let result = manage_collection(
            &data_dir,
            CollectionAction::Add {
                name: "Nope".into(),
                uid: "local:Roads".into(),
            },
        )
        .await;

        assert!(matches!(result, Err(CliError::CollectionNotFound { .. })));
    }
}
