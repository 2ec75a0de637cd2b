use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    fetch_mods, ignore_error, manage_collection, search_mods, set_override, validate_collection,
    CollectionAction, FetchModsArgs, IgnoreErrorArgs, SearchModsArgs, SetOverrideArgs,
    ValidateCollectionArgs,
};
use miette::Result;
use modset_store::DataDir;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The directory holding collections, overrides and the last load cycle
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load every local, legacy and subscribed mod and their dependencies
    Fetch {
        /// A catalog snapshot JSON file to serve as the remote catalog
        #[arg(short, long)]
        catalog: Option<Utf8PathBuf>,

        /// The folder holding local mods
        #[arg(short, long)]
        local: Option<Utf8PathBuf>,

        /// The folder holding legacy mods
        #[arg(long)]
        legacy: Option<Utf8PathBuf>,
    },
    /// Validate a collection against the last load cycle
    Validate {
        /// The name of the collection
        collection: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the loaded mods
    Search {
        /// Text matched against name, uid, id, authors and tags
        query: Option<String>,

        /// Only show mods from this source (local, remote, legacy)
        #[arg(short, long)]
        source: Option<String>,

        /// Only show mods that share their identity with another mod
        #[arg(long)]
        conflicts: bool,

        /// Print the rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage saved collections
    Collection {
        #[command(subcommand)]
        action: CollectionCommand,
    },
    /// Ignore (or stop ignoring) one validation error
    Ignore {
        /// The error kind, e.g. incompatibleMod or missingDependency
        kind: String,

        /// The uid of the collection member with the error
        member: String,

        /// The offending mod for dependency and compatibility errors
        offending: Option<String>,

        /// Stop ignoring the error instead
        #[arg(long)]
        remove: bool,
    },
    /// Override how a mod's identity is resolved
    Override {
        /// The uid of the mod, e.g. local:BetterRoads
        uid: String,

        /// Replace the mod's id. An empty value makes it unique
        #[arg(long)]
        id: Option<String>,

        /// Replace the mod's tags, comma separated
        #[arg(long)]
        tag: Option<String>,

        /// Remove the override
        #[arg(long, conflicts_with_all = ["id", "tag"])]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
    /// List every collection
    List,
    /// Show the members of a collection
    Show { name: String },
    /// Create an empty collection
    Create { name: String },
    /// Rename a collection
    Rename { name: String, new_name: String },
    /// Copy a collection under a new name
    Duplicate { name: String, new_name: String },
    /// Delete a collection
    Delete { name: String },
    /// Add a mod to a collection
    Add { name: String, uid: String },
    /// Remove a mod from a collection
    Remove { name: String, uid: String },
}

impl From<CollectionCommand> for CollectionAction {
    fn from(command: CollectionCommand) -> Self {
        match command {
            CollectionCommand::List => CollectionAction::List,
            CollectionCommand::Show { name } => CollectionAction::Show { name },
            CollectionCommand::Create { name } => CollectionAction::Create { name },
            CollectionCommand::Rename { name, new_name } => {
                CollectionAction::Rename { name, new_name }
            }
            CollectionCommand::Duplicate { name, new_name } => {
                CollectionAction::Duplicate { name, new_name }
            }
            CollectionCommand::Delete { name } => CollectionAction::Delete { name },
            CollectionCommand::Add { name, uid } => CollectionAction::Add { name, uid },
            CollectionCommand::Remove { name, uid } => CollectionAction::Remove { name, uid },
        }
    }
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "modset=info,modset_core=info,modset_store=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = parse_args();
    let data_dir = DataDir::new(utils::data_dir::resolve_data_dir(args.data_dir.as_deref())?);

    let result = match args.command {
        Commands::Fetch {
            catalog,
            local,
            legacy,
        } => {
            fetch_mods(
                &data_dir,
                FetchModsArgs {
                    catalog,
                    local,
                    legacy,
                },
            )
            .await
        }
        Commands::Validate { collection, json } => {
            validate_collection(&data_dir, ValidateCollectionArgs { collection, json }).await
        }
        Commands::Search {
            query,
            source,
            conflicts,
            json,
        } => {
            search_mods(
                &data_dir,
                SearchModsArgs {
                    query,
                    source,
                    conflicts,
                    json,
                },
            )
            .await
        }
        Commands::Collection { action } => manage_collection(&data_dir, action.into()).await,
        Commands::Ignore {
            kind,
            member,
            offending,
            remove,
        } => ignore_error(
            &data_dir,
            IgnoreErrorArgs {
                kind,
                member,
                offending,
                remove,
            },
        ),
        Commands::Override {
            uid,
            id,
            tag,
            clear,
        } => set_override(&data_dir, SetOverrideArgs { uid, id, tag, clear }),
    };

    Ok(result?)
}
