//! qmlcatalog CLI - inspect and feed a persistent QML type catalog

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use qmlcatalog::config::{self, CatalogConfig};
use qmlcatalog::query::{PropertyDeclarationInfo, TypeInfo};
use qmlcatalog::ui::{self, Icons, PropertyRow, TableBuilder, TypeRow};
use qmlcatalog::{ProjectStorage, SynchronizationPackage, TypeId, Version};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "qmlcatalog")]
#[command(version)]
#[command(about = "Persistent QML type catalog")]
#[command(long_about = r#"
qmlcatalog keeps the types, exported names, properties and aliases parsed
from QML documents and qmltypes files in one SQLite catalog, and answers
lookups against it.

Example usage:
  qmlcatalog init
  qmlcatalog sync --package parsed.json
  qmlcatalog lookup --module QtQuick --name Item --version 2.15
  qmlcatalog properties --type-id 4
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the catalog database (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the catalog
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Merge a synchronization package (JSON) into the catalog
    Sync {
        /// Path to the package file
        #[arg(short, long)]
        package: PathBuf,
    },

    /// List every stored type
    Types,

    /// Find the type a module exports under a name
    Lookup {
        /// Module name, e.g. QtQuick
        #[arg(short, long)]
        module: String,

        /// Exported type name, e.g. Item
        #[arg(short, long)]
        name: String,

        /// Requested version, `major` or `major.minor`
        #[arg(long = "version", id = "requested_version")]
        version: Option<String>,
    },

    /// Show the prototype chain of a type
    Prototypes {
        #[arg(short, long)]
        type_id: i64,
    },

    /// Show the properties visible on a type
    Properties {
        #[arg(short, long)]
        type_id: i64,

        /// Only properties declared on the type itself
        #[arg(long)]
        local: bool,
    },

    /// Show the id of a module
    Module {
        #[arg(short, long)]
        name: String,
    },

    /// Show the id of a source file
    Source {
        #[arg(short, long)]
        path: String,
    },

    /// Show row counts of the catalog
    Stats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(Some(&config_path))?.unwrap_or_default();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(config.log.as_deref().unwrap_or("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let database = cli.database.clone().unwrap_or_else(|| config.database_path());

    if let Err(e) = run(&cli, &config_path, &database) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli, config_path: &Path, database: &Path) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { force } => {
            let config = CatalogConfig {
                database: Some(database.display().to_string()),
                log: Some("info".to_string()),
            };
            config::write_config(config_path, &config, *force)?;
            config::ensure_db_dir(database)?;
            ProjectStorage::open(database)?;

            if cli.json {
                print_json(&config)?;
            } else {
                ui::success(&format!("Wrote {}", config_path.display()));
                ui::info("Database", &database.display().to_string());
            }
        }

        Commands::Sync { package } => {
            let contents = std::fs::read_to_string(package)?;
            let package: SynchronizationPackage = serde_json::from_str(&contents)?;
            let storage = open_existing(database)?;

            let spinner = ui::Spinner::new(&format!("Synchronizing {} types", package.types.len()));
            let result = storage.synchronize(&package);
            spinner.finish_and_clear();
            let report = result?;

            if cli.json {
                print_json(&report)?;
            } else {
                ui::header("Synchronization complete");
                let mut table = TableBuilder::new();
                table.add_row("Inserted types", report.inserted_types);
                table.add_row("Updated types", report.updated_types);
                table.add_row("Deleted types", report.deleted_types);
                table.add_row("Relinked references", report.relinked);
                table.add_row("Resolved aliases", report.resolved_aliases);
                table.add_row("Changed export names", report.changed_export_names.len());
                println!("{}", table.build());
            }
        }

        Commands::Types => {
            let storage = open_existing(database)?;
            let types = storage.fetch_types()?;

            if cli.json {
                print_json(&types)?;
            } else if types.is_empty() {
                ui::warn("No types in the catalog");
            } else {
                let names: HashMap<TypeId, &str> =
                    types.iter().map(|ty| (ty.type_id, ty.name.as_str())).collect();
                let rows = types
                    .iter()
                    .map(|ty| type_row(&storage, ty, &names))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                println!("{}", ui::types_table(&rows));
            }
        }

        Commands::Lookup { module, name, version } => {
            let storage = open_existing(database)?;
            let version: Version = version.as_deref().unwrap_or("").parse()?;
            let module_id = storage.module_id(module)?;
            let found = match storage.type_id(module_id, name, version)? {
                Some(type_id) => storage.fetch_type_by_type_id(type_id)?,
                None => None,
            };

            if cli.json {
                print_json(&found)?;
            } else {
                match found {
                    Some(ty) => {
                        ui::success(&format!("{} {} {} -> {}", module, name, version, ty.name));
                        ui::info("Type id", &ty.type_id.to_string());
                        ui::info("Source", &storage.source_path(ty.source_id)?);
                    }
                    None => ui::warn(&format!("{} {} {} is not exported", module, name, version)),
                }
            }
        }

        Commands::Prototypes { type_id } => {
            let storage = open_existing(database)?;
            let chain = storage.prototype_and_self_ids(TypeId(*type_id))?;
            let types = chain
                .iter()
                .filter_map(|id| storage.fetch_type_by_type_id(*id).transpose())
                .collect::<qmlcatalog::Result<Vec<_>>>()?;

            if cli.json {
                print_json(&types)?;
            } else if types.is_empty() {
                ui::warn(&format!("Type {} does not exist", type_id));
            } else {
                for (depth, ty) in types.iter().enumerate() {
                    ui::chain_entry(depth, &ty.name, &ty.type_id.to_string());
                }
            }
        }

        Commands::Properties { type_id, local } => {
            let storage = open_existing(database)?;
            let type_id = TypeId(*type_id);
            let ids = if *local {
                storage.local_property_declaration_ids(type_id)?
            } else {
                storage.property_declaration_ids(type_id)?
            };
            let properties = ids
                .into_iter()
                .filter_map(|id| storage.property_declaration(id).transpose())
                .collect::<qmlcatalog::Result<Vec<_>>>()?;

            if cli.json {
                print_json(&properties)?;
            } else if properties.is_empty() {
                ui::warn(&format!("Type {} has no properties", type_id));
            } else {
                let rows = properties
                    .iter()
                    .map(|property| property_row(&storage, property))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                println!("{}", ui::properties_table(&rows));
                if let Some(default) = storage.default_property_declaration_id(type_id)? {
                    ui::info("Default property", &default.to_string());
                }
            }
        }

        Commands::Module { name } => {
            let storage = open_existing(database)?;
            let module_id = storage.module_id(name)?;
            let exported = storage.type_ids_exported_by(module_id)?;

            if cli.json {
                print_json(&serde_json::json!({
                    "module_id": module_id,
                    "name": name,
                    "exported_type_ids": exported,
                }))?;
            } else {
                ui::info("Module", name);
                ui::info("Id", &module_id.to_string());
                ui::info("Exported types", &exported.len().to_string());
            }
        }

        Commands::Source { path } => {
            let storage = open_existing(database)?;
            let source_id = storage.source_id(path)?;
            let imports = storage.fetch_imports(source_id)?;
            let status = storage.fetch_file_status(source_id)?;

            if cli.json {
                print_json(&serde_json::json!({
                    "source_id": source_id,
                    "path": path,
                    "imports": imports,
                    "file_status": status,
                }))?;
            } else {
                ui::info("Source", path);
                ui::info("Id", &source_id.to_string());
                ui::section("Imports");
                for import in imports {
                    let module = storage.module_name(import.module_id)?;
                    ui::summary_row(Icons::PACKAGE, &format!("{} {}", module, import.version));
                }
                if let Some(status) = status {
                    ui::section("File status");
                    ui::summary_row("size", &status.size.to_string());
                    ui::summary_row("last modified", &status.last_modified.to_string());
                }
            }
        }

        Commands::Stats => {
            let storage = open_existing(database)?;
            let stats = storage.stats()?;

            if cli.json {
                print_json(&stats)?;
            } else {
                println!("{} Catalog statistics ({})", Icons::STATS, database.display());
                let mut table = TableBuilder::new();
                table.add_row("Modules", stats.modules);
                table.add_row("Sources", stats.sources);
                table.add_row("Types", stats.types);
                table.add_row("Exported types", stats.exported_types);
                table.add_row("Properties", stats.property_declarations);
                table.add_row("Functions", stats.function_declarations);
                table.add_row("Signals", stats.signal_declarations);
                table.add_row("Enumerations", stats.enumeration_declarations);
                table.add_row("Imports", stats.imports);
                table.add_row("File statuses", stats.file_statuses);
                table.add_row("Project data", stats.project_datas);
                println!("{}", table.build());
            }
        }
    }

    Ok(())
}

/// Every command but `init` expects the catalog to exist already
fn open_existing(database: &Path) -> anyhow::Result<ProjectStorage> {
    if !database.exists() {
        anyhow::bail!(
            "catalog not found at {} (run `qmlcatalog init` first)",
            database.display()
        );
    }
    Ok(ProjectStorage::open(database)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn flag_names<B: bitflags::Flags>(flags: &B) -> String {
    let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() { "-".to_string() } else { names.join("|") }
}

fn type_row(storage: &ProjectStorage, ty: &TypeInfo, names: &HashMap<TypeId, &str>) -> anyhow::Result<TypeRow> {
    let prototype = ty
        .prototype_id
        .and_then(|id| names.get(&id).copied())
        .unwrap_or("-")
        .to_string();
    let exports = ty
        .exported_types
        .iter()
        .map(|export| {
            let module = storage.module_name(export.module_id)?;
            Ok(format!("{}.{} {}", module, export.name, export.version).trim_end().to_string())
        })
        .collect::<anyhow::Result<Vec<_>>>()?
        .join(", ");

    Ok(TypeRow {
        id: ty.type_id.raw(),
        name: ty.name.clone(),
        prototype,
        exports,
        kind: ty.traits.kind_str(),
        traits: flag_names(&ty.traits),
    })
}

fn property_row(storage: &ProjectStorage, property: &PropertyDeclarationInfo) -> anyhow::Result<PropertyRow> {
    let type_name = |id: Option<TypeId>| -> anyhow::Result<String> {
        Ok(match id {
            Some(id) => storage.fetch_type_by_type_id(id)?.map(|ty| ty.name).unwrap_or_default(),
            None => "-".to_string(),
        })
    };
    let alias = match (&property.alias_property_name, &property.alias_property_name_tail) {
        (Some(stem), Some(tail)) => format!("{}.{}", stem, tail),
        (Some(stem), None) => stem.clone(),
        _ => String::new(),
    };

    Ok(PropertyRow {
        id: property.id.raw(),
        name: property.name.clone(),
        owner: type_name(Some(property.type_id))?,
        property_type: type_name(property.property_type_id)?,
        traits: flag_names(&property.traits),
        alias,
    })
}
