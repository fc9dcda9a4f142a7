use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use assocdb::json::{entities_to_json, entity_from_json, entity_to_json};
use assocdb::model::loader;
use assocdb::{ConnectionConfig, PersistenceEngine};

#[derive(Parser)]
#[command(name = "assocdb")]
#[command(about = "Schema and data tooling for assocdb entity types")]
struct Cli {
    /// JSON file with the entity type definitions
    #[arg(long, env = "ASSOCDB_TYPES", global = true)]
    types: Option<PathBuf>,

    /// Database URL: sqlite://path/to.db or sqlite::memory:
    #[arg(long, env = "ASSOCDB_URL", global = true, default_value = "sqlite::memory:")]
    db: String,

    /// Log every SQL statement at info level
    #[arg(long, env = "ASSOCDB_LOG_STATEMENTS", global = true)]
    log_statements: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the client schema description
    Schema {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create tables, columns and join tables
    Sync,
    /// Print one entity
    Get { entity: String, id: String },
    /// Print every entity of a type, optionally filtered with field=value
    List {
        entity: String,
        #[arg(long = "where", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Create an entity from a JSON object
    Create { entity: String, body: String },
    /// Delete an entity by id
    Delete { entity: String, id: String },
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("Invalid id '{}'", raw))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let types = cli
        .types
        .as_ref()
        .ok_or_else(|| anyhow!("No type definitions given; pass --types or set ASSOCDB_TYPES"))?;
    let registry = loader::load_registry(types)
        .with_context(|| format!("Failed to load type definitions from {}", types.display()))?;
    let engine = PersistenceEngine::new(Arc::new(registry))?;

    if let Command::Schema { out } = &cli.command {
        let text = engine.registry().schema()?.to_json_pretty()?;
        match out {
            Some(path) => fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{}", text),
        }
        return Ok(());
    }

    let config = ConnectionConfig::from_url(&cli.db)?.log_statements(cli.log_statements);
    let mut db = config.open().context("Failed to open database")?;
    engine.sync_all(&mut db)?;

    let output = match cli.command {
        Command::Schema { .. } => return Ok(()),
        Command::Sync => {
            println!("synced {} types", engine.registry().type_names().len());
            return Ok(());
        }
        Command::Get { entity, id } => {
            let id = parse_id(&id)?;
            let found = engine
                .by_id(&mut db, &entity, id)?
                .ok_or_else(|| anyhow!("{} '{}' not found", entity, id))?;
            entity_to_json(engine.registry(), &found.borrow())?
        }
        Command::List { entity, filters } => {
            let found = if filters.is_empty() {
                engine.all(&mut db, &entity)?
            } else {
                let filter: BTreeMap<String, String> = filters.into_iter().collect();
                engine.find_where(&mut db, &entity, &filter)?
            };
            entities_to_json(engine.registry(), &found)?
        }
        Command::Create { entity, body } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("Request body is not valid JSON")?;
            let created = entity_from_json(&engine, &mut db, &entity, &body)?.into_ref();
            engine.save(&mut db, &created)?;
            entity_to_json(engine.registry(), &created.borrow())?
        }
        Command::Delete { entity, id } => {
            let id = parse_id(&id)?;
            serde_json::json!({ "deleted": engine.delete_by_id(&mut db, &entity, id)? })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
