//! Inspects saved asset graphs.
//!
//! ```text
//! asset-inspect demo hero.bin
//! asset-inspect inspect hero.bin --config persist.toml
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use redlilium_assets::{asset_registry, read_graph, sample, write_graph, Asset, AssetError, Character};
use redlilium_persist::{Class, MemoryResourceCache, ObjectHandle, PersistConfig, Registry};

#[derive(Parser, Debug)]
#[command(name = "asset-inspect", version, about = "Inspect RedLilium asset graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the records of a saved graph.
    Inspect {
        /// Graph file to read.
        file: PathBuf,
        /// Serializer settings (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the sample character graph.
    Demo {
        /// Output file.
        out: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<PersistConfig, AssetError> {
    match path {
        Some(path) => Ok(PersistConfig::load(path)?),
        None => Ok(PersistConfig::default()),
    }
}

fn describe_root(registry: &Registry, root: &ObjectHandle) -> String {
    if let Some(character) = root.downcast::<Character>() {
        let character = character.read();
        return format!(
            "character '{}' ({} animations, {} attachments)",
            character.name,
            character.animations.len(),
            character.attachments.len()
        );
    }
    registry
        .view::<Asset, _>(root, |asset| format!("asset '{}'", asset.name))
        .unwrap_or_else(|| "object".to_string())
}

fn inspect(file: &Path, config: Option<&Path>) -> Result<(), AssetError> {
    let registry = asset_registry()?;
    let config = load_config(config)?;
    let graph = read_graph(file, &registry, &config, None)?;

    println!("{}: {} records", file.display(), graph.record_count());
    for (slot, tag) in graph.record_tags().iter().enumerate() {
        let name = registry.lookup(*tag).map(|class| class.name()).unwrap_or("?");
        println!("  {slot:>5}  {tag}  {name}");
    }
    println!("root: {}", describe_root(&registry, graph.root()));
    println!("unowned records: {}", graph.retained().len());
    Ok(())
}

fn demo(out: &Path) -> Result<(), AssetError> {
    let registry = asset_registry()?;
    let cache = MemoryResourceCache::new();
    let hero = sample::sample_character(&cache);
    let root = ObjectHandle::from_handle(hero);
    let written = write_graph(out, &registry, &PersistConfig::default(), &root)?;
    println!(
        "wrote {} ({written} bytes, root {})",
        out.display(),
        Character::NAME
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Inspect { file, config } => inspect(file, config.as_deref()),
        Command::Demo { out } => demo(out),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
