//! djbridge
//!
//! Converts DJ libraries between Engine, Rekordbox XML and Serato through
//! the neutral library model, or a JSON snapshot of it.

mod config;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use djbridge_core::{engine, rbxml, serato, Library};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Config;

#[derive(Parser)]
#[command(name = "djbridge")]
#[command(about = "Convert DJ libraries between Engine, Rekordbox and Serato")]
#[command(version)]
struct Cli {
    /// JSON file with conversion settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the analyser's beatgrids instead of the adjusted ones
    #[arg(long, global = true)]
    original_grids: bool,

    /// Use the analyser's main cues instead of the moved ones
    #[arg(long, global = true)]
    original_cues: bool,

    /// Keep Engine track paths relative to the library
    #[arg(long, global = true)]
    preserve_paths: bool,

    /// Read and write Rekordbox dates in UTC
    #[arg(long, global = true)]
    utc: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine library directory to Rekordbox XML
    EngineToXml { library: PathBuf, output: PathBuf },

    /// Engine library directory to a JSON snapshot
    EngineToJson { library: PathBuf, output: PathBuf },

    /// Rekordbox XML to a JSON snapshot
    XmlToJson { input: PathBuf, output: PathBuf },

    /// Serato folder (usually `_Serato_`) to Rekordbox XML
    SeratoToXml { folder: PathBuf, output: PathBuf },

    /// Print one crate file as JSON
    Crate { path: PathBuf },
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.engine.import_original_grids |= self.original_grids;
        config.engine.import_original_cues |= self.original_cues;
        config.engine.preserve_original_paths |= self.preserve_paths;
        config.use_utc |= self.utc;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config()?;
    debug!("Config: {:?}", config);

    match &cli.command {
        Commands::EngineToXml { library, output } => {
            let library = engine::import(library, &config.engine)?;
            write_xml(&library, output, &config)?;
        }
        Commands::EngineToJson { library, output } => {
            let library = engine::import(library, &config.engine)?;
            write_json(library, output)?;
        }
        Commands::XmlToJson { input, output } => {
            let library = rbxml::import(input, &config.xml_import())?;
            write_json(library, output)?;
        }
        Commands::SeratoToXml { folder, output } => {
            let library = serato::import(folder)?;
            write_xml(&library, output, &config)?;
        }
        Commands::Crate { path } => {
            let krate = serato::Crate::read(path)?;
            let dump = serde_json::json!({
                "name": krate.name,
                "version": krate.version,
                "paths": krate.paths,
            });
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }

    Ok(())
}

fn write_xml(library: &Library, output: &Path, config: &Config) -> anyhow::Result<()> {
    rbxml::export(library, output, &config.xml_export())?;
    info!("Wrote {} songs to {}", library.songs.len(), output.display());
    Ok(())
}

fn write_json(mut library: Library, output: &Path) -> anyhow::Result<()> {
    library.sort_songs();
    library.save_json(output)?;
    info!("Wrote {} songs to {}", library.songs.len(), output.display());
    Ok(())
}
