/// Resonant - offline DSP processing and script tooling
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resonant_cli::process::{process_file, ProcessOptions, DEFAULT_BLOCK_FRAMES};
use resonant_cli::script;
use resonant_core::{EngineConfig, LocalFileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resonant")]
#[command(about = "Resonant DSP engine command line", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "resonant.toml")]
    config: PathBuf,

    /// Base directory for IR, DDC and script files
    #[arg(short, long, global = true, env = "RESONANT_LIBRARY_ROOT")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a stereo WAV file
    Process {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// JSON settings file
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// Engine sample rate (defaults to the input rate)
        #[arg(long)]
        sample_rate: Option<f32>,
        /// Frames per engine call
        #[arg(long, default_value_t = DEFAULT_BLOCK_FRAMES)]
        block_frames: usize,
        /// Print engine events as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// Inspect or edit script properties
    Script {
        #[command(subcommand)]
        action: ScriptAction,
    },
}

#[derive(Subcommand)]
enum ScriptAction {
    /// List description, tags and properties
    Show { file: String },
    /// Set a property value and save
    Set { file: String, key: String, value: f64 },
    /// Restore declared defaults and save
    Restore { file: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration '{}'", cli.config.display()))?;
    if let Some(root) = cli.library {
        config.library.root = root;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            input,
            output,
            settings,
            sample_rate,
            block_frames,
            events,
        } => {
            let options = ProcessOptions {
                input,
                output,
                settings,
                sample_rate,
                block_frames,
            };
            let summary = process_file(&config, &options)?;
            tracing::info!(
                "Processed {} frames at {} Hz ({} namespaces applied, {} rejected)",
                summary.frames,
                summary.sample_rate,
                summary.sync.applied.len(),
                summary.sync.failed.len()
            );
            if events {
                for event in &summary.events {
                    println!("{}", serde_json::to_string(event)?);
                }
            }
        }
        Commands::Script { action } => {
            let files = Arc::new(LocalFileStore::new(config.library.root.clone()));
            match action {
                ScriptAction::Show { file } => {
                    let document = script::open(files, &file)?;
                    print!("{}", script::render(&document));
                }
                ScriptAction::Set { file, key, value } => {
                    let mut document = script::open(files, &file)?;
                    script::set(&mut document, &key, value)?;
                    print!("{}", script::render(&document));
                }
                ScriptAction::Restore { file } => {
                    let mut document = script::open(files, &file)?;
                    script::restore(&mut document)?;
                    print!("{}", script::render(&document));
                }
            }
        }
    }

    Ok(())
}
