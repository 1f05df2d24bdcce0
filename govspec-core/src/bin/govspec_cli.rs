//! Governed Spec CLI - Batch export gate
//!
//! Commands: contract, export, batch
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when any export is invalid

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use govspec_core::{
    write_artifacts, BuildMode, Category, ContractLock, Manifest, ManifestEntry, Pipeline,
};

#[derive(Parser)]
#[command(name = "govspec-cli")]
#[command(version, about = "Governed Spec CLI - contract-locked layout exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Alternate contract lock (TOML); the frozen lock is used when omitted
    #[arg(short, long, global = true)]
    contract: Option<PathBuf>,

    /// Build mode override (release | development)
    #[arg(short, long, global = true)]
    mode: Option<BuildMode>,

    /// Tracing filter, e.g. "info" or "govspec_core=debug"
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective contract lock
    Contract,

    /// Export a single layout file
    Export {
        /// Layout JSON file
        #[arg(short, long)]
        spec: PathBuf,

        /// Page or component identifier
        #[arg(short, long)]
        id: String,

        /// Pages or Components
        #[arg(long, default_value = "Pages")]
        category: Category,
    },

    /// Export every layout listed in a manifest
    Batch {
        /// Manifest JSON file
        #[arg(short = 'f', long)]
        manifest: PathBuf,

        /// Output directory for artifacts
        #[arg(short, long, default_value = "exports")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // The lock is checked before any input is read.
    let pipeline = match load_pipeline(&cli) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "contract lock rejected at startup");
            print_json(&serde_json::json!({"success": false, "error": e}));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Contract => {
            print_json(pipeline.contract());
            ExitCode::SUCCESS
        }

        Commands::Export { spec, id, category } => {
            let tree: serde_json::Value = match std::fs::read_to_string(&spec)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
            {
                Ok(t) => t,
                Err(e) => {
                    print_json(&serde_json::json!({
                        "valid": false,
                        "error": format!("Invalid layout {}: {}", spec.display(), e),
                    }));
                    return ExitCode::FAILURE;
                }
            };

            match pipeline.export_one(&ManifestEntry::new(id, category, tree)) {
                Ok(result) => {
                    print_json(&result);
                    if result.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)  // Validation failure
                    }
                }
                Err(e) => {
                    print_json(&serde_json::json!({"valid": false, "error": e.to_string()}));
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Batch { manifest, out } => {
            let manifest = match Manifest::from_file(&manifest) {
                Ok(m) => m,
                Err(e) => {
                    print_json(&serde_json::json!({"success": false, "error": e.to_string()}));
                    return ExitCode::FAILURE;
                }
            };

            let outcome = pipeline.run_batch(&manifest);
            if let Err(e) = write_artifacts(&outcome, &out) {
                print_json(&serde_json::json!({"success": false, "error": e.to_string()}));
                return ExitCode::FAILURE;
            }

            print_json(&serde_json::json!({
                "success": true,
                "out": out.display().to_string(),
                "summary": outcome.summary,
            }));
            if outcome.summary.all_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)  // At least one invalid export
            }
        }
    }
}

fn load_pipeline(cli: &Cli) -> Result<Pipeline, String> {
    let lock = match &cli.contract {
        Some(path) => ContractLock::from_file(path).map_err(|e| e.to_string())?,
        None => ContractLock::frozen(),
    };
    let lock = match cli.mode {
        Some(mode) => lock.with_build_mode(mode),
        None => lock,
    };
    Pipeline::new(lock).map_err(|e| e.to_string())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!(r#"{{"success": false, "error": "Serialization error: {}"}}"#, e),
    }
}
