use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use udf_host::config::{HostConfig, ModuleConfig};
use udf_host::plugins::{ModuleContext, ModuleEvent, UdfModule};

/// Validate native UDF plugin images.
#[derive(Debug, Parser)]
#[command(name = "udf-host", version, about)]
struct Cli {
    /// Config file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the plugin user path from the config
    #[arg(long, global = true)]
    user_path: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a plugin image file
    Validate {
        /// Plugin image on disk
        file: PathBuf,

        /// Module name to validate as (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the configured user path is usable
    Check,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = HostConfig::load_or_default(cli.config.as_deref())?;
    if let Some(user_path) = cli.user_path {
        config.udf = ModuleConfig::with_user_path(user_path);
    }

    let context = Arc::new(ModuleContext::new());
    let module = UdfModule::native(Arc::clone(&context), &config.validator);

    let status = module.update(&ModuleEvent::Configure(config.udf.clone()));
    if status != 0 {
        anyhow::bail!("Configure rejected with status {status}");
    }

    match cli.command {
        Command::Check => {
            let status = module.update(&ModuleEvent::FileScan);
            if status == 0 {
                println!("user path ready: {}", config.udf.user_path);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("user path not usable: {:?}", context.user_path());
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Validate { file, name, json } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("Failed to read plugin image: {}", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .with_context(|| format!("Cannot derive module name from {}", file.display()))?,
            };

            let report = module.validate(&name, &content);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_pass() {
                println!("{name}: ok");
            } else {
                println!("{name}: failed ({}) {}", report.code, report.message);
            }
            Ok(if report.is_pass() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
