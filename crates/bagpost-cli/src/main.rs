mod commands;
mod logging;
mod progress;

use std::process;

use anyhow::Context;
use bagpost_core::archive::HttpArchiveClient;
use bagpost_core::{naming, AppConfig, ProgressReporter, SilentReporter, UploadDriver};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Cli::parse();

    let mut config = match bagpost_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "Error loading configuration:".red(), err);
            process::exit(1);
        }
    };
    apply_overrides(&mut config, &args);

    let _guard = logging::init_logger(&config.log_file, config.quiet);

    match args.command {
        Some(Commands::Process) => run_process(&config)?,
        Some(Commands::Rename { vehicle_type, name }) => {
            let renamed = naming::hard_rename(
                &config.scan_root,
                &config.extension,
                &vehicle_type,
                &name,
                &config.vehicles,
            )
            .with_context(|| format!("renaming recordings in {}", config.scan_root.display()))?;
            info!("{} recording(s) renamed", renamed.len());
        }
        Some(Commands::PrintConfig) => {
            let rendered =
                toml::to_string_pretty(&config).context("rendering configuration")?;
            println!("{}", rendered);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &Cli) {
    if args.quiet {
        config.quiet = true;
    }
    if args.recursive {
        config.recursive = true;
    }
    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if let Some(dir) = &args.dir {
        config.scan_root = dir.clone();
    }
}

fn run_process(config: &AppConfig) -> anyhow::Result<()> {
    let client = HttpArchiveClient::new(&config.base_url)
        .context("building archive client")?;

    let cli_reporter;
    let reporter: &dyn ProgressReporter = if config.quiet {
        &SilentReporter
    } else {
        cli_reporter = CliReporter::new();
        &cli_reporter
    };

    let summary = match UploadDriver::new(config, &client).run(reporter) {
        Ok(summary) => summary,
        Err(err) => {
            error!("Aborting upload run: {}", err);
            return Err(err).context(format!("processing {}", config.scan_root.display()));
        }
    };

    info!(
        "{} uploaded, {} rejected, {} left for manual review, {} already uploaded",
        format!("{}", summary.uploaded).green(),
        format!("{}", summary.upload_failed).red(),
        format!("{}", summary.skipped_unsafe).yellow(),
        format!("{}", summary.already_processed).cyan(),
    );
    for (path, err) in &summary.errors {
        error!("{}: {}", path.display(), err);
    }

    Ok(())
}
