//! ebook-mirror entry point.

use clap::Parser;
use ebook_mirror::{
    AppError, LocalFs, RunContext, SyncEngine,
    config::{Cli, Command, Config},
    report,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_CONSTRUCT_FAILED: u8 = 1;
const EXIT_CONFIG_INVALID: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<AppError>() {
                Some(AppError::ConfigInvalid(_)) => ExitCode::from(EXIT_CONFIG_INVALID),
                _ => ExitCode::from(EXIT_CONSTRUCT_FAILED),
            }
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug {
        "ebook_mirror=debug"
    } else {
        "ebook_mirror=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Find config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    match cli.command {
        Some(Command::Init { force }) => cmd_init(config_path, force),
        Some(Command::List {
            columns,
            invert,
            json,
        }) => {
            let config = load_config(config_path.as_deref())?;
            cmd_list(&config, &columns, invert, json)
        }
        Some(Command::Sync {
            update_all_metadata,
            dryrun,
        }) => {
            let config = load_config(config_path.as_deref())?;
            cmd_sync(
                &config,
                RunContext {
                    force_update: update_all_metadata,
                    dry_run: dryrun,
                },
            )
        }
        None => {
            // Default: sync
            let config = load_config(config_path.as_deref())?;
            cmd_sync(&config, RunContext::default())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Err(AppError::ConfigInvalid(
            "no config file found; pass --config or run `ebook-mirror init`".into(),
        )
        .into());
    };
    tracing::debug!(path = %path.display(), "Loading config");
    Ok(Config::load(path)?)
}

/// Write a default config file.
fn cmd_init(config_path: Option<PathBuf>, force: bool) -> anyhow::Result<ExitCode> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("ebook-mirror.toml"));

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit it to describe your constructs, then run: ebook-mirror sync --dryrun");

    Ok(ExitCode::SUCCESS)
}

/// Mirror every construct.
fn cmd_sync(config: &Config, ctx: RunContext) -> anyhow::Result<ExitCode> {
    tracing::info!(
        constructs = config.constructs.len(),
        force = ctx.force_update,
        dry_run = ctx.dry_run,
        "Starting sync"
    );

    let fs = LocalFs;
    let summary = SyncEngine::new(&fs, ctx).run(config);
    summary.log();

    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "CONSTRUCT", "CREATED", "UPDATED", "SKIPPED", "EXCLUDED", "WARNINGS", "FAILED"
    );
    println!("{}", "-".repeat(80));
    for c in &summary.constructs {
        match &c.fatal {
            Some(reason) => println!("{:<24} {}", c.section, reason),
            None => println!(
                "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
                c.section,
                c.created,
                c.updated,
                c.skipped,
                c.excluded,
                c.warnings.len(),
                c.failures.len()
            ),
        }
    }

    Ok(if summary.has_fatal() {
        ExitCode::from(EXIT_CONSTRUCT_FAILED)
    } else {
        ExitCode::SUCCESS
    })
}

/// Print what each construct selects.
fn cmd_list(config: &Config, columns: &str, invert: bool, json: bool) -> anyhow::Result<ExitCode> {
    let columns = report::parse_columns(columns)?;
    let report = report::project(&LocalFs, config, &columns, invert);

    if json {
        println!("{}", report.to_json()?);
    } else if report.is_empty() {
        println!("No books found.");
    } else {
        print!("{}", report.render_table());
    }

    Ok(ExitCode::SUCCESS)
}
