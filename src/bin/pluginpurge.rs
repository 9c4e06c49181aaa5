use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pluginpurge_core::{EngineConfig, PurgeEngine, SizeOrder, SortColumn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// PluginPurge - find, inspect and remove installed audio plugins
#[derive(Parser, Debug)]
#[command(name = "pluginpurge", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Additional root directory to scan (repeatable)
    #[arg(long = "root", global = true, value_hint = clap::ValueHint::DirPath)]
    roots: Vec<PathBuf>,

    /// Skip the platform's standard plugin directories
    #[arg(long, global = true)]
    no_default_roots: bool,

    /// Order the Size column by byte count instead of the displayed text
    #[arg(long, global = true)]
    numeric_size: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan and list installed plugins
    List {
        /// Only show plugins whose file name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Column to sort by: name, vendor, version, size, format, path
        #[arg(short, long)]
        sort: Option<SortColumn>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete plugin files
    Uninstall {
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        paths: Vec<PathBuf>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the folder containing a plugin
    Folder { path: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = EngineConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    config.roots.extend(args.roots.iter().cloned());
    if args.no_default_roots {
        config.include_default_roots = false;
    }
    if args.numeric_size {
        config.size_order = SizeOrder::Numeric;
    }

    let mut engine = PurgeEngine::new(&config);

    match args.command {
        Command::List {
            filter,
            sort,
            desc,
            json,
        } => {
            engine.refresh_blocking().context("Plugin scan failed")?;
            let total = engine.status();
            if let Some(filter) = filter.as_deref() {
                engine.set_filter(filter);
            }
            if let Some(column) = sort {
                engine.sort_by(column);
                if desc {
                    engine.sort_by(column);
                }
            }

            let rows = engine.rows();
            if json {
                let out = serde_json::to_string_pretty(&rows)?;
                println!("{out}");
            } else {
                for row in &rows {
                    println!(
                        "{:<40} {:<24} {:<12} {:>11} {:<6} {}",
                        row.name, row.vendor, row.version, row.size, row.format, row.path
                    );
                }
                eprintln!("{total}");
                if filter.is_some() {
                    eprintln!("{}", engine.status());
                }
            }
        }

        Command::Uninstall { paths, yes } => {
            let report = engine
                .uninstall_selected(&paths, |count| yes || confirm(count))
                .context("Uninstall failed")?;
            let Some(report) = report else {
                eprintln!("{}", engine.status());
                return Ok(());
            };
            for (path, outcome) in report.failures() {
                eprintln!("Failed to uninstall {}: {outcome}", path.display());
            }
            println!("{}", engine.status());
            engine.wait_for_scan().context("Rescan failed")?;
            println!("{}", engine.status());
        }

        Command::Folder { path } => match engine.containing_folder(&path) {
            Some(folder) => println!("{}", folder.display()),
            None => anyhow::bail!("{} has no containing folder", path.display()),
        },
    }

    Ok(())
}

fn confirm(count: usize) -> bool {
    print!("Are you sure you want to uninstall {count} plugin(s)? [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pluginpurge_core={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
