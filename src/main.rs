use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, warn};

mod cleanup;
mod config;
mod db;
mod editor;
mod logging;
mod query;
mod table;
mod whitelist;

use config::{AppPaths, Config};
use editor::{EditOutcome, Prompt};

#[derive(Parser)]
#[command(name = "epcleansing")]
#[command(about = "Delete watched Kodi episodes, except for whitelisted tvshows")]
#[command(version)]
struct Cli {
    /// Display which episodes are going to be deleted without processing
    #[arg(short, long)]
    simu: bool,

    /// Delete all the watched episodes
    #[arg(short, long)]
    clean: bool,

    /// Display the list of tvshows in the database
    #[arg(short, long)]
    tvshows: bool,

    /// Add a tvshow to the whitelist
    #[arg(short, long)]
    add: bool,

    /// Display the tvshows in the whitelist
    #[arg(short, long)]
    display: bool,

    /// Remove tvshows from the whitelist
    #[arg(short, long)]
    remove: bool,

    /// Increase output verbosity
    #[arg(short, long)]
    verbose: bool,

    /// Print rows as JSON (with --tvshows, --simu or --display)
    #[arg(long)]
    json: bool,

    /// Directory holding config.json, whitelist.json and the log file
    /// (defaults to the directory of the executable)
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Print a shell completion script and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Clean,
    TvShows,
    Simulate,
    Add,
    Display,
    Remove,
}

impl Cli {
    /// The first requested action in priority order; the rest are ignored.
    fn action(&self) -> Option<Action> {
        [
            (self.clean, Action::Clean),
            (self.tvshows, Action::TvShows),
            (self.simu, Action::Simulate),
            (self.add, Action::Add),
            (self.display, Action::Display),
            (self.remove, Action::Remove),
        ]
        .into_iter()
        .find_map(|(set, action)| set.then_some(action))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "epcleansing", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let paths = match &cli.home {
        Some(dir) => AppPaths::new(dir),
        None => match AppPaths::beside_executable() {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let _log = match logging::init(cli.verbose, &paths.log()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &paths) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, paths: &AppPaths) -> Result<()> {
    let Some(action) = cli.action() else {
        warn!("No option selected. No action done. Please choose an option.");
        Cli::command().print_help()?;
        return Ok(());
    };
    debug!("Running {:?}", action);

    let config = Config::load(&paths.config())?;
    let db_path = config.resolve_database()?;
    let whitelist_path = paths.whitelist();
    let mut stdout = io::stdout();

    match action {
        Action::Clean => {
            cleanup::clean(&db_path, &whitelist_path)?;
        }
        Action::TvShows => {
            query::list_tvshows(&db_path, cli.json, &mut stdout)?;
        }
        Action::Simulate => {
            cleanup::simulate(&db_path, &whitelist_path, cli.json, &mut stdout)?;
        }
        Action::Display => {
            query::show_whitelist(&db_path, &whitelist_path, cli.json, &mut stdout)?;
        }
        Action::Add | Action::Remove => {
            let mut prompt = Prompt::new(io::stdin().lock(), stdout);
            let outcome = if action == Action::Add {
                editor::add(&db_path, &whitelist_path, &mut prompt)?
            } else {
                editor::remove(&db_path, &whitelist_path, &mut prompt)?
            };
            if outcome == EditOutcome::Quit {
                debug!("Whitelist edit cancelled, nothing saved");
            }
        }
    }

    Ok(())
}
