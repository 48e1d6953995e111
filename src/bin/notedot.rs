// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use notedot::{
    config::Config,
    fs::LocalFs,
    path::{default_config_path, default_store_path, home_dir},
    reconcile::{
        diff::Classification, namespace::Namespace, AddStatus, Reconciler, RemoveStatus,
    },
    store::FileStore,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::read_to_string,
    path::{absolute, PathBuf},
    process::exit,
};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "notedot [options] <notedot-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Home directory that tracked paths are relative to.
    #[arg(long, global = true, value_name = "path")]
    pub home: Option<PathBuf>,

    /// Path to local store file.
    #[arg(short, long, global = true, value_name = "path")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let session = Session::load(self.config, self.home, self.store)?;
        match self.command {
            Command::Status(opts) => run_status(session, opts),
            Command::Add(opts) => run_add(session, opts),
            Command::Remove(opts) => run_remove(session, opts),
            Command::Sync(opts) => run_sync(session, opts),
            Command::Wipe => run_wipe(session),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show how local files drift from their notes.
    #[command(override_usage = "notedot status [options] [<path>]...")]
    Status(StatusOptions),

    /// Start tracking files as notes.
    #[command(override_usage = "notedot add [options] <path>...")]
    Add(AddOptions),

    /// Stop tracking files.
    #[command(override_usage = "notedot remove [options] <path>...")]
    Remove(RemoveOptions),

    /// Push local changes and pull remote changes.
    #[command(override_usage = "notedot sync [options]")]
    Sync(SyncOptions),

    /// Stop tracking everything in the namespace.
    #[command(override_usage = "notedot wipe [options]")]
    Wipe,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Restrict report to these paths.
    #[arg(value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Files or directories to track.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Files or directories to stop tracking.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Paths to leave alone, on top of configured ones.
    #[arg(short, long, value_name = "path")]
    pub exclude: Vec<PathBuf>,
}

/// Everything a command needs, resolved from flags, configuration, and
/// defaults in that order.
struct Session {
    home: PathBuf,
    exclude: Vec<PathBuf>,
    reconciler: Reconciler<FileStore, LocalFs>,
}

impl Session {
    fn load(config: Option<PathBuf>, home: Option<PathBuf>, store: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config)?;
        let settings = config.settings;

        let home = match home.or(settings.home) {
            Some(home) => home,
            None => home_dir()?,
        };
        let home = absolute(&home)
            .with_context(|| format!("cannot resolve home directory {:?}", home.display()))?;

        let store = match store.or(settings.store) {
            Some(store) => store,
            None => default_store_path()?,
        };
        debug!("use store file {:?}", store.display());

        let exclude = settings
            .exclude
            .into_iter()
            .map(|path| if path.is_relative() { home.join(path) } else { path })
            .collect();

        let namespace = Namespace::new(settings.namespace_root)?;
        let reconciler = Reconciler::new(namespace, FileStore::open(store)?, LocalFs);

        Ok(Self {
            home,
            exclude,
            reconciler,
        })
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    // INVARIANT: Only an explicitly requested configuration file must exist.
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (default_config_path()?, false),
    };

    if !required && !path.exists() {
        debug!("no configuration at {:?}, use defaults", path.display());
        return Ok(Config::default());
    }

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read configuration {:?}", path.display()))?;
    let config = data
        .parse::<Config>()
        .with_context(|| format!("failed to parse configuration {:?}", path.display()))?;
    debug!("loaded configuration {:?}", path.display());

    Ok(config)
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_status(session: Session, opts: StatusOptions) -> Result<()> {
    let paths = absolutize(opts.paths)?;
    let diffs = session.reconciler.status(&session.home, paths)?;
    if diffs.is_empty() {
        info!("nothing tracked");
    }

    for item in diffs {
        println!(
            "{:<14} {}",
            label(item.classification),
            item.home_relative.display()
        );
    }

    Ok(())
}

fn run_add(mut session: Session, opts: AddOptions) -> Result<()> {
    let paths = absolutize(opts.paths)?;
    let outcome = session.reconciler.add(&session.home, paths)?;
    for (path, status) in &outcome.paths {
        let status = match status {
            AddStatus::Added => "added",
            AddStatus::AlreadyTracked => "already tracked",
            AddStatus::Invalid => "invalid",
        };
        println!("{status:<16} {}", path.display());
    }
    println!(
        "pushed {} tags and {} notes",
        outcome.tags_pushed, outcome.notes_pushed
    );

    Ok(())
}

fn run_remove(mut session: Session, opts: RemoveOptions) -> Result<()> {
    let paths = absolutize(opts.paths)?;
    let outcome = session.reconciler.remove(&session.home, paths)?;
    for (path, status) in &outcome.paths {
        match status {
            RemoveStatus::Removed { instances } => {
                println!("removed ({instances})    {}", path.display())
            }
            RemoveStatus::NotTracked => println!("not tracked      {}", path.display()),
        }
    }
    println!(
        "removed {} notes and {} tags, {} paths not tracked",
        outcome.notes_removed, outcome.tags_removed, outcome.not_tracked
    );

    Ok(())
}

fn run_sync(mut session: Session, opts: SyncOptions) -> Result<()> {
    let mut exclude = session.exclude;
    exclude.extend(absolutize(opts.exclude)?);

    let outcome = session.reconciler.sync(&session.home, exclude)?;
    if outcome.is_noop() {
        println!("nothing to do");
    } else {
        println!("pushed {} and pulled {}", outcome.pushed, outcome.pulled);
    }

    Ok(())
}

fn run_wipe(mut session: Session) -> Result<()> {
    let outcome = session.reconciler.wipe()?;
    println!(
        "wiped {} notes and {} tags",
        outcome.notes_removed, outcome.tags_removed
    );

    Ok(())
}

fn absolutize(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    paths
        .into_iter()
        .map(|path| {
            absolute(&path).with_context(|| format!("cannot resolve path {:?}", path.display()))
        })
        .collect()
}

fn label(classification: Classification) -> &'static str {
    match classification {
        Classification::Identical => "identical",
        Classification::LocalMissing => "local missing",
        Classification::LocalNewer => "local newer",
        Classification::RemoteNewer => "remote newer",
        Classification::Untracked => "untracked",
    }
}
