mod render;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fscore_config::{Settings, DEFAULT_CONFIG_FILE};
use fsd::{IndexError, IndexEvent, SearchService, ServiceError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "FASTSEARCH_LOG";

/// Index a directory tree and search it by filename
#[derive(Parser)]
#[command(name = "fastsearch")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Snapshot file, overrides the configured one
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log filter used when FASTSEARCH_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk ROOT, publish the new index and save the snapshot
    Index { root: PathBuf },

    /// Search the saved index by filename
    Search {
        fragment: String,

        /// Run even if the fragment is shorter than the live-typing minimum
        #[arg(short, long)]
        force: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Interactive session: every line is a search, `:help` lists directives
    Shell,

    /// Show snapshot and index counts
    Status,
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(snapshot) = args.snapshot {
        settings.snapshot_path = snapshot;
    }

    match args.command {
        Command::Index { root } => {
            let service = SearchService::new(settings);
            run_index(&service, root).await
        }
        Command::Search {
            fragment,
            force,
            limit,
        } => {
            if let Some(limit) = limit {
                settings.max_results = limit;
            }
            let service = open_service(settings);
            run_search(&service, &fragment, force);
            Ok(())
        }
        Command::Shell => {
            let service = open_service(settings);
            run_shell(&service).await
        }
        Command::Status => {
            let service = open_service(settings);
            let catalog = service.catalog();
            println!("snapshot: {}", service.settings().snapshot_path.display());
            println!("names:    {}", catalog.name_count());
            println!("paths:    {}", catalog.path_count());
            Ok(())
        }
    }
}

/// Builds the service and restores the last snapshot. A corrupt snapshot is reported
/// and the session starts with an empty index.
fn open_service(settings: Settings) -> SearchService {
    let service = SearchService::new(settings);
    match service.restore_snapshot() {
        Ok(true) => {}
        Ok(false) => tracing::info!("no snapshot yet, run `fastsearch index <ROOT>`"),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable snapshot");
            eprintln!("warning: {err}; starting with an empty index");
        }
    }
    service
}

async fn run_index(service: &SearchService, root: PathBuf) -> anyhow::Result<()> {
    let mut job = service.start_index(&root)?;
    let cancel = job.cancel_token();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = job.next_event() => match event {
                Some(IndexEvent::Progress { files, .. }) => {
                    eprint!("\rindexing... {files} files");
                }
                Some(_) => {}
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                cancel.cancel();
            }
        }
    }
    eprintln!();

    match job.wait().await {
        Ok(report) => {
            println!("{}", render::report_line(&report));
            Ok(())
        }
        Err(ServiceError::Index(IndexError::Cancelled)) => {
            println!("Indexing cancelled, previous index kept");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_search(service: &SearchService, fragment: &str, forced: bool) {
    if !service.admits(fragment, forced) {
        if !fragment.trim().is_empty() {
            println!(
                "Type at least {} characters or pass --force",
                service.settings().min_live_query_len
            );
        }
        return;
    }

    for row in render::result_rows(&service.search(fragment, forced)) {
        println!("{row}");
    }
}

async fn run_shell(service: &SearchService) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match parse_shell_line(line) {
            ShellLine::Empty => {}
            ShellLine::Quit => break,
            ShellLine::Help => print_shell_help(),
            ShellLine::Clear => {
                service.clear();
                println!("Index cleared");
            }
            ShellLine::Index(root) => {
                if let Err(err) = run_index(service, PathBuf::from(root)).await {
                    println!("error: {err}");
                }
            }
            ShellLine::Unknown(directive) => println!("unknown directive {directive}, try :help"),
            // Enter is an explicit confirmation, so shell queries are always forced.
            ShellLine::Query(fragment) => run_search(service, fragment, true),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ShellLine<'a> {
    Empty,
    Quit,
    Help,
    Clear,
    Index(&'a str),
    Unknown(&'a str),
    Query(&'a str),
}

fn parse_shell_line(line: &str) -> ShellLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ShellLine::Empty;
    }

    let Some(directive) = line.strip_prefix(':') else {
        return ShellLine::Query(line);
    };

    let (name, rest) = directive
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((directive, ""));

    match name.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => ShellLine::Quit,
        "help" | "h" => ShellLine::Help,
        "clear" => ShellLine::Clear,
        "index" if !rest.is_empty() => ShellLine::Index(rest),
        _ => ShellLine::Unknown(line),
    }
}

fn print_shell_help() {
    println!(":index <ROOT>  rebuild the index from ROOT");
    println!(":clear         drop the in-memory index");
    println!(":quit          leave the shell");
    println!("anything else  search filenames");
}
