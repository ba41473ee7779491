use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use treekv::payload::Payload;
use treekv::{Store, DEFAULT_BRANCH};

#[derive(Parser)]
#[command(
    name = "treekv",
    version,
    author,
    about = "A versioned, path-addressed key-value store",
    long_about = "Inspects and manipulates a treekv repository: a path-addressed \
    tree of values committed as snapshots in a content-addressed object \
    database compatible with a standard distributed version-control store."
)]
struct Cli {
    #[arg(long, default_value = ".", help = "Path to the repository")]
    path: String,

    #[arg(long, default_value = DEFAULT_BRANCH, help = "Branch to operate on")]
    branch: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Lay out an empty repository at the given path")]
    Init,

    #[command(about = "Print the decoded value at a path, or report it absent")]
    Get {
        #[arg(index = 1)]
        path: String,
    },

    #[command(about = "Set a path to a raw byte value and commit")]
    Set {
        #[arg(index = 1)]
        path: String,
        #[arg(index = 2)]
        value: String,
        #[arg(short, long, help = "Commit message")]
        message: Option<String>,
    },

    #[command(about = "Delete a path and commit")]
    Rm {
        #[arg(index = 1)]
        path: String,
        #[arg(short, long, help = "Commit message")]
        message: Option<String>,
    },

    #[command(about = "Show commit history, newest first")]
    Log {
        #[arg(short, long, default_value_t = 10, help = "Maximum commits to show")]
        limit: usize,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init => {
            Store::init(&cli.path, &cli.branch, false)
                .with_context(|| format!("failed to initialize repository at {}", cli.path))?;
            println!("Initialized empty repository in {}", cli.path);
        }
        Commands::Get { path } => {
            let mut store = open_store(&cli)?;
            match store.get(path).with_context(|| format!("failed to read {path}"))? {
                Some(Payload::Raw(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => println!("{text}"),
                    Err(_) => println!("{bytes:?}"),
                },
                Some(Payload::Structured(value)) => {
                    print!(
                        "{}",
                        serde_yaml::to_string(&value).context("failed to render value as yaml")?
                    );
                }
                None => println!("(no entry at {path})"),
            }
        }
        Commands::Set { path, value, message } => {
            let mut store = open_store(&cli)?;
            let message = message.clone().unwrap_or_else(|| format!("set {path}"));
            let path = path.clone();
            let value = value.clone();
            store
                .transaction(&message, |wt, db, _handlers| {
                    wt.set(&path, Payload::Raw(value.into_bytes()), db)
                })
                .context("transaction failed")?;
        }
        Commands::Rm { path, message } => {
            let mut store = open_store(&cli)?;
            let message = message.clone().unwrap_or_else(|| format!("remove {path}"));
            let path = path.clone();
            store
                .transaction(&message, |wt, db, _handlers| wt.delete(&path, db))
                .context("transaction failed")?;
        }
        Commands::Log { limit } => {
            let store = open_store(&cli)?;
            for (id, commit) in store.commits(*limit, None).context("failed to walk history")? {
                println!("{} {}", id.to_short().yellow(), commit.short_message());
            }
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<Store> {
    Store::open(&cli.path, &cli.branch, false)
        .with_context(|| format!("failed to open repository at {}", cli.path))
}
