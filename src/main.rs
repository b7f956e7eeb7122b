use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use lindex::{Index, IndexError};

#[derive(Parser)]
#[command(name = "lindex", about = "B-tree index over line-oriented text files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a new index from an existing data file
    Create {
        /// Path to the line-oriented data file
        data_file: PathBuf,
        /// Path of the index file to create
        index_file: PathBuf,
        /// Fixed key length: the first N bytes of every line
        key_size: usize,
    },
    /// Look up a key and print its offset and line
    Find {
        index_file: PathBuf,
        key: String,
    },
    /// Append a record to the data file and index its key
    Insert {
        index_file: PathBuf,
        record: String,
    },
    /// Print up to COUNT lines whose keys are >= KEY, in key order
    List {
        index_file: PathBuf,
        key: String,
        count: usize,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Create {
            data_file,
            index_file,
            key_size,
        } => {
            Index::build(&data_file, &index_file, key_size, &mut |key, offset| {
                println!(
                    "duplicate key {:?} already indexed at offset {offset}, line skipped",
                    String::from_utf8_lossy(key)
                );
            })?;
        }
        Command::Find { index_file, key } => {
            let mut index = Index::open(&index_file)?;
            match index.find(key.as_bytes())? {
                Some((offset, line)) => println!("found key at offset {offset}: {line}"),
                None => println!("key not found"),
            }
        }
        Command::Insert { index_file, record } => {
            let mut index = Index::open(&index_file)?;
            match index.insert_record(&record) {
                Ok(offset) => println!("placed new record at offset {offset}"),
                Err(IndexError::DuplicateKey { offset, .. }) => {
                    println!("key already exists at offset {offset}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::List {
            index_file,
            key,
            count,
        } => {
            let mut index = Index::open(&index_file)?;
            index.list(key.as_bytes(), count, &mut |line| println!("{line}"))?;
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lindex=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
