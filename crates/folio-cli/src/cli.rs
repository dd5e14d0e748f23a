use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "folio",
    about = "folio: indexed JSON documents in a versioned store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository root
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Branch to work on instead of the configured one
    #[arg(short, long, global = true)]
    pub branch: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a repository
    Init,
    /// Store a document, or create a container
    Put(PutArgs),
    /// Print a document or list a container
    Get(PathArgs),
    /// Remove a document or container
    Rm(PathArgs),
    /// List a container with entry kinds
    Ls(LsArgs),
    /// Give a container an index
    Index(IndexArgs),
    /// Look a key up in a container's index
    Find(FindArgs),
    /// Print a stored document by content hash
    Show(ShowArgs),
    /// List branches
    Branches,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: String,
    /// Document body as a JSON object
    pub json: Option<String>,
    /// Create an empty container instead of a document
    #[arg(long, conflicts_with = "json")]
    pub container: bool,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "")]
    pub path: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum IndexKind {
    Hash,
    Keyed,
}

#[derive(Args)]
pub struct IndexArgs {
    pub container: String,
    #[arg(long, value_enum, default_value = "hash")]
    pub kind: IndexKind,
    /// Register the index under this name
    #[arg(long)]
    pub name: Option<String>,
    /// Send records to the named index instead of keeping them
    #[arg(long)]
    pub supply: Option<String>,
    /// Key records by content hash
    #[arg(long)]
    pub inverse: bool,
    /// Field keyed indexes read their key from
    #[arg(long)]
    pub field: Option<String>,
    /// Add as a named subindex of a container index
    #[arg(long)]
    pub sub: Option<String>,
}

#[derive(Args)]
pub struct FindArgs {
    pub container: String,
    pub key: String,
    #[arg(long)]
    pub subindex: Option<String>,
    /// Print only the first match
    #[arg(long)]
    pub first: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub hash: String,
}
