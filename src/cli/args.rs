//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    assoc::AssocCommands,
    attr::AttrCommands,
    completions::CompletionsArgs,
    group::GroupCommands,
    hierarchy::{CategoryCommands, FamilyCommands, TypeCommands},
    init::InitArgs,
    item::ItemCommands,
    link::LinkCommands,
};

#[derive(Parser)]
#[command(name = "mdt")]
#[command(author, version, about = "Master Data Toolkit")]
#[command(
    long_about = "Manage items with hierarchy-resolved dynamic attributes and typed, \
validated associations, stored as plain text files."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .mdt/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new project
    Init(InitArgs),

    /// Attribute definition management
    #[command(subcommand)]
    Attr(AttrCommands),

    /// Attribute group management
    #[command(subcommand)]
    Group(GroupCommands),

    /// Item type management
    #[command(subcommand, name = "type")]
    ItemType(TypeCommands),

    /// Category hierarchy management
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Family hierarchy management
    #[command(subcommand)]
    Family(FamilyCommands),

    /// Item management
    #[command(subcommand)]
    Item(ItemCommands),

    /// Association definition and rule management
    #[command(subcommand)]
    Assoc(AssocCommands),

    /// Manage links between items
    #[command(subcommand)]
    Link(LinkCommands),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
    /// Just IDs, one per line
    Id,
}
