//! `mdt link` command - Manage links between items

use console::style;
use miette::Result;

use crate::assoc::{AssociationEngine, AttributeFilter, TargetQuery};
use crate::cli::helpers::{actor, format_short_id, open_store, parse_id, print_doc};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(clap::Subcommand, Debug)]
pub enum LinkCommands {
    /// Link targets to an item under a rule
    Add(AddLinkArgs),

    /// Remove links from an item under a rule
    Remove(RemoveLinkArgs),

    /// Show all links on an item
    Show(ShowLinksArgs),

    /// List the items a rule would accept as targets
    Candidates(CandidatesArgs),

    /// Show link-state metadata for one rule on one item
    Meta(MetaArgs),
}

#[derive(clap::Args, Debug)]
#[command(after_help = "\
The batch is all-or-nothing: if any target fails type, criteria or
cardinality checks, no link is applied.

EXAMPLES:
  mdt link add ITEM-01J... ORDER_CUSTOMER ITEM-01K...
  mdt link add ITEM-01J... ORDER_FABRIC_SELECTION ITEM-01K... ITEM-01M...
")]
pub struct AddLinkArgs {
    /// Source item id
    pub source: String,

    /// Rule code
    pub rule: String,

    /// Target item ids
    #[arg(required = true)]
    pub targets: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveLinkArgs {
    /// Source item id
    pub source: String,

    /// Rule code
    pub rule: String,

    /// Target item ids (absent ids are a no-op)
    #[arg(required = true)]
    pub targets: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowLinksArgs {
    /// Item id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct CandidatesArgs {
    /// Source item id
    pub source: String,

    /// Rule code
    pub rule: String,

    /// Free-text search across the rule's searchable attributes
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Extra attribute filter as YAML/JSON, repeatable; all must pass
    #[arg(long, value_name = "FILTER")]
    pub filter: Vec<String>,

    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Page size (0 = everything)
    #[arg(long, default_value_t = 20)]
    pub page_size: usize,

    /// Include deactivated items
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct MetaArgs {
    /// Source item id
    pub source: String,

    /// Rule code
    pub rule: String,
}

pub fn run(cmd: LinkCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LinkCommands::Add(args) => add(args, global),
        LinkCommands::Remove(args) => remove(args, global),
        LinkCommands::Show(args) => show(args, global),
        LinkCommands::Candidates(args) => candidates(args, global),
        LinkCommands::Meta(args) => meta(args, global),
    }
}

fn parse_ids(raw: &[String]) -> Result<Vec<crate::core::identity::EntityId>> {
    raw.iter().map(|s| parse_id(s)).collect()
}

fn add(args: AddLinkArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let engine = AssociationEngine::new(&store);
    let source = parse_id(&args.source)?;
    let targets = parse_ids(&args.targets)?;

    engine.add_association(source, &targets, &args.rule, &actor())?;
    if !global.quiet {
        println!(
            "{} Linked {} target(s) under {}",
            style("✓").green(),
            targets.len(),
            style(&args.rule).cyan()
        );
    }
    Ok(())
}

fn remove(args: RemoveLinkArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let engine = AssociationEngine::new(&store);
    let source = parse_id(&args.source)?;
    let targets = parse_ids(&args.targets)?;

    engine.remove_association(source, &targets, &args.rule, &actor())?;
    if !global.quiet {
        println!(
            "{} Unlinked {} target(s) under {}",
            style("✓").green(),
            targets.len(),
            style(&args.rule).cyan()
        );
    }
    Ok(())
}

fn show(args: ShowLinksArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let item = store.must_item(parse_id(&args.id)?)?;

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&item.associations, global);
    }

    for (key, value) in &item.associations {
        println!("{}:", style(key).cyan());
        for id in value.ids() {
            println!("  {id}");
        }
    }
    if !global.quiet {
        eprintln!("{} association key(s)", item.associations.len());
    }
    Ok(())
}

fn candidates(args: CandidatesArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let engine = AssociationEngine::new(&store);
    let source = parse_id(&args.source)?;

    let extra = args
        .filter
        .iter()
        .map(|raw| {
            serde_yml::from_str::<AttributeFilter>(raw)
                .map_err(|e| miette::miette!("invalid filter '{raw}': {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let query = TargetQuery {
        page: args.page,
        page_size: args.page_size,
        search: args.search.clone(),
        extra,
        include_inactive: args.all,
    };
    let page = engine.filtered_targets(source, &args.rule, &query)?;

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&page.items, global);
    }

    let mut listing = Listing::new(&["ID", "ATTRS", "ACTIVE"], "candidate");
    for item in &page.items {
        listing.push(
            item.id.to_string(),
            vec![
                format_short_id(&item.id),
                item.attributes.len().to_string(),
                if item.active { "yes" } else { "no" }.to_string(),
            ],
        );
    }
    listing.print(global);
    if !global.quiet {
        eprintln!(
            "page {} ({} of {} total)",
            args.page,
            page.items.len(),
            page.total
        );
    }
    Ok(())
}

fn meta(args: MetaArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let engine = AssociationEngine::new(&store);
    let meta = engine.association_metadata(parse_id(&args.source)?, &args.rule)?;
    print_doc(&meta, global)
}
