//! `mdt item` command - Item management

use std::collections::BTreeMap;

use console::style;
use miette::Result;

use crate::cli::helpers::{
    actor, format_short_id, open_store, parse_assignment, parse_id, print_doc,
};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::CoreError;
use crate::item::{ItemPatch, ItemService, NewItem};

#[derive(clap::Subcommand, Debug)]
pub enum ItemCommands {
    /// Create an item
    New(NewItemArgs),

    /// List items
    List(ListItemArgs),

    /// Show one item
    Show(ShowItemArgs),

    /// Set or clear attribute values on an item
    Set(SetItemArgs),

    /// Deactivate an item (kept on disk, dropped from candidate listings)
    Deactivate(IdArgs),

    /// Reactivate an item
    Activate(IdArgs),

    /// Delete an item and scrub its mirrored links
    Delete(DeleteItemArgs),
}

#[derive(clap::Args, Debug)]
#[command(after_help = "\
EXAMPLES:
  mdt item new television -c electronics --family led_tvs \\
      -a screen_size=55 -a brand='\"Acme\"'
  mdt item new order -c sales --family fabric_orders \\
      -a order_no='\"SO-1001\"' --link ORDER_CUSTOMER=ITEM-01J...
")]
pub struct NewItemArgs {
    /// Item type code
    pub item_type: String,

    /// Category code
    #[arg(long, short = 'c')]
    pub category: String,

    /// Family code
    #[arg(long)]
    pub family: String,

    /// Attribute values as code=value (value parsed as JSON, bare text
    /// taken as a string)
    #[arg(long, short = 'a', value_name = "CODE=VALUE")]
    pub attr: Vec<String>,

    /// Associations as RULE_CODE=TARGET_ID, repeatable per rule for
    /// multi-target batches
    #[arg(long, short = 'l', value_name = "RULE=ID")]
    pub link: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListItemArgs {
    /// Restrict to one item type code
    #[arg(long, short = 't')]
    pub item_type: Option<String>,

    /// Include deactivated items
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowItemArgs {
    /// Item id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct SetItemArgs {
    /// Item id
    pub id: String,

    /// Values to set, as code=value
    #[arg(long, short = 'a', value_name = "CODE=VALUE")]
    pub attr: Vec<String>,

    /// Attribute codes to clear
    #[arg(long, value_name = "CODE")]
    pub clear: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Item id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteItemArgs {
    /// Item id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: ItemCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ItemCommands::New(args) => new_item(args, global),
        ItemCommands::List(args) => list_items(args, global),
        ItemCommands::Show(args) => show_item(args, global),
        ItemCommands::Set(args) => set_item(args, global),
        ItemCommands::Deactivate(args) => set_active(args, false, global),
        ItemCommands::Activate(args) => set_active(args, true, global),
        ItemCommands::Delete(args) => delete_item(args, global),
    }
}

fn new_item(args: NewItemArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    let mut attributes = BTreeMap::new();
    for raw in &args.attr {
        let (code, value) = parse_assignment(raw)?;
        attributes.insert(code, value);
    }

    // Repeated --link flags for the same rule form one batch
    let mut associations: Vec<(String, Vec<_>)> = Vec::new();
    for raw in &args.link {
        let (rule, target) = raw
            .split_once('=')
            .ok_or_else(|| miette::miette!("expected 'RULE=ID', got '{raw}'"))?;
        let target = parse_id(target)?;
        match associations.iter_mut().find(|(r, _)| r == rule) {
            Some((_, targets)) => targets.push(target),
            None => associations.push((rule.to_string(), vec![target])),
        }
    }

    let service = ItemService::new(&store);
    let item = service.create_item(
        NewItem {
            item_type: args.item_type,
            category: args.category,
            family: args.family,
            attributes,
            associations,
        },
        &actor(),
    )?;

    if !global.quiet {
        println!("{} Created item {}", style("✓").green(), style(item.id).cyan());
    }
    Ok(())
}

fn list_items(args: ListItemArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    let type_filter = match &args.item_type {
        Some(code) => Some(store.item_type_by_code(code)?.id),
        None => None,
    };
    let type_codes: BTreeMap<_, _> = store
        .item_types
        .list()
        .map_err(CoreError::from)?
        .into_iter()
        .map(|t| (t.id, t.code))
        .collect();

    let mut items: Vec<_> = store
        .items
        .list()
        .map_err(CoreError::from)?
        .into_iter()
        .filter(|i| type_filter.map_or(true, |t| i.item_type == t))
        .filter(|i| i.active || args.all)
        .collect();
    items.sort_by(|a, b| a.audit.created.cmp(&b.audit.created));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&items, global);
    }

    let mut listing = Listing::new(&["ID", "TYPE", "ATTRS", "LINKS", "ACTIVE"], "item");
    for item in &items {
        listing.push(
            item.id.to_string(),
            vec![
                format_short_id(&item.id),
                type_codes
                    .get(&item.item_type)
                    .cloned()
                    .unwrap_or_else(|| "?".to_string()),
                item.attributes.len().to_string(),
                item.associations.len().to_string(),
                if item.active { "yes" } else { "no" }.to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn show_item(args: ShowItemArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let item = store.must_item(parse_id(&args.id)?)?;
    print_doc(&item, global)
}

fn set_item(args: SetItemArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    let mut patch = ItemPatch {
        clear: args.clear.clone(),
        ..Default::default()
    };
    for raw in &args.attr {
        let (code, value) = parse_assignment(raw)?;
        patch.set.insert(code, value);
    }

    let service = ItemService::new(&store);
    let item = service.update_item(parse_id(&args.id)?, &patch, &actor())?;
    if !global.quiet {
        println!("{} Updated item {}", style("✓").green(), style(item.id).cyan());
    }
    Ok(())
}

fn set_active(args: IdArgs, active: bool, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let service = ItemService::new(&store);
    let id = parse_id(&args.id)?;
    let item = if active {
        service.reactivate_item(id, &actor())?
    } else {
        service.deactivate_item(id, &actor())?
    };
    if !global.quiet {
        let verb = if active { "Activated" } else { "Deactivated" };
        println!("{} {verb} item {}", style("✓").green(), style(item.id).cyan());
    }
    Ok(())
}

fn delete_item(args: DeleteItemArgs, global: &GlobalOpts) -> Result<()> {
    if !args.yes {
        return Err(miette::miette!(
            "deletion is permanent; re-run with --yes to confirm"
        ));
    }
    let (_, store) = open_store(global)?;
    let service = ItemService::new(&store);
    let id = parse_id(&args.id)?;
    service.delete_item(id, &actor())?;
    if !global.quiet {
        println!("{} Deleted item {}", style("✓").green(), style(id).cyan());
    }
    Ok(())
}
