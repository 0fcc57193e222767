//! `mdt type` / `mdt category` / `mdt family` commands
//!
//! The three hierarchies share a shape (code, optional parent, attribute
//! groups), so their commands live together.

use console::style;
use miette::Result;

use crate::cli::helpers::{actor, format_short_id, open_store, print_doc};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::CoreError;
use crate::hierarchy::{CategoryNode, FamilyNode, ItemTypeNode, RequirementResolver};
use crate::store::Store;

#[derive(clap::Subcommand, Debug)]
pub enum TypeCommands {
    /// Create an item type
    New(NewTypeArgs),

    /// List item types
    List,

    /// Show one item type
    Show(ShowArgs),

    /// Show the resolved required attributes for a (type, category, family)
    /// triple
    Required(RequiredArgs),
}

#[derive(clap::Subcommand, Debug)]
pub enum CategoryCommands {
    /// Create a category
    New(NewCategoryArgs),

    /// List categories
    List,

    /// Show one category
    Show(ShowArgs),
}

#[derive(clap::Subcommand, Debug)]
pub enum FamilyCommands {
    /// Create a family
    New(NewFamilyArgs),

    /// List families
    List,

    /// Show one family
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewTypeArgs {
    /// Unique machine code (e.g. "television")
    pub code: String,

    /// Category the type belongs to
    #[arg(long, short = 'c')]
    pub category: String,

    /// Attribute group codes attached to the type
    #[arg(long, short = 'g')]
    pub group: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct NewCategoryArgs {
    /// Unique machine code (e.g. "electronics")
    pub code: String,

    /// Parent category code (omit for a root)
    #[arg(long, short = 'p')]
    pub parent: Option<String>,

    /// Attribute group codes attached to the category
    #[arg(long, short = 'g')]
    pub group: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct NewFamilyArgs {
    /// Unique machine code (e.g. "led_tvs")
    pub code: String,

    /// Category the family belongs to
    #[arg(long, short = 'c')]
    pub category: String,

    /// Parent family code (omit for a root)
    #[arg(long, short = 'p')]
    pub parent: Option<String>,

    /// Attribute group codes attached to the family
    #[arg(long, short = 'g')]
    pub group: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Node code
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct RequiredArgs {
    /// Item type code
    pub item_type: String,

    /// Category code
    #[arg(long, short = 'c')]
    pub category: String,

    /// Family code
    #[arg(long)]
    pub family: String,
}

pub fn run_type(cmd: TypeCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TypeCommands::New(args) => new_type(args, global),
        TypeCommands::List => list_types(global),
        TypeCommands::Show(args) => {
            let (_, store) = open_store(global)?;
            let node = store.item_type_by_code(&args.code)?;
            print_doc(&node, global)
        }
        TypeCommands::Required(args) => show_required(args, global),
    }
}

pub fn run_category(cmd: CategoryCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CategoryCommands::New(args) => new_category(args, global),
        CategoryCommands::List => list_categories(global),
        CategoryCommands::Show(args) => {
            let (_, store) = open_store(global)?;
            let node = category_by_code(&store, &args.code)?;
            print_doc(&node, global)
        }
    }
}

pub fn run_family(cmd: FamilyCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        FamilyCommands::New(args) => new_family(args, global),
        FamilyCommands::List => list_families(global),
        FamilyCommands::Show(args) => {
            let (_, store) = open_store(global)?;
            let node = family_by_code(&store, &args.code)?;
            print_doc(&node, global)
        }
    }
}

fn category_by_code(store: &Store, code: &str) -> Result<CategoryNode, CoreError> {
    store
        .categories
        .find_by_code(code)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Cat, code))
}

fn family_by_code(store: &Store, code: &str) -> Result<FamilyNode, CoreError> {
    store
        .families
        .find_by_code(code)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Fam, code))
}

fn group_ids(store: &Store, codes: &[String]) -> Result<Vec<EntityId>, CoreError> {
    codes
        .iter()
        .map(|code| {
            store
                .groups
                .find_by_code(code)?
                .map(|g| g.id)
                .ok_or_else(|| CoreError::not_found(EntityPrefix::Grp, code.clone()))
        })
        .collect()
}

fn new_type(args: NewTypeArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let category = category_by_code(&store, &args.category)?;

    let mut node = ItemTypeNode::new(args.code, category.id, &actor());
    node.groups = group_ids(&store, &args.group)?;

    let node = store.item_types.insert(node).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created item type {} ({})",
            style("✓").green(),
            style(&node.code).cyan(),
            node.id
        );
    }
    Ok(())
}

fn new_category(args: NewCategoryArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let parent = match &args.parent {
        Some(code) => Some(category_by_code(&store, code)?.id),
        None => None,
    };

    let mut node = CategoryNode::new(args.code, parent, &actor());
    node.groups = group_ids(&store, &args.group)?;

    let node = store.categories.insert(node).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created category {} ({})",
            style("✓").green(),
            style(&node.code).cyan(),
            node.id
        );
    }
    Ok(())
}

fn new_family(args: NewFamilyArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let category = category_by_code(&store, &args.category)?;
    let parent = match &args.parent {
        Some(code) => Some(family_by_code(&store, code)?.id),
        None => None,
    };

    let mut node = FamilyNode::new(args.code, category.id, parent, &actor());
    node.groups = group_ids(&store, &args.group)?;

    let node = store.families.insert(node).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created family {} ({})",
            style("✓").green(),
            style(&node.code).cyan(),
            node.id
        );
    }
    Ok(())
}

fn list_types(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut nodes = store.item_types.list().map_err(CoreError::from)?;
    nodes.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&nodes, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "CATEGORY", "GROUPS"], "item type");
    for node in &nodes {
        listing.push(
            node.id.to_string(),
            vec![
                format_short_id(&node.id),
                node.code.clone(),
                format_short_id(&node.category),
                node.groups.len().to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn list_categories(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut nodes = store.categories.list().map_err(CoreError::from)?;
    nodes.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&nodes, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "PARENT", "GROUPS"], "category");
    for node in &nodes {
        listing.push(
            node.id.to_string(),
            vec![
                format_short_id(&node.id),
                node.code.clone(),
                node.parent.map(|p| format_short_id(&p)).unwrap_or_default(),
                node.groups.len().to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn list_families(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut nodes = store.families.list().map_err(CoreError::from)?;
    nodes.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&nodes, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "CATEGORY", "PARENT", "GROUPS"], "family");
    for node in &nodes {
        listing.push(
            node.id.to_string(),
            vec![
                format_short_id(&node.id),
                node.code.clone(),
                format_short_id(&node.category),
                node.parent.map(|p| format_short_id(&p)).unwrap_or_default(),
                node.groups.len().to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn show_required(args: RequiredArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let type_node = store.item_type_by_code(&args.item_type)?;
    let category = category_by_code(&store, &args.category)?;
    let family = family_by_code(&store, &args.family)?;

    let resolver = RequirementResolver::new(&store);
    let required = resolver.resolve_required(type_node.id, category.id, family.id)?;

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&required, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "KIND"], "required attribute");
    for attr in &required {
        listing.push(
            attr.id.to_string(),
            vec![
                format_short_id(&attr.id),
                attr.code.clone(),
                format!("{:?}", attr.kind).to_lowercase(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}
