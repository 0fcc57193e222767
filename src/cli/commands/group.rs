//! `mdt group` command - Attribute group management

use console::style;
use miette::Result;

use crate::catalog::AttributeGroup;
use crate::cli::helpers::{actor, format_short_id, open_store, print_doc};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::CoreError;

#[derive(clap::Subcommand, Debug)]
pub enum GroupCommands {
    /// Create a new attribute group
    New(NewGroupArgs),

    /// List attribute groups
    List,

    /// Show one group with its attributes
    Show(ShowGroupArgs),

    /// Add an attribute to a group
    AddAttr(AddAttrArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewGroupArgs {
    /// Unique machine code (e.g. "display_specs")
    pub code: String,

    /// Attribute codes to include
    #[arg(long, short = 'a')]
    pub attr: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowGroupArgs {
    /// Group code
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct AddAttrArgs {
    /// Group code
    pub group: String,

    /// Attribute code to add
    pub attr: String,
}

pub fn run(cmd: GroupCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        GroupCommands::New(args) => new_group(args, global),
        GroupCommands::List => list_groups(global),
        GroupCommands::Show(args) => show_group(args, global),
        GroupCommands::AddAttr(args) => add_attr(args, global),
    }
}

fn new_group(args: NewGroupArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    let mut group = AttributeGroup::new(args.code, &actor());
    for code in &args.attr {
        let attr = store
            .attributes
            .find_by_code(code)
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Attr, code.clone()))?;
        group.add_attribute(attr.id);
    }

    let group = store.groups.insert(group).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created group {} with {} attribute(s)",
            style("✓").green(),
            style(&group.code).cyan(),
            group.attributes.len()
        );
    }
    Ok(())
}

fn list_groups(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut groups = store.groups.list().map_err(CoreError::from)?;
    groups.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&groups, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "ATTRS"], "group");
    for group in &groups {
        listing.push(
            group.id.to_string(),
            vec![
                format_short_id(&group.id),
                group.code.clone(),
                group.attributes.len().to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn show_group(args: ShowGroupArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let group = store
        .groups
        .find_by_code(&args.code)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Grp, &*args.code))?;
    print_doc(&group, global)
}

fn add_attr(args: AddAttrArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut group = store
        .groups
        .find_by_code(&args.group)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Grp, &*args.group))?;
    let attr = store
        .attributes
        .find_by_code(&args.attr)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Attr, &*args.attr))?;

    group.add_attribute(attr.id);
    group.audit.touch(&actor());
    store.groups.save(group).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Added {} to {}",
            style("✓").green(),
            style(&args.attr).cyan(),
            style(&args.group).cyan()
        );
    }
    Ok(())
}
